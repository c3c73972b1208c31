use clap::Subcommand;

use crate::cli::config::{load_ui_state, save_ui_state};
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::state::{UiAction, UiState};

#[derive(Subcommand)]
pub enum UiCommands {
    #[command(about = "Show persisted UI state")]
    Show,

    #[command(about = "Apply a UI action given as JSON, e.g. {\"slice\":\"sidebar\",\"action\":{\"type\":\"toggle\"}}")]
    Dispatch {
        #[arg(help = "Action JSON")]
        action: String,
    },

    #[command(about = "Reset UI state to defaults")]
    Reset,
}

pub async fn handle(cmd: UiCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        UiCommands::Show => {
            let state = load_ui_state()?;
            output_success(&output_format, "UI state", Some(serde_json::to_value(&state)?))
        }
        UiCommands::Dispatch { action } => {
            let action: UiAction = serde_json::from_str(&action)
                .map_err(|e| anyhow::anyhow!("Invalid UI action: {}", e))?;
            let mut state = load_ui_state()?;
            state.dispatch(action)?;
            save_ui_state(&state)?;
            output_success(&output_format, "UI state updated", Some(serde_json::to_value(&state)?))
        }
        UiCommands::Reset => {
            save_ui_state(&UiState::default())?;
            output_success(&output_format, "UI state reset", None)
        }
    }
}
