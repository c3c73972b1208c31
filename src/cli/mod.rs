pub mod commands;
pub mod config;
pub mod utils;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::SessionStore;
use crate::config::AppConfig;
use crate::hooks::HookContext;
use crate::notify::TracingNotifier;
use crate::remote::{MemoryStore, RemoteDataClient, RestClient};

#[derive(Parser)]
#[command(name = "crm")]
#[command(about = "Coaching CRM command line - leads, customers and data operations")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[arg(long, global = true, help = "Use a local in-memory store instead of the hosted one")]
    pub offline: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Sign in, sign out and session status")]
    Auth {
        #[command(subcommand)]
        cmd: commands::auth::AuthCommands,
    },

    #[command(about = "Generic row operations on any table")]
    Data {
        #[command(subcommand)]
        cmd: commands::data::DataCommands,
    },

    #[command(about = "Lead workflow")]
    Leads {
        #[command(subcommand)]
        cmd: commands::leads::LeadCommands,
    },

    #[command(about = "Persisted UI preferences")]
    Ui {
        #[command(subcommand)]
        cmd: commands::ui::UiCommands,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

/// Wiring shared by commands that talk to the store
pub struct CliContext {
    pub app: AppConfig,
    pub hooks: HookContext,
    pub sessions: SessionStore,
    offline: Option<MemoryStore>,
}

impl CliContext {
    pub async fn build(offline: bool) -> anyhow::Result<Self> {
        let app = crate::config::config().clone();
        let sessions = SessionStore::new(&app.auth);
        if let Some(session) = config::load_session()? {
            sessions.set(session).await;
        }

        let (client, offline): (Arc<dyn RemoteDataClient>, Option<MemoryStore>) = if offline {
            let store = MemoryStore::new();
            for (table, rows) in config::load_offline_tables()? {
                store.seed(&table, rows.into_iter().map(Value::Object)).await?;
            }
            (Arc::new(store.clone()), Some(store))
        } else {
            (Arc::new(RestClient::new(&app.remote, sessions.clone())?), None)
        };

        let hooks = HookContext::new(app.clone(), client, Arc::new(TracingNotifier)).with_sessions(sessions.clone());
        Ok(Self { app, hooks, sessions, offline })
    }

    /// Persist offline tables; forget a session the store rejected
    pub async fn finish(&self) -> anyhow::Result<()> {
        match &self.offline {
            Some(store) => config::save_offline_tables(&store.snapshot().await)?,
            None => {
                if !self.sessions.is_authenticated().await {
                    config::clear_session()?;
                }
            }
        }
        Ok(())
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Auth { cmd } => commands::auth::handle(cmd, output_format).await,
        Commands::Ui { cmd } => commands::ui::handle(cmd, output_format).await,
        Commands::Data { cmd } => {
            let ctx = CliContext::build(cli.offline).await?;
            let result = commands::data::handle(&ctx, cmd, output_format).await;
            command_outcome(result, ctx.finish().await)
        }
        Commands::Leads { cmd } => {
            let ctx = CliContext::build(cli.offline).await?;
            let result = commands::leads::handle(&ctx, cmd, output_format).await;
            command_outcome(result, ctx.finish().await)
        }
    }
}

/// The command's own error wins; a failed `finish` after it is only logged
fn command_outcome(result: anyhow::Result<()>, finished: anyhow::Result<()>) -> anyhow::Result<()> {
    match (result, finished) {
        (Err(e), Err(finish_err)) => {
            tracing::warn!("could not persist local state: {:#}", finish_err);
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Ok(()), finished) => finished,
    }
}
