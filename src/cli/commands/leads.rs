use std::fs;

use clap::Subcommand;
use serde_json::Value;

use crate::cli::utils::{output_rows, output_success, read_stdin_json};
use crate::cli::{CliContext, OutputFormat};
use crate::filter::FilterData;
use crate::hooks::LeadHooks;
use crate::models::{Entity, FormSubmission, LeadStatus};

#[derive(Subcommand)]
pub enum LeadCommands {
    #[command(about = "List leads, optionally by status")]
    List {
        #[arg(long, help = "Status label, e.g. חדש")]
        status: Option<String>,
    },

    #[command(about = "Move a lead to a new status")]
    Status {
        #[arg(help = "Lead ID")]
        id: String,
        #[arg(help = "New status label")]
        status: String,
    },

    #[command(about = "Create a lead from a form-submission payload")]
    Ingest {
        #[arg(help = "Payload file (reads stdin when omitted)")]
        file: Option<String>,
    },

    #[command(about = "Show the known status labels")]
    Statuses,
}

pub async fn handle(ctx: &CliContext, cmd: LeadCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let leads = LeadHooks::new(ctx.hooks.clone());

    match cmd {
        LeadCommands::List { status } => {
            let rows = match status {
                Some(status) => leads.by_status(&status).await?,
                None => leads.entity.fetch_list(FilterData::default()).await?,
            };
            let rows = rows.iter().map(Entity::to_row).collect::<Result<Vec<_>, _>>()?;
            let rows: Vec<Value> = rows.into_iter().map(Value::Object).collect();
            output_rows(&output_format, "leads", &rows, &["id", "full_name", "phone", "status"])
        }
        LeadCommands::Status { id, status } => {
            let lead = leads.update_status(&id, &status).await?;
            output_success(
                &output_format,
                &format!("Lead {} is now {}", lead.id, lead.status),
                Some(Value::Object(lead.to_row()?)),
            )
        }
        LeadCommands::Ingest { file } => {
            let body = match file {
                Some(path) => fs::read_to_string(path)?,
                None => read_stdin_json()?.to_string(),
            };
            let submission = FormSubmission::from_json(&body)?;
            let lead = leads.ingest(&submission).await?;
            output_success(
                &output_format,
                &format!("Created lead {} from form {}", lead.id, submission.form_id),
                Some(Value::Object(lead.to_row()?)),
            )
        }
        LeadCommands::Statuses => {
            let rows: Vec<Value> = LeadStatus::ALL.iter().map(|s| serde_json::json!({ "status": s })).collect();
            output_rows(&output_format, "statuses", &rows, &["status"])
        }
    }
}
