use clap::Subcommand;
use serde_json::Value;

use crate::cli::utils::{output_rows, output_success, parse_json_arg, read_stdin_json};
use crate::cli::{CliContext, OutputFormat};
use crate::error::CrmError;
use crate::filter::{Filter, FilterData};
use crate::mutation::{CacheTarget, Patch};
use crate::query_key;
use crate::remote::into_row;

#[derive(Subcommand)]
pub enum DataCommands {
    #[command(about = "Select rows with flexible query support")]
    Select {
        #[arg(help = "Table name")]
        table: String,
        #[arg(help = "Row ID to retrieve (optional)")]
        id: Option<String>,
        #[arg(long, help = "JSON filter: where, order, limit, offset")]
        filter: Option<String>,
    },

    #[command(about = "Create a row from stdin")]
    Create {
        #[arg(help = "Table name")]
        table: String,
    },

    #[command(about = "Patch a row from stdin")]
    Update {
        #[arg(help = "Table name")]
        table: String,
        #[arg(help = "Row ID to update")]
        id: String,
    },

    #[command(about = "Delete rows")]
    Delete {
        #[arg(help = "Table name")]
        table: String,
        #[arg(help = "Row IDs to delete", required = true)]
        ids: Vec<String>,
    },
}

pub async fn handle(ctx: &CliContext, cmd: DataCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let hooks = &ctx.hooks;

    match cmd {
        DataCommands::Select { table, id, filter } => {
            let filter = match id {
                Some(id) => Filter::by_id(&table, &id)?,
                None => Filter::from_data(&table, parse_json_arg::<FilterData>(filter.as_deref())?)?,
            };
            let rows: Vec<Value> = hooks.client.select(&filter).await?.into_iter().map(Value::Object).collect();
            output_rows(&output_format, &table, &rows, &["id", "full_name", "name", "status", "updated_at"])
        }
        DataCommands::Create { table } => {
            let row = hooks.client.insert(&table, into_row(read_stdin_json()?)?).await?;
            hooks.cache.invalidate(&query_key![table.as_str()]).await;
            output_success(&output_format, &format!("Created row in {}", table), Some(Value::Object(row)))
        }
        DataCommands::Update { table, id } => {
            let patch = Patch::from_value(read_stdin_json()?)?;
            let targets = [
                CacheTarget::Detail(query_key![table.as_str(), "detail", id.as_str()]),
                CacheTarget::ListPrefix(query_key![table.as_str(), "list"]),
            ];
            let row = hooks
                .reconciler()
                .update(&table, &id, patch, &targets, &[query_key![table.as_str(), "list"]])
                .await?;
            output_success(&output_format, &format!("Updated {} {}", table, id), Some(Value::Object(row)))
        }
        DataCommands::Delete { table, ids } => {
            let targets = [CacheTarget::ListPrefix(query_key![table.as_str(), "list"])];
            let deleted = hooks.reconciler().remove(&table, &ids, &targets, &[]).await?;
            if deleted.is_empty() {
                return Err(CrmError::not_found(format!("no {} rows matched", table)).into());
            }
            output_success(&output_format, &format!("Deleted {} row(s) from {}", deleted.len(), table), None)
        }
    }
}
