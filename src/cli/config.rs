use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use crate::auth::Session;
use crate::remote::Row;
use crate::state::UiState;

pub fn get_config_dir() -> anyhow::Result<PathBuf> {
    let config_dir = if let Ok(custom_dir) = std::env::var("CRM_CLI_CONFIG_DIR") {
        PathBuf::from(custom_dir)
    } else {
        let home = std::env::var("HOME").map_err(|_| anyhow::anyhow!("HOME environment variable not set"))?;
        PathBuf::from(home).join(".config").join("coach-crm")
    };

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

pub fn load_session() -> anyhow::Result<Option<Session>> {
    let session_file = get_config_dir()?.join("session.json");

    if !session_file.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(session_file)?;
    Ok(Some(serde_json::from_str(&content)?))
}

pub fn save_session(session: &Session) -> anyhow::Result<()> {
    let session_file = get_config_dir()?.join("session.json");

    let content = serde_json::to_string_pretty(session)?;
    fs::write(session_file, content)?;
    Ok(())
}

pub fn clear_session() -> anyhow::Result<()> {
    let session_file = get_config_dir()?.join("session.json");

    if session_file.exists() {
        fs::remove_file(session_file)?;
    }
    Ok(())
}

/// Tables backing `--offline` runs
pub fn load_offline_tables() -> anyhow::Result<BTreeMap<String, Vec<Row>>> {
    let offline_file = get_config_dir()?.join("offline.json");

    if !offline_file.exists() {
        return Ok(BTreeMap::new());
    }

    let content = fs::read_to_string(offline_file)?;
    Ok(serde_json::from_str(&content)?)
}

pub fn save_offline_tables(tables: &BTreeMap<String, Vec<Row>>) -> anyhow::Result<()> {
    let offline_file = get_config_dir()?.join("offline.json");

    let content = serde_json::to_string_pretty(tables)?;
    fs::write(offline_file, content)?;
    Ok(())
}

pub fn load_ui_state() -> anyhow::Result<UiState> {
    let ui_file = get_config_dir()?.join("ui.json");

    if !ui_file.exists() {
        return Ok(UiState::default());
    }

    let content = fs::read_to_string(ui_file)?;
    Ok(UiState::from_json(&content)?)
}

pub fn save_ui_state(state: &UiState) -> anyhow::Result<()> {
    let ui_file = get_config_dir()?.join("ui.json");

    fs::write(ui_file, state.to_json()?)?;
    Ok(())
}
