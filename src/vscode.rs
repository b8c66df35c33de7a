//! Reading and writing the workspace `.vscode/settings.json`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_json::{Map, Value};

/// The settings entry all color output lives under.
pub const COLOR_CUSTOMIZATIONS_KEY: &str = "workbench.colorCustomizations";

pub fn settings_path(workspace: &Path) -> PathBuf {
    workspace.join(".vscode").join("settings.json")
}

/// Load the settings document; a missing file is an empty document, any
/// other read or parse failure is an error (overwriting a file we could not
/// parse would destroy user settings).
pub fn read_settings(path: &Path) -> anyhow::Result<Map<String, Value>> {
    if !path.exists() {
        return Ok(Map::new());
    }
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file {}", path.display()))?;
    if text.trim().is_empty() {
        return Ok(Map::new());
    }
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse settings file {}", path.display()))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => anyhow::bail!("settings file {} is not a JSON object", path.display()),
    }
}

/// The `workbench.colorCustomizations` object, empty when absent or not an
/// object.
pub fn color_customizations(settings: &Map<String, Value>) -> Map<String, Value> {
    match settings.get(COLOR_CUSTOMIZATIONS_KEY) {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    }
}

/// Write the settings document back, replacing the customizations object.
///
/// An empty customizations object removes the key entirely rather than
/// leaving `{}` behind. The write goes through a sibling temp file and a
/// rename so a crash cannot leave a truncated settings.json.
pub fn write_settings(
    path: &Path,
    mut settings: Map<String, Value>,
    customizations: Map<String, Value>,
) -> anyhow::Result<()> {
    if customizations.is_empty() {
        settings.remove(COLOR_CUSTOMIZATIONS_KEY);
    } else {
        settings.insert(
            COLOR_CUSTOMIZATIONS_KEY.to_owned(),
            Value::Object(customizations),
        );
    }

    let parent = path
        .parent()
        .context("settings path has no parent directory")?;
    fs::create_dir_all(parent)
        .with_context(|| format!("failed to create directory {}", parent.display()))?;

    let mut text = serde_json::to_string_pretty(&Value::Object(settings))
        .context("failed to serialize settings")?;
    text.push('\n');

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, &text)
        .with_context(|| format!("failed to write temp settings file {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("failed to replace settings file {}", path.display()))?;
    Ok(())
}
