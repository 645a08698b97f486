use std::fs;
use std::path::Path;

use crate::io::project_io::{CONFIG_FILE, ProjectError, atomic_write};
use crate::model::config::ProjectConfig;

/// Read the project config, returning both the parsed config and the raw
/// toml_edit Document for round-trip-safe editing.
pub fn read_config(wbs_dir: &Path) -> Result<(ProjectConfig, toml_edit::DocumentMut), ProjectError> {
    let config_path = wbs_dir.join(CONFIG_FILE);
    let config_text = fs::read_to_string(&config_path).map_err(|e| ProjectError::ReadError {
        path: config_path.clone(),
        source: e,
    })?;
    let config: ProjectConfig = toml::from_str(&config_text)?;
    let doc: toml_edit::DocumentMut = config_text.parse()?;
    Ok((config, doc))
}

/// Write the config document back to disk, preserving formatting.
pub fn write_config(wbs_dir: &Path, doc: &toml_edit::DocumentMut) -> Result<(), ProjectError> {
    let config_path = wbs_dir.join(CONFIG_FILE);
    atomic_write(&config_path, doc.to_string().as_bytes()).map_err(|e| ProjectError::WriteError {
        path: config_path,
        source: e,
    })?;
    Ok(())
}

/// Store a filter preset as `[presets.<name>]`, replacing any existing one
pub fn save_preset<'a>(
    doc: &mut toml_edit::DocumentMut,
    name: &str,
    filters: impl IntoIterator<Item = (&'a str, &'a str)>,
) {
    if !doc.contains_key("presets") {
        let mut presets = toml_edit::Table::new();
        presets.set_implicit(true);
        doc["presets"] = toml_edit::Item::Table(presets);
    }
    let mut table = toml_edit::Table::new();
    for (column, needle) in filters {
        table[column] = toml_edit::value(needle);
    }
    doc["presets"][name] = toml_edit::Item::Table(table);
}

/// Remove a preset; returns false if it did not exist
pub fn remove_preset(doc: &mut toml_edit::DocumentMut, name: &str) -> bool {
    doc.get_mut("presets")
        .and_then(|item| item.as_table_mut())
        .is_some_and(|presets| presets.remove(name).is_some())
}

/// Set the default visible columns
pub fn set_default_columns(doc: &mut toml_edit::DocumentMut, columns: &[&str]) {
    if !doc.contains_key("display") {
        doc["display"] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    let array: toml_edit::Array = columns.iter().copied().collect();
    doc["display"]["columns"] = toml_edit::value(array);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_config() -> &'static str {
        r#"[project]
name = "Tower B"

# reconnect tuning for the site office link
[sync]
retry_delay_ms = 5000

[presets.mine]
executor = "Ivanov"
"#
    }

    #[test]
    fn test_round_trip_config() {
        let tmp = TempDir::new().unwrap();
        let wbs_dir = tmp.path().join("wbs");
        fs::create_dir_all(&wbs_dir).unwrap();
        let config_path = wbs_dir.join("project.toml");

        let original = sample_config();
        fs::write(&config_path, original).unwrap();

        let (config, doc) = read_config(&wbs_dir).unwrap();
        assert_eq!(config.sync.retry_delay_ms, 5000);
        write_config(&wbs_dir, &doc).unwrap();

        let written = fs::read_to_string(&config_path).unwrap();
        assert_eq!(written, original);
    }

    #[test]
    fn test_save_preset_keeps_comments() {
        let mut doc: toml_edit::DocumentMut = sample_config().parse().unwrap();
        save_preset(&mut doc, "roof", [("code", "3."), ("unit", "m2")]);
        let result = doc.to_string();
        assert!(result.contains("# reconnect tuning"));

        let config: ProjectConfig = toml::from_str(&result).unwrap();
        let names: Vec<&str> = config.presets.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["mine", "roof"]);
        assert_eq!(config.presets["roof"]["unit"], "m2");
    }

    #[test]
    fn test_save_preset_into_empty_config() {
        let mut doc: toml_edit::DocumentMut = "[project]\nname = \"x\"\n".parse().unwrap();
        save_preset(&mut doc, "mine", [("executor", "Petrov")]);
        let config: ProjectConfig = toml::from_str(&doc.to_string()).unwrap();
        assert_eq!(config.presets["mine"]["executor"], "Petrov");
    }

    #[test]
    fn test_remove_preset() {
        let mut doc: toml_edit::DocumentMut = sample_config().parse().unwrap();
        assert!(remove_preset(&mut doc, "mine"));
        assert!(!remove_preset(&mut doc, "mine"));
        let config: ProjectConfig = toml::from_str(&doc.to_string()).unwrap();
        assert!(config.presets.is_empty());
    }

    #[test]
    fn test_set_default_columns() {
        let mut doc: toml_edit::DocumentMut = sample_config().parse().unwrap();
        set_default_columns(&mut doc, &["code", "name", "progress"]);
        let config: ProjectConfig = toml::from_str(&doc.to_string()).unwrap();
        assert_eq!(config.display.columns, vec!["code", "name", "progress"]);
    }
}
