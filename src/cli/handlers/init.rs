use std::fs;

use crate::cli::commands::InitArgs;
use crate::io::project_io::{self, CONFIG_FILE, JOURNAL_FILE, NODES_FILE, PROJECT_DIR};

use super::start_dir;

const PROJECT_TOML_TEMPLATE: &str = r##"[project]
name = "{name}"

[sync]
# Fixed delay between reconnect attempts of `wbs watch`
retry_delay_ms = 3000
# Automatic reconnects before giving up (press r to retry manually)
max_retry_attempts = 5
# Delay between a schedule clear and the follow-up full fetch
refetch_delay_ms = 1000
tick_ms = 100

[display]
date_format = "%d.%m.%Y"
breadcrumb_separator = " / "
picker_limit = 100
# Columns shown by `wbs list`; see `wbs columns` for keys
# columns = ["code", "name", "unit", "volume_plan", "volume_fact", "progress"]

# --- Filter presets ---
# Save with: wbs preset save <name> -f column=text
#
# [presets.concrete]
# name = "concrete"
# executor = "ivanov"
"##;

/// Infer a project name from a directory name: replace hyphens with spaces, title-case.
fn infer_name(dir_name: &str) -> String {
    dir_name
        .split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(c) => {
                    let upper: String = c.to_uppercase().collect();
                    upper + chars.as_str()
                }
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn render_project_toml(name: &str) -> String {
    let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
    PROJECT_TOML_TEMPLATE.replace("{name}", &escaped)
}

pub fn cmd_init(args: InitArgs) -> Result<(), Box<dyn std::error::Error>> {
    let root = start_dir()?;
    let wbs_dir = root.join(PROJECT_DIR);

    if wbs_dir.is_dir() && !args.force {
        return Err(format!(
            "wbs project already exists in {}/ (use --force to reinitialize)",
            wbs_dir.display()
        )
        .into());
    }

    if let Some(parent) = root.parent()
        && let Ok(parent_root) = project_io::discover_project(parent)
    {
        eprintln!(
            "note: parent project found at {}/",
            parent_root.join(PROJECT_DIR).display()
        );
    }

    let name = args.name.unwrap_or_else(|| {
        root.file_name()
            .and_then(|n| n.to_str())
            .map(infer_name)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "Untitled".to_string())
    });

    fs::create_dir_all(&wbs_dir)?;
    project_io::atomic_write(
        &wbs_dir.join(CONFIG_FILE),
        render_project_toml(&name).as_bytes(),
    )?;

    // --force keeps existing schedule data
    let nodes = wbs_dir.join(NODES_FILE);
    if !nodes.exists() {
        fs::write(&nodes, "[]\n")?;
    }
    let journal = wbs_dir.join(JOURNAL_FILE);
    if !journal.exists() {
        fs::write(&journal, "")?;
    }

    println!("Initialized wbs project: {}", name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::config::ProjectConfig;

    #[test]
    fn test_infer_name() {
        assert_eq!(infer_name("tower-b"), "Tower B");
        assert_eq!(infer_name("wbs"), "Wbs");
        assert_eq!(infer_name("north_wing--phase-2"), "North Wing Phase 2");
    }

    #[test]
    fn template_parses_with_defaults() {
        let config: ProjectConfig = toml::from_str(&render_project_toml("Tower B")).unwrap();
        assert_eq!(config.project.name, "Tower B");
        assert_eq!(config.sync.retry_delay_ms, 3000);
        assert_eq!(config.sync.max_retry_attempts, 5);
        assert_eq!(config.display.breadcrumb_separator, " / ");
        assert!(config.display.columns.is_empty());
        assert!(config.presets.is_empty());
    }

    #[test]
    fn template_escapes_quotes() {
        let config: ProjectConfig =
            toml::from_str(&render_project_toml(r#"Block "A""#)).unwrap();
        assert_eq!(config.project.name, r#"Block "A""#);
    }
}
