use std::fs;
use std::path::Path;

use crate::cli::commands::InitArgs;
use crate::io::store::JsonFileStore;

const CONFIG_TOML_TEMPLATE: &str = r##"# pathlist configuration

[tasks]
# What `pl rm` does with locked tasks:
#   "protect" refuses when the task, an ancestor or a descendant is locked
#   "allow" deletes anyway
locked_delete = "protect"

[import]
# Keep ids, display orders, dates and locks from imported files
preserve_metadata = false

[complete]
limit = 20
case_sensitive = false

[log]
# tracing filter used when PATHLIST_LOG is unset
level = "warn"
"##;

/// Create the data directory with a default config.toml and an empty store
pub fn cmd_init(data_dir: &Path, args: InitArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = data_dir.join("config.toml");
    if config_path.exists() && !args.force {
        return Err(format!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        )
        .into());
    }

    // Opening the store creates the directory
    JsonFileStore::open(data_dir)?;
    fs::write(&config_path, CONFIG_TOML_TEMPLATE)?;

    println!("initialized pathlist in {}", data_dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::config::Config;
    use tempfile::TempDir;

    #[test]
    fn template_parses_to_defaults() {
        let config: Config = toml::from_str(CONFIG_TOML_TEMPLATE).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("data");
        cmd_init(&dir, InitArgs { force: false }).unwrap();
        assert!(dir.join("config.toml").exists());
        assert!(cmd_init(&dir, InitArgs { force: false }).is_err());
        assert!(cmd_init(&dir, InitArgs { force: true }).is_ok());
    }
}
