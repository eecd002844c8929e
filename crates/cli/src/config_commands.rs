use std::path::Path;

use {
    anyhow::{Result, bail},
    clap::Subcommand,
    calbridge_config::{CalbridgeConfig, default_config_template, find_or_default_config_path},
};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration (file plus environment).
    Show,
    /// Print the config file path in use.
    Path,
    /// Write a commented starter config.
    Init {
        /// Overwrite an existing file.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

pub fn handle_config(
    action: ConfigAction,
    config: &CalbridgeConfig,
    explicit_path: Option<&Path>,
) -> Result<()> {
    let path = explicit_path.map_or_else(find_or_default_config_path, Path::to_path_buf);
    match action {
        ConfigAction::Show => {
            print!("{}", toml::to_string_pretty(config)?);
            Ok(())
        },
        ConfigAction::Path => {
            let note = if path.is_file() { "" } else { " (not created yet)" };
            println!("{}{note}", path.display());
            Ok(())
        },
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                bail!(
                    "{} already exists, pass --force to overwrite",
                    path.display()
                );
            }
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, default_config_template(config.server.port))?;
            println!("Wrote {}", path.display());
            Ok(())
        },
    }
}
