use clap::Subcommand;
use rally_core::config::{AppMode, RallyConfig};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Initialize ~/.rally/ with default config and database
    Init,
    /// Show current configuration
    Show,
    /// Show or switch the app mode (`live` or `demo`)
    Mode {
        mode: Option<AppMode>,
    },
}

pub fn run(action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let home = RallyConfig::init()?;
            let db_path = RallyConfig::db_path()?;

            // Opening the store creates the schema.
            super::open_store()?;

            println!("Initialized rally at {}", home.display());
            println!("  config: {}", RallyConfig::config_path()?.display());
            println!("  database: {}", db_path.display());
            Ok(())
        }
        ConfigAction::Show => {
            let config = RallyConfig::load()?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{toml_str}");
            Ok(())
        }
        ConfigAction::Mode { mode } => {
            let mut config = RallyConfig::load()?;
            if let Some(mode) = mode {
                config.app_mode = mode;
                config.save()?;
            }
            println!("App mode: {}", config.app_mode);
            Ok(())
        }
    }
}
