use clap::Subcommand;
use kidtimer_core::{Config, ConfigError};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print one value, e.g. `timer.warning_offsets_secs` or `storage.backend`
    Get { key: String },
    /// Change one value. Arrays and tables take JSON, e.g.
    /// `children '[{"id":"…","name":"Emma","age":7}]'`
    Set { key: String, value: String },
    /// Print the whole configuration as JSON
    List,
    /// Print the children and categories timers can be started for
    Family,
    /// Overwrite the configuration with defaults
    Reset,
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key).ok_or(ConfigError::UnknownKey(key))?;
            println!("{value}");
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            println!("{key} = {}", config.get(&key).unwrap_or(value));
        }
        ConfigAction::List => {
            println!("{}", serde_json::to_string_pretty(&Config::load()?)?);
        }
        ConfigAction::Family => {
            let config = Config::load()?;
            let family = serde_json::json!({
                "children": config.children,
                "categories": config.categories,
            });
            println!("{}", serde_json::to_string_pretty(&family)?);
        }
        ConfigAction::Reset => {
            Config::default().save()?;
            println!("config reset to defaults");
        }
    }
    Ok(())
}
