//! Configuration management CLI commands.

use clap::{Args, Subcommand};

use crate::output::{self, OutputFormat};
use kvstash_core::config::AppConfig;
use kvstash_core::config::cache::DriverKind;
use kvstash_core::error::AppError;

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show,
    /// Validate configuration
    Validate,
}

/// Execute config commands
pub fn execute(
    args: &ConfigArgs,
    config_path: &str,
    config: AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    match &args.command {
        ConfigCommand::Show => {
            output::print_item(&masked(config), format);
        }
        ConfigCommand::Validate => match config.cache.validate() {
            Ok(kind) => {
                output::print_success(&format!("Configuration '{}' is valid", config_path));
                output::print_kv("Cache", kind.as_str());
                match kind {
                    DriverKind::File => output::print_kv("Path", &config.cache.path),
                    DriverKind::Redis => output::print_kv(
                        "Redis",
                        &format!(
                            "{}:{}/{}",
                            config.cache.host, config.cache.port, config.cache.select
                        ),
                    ),
                    DriverKind::Memory => {}
                }
                output::print_kv("Default expire", &format!("{}s", config.cache.expire));
                output::print_kv("Log level", &config.logging.level);
            }
            Err(e) => {
                output::print_error(&format!("Configuration invalid: {}", e));
                return Err(e);
            }
        },
    }

    Ok(())
}

/// Hide the store password for display
fn masked(mut config: AppConfig) -> AppConfig {
    if !config.cache.password.is_empty() {
        config.cache.password = "****".to_string();
    }
    config
}
