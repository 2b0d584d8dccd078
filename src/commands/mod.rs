//! CLI command definitions and dispatch.

pub mod config;
pub mod entry;
pub mod tag;

use clap::{Parser, Subcommand};
use serde_json::Value;

use crate::output::OutputFormat;
use kvstash_cache::Cache;
use kvstash_core::config::AppConfig;
use kvstash_core::error::AppError;

/// kvstash: key/value cache over local files or Redis
#[derive(Debug, Parser)]
#[command(name = "kvstash", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Read a value
    Get {
        /// Cache name
        name: String,
        /// Printed when the entry is absent
        #[arg(short, long)]
        default: Option<String>,
    },
    /// Store a value (JSON, or a plain string)
    Set {
        /// Cache name
        name: String,
        /// Value to store
        value: String,
        /// TTL in seconds; 0 stores without expiry
        #[arg(short, long)]
        expire: Option<u64>,
        /// Record the entry under this tag
        #[arg(short, long)]
        tag: Option<String>,
    },
    /// Increment a counter
    Inc {
        /// Cache name
        name: String,
        /// Amount to add
        #[arg(short, long, default_value_t = 1)]
        step: i64,
    },
    /// Decrement a counter
    Dec {
        /// Cache name
        name: String,
        /// Amount to subtract
        #[arg(short, long, default_value_t = 1)]
        step: i64,
    },
    /// Check whether a live value exists
    Has {
        /// Cache name
        name: String,
    },
    /// Delete a value
    Remove {
        /// Cache name
        name: String,
    },
    /// Read and delete a value
    Pull {
        /// Cache name
        name: String,
        /// Pull falsy values (0, "", false) too
        #[arg(long)]
        strict: bool,
    },
    /// Delete every entry in the configured scope
    Clear,
    /// Add cache names to a tag
    Tag(tag::TagArgs),
    /// List the members of a tag
    TagItems {
        /// Tag name
        name: String,
    },
    /// Delete every member of a tag
    ClearTag {
        /// Tag name
        name: String,
    },
    /// Drop tag members whose entries are gone
    PruneTag {
        /// Tag name
        name: String,
    },
    /// Check the cache backend
    Ping,
    /// Configuration management
    Config(config::ConfigArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self, app_config: AppConfig) -> Result<(), AppError> {
        let format = self.format;
        if let Commands::Config(args) = &self.command {
            return config::execute(args, &self.config, app_config, format);
        }

        let cache = Cache::new(app_config.cache)?;
        match &self.command {
            Commands::Get { name, default } => {
                entry::get(&cache, name, default.as_deref(), format).await
            }
            Commands::Set {
                name,
                value,
                expire,
                tag,
            } => entry::set(&cache, name, value, *expire, tag.as_deref(), format).await,
            Commands::Inc { name, step } => entry::inc(&cache, name, *step, format).await,
            Commands::Dec { name, step } => entry::dec(&cache, name, *step, format).await,
            Commands::Has { name } => entry::has(&cache, name, format).await,
            Commands::Remove { name } => entry::remove(&cache, name, format).await,
            Commands::Pull { name, strict } => entry::pull(&cache, name, *strict, format).await,
            Commands::Clear => entry::clear(&cache, format).await,
            Commands::Ping => entry::ping(&cache, format).await,
            Commands::Tag(args) => tag::tag(&cache, args, format).await,
            Commands::TagItems { name } => tag::items(&cache, name, format).await,
            Commands::ClearTag { name } => tag::clear(&cache, name, format).await,
            Commands::PruneTag { name } => tag::prune(&cache, name, format).await,
            Commands::Config(_) => Ok(()),
        }
    }
}

/// Interpret a command-line value: JSON when it parses, a string otherwise.
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use serde_json::json;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("{\"a\":1}"), json!({"a": 1}));
        assert_eq!(parse_value("42"), json!(42));
        assert_eq!(parse_value("hello"), json!("hello"));
    }

    #[test]
    fn test_parse_set_args() {
        let cli = Cli::parse_from(["kvstash", "set", "k", "1", "--expire", "5", "--tag", "t"]);
        match cli.command {
            Commands::Set {
                name, expire, tag, ..
            } => {
                assert_eq!(name, "k");
                assert_eq!(expire, Some(5));
                assert_eq!(tag.as_deref(), Some("t"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
