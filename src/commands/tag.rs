//! Tag commands.

use clap::Args;
use serde::Serialize;
use serde_json::json;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use kvstash_cache::{Cache, TagKeys};
use kvstash_core::error::AppError;
use kvstash_core::traits::CacheDriver;

/// Arguments for the tag command
#[derive(Debug, Args)]
pub struct TagArgs {
    /// Tag name
    pub name: String,
    /// Comma-separated cache names to add
    #[arg(short, long)]
    pub keys: String,
    /// Replace the tag's members instead of merging
    #[arg(long)]
    pub overlay: bool,
}

/// Tag member display row
#[derive(Debug, Serialize, Tabled)]
struct MemberRow {
    /// Mapped cache identifier
    member: String,
    /// Whether the entry is still live
    live: bool,
}

/// Add names to a tag
pub async fn tag(cache: &Cache, args: &TagArgs, format: OutputFormat) -> Result<(), AppError> {
    let keys = TagKeys::from(args.keys.as_str());
    if keys.is_empty() {
        return Err(AppError::validation("required at least one key"));
    }
    cache.tag(&args.name, Some(keys), args.overlay).await?;
    let members = cache.tag_items(&args.name).await?;
    match format {
        OutputFormat::Table => output::print_success(&format!(
            "Tag '{}' now has {} member(s)",
            args.name,
            members.len()
        )),
        OutputFormat::Json => output::print_value(
            &json!({ "tag": args.name, "members": members }),
            format,
        ),
    }
    Ok(())
}

/// List a tag's members
pub async fn items(cache: &Cache, name: &str, format: OutputFormat) -> Result<(), AppError> {
    let driver = cache.connect().await?;
    let mut rows = Vec::new();
    for member in cache.tag_items(name).await? {
        let live = driver.has_key(&member).await?;
        rows.push(MemberRow { member, live });
    }
    output::print_list(&rows, format);
    Ok(())
}

/// Delete a tag's members
pub async fn clear(cache: &Cache, name: &str, format: OutputFormat) -> Result<(), AppError> {
    let removed = cache.clear_tag(name).await?;
    match format {
        OutputFormat::Table => {
            output::print_success(&format!("Cleared tag '{}' ({} entries removed)", name, removed))
        }
        OutputFormat::Json => {
            output::print_value(&json!({ "tag": name, "removed": removed }), format)
        }
    }
    Ok(())
}

/// Drop stale members
pub async fn prune(cache: &Cache, name: &str, format: OutputFormat) -> Result<(), AppError> {
    let pruned = cache.prune_tag(name).await?;
    match format {
        OutputFormat::Table => {
            output::print_success(&format!("Pruned {} stale member(s) from '{}'", pruned, name))
        }
        OutputFormat::Json => {
            output::print_value(&json!({ "tag": name, "pruned": pruned }), format)
        }
    }
    Ok(())
}
