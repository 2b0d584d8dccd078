//! Value commands: get, set, counters, existence, removal.

use serde_json::{Value, json};

use crate::output::{self, OutputFormat};
use kvstash_cache::Cache;
use kvstash_core::error::AppError;

/// Print a command result: a message in table mode, an object in JSON mode.
fn report(name: &str, field: &str, result: Value, message: &str, format: OutputFormat) {
    match format {
        OutputFormat::Table => output::print_success(message),
        OutputFormat::Json => output::print_value(&json!({ "name": name, field: result }), format),
    }
}

/// Read a value
pub async fn get(
    cache: &Cache,
    name: &str,
    default: Option<&str>,
    format: OutputFormat,
) -> Result<(), AppError> {
    match cache.get(name).await? {
        Some(value) => output::print_value(&value, format),
        None => match default {
            Some(raw) => output::print_value(&super::parse_value(raw), format),
            None => return Err(AppError::not_found(format!("Cache entry '{}' not found", name))),
        },
    }
    Ok(())
}

/// Store a value
pub async fn set(
    cache: &Cache,
    name: &str,
    raw: &str,
    expire: Option<u64>,
    tag: Option<&str>,
    format: OutputFormat,
) -> Result<(), AppError> {
    let value = super::parse_value(raw);
    if let Some(tag) = tag {
        cache.tag(tag, None, false).await?;
    }
    if !cache.set(name, &value, expire).await? {
        return Err(AppError::storage(format!("Failed to store '{}'", name)));
    }
    report(name, "stored", json!(true), &format!("Stored '{}'", name), format);
    Ok(())
}

/// Increment a counter
pub async fn inc(cache: &Cache, name: &str, step: i64, format: OutputFormat) -> Result<(), AppError> {
    let value = cache.inc(name, step).await?;
    report(name, "value", json!(value), &format!("{} = {}", name, value), format);
    Ok(())
}

/// Decrement a counter
pub async fn dec(cache: &Cache, name: &str, step: i64, format: OutputFormat) -> Result<(), AppError> {
    let value = cache.dec(name, step).await?;
    report(name, "value", json!(value), &format!("{} = {}", name, value), format);
    Ok(())
}

/// Check existence
pub async fn has(cache: &Cache, name: &str, format: OutputFormat) -> Result<(), AppError> {
    let exists = cache.has(name).await?;
    match format {
        OutputFormat::Table => output::print_kv(name, if exists { "present" } else { "absent" }),
        OutputFormat::Json => output::print_value(&json!({ "name": name, "exists": exists }), format),
    }
    Ok(())
}

/// Delete a value
pub async fn remove(cache: &Cache, name: &str, format: OutputFormat) -> Result<(), AppError> {
    if !cache.remove(name).await? {
        return Err(AppError::storage(format!("Failed to remove '{}'", name)));
    }
    report(name, "removed", json!(true), &format!("Removed '{}'", name), format);
    Ok(())
}

/// Read and delete a value
pub async fn pull(
    cache: &Cache,
    name: &str,
    strict: bool,
    format: OutputFormat,
) -> Result<(), AppError> {
    let pulled = if strict {
        cache.pull_strict(name).await?
    } else {
        cache.pull(name).await?
    };
    match pulled {
        Some(value) => output::print_value(&value, format),
        None => match format {
            OutputFormat::Table => output::print_warning(&format!("'{}' not found", name)),
            OutputFormat::Json => output::print_value(&Value::Null, format),
        },
    }
    Ok(())
}

/// Delete everything in scope
pub async fn clear(cache: &Cache, format: OutputFormat) -> Result<(), AppError> {
    let cleared = cache.clear().await?;
    match format {
        OutputFormat::Table if cleared => output::print_success("Cache cleared"),
        OutputFormat::Table => output::print_warning("Cache partially cleared; see logs"),
        OutputFormat::Json => output::print_value(&json!({ "cleared": cleared }), format),
    }
    Ok(())
}

/// Check the backend
pub async fn ping(cache: &Cache, format: OutputFormat) -> Result<(), AppError> {
    let alive = cache.ping().await?;
    match format {
        OutputFormat::Table => {
            output::print_kv("Backend", cache.kind().as_str());
            output::print_kv("Status", if alive { "ok" } else { "unavailable" });
        }
        OutputFormat::Json => output::print_value(
            &json!({ "backend": cache.kind().as_str(), "ok": alive }),
            format,
        ),
    }
    if alive {
        Ok(())
    } else {
        Err(AppError::cache("Cache backend is not available"))
    }
}
