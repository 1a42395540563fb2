// ABOUTME: Utility functions for validation and retry handling
// ABOUTME: Provides table name checks, datastore sameness checks and backoff retries

use crate::datastore::DatastoreConfig;
use anyhow::{bail, Result};
use std::time::Duration;

/// Longest table name accepted, matching the PostgreSQL identifier limit
const MAX_TABLE_NAME_LEN: usize = 63;

/// Validate a table name before it is interpolated into SQL
///
/// Table names come from the record registry rather than user input, but the
/// SQL adapters still quote them into statements, so only plain identifiers
/// are accepted.
///
/// # Errors
///
/// Returns an error if the name is empty, longer than 63 characters, starts
/// with a digit or contains anything other than ASCII letters, digits and `_`.
///
/// # Examples
///
/// ```
/// # use vela_migrator::utils::validate_table_name;
/// assert!(validate_table_name("vela_application").is_ok());
/// assert!(validate_table_name("1table").is_err());
/// assert!(validate_table_name("users; DROP TABLE x").is_err());
/// ```
pub fn validate_table_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("Table name cannot be empty");
    }

    if name.len() > MAX_TABLE_NAME_LEN {
        bail!(
            "Table name '{}' is too long ({} characters, maximum {})",
            sanitize_identifier(name),
            name.len(),
            MAX_TABLE_NAME_LEN
        );
    }

    if name.starts_with(|c: char| c.is_ascii_digit()) {
        bail!(
            "Table name '{}' cannot start with a digit",
            sanitize_identifier(name)
        );
    }

    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        bail!(
            "Table name '{}' contains invalid characters. \
             Only letters, digits and underscores are allowed",
            sanitize_identifier(name)
        );
    }

    Ok(())
}

/// Ensure source and target do not point at the same datastore
///
/// Two memory stores are always distinct instances, so they are never
/// considered equal here.
///
/// # Errors
///
/// Returns an error if both configs name the same backend, URL and database.
pub fn validate_source_target_different(
    source: &DatastoreConfig,
    target: &DatastoreConfig,
) -> Result<()> {
    let kind = source.kind.to_ascii_lowercase();
    if kind == "memory" {
        return Ok(());
    }

    let same_kind = kind == target.kind.to_ascii_lowercase()
        || (kind.starts_with("postgres") && target.kind.to_ascii_lowercase().starts_with("postgres"));

    if same_kind
        && source.url.trim() == target.url.trim()
        && source.database.trim() == target.database.trim()
    {
        bail!(
            "Source and target datastores are identical ({} at '{}').\n\
             Migrating a datastore onto itself would overwrite its own rows.",
            source.kind,
            sanitize_identifier(&source.url)
        );
    }

    Ok(())
}

/// Retry a function with exponential backoff
///
/// Executes an async operation with automatic retry on failure. Each retry doubles
/// the delay.
///
/// # Arguments
///
/// * `operation` - Async function to retry
/// * `max_retries` - Maximum number of retry attempts (0 = no retries, just initial attempt)
/// * `initial_delay` - Delay before first retry
///
/// # Examples
///
/// ```no_run
/// # use anyhow::Result;
/// # use std::time::Duration;
/// # use vela_migrator::utils::retry_with_backoff;
/// # async fn example() -> Result<()> {
/// let result = retry_with_backoff(
///     || async { Ok("success") },
///     3,
///     Duration::from_secs(1)
/// ).await?;
/// # Ok(())
/// # }
/// ```
pub async fn retry_with_backoff<F, Fut, T>(
    mut operation: F,
    max_retries: u32,
    initial_delay: Duration,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut delay = initial_delay;
    let mut last_error = None;

    for attempt in 0..=max_retries {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                last_error = Some(e);

                if attempt < max_retries {
                    tracing::warn!(
                        "Operation failed (attempt {}/{}), retrying in {:?}...",
                        attempt + 1,
                        max_retries + 1,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Operation failed after retries")))
}

/// Sanitize an identifier or URL for display
///
/// Removes control characters and limits length to keep log lines readable.
///
/// # Examples
///
/// ```
/// # use vela_migrator::utils::sanitize_identifier;
/// assert_eq!(sanitize_identifier("normal_table"), "normal_table");
/// assert_eq!(sanitize_identifier("table\nname"), "tablename");
/// ```
pub fn sanitize_identifier(identifier: &str) -> String {
    identifier
        .chars()
        .filter(|c| !c.is_control())
        .take(100)
        .collect()
}
