//! dyntally: stream counter increments from stdin into the configured store.
//!
//! ## Input
//! One increment per line: `<hash> <range> <delta>`. Blank lines and lines
//! starting with `#` are skipped; malformed lines are logged and skipped.
//!
//! ## Configuration
//! - First argument or DYNTALLY_CONFIG: YAML config file (must define `schema`)
//! - DYNTALLY__*: overrides, e.g. DYNTALLY__ENGINE__BATCH_SIZE=500
//! - DYNTALLY_CREATE_TABLE=1: create the counter table before starting
//! - DYNTALLY_LOG: tracing filter (default: info)

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use dyntally::config::Config;
use dyntally::engine::{CounterBatcher, EngineError, ErrorHandler};
use dyntally::schema::Row;
use dyntally::storage;
use dyntally::utils::bootstrap::init_tracing;

const CREATE_TABLE_ENV_VAR: &str = "DYNTALLY_CREATE_TABLE";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let path = std::env::args().nth(1);
    let config = Config::load(path.as_deref())?;
    let schema = config
        .schema
        .clone()
        .ok_or("configuration has no `schema` section")?
        .shared();

    let backend = storage::connect(&config.storage).await?;

    let create_table = std::env::var(CREATE_TABLE_ENV_VAR)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if create_table {
        backend.admin().create_destination(&schema).await?;
    }

    let failures = Arc::new(AtomicU64::new(0));
    let counted = Arc::clone(&failures);
    let on_error: ErrorHandler = Arc::new(move |_location: &str, _err: &EngineError| {
        counted.fetch_add(1, Ordering::Relaxed);
    });

    let batcher =
        CounterBatcher::with_store(config.engine.clone(), backend.incrementer(), on_error)?;

    info!(table = %schema.table_name, "dyntally reading increments from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_no = 0u64;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        match parse_line(&line) {
            Ok(Some((hash, range, delta))) => {
                batcher
                    .submit(Row::new(schema.clone(), hash, range, delta))
                    .await?
            }
            Ok(None) => {}
            Err(msg) => warn!(line = line_no, error = %msg, "Skipping malformed input line"),
        }
    }

    batcher.shutdown_and_wait().await;

    let stats = batcher.stats();
    let failed = failures.load(Ordering::Relaxed);
    info!(
        rows = stats.rows_received,
        batches = stats.batches_flushed,
        keys = stats.keys_written,
        failures = failed,
        "dyntally finished"
    );

    if failed > 0 {
        return Err(format!("{} increments were rejected or failed", failed).into());
    }
    Ok(())
}

/// Split an input line into (hash, range, delta).
fn parse_line(line: &str) -> Result<Option<(&str, &str, &str)>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let fields: Vec<&str> = line.split_whitespace().collect();
    match fields.as_slice() {
        [hash, range, delta] => Ok(Some((*hash, *range, *delta))),
        _ => Err(format!("expected `<hash> <range> <delta>`, got {} fields", fields.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line("user-1 12-31 5").unwrap(), Some(("user-1", "12-31", "5")));
        assert_eq!(parse_line("  a\tb  -2 ").unwrap(), Some(("a", "b", "-2")));
    }

    #[test]
    fn test_parse_line_skips_blank_and_comments() {
        assert_eq!(parse_line("").unwrap(), None);
        assert_eq!(parse_line("   ").unwrap(), None);
        assert_eq!(parse_line("# header").unwrap(), None);
    }

    #[test]
    fn test_parse_line_rejects_wrong_arity() {
        assert!(parse_line("a b").is_err());
        assert!(parse_line("a b c d").is_err());
    }
}
