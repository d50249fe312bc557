//! The `adaptest check-oracle` command.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};

use adaptest_oracles::{create_oracle, load_config_from};

pub async fn execute(oracle_name: Option<String>, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let name = oracle_name.unwrap_or_else(|| config.default_oracle.clone());
    let oracle = create_oracle(&config.oracle(&name)?, &config)?;

    let started = Instant::now();
    tokio::time::timeout(config.oracle_timeout(), oracle.check())
        .await
        .with_context(|| {
            format!(
                "oracle '{name}' did not answer within {}s",
                config.oracle_timeout_secs
            )
        })?
        .with_context(|| format!("oracle '{name}' is not usable"))?;

    println!(
        "Oracle '{name}' ({}) OK in {}ms",
        oracle.name(),
        started.elapsed().as_millis()
    );
    Ok(())
}
