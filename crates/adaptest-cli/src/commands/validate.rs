//! The `adaptest validate` command.

use std::path::PathBuf;

use anyhow::Result;

use adaptest_core::bank::{parse_bank, validate_bank};
use adaptest_oracles::load_config_from;

pub fn execute(bank_path: PathBuf, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let bank = parse_bank(&bank_path)?;

    let tiers: Vec<String> = bank
        .tiers()
        .iter()
        .map(|t| t.value().to_string())
        .collect();
    println!(
        "Bank: {} ({} questions, tiers {})",
        bank.name(),
        bank.len(),
        tiers.join(", ")
    );

    let warnings = validate_bank(&bank, &config.policy, config.quiz.max_questions);
    for w in &warnings {
        let prefix = w
            .question_id
            .as_ref()
            .map(|id| format!("  [{id}]"))
            .unwrap_or_else(|| "  ".to_string());
        println!("{prefix} WARNING: {}", w.message);
    }

    if warnings.is_empty() {
        println!("Bank valid.");
    } else {
        println!("\n{} warning(s) found.", warnings.len());
    }

    Ok(())
}
