//! CLI integration tests using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const BANK: &str = "../../banks/python-fundamentals.toml";

/// The binary, isolated from any user config and key overrides.
fn adaptest(home: &TempDir) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("adaptest").unwrap();
    cmd.env("HOME", home.path())
        .env_remove("ADAPTEST_OPENAI_KEY")
        .env_remove("ADAPTEST_ANTHROPIC_KEY")
        .env_remove("ADAPTEST_ALLOWED_ORIGINS");
    cmd
}

#[test]
fn validate_sample_bank() {
    let home = TempDir::new().unwrap();
    adaptest(&home)
        .arg("validate")
        .arg("--bank")
        .arg(BANK)
        .assert()
        .success()
        .stdout(predicate::str::contains("Python Fundamentals"))
        .stdout(predicate::str::contains("15 questions"))
        .stdout(predicate::str::contains("Bank valid."));
}

#[test]
fn validate_reports_warnings() {
    let home = TempDir::new().unwrap();
    let bank = home.path().join("thin.toml");
    std::fs::write(
        &bank,
        r#"
[bank]
id = "thin"
name = "Thin"

[[questions]]
id = "t1"
tier = 1
prompt = "Name a Python keyword."

[[questions]]
id = "t2"
tier = 7
prompt = "Explain descriptors."
reference_answer = "Objects defining __get__/__set__ that customise attribute access."
"#,
    )
    .unwrap();

    adaptest(&home)
        .arg("validate")
        .arg("--bank")
        .arg(&bank)
        .assert()
        .success()
        .stdout(predicate::str::contains("[t1] WARNING: reference_answer is empty"))
        .stdout(predicate::str::contains("[t2] WARNING: tier 7 is outside the policy range"))
        .stdout(predicate::str::contains("no questions at tier 3"))
        .stdout(predicate::str::contains("warning(s) found"));
}

#[test]
fn validate_nonexistent_file() {
    let home = TempDir::new().unwrap();
    adaptest(&home)
        .arg("validate")
        .arg("--bank")
        .arg("nonexistent.toml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn validate_rejects_duplicate_ids() {
    let home = TempDir::new().unwrap();
    let bank = home.path().join("dup.toml");
    std::fs::write(
        &bank,
        r#"
[bank]
id = "dup"
name = "Dup"

[[questions]]
id = "same"
tier = 1
prompt = "a"

[[questions]]
id = "same"
tier = 2
prompt = "b"
"#,
    )
    .unwrap();

    adaptest(&home)
        .arg("validate")
        .arg("--bank")
        .arg(&bank)
        .assert()
        .failure()
        .stderr(predicate::str::contains("duplicate question id: same"));
}

#[test]
fn invalid_config_is_rejected() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("adaptest.toml");
    std::fs::write(&config, "[quiz]\nmax_questions = 40\n").unwrap();

    adaptest(&home)
        .arg("validate")
        .arg("--bank")
        .arg(BANK)
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("max_questions"));
}

#[test]
fn init_creates_files() {
    let dir = TempDir::new().unwrap();

    adaptest(&dir)
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created adaptest.toml"))
        .stdout(predicate::str::contains("Created banks/example.toml"));

    assert!(dir.path().join("adaptest.toml").exists());
    assert!(dir.path().join("banks/example.toml").exists());

    // The generated files load and validate cleanly
    adaptest(&dir)
        .current_dir(dir.path())
        .arg("validate")
        .arg("--bank")
        .arg("banks/example.toml")
        .assert()
        .success()
        .stdout(predicate::str::contains("6 questions"))
        .stdout(predicate::str::contains("Bank valid."));
}

#[test]
fn init_skips_existing() {
    let dir = TempDir::new().unwrap();

    // First init
    adaptest(&dir)
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success();

    // Second init should skip
    adaptest(&dir)
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn take_full_quiz_with_mock_oracle() {
    let home = TempDir::new().unwrap();
    let stdin = "an answer\n\n".repeat(15);

    adaptest(&home)
        .arg("take")
        .arg("--bank")
        .arg(BANK)
        .arg("--oracle")
        .arg("mock")
        .arg("--json")
        .write_stdin(stdin)
        .assert()
        .success()
        .stdout(predicate::str::contains("Question 1/15"))
        .stdout(predicate::str::contains("Question 15/15"))
        .stdout(predicate::str::contains("\"answered\": 15"))
        .stdout(predicate::str::contains("\"completed\": true"));
}

#[test]
fn take_ends_early_on_end_of_input() {
    let home = TempDir::new().unwrap();

    adaptest(&home)
        .arg("take")
        .arg("--bank")
        .arg(BANK)
        .arg("--oracle")
        .arg("mock")
        .write_stdin("first\nbecause\nsecond\n\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Explanation: "))
        .stdout(predicate::str::contains("Answered 2/15 (ended early)"))
        .stdout(predicate::str::contains("Average explanation score: "));
}

#[test]
fn take_quit_before_answering() {
    let home = TempDir::new().unwrap();

    adaptest(&home)
        .arg("take")
        .arg("--bank")
        .arg(BANK)
        .arg("--oracle")
        .arg("mock")
        .arg("--max-questions")
        .arg("5")
        .write_stdin(":quit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Question 1/5"))
        .stdout(predicate::str::contains("Answered 0/5 (ended early)"))
        .stdout(predicate::str::contains("Average score: 0.00"));
}

#[test]
fn take_unknown_oracle() {
    let home = TempDir::new().unwrap();

    adaptest(&home)
        .arg("take")
        .arg("--bank")
        .arg(BANK)
        .arg("--oracle")
        .arg("openai")
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("oracle 'openai' is not configured"));
}

#[test]
fn check_mock_oracle() {
    let home = TempDir::new().unwrap();

    adaptest(&home)
        .arg("check-oracle")
        .arg("--oracle")
        .arg("mock")
        .assert()
        .success()
        .stdout(predicate::str::contains("Oracle 'mock' (mock) OK"));
}
