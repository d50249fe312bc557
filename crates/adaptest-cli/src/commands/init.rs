//! The `adaptest init` command.

use std::path::Path;

use anyhow::{Context, Result};

/// Files written by `init`, relative to the current directory.
const STARTER_FILES: &[(&str, &str)] = &[
    ("adaptest.toml", SAMPLE_CONFIG),
    ("banks/example.toml", EXAMPLE_BANK),
];

pub fn execute() -> Result<()> {
    for (path, contents) in STARTER_FILES {
        if write_if_missing(Path::new(path), contents)? {
            println!("Created {path}");
        } else {
            println!("{path} already exists, skipping.");
        }
    }

    println!("\nNext steps:");
    println!("  1. Put your API keys in the environment or in adaptest.toml");
    println!("  2. Run: adaptest validate --bank banks/example.toml");
    println!("  3. Run: adaptest take --bank banks/example.toml --oracle mock");

    Ok(())
}

/// Write `contents` to `path` unless it already exists. Returns whether the
/// file was written.
fn write_if_missing(path: &Path, contents: &str) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(true)
}

const SAMPLE_CONFIG: &str = r#"# adaptest configuration

default_oracle = "anthropic"
oracle_timeout_secs = 30
max_retries = 2
retry_delay_ms = 500

[quiz]
max_questions = 5
inactivity_timeout_secs = 3600
sweep_interval_secs = 300

[policy]
high_threshold = 0.7
low_threshold = 0.3
min_tier = 1
max_tier = 5

[oracles.anthropic]
type = "anthropic"
api_key = "${ANTHROPIC_API_KEY}"

[oracles.openai]
type = "openai"
api_key = "${OPENAI_API_KEY}"
model = "gpt-4o-mini"

[oracles.mock]
type = "mock"
"#;

const EXAMPLE_BANK: &str = r#"[bank]
id = "example"
name = "Example Bank"
description = "A small bank to get started"

[[questions]]
id = "ex-01"
tier = 1
topic = "variables"
prompt = "What is printed by `x = 3; x = x + 1; print(x)`?"
reference_answer = "4, because the second assignment rebinds x to 3 + 1."
keywords = ["4", "rebind"]

[[questions]]
id = "ex-02"
tier = 2
topic = "lists"
prompt = "What is the difference between `list.append(x)` and `list.extend(x)`?"
reference_answer = """
append adds x as a single element; \
extend adds each element of the iterable x."""
keywords = ["single", "each", "iterable"]

[[questions]]
id = "ex-03"
tier = 3
topic = "functions"
prompt = "Why is `def f(items=[])` a common bug?"
reference_answer = """
The default list is created once at definition time \
and shared across calls, so mutations persist."""
keywords = ["once", "shared", "mutable"]

[[questions]]
id = "ex-04"
tier = 3
topic = "dictionaries"
prompt = "What does `d.get(k, 0)` do when `k` is missing?"
reference_answer = "It returns the default 0 instead of raising KeyError."
keywords = ["default", "KeyError"]

[[questions]]
id = "ex-05"
tier = 4
topic = "generators"
prompt = """
What is the difference between a list comprehension \
and a generator expression?"""
reference_answer = """
A list comprehension builds the whole list eagerly; \
a generator expression yields items lazily on demand."""
keywords = ["eager", "lazy", "memory"]

[[questions]]
id = "ex-06"
tier = 5
topic = "concurrency"
prompt = "Why do CPU-bound Python threads rarely run faster than one thread?"
reference_answer = """
The GIL lets only one thread execute Python bytecode at a time, \
so CPU-bound threads serialize."""
keywords = ["GIL", "bytecode", "one thread"]
"#;
