//! adaptest-oracles: AI scoring backends.
//!
//! Implements the `ScoringOracle` trait for OpenAI-compatible and Anthropic
//! judges, plus an offline mock, and loads the adaptest configuration that
//! selects between them.

pub mod anthropic;
pub mod config;
mod http;
pub mod mock;
pub mod openai;
pub mod retry;

pub use config::{
    create_oracle, load_config, load_config_from, AdaptestConfig, OracleConfig, QuizSettings,
};
pub use mock::{MockOracle, MockOutcome};
pub use retry::RetryingOracle;
