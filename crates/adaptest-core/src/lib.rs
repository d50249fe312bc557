//! adaptest-core: adaptive question selection, sessions, and the scoring contract.
//!
//! This crate defines the data model, the `ScoringOracle` trait, the
//! difficulty-steering engine, and the session registry that the rest of
//! adaptest builds on.

pub mod bank;
pub mod engine;
pub mod error;
pub mod model;
pub mod service;
pub mod session;
pub mod store;
pub mod traits;

pub use bank::QuestionBank;
pub use engine::{AdaptiveEngine, DifficultyPolicy, Selection};
pub use error::{OracleError, QuizError, QuizResult, UnavailableReason};
pub use service::QuizService;
pub use session::Session;
pub use store::SessionStore;
pub use traits::{Evaluation, ScoringOracle, Submission};
