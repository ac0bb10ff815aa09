//! Spaced repetition scheduling engine for the vocabulary learning app.
//!
//! Provides:
//! - The FSRS scheduling core: an exponential-forgetting-curve memory model
//!   with per-card stability and difficulty and four-way grading
//! - A service façade for card creation, grading, due queries, and statistics
//! - Bulk card management (reset/suspend, filtering, sorting, analytics)
//! - Bounded learning sessions with progress tracking and workload advice
//!
//! Every operation is a pure function over immutable value snapshots; "now"
//! is always an explicit argument, so schedules are fully deterministic
//! under test.

pub mod algorithm;
pub mod error;
pub mod manager;
pub mod service;
pub mod session;
pub mod time_utils;
pub mod types;

pub use algorithm::fsrs::{Parameters, Scheduler, Weights};
pub use algorithm::{Card, RecordLog, ReviewLog, SchedulingInfo};
pub use error::{Result, SrsError};
pub use manager::{
    BatchAnalysisResult, CardAnalytics, CardFilter, CardIdGenerator, FlashCardManager,
    SortStrategy,
};
pub use service::{FsrsConfig, FsrsService};
pub use session::{
    LearningRecommendations, LearningSession, LearningSessionManager, LoadLevel, StudyLoad,
};
pub use types::{CardPhase, FlashCard, Grade, LearningStat, Rating};
