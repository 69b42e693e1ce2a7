//! Synheart Typing Auth - keystroke-dynamics authentication for touchscreens.
//!
//! This library scores how a user types against the way they typed before.
//! Each input session is reduced to timing, touch and motion-sensor features,
//! compared against an enrollment set stored per input context and screen
//! orientation, and added to that set until it reaches capacity. At capacity
//! the set is reduced to its most representative templates and locked.
//!
//! # Scores
//!
//! A score is a non-negative distance: `0` means the session is
//! indistinguishable from the enrollment set, larger means less similar.
//! Two sentinels exist: `-1` (not enough enrollment data yet) and `-2`
//! (the session could not be compared, e.g. a different keystroke count).
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Synheart Typing Auth                     │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌──────────────┐        │
//! │  │ InputSource │──▶│   Session   │──▶│    Scorer    │        │
//! │  │ (touch evts)│   │   Capture   │   │ (variability)│        │
//! │  └─────────────┘   └─────────────┘   └──────────────┘        │
//! │                        │     ▲                               │
//! │                        ▼     │                               │
//! │  ┌─────────────┐   ┌─────────────┐   ┌──────────────┐        │
//! │  │    Audit    │   │ Enrollment  │◀──│   Template   │        │
//! │  │     Log     │   │    Store    │   │   Selector   │        │
//! │  └─────────────┘   └─────────────┘   └──────────────┘        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use synheart_typing_auth::{capture, config, store};
//!
//! let store = store::MemoryStore::new();
//! let mut session = capture::SessionCapture::new(config::ClassifierConfig::default(), store)
//!     .expect("Invalid classifier configuration");
//!
//! let key = store::EnrollmentKey::new(1, 0);
//! session.start(key, false, false).expect("Failed to load enrollment set");
//! // feed events with session.key_event(..), then:
//! let score = session.finish(true, false, false).expect("Failed to store acquisition");
//! ```

pub mod audit;
pub mod capture;
pub mod config;
pub mod core;
pub mod evaluation;
pub mod store;

// Re-export key types at crate root for convenience
pub use audit::{AuditLog, AuditStats, SharedAuditLog};
pub use capture::{
    Acquisition, CaptureError, CaptureState, InputSource, Keystroke, RawTouchEvent, ReplayInput,
    SensorType, SessionCapture, TouchEventKind,
};
pub use config::{
    ClassificationFunction, ClassifierConfig, Config, ConfigError, DistanceFunction,
    OptimizerConfig, TemplateSelectionFunction,
};
pub use core::{AuthenticationScorer, Feature, FeatureSet, Score, TemplateSelector, TouchProperty};
pub use evaluation::{Corpus, EvaluationError, EvaluationReport, OptimizationReport};
pub use store::{EnrollmentKey, EnrollmentStore, JsonFileStore, MemoryStore, StoreError};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
