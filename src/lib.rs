//! Roommate matching engine.
//!
//! Three layers sit on top of an async [`ProfileStore`]:
//!
//! - [`pool`] fetches profiles of an acceptable gender, drops anyone the
//!   current user already swiped on or who would not accept them back, and
//!   ranks the rest by compatibility.
//! - [`compat`] scores a pair of profiles from 0 to 100 and derives up to
//!   three human-readable insights.
//! - [`session`] walks the ranked pool one candidate at a time, persisting
//!   like/pass/superlike decisions, detecting mutual matches and supporting
//!   undo of the most recent swipe.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use roomie_match::{
//!     InMemoryProfileStore, MatchSession, SessionConfig, SwipeAction, TracingErrorReporter,
//! };
//!
//! let store = Arc::new(InMemoryProfileStore::from_json_slice(bytes)?);
//! let me = store.snapshot("u1")?.expect("seeded");
//! let session = MatchSession::new(store, Arc::new(TracingErrorReporter), SessionConfig::default());
//! session.rebuild(&me).await?;
//! if let Some(top) = session.current_candidate().await {
//!     session.swipe(&me, top.id(), SwipeAction::Like).await?;
//! }
//! ```

pub mod compat;
pub mod config;
pub mod error;
pub mod metrics;
pub mod pool;
pub mod profile;
pub mod session;
pub mod store;

pub use compat::{
    Breakdown, Compatibility, FixedVariety, Insight, InsightKind, VarietySource, breakdown, score,
    variety_source,
};
pub use config::{ConfigLoadError, RoomieConfig};
pub use error::{MatchError, StoreError};
pub use metrics::{MatchMetrics, set_match_metrics};
pub use pool::{CandidatePool, PoolKey, ScoredCandidate, admits, build_pool, effective_gender_filter};
pub use profile::{
    AiAnalysis, Gender, GenderPreference, Lifestyle, MatchingPreferences, SetField, SocialVibe,
    SwipeAction, UserId, UserProfile,
};
pub use session::{
    MatchSession, SessionConfig, SessionPhase, SwipeOutcome, SwipeRecord, SwipeStatus,
    UndoOutcome, UndoPolicy,
};
pub use store::{
    ErrorReporter, FieldValue, InMemoryProfileStore, ProfileStore, TracingErrorReporter,
};
#[cfg(feature = "testing")]
pub use store::{FaultInjectingStore, StoreCall, StoreOp};
