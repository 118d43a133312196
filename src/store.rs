use async_trait::async_trait;
use serde_json::Value;

use crate::error::{MatchError, StoreError};
use crate::profile::{Gender, SetField, UserProfile};

/// Value written by [`ProfileStore::set_field`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Ask the backend to stamp its own clock at commit time.
    ServerTimestamp,
    Value(Value),
}

/// Contract for the document store that owns user profiles.
///
/// Every operation is async and may fail. Set mutations follow
/// array-union/array-remove semantics: adding a present value or removing
/// an absent one is a no-op, never an error.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Fetch every profile whose `gender` is one of `genders`.
    async fn query_by_gender(&self, genders: &[Gender]) -> Result<Vec<UserProfile>, StoreError>;
    /// Fetch a single profile, `None` if it does not exist.
    async fn get_profile(&self, id: &str) -> Result<Option<UserProfile>, StoreError>;
    /// Append `value` to the set `field` of `user_id`.
    async fn add_to_set(&self, user_id: &str, field: SetField, value: &str)
        -> Result<(), StoreError>;
    /// Remove `value` from the set `field` of `user_id`.
    async fn remove_from_set(
        &self,
        user_id: &str,
        field: SetField,
        value: &str,
    ) -> Result<(), StoreError>;
    /// Overwrite a scalar document field.
    async fn set_field(&self, user_id: &str, field: &str, value: FieldValue)
        -> Result<(), StoreError>;
}

/// Sink for failures that were absorbed into degraded behaviour.
///
/// Implementations must not block and must not fail.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, error: &MatchError);
}

/// Reports through `tracing` at WARN level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorReporter;

impl ErrorReporter for TracingErrorReporter {
    fn report(&self, error: &MatchError) {
        tracing::warn!(error = %error, "match_error_reported");
    }
}

/// In-memory document store.
pub mod memory;

/// Fault-injecting wrapper for exercising degraded paths.
#[cfg(any(test, feature = "testing"))]
pub mod faults;

#[cfg(any(test, feature = "testing"))]
pub use faults::{FaultInjectingStore, StoreCall, StoreOp};
pub use memory::InMemoryProfileStore;
