use std::sync::Mutex;

use async_trait::async_trait;

use super::{FieldValue, ProfileStore};
use crate::error::StoreError;
use crate::profile::{Gender, SetField, UserProfile};

/// Store operation kinds, used to target injected faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Query,
    Get,
    AddToSet(SetField),
    RemoveFromSet(SetField),
    SetField,
}

impl StoreOp {
    pub fn is_write(self) -> bool {
        matches!(
            self,
            StoreOp::AddToSet(_) | StoreOp::RemoveFromSet(_) | StoreOp::SetField
        )
    }
}

/// One call observed by [`FaultInjectingStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    pub op: StoreOp,
    /// Target document, empty for queries.
    pub user_id: String,
    /// Set member or field name, empty when not applicable.
    pub value: String,
}

#[derive(Debug, Clone)]
struct Fault {
    op: StoreOp,
    user_id: Option<String>,
    error: StoreError,
}

/// Wraps another store, failing selected operations and recording every
/// call that reaches it (failed ones included).
pub struct FaultInjectingStore<S> {
    inner: S,
    faults: Mutex<Vec<Fault>>,
    calls: Mutex<Vec<StoreCall>>,
}

impl<S: ProfileStore> FaultInjectingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            faults: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Fail every `op`, optionally only against `user_id`.
    pub fn fail(&self, op: StoreOp, user_id: Option<&str>, error: StoreError) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.push(Fault {
                op,
                user_id: user_id.map(str::to_string),
                error,
            });
        }
    }

    pub fn clear_faults(&self) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.clear();
        }
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn writes(&self) -> Vec<StoreCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.op.is_write())
            .collect()
    }

    pub fn clear_calls(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }

    fn enter(&self, op: StoreOp, user_id: &str, value: &str) -> Result<(), StoreError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(StoreCall {
                op,
                user_id: user_id.to_string(),
                value: value.to_string(),
            });
        }
        let faults = self
            .faults
            .lock()
            .map_err(|_| StoreError::unavailable("poisoned lock"))?;
        let hit = faults.iter().find(|fault| {
            fault.op == op && fault.user_id.as_deref().is_none_or(|target| target == user_id)
        });
        match hit {
            Some(fault) => Err(fault.error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl<S: ProfileStore> ProfileStore for FaultInjectingStore<S> {
    async fn query_by_gender(&self, genders: &[Gender]) -> Result<Vec<UserProfile>, StoreError> {
        self.enter(StoreOp::Query, "", "")?;
        self.inner.query_by_gender(genders).await
    }

    async fn get_profile(&self, id: &str) -> Result<Option<UserProfile>, StoreError> {
        self.enter(StoreOp::Get, id, "")?;
        self.inner.get_profile(id).await
    }

    async fn add_to_set(
        &self,
        user_id: &str,
        field: SetField,
        value: &str,
    ) -> Result<(), StoreError> {
        self.enter(StoreOp::AddToSet(field), user_id, value)?;
        self.inner.add_to_set(user_id, field, value).await
    }

    async fn remove_from_set(
        &self,
        user_id: &str,
        field: SetField,
        value: &str,
    ) -> Result<(), StoreError> {
        self.enter(StoreOp::RemoveFromSet(field), user_id, value)?;
        self.inner.remove_from_set(user_id, field, value).await
    }

    async fn set_field(
        &self,
        user_id: &str,
        field: &str,
        value: FieldValue,
    ) -> Result<(), StoreError> {
        self.enter(StoreOp::SetField, user_id, field)?;
        self.inner.set_field(user_id, field, value).await
    }
}
