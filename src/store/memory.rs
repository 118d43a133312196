use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use super::{FieldValue, ProfileStore};
use crate::error::StoreError;
use crate::profile::{Gender, SetField, UserId, UserProfile};

/// Profile store backed by JSON documents behind a `RwLock`.
///
/// Documents are kept keyed by id, so queries return profiles in id order.
/// Writes mirror a document database: sets are JSON arrays mutated with
/// union/remove semantics and server timestamps are RFC 3339 strings.
pub struct InMemoryProfileStore {
    docs: RwLock<BTreeMap<UserId, Value>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(BTreeMap::new()),
        }
    }

    /// Seed a store from typed profiles.
    pub fn from_profiles<I>(profiles: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = UserProfile>,
    {
        let store = Self::new();
        for profile in profiles {
            store.upsert_profile(&profile)?;
        }
        Ok(store)
    }

    /// Seed a store from a JSON array of profile documents.
    ///
    /// Each document must carry its id under `uid` or `id`.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, StoreError> {
        let docs: Vec<Value> = serde_json::from_slice(bytes).map_err(|e| StoreError::Malformed {
            id: "<seed>".into(),
            reason: e.to_string(),
        })?;
        let store = Self::new();
        for doc in docs {
            store.insert_document(doc)?;
        }
        Ok(store)
    }

    /// Insert or replace a raw document. Returns its id.
    pub fn insert_document(&self, doc: Value) -> Result<UserId, StoreError> {
        let id = doc
            .get("uid")
            .or_else(|| doc.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| StoreError::Malformed {
                id: "<unknown>".into(),
                reason: "document has no uid".into(),
            })?;
        // Reject documents that would never decode.
        decode(&id, &doc)?;
        self.write()?.insert(id.clone(), doc);
        Ok(id)
    }

    pub fn upsert_profile(&self, profile: &UserProfile) -> Result<(), StoreError> {
        let doc = serde_json::to_value(profile).map_err(|e| StoreError::Malformed {
            id: profile.id.clone(),
            reason: e.to_string(),
        })?;
        self.write()?.insert(profile.id.clone(), doc);
        Ok(())
    }

    /// Synchronous read for tests and tooling.
    pub fn snapshot(&self, id: &str) -> Result<Option<UserProfile>, StoreError> {
        let guard = self.read()?;
        guard.get(id).map(|doc| decode(id, doc)).transpose()
    }

    pub fn len(&self) -> usize {
        self.read().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, BTreeMap<UserId, Value>>, StoreError> {
        self.docs
            .read()
            .map_err(|_| StoreError::unavailable("poisoned lock"))
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, BTreeMap<UserId, Value>>, StoreError> {
        self.docs
            .write()
            .map_err(|_| StoreError::unavailable("poisoned lock"))
    }

    fn with_document<T>(
        &self,
        user_id: &str,
        mutate: impl FnOnce(&mut serde_json::Map<String, Value>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self.write()?;
        let doc = guard
            .get_mut(user_id)
            .ok_or_else(|| StoreError::NotFound(user_id.to_string()))?;
        let object = doc
            .as_object_mut()
            .ok_or_else(|| StoreError::Malformed {
                id: user_id.to_string(),
                reason: "document is not an object".into(),
            })?;
        mutate(object)
    }
}

impl Default for InMemoryProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

fn decode(id: &str, doc: &Value) -> Result<UserProfile, StoreError> {
    let mut doc = doc.clone();
    if let Some(object) = doc.as_object_mut() {
        object.remove("id");
        object.insert("uid".into(), Value::String(id.to_string()));
    }
    serde_json::from_value(doc).map_err(|e| StoreError::Malformed {
        id: id.to_string(),
        reason: e.to_string(),
    })
}

fn document_gender(doc: &Value) -> Option<Gender> {
    doc.get("gender")
        .and_then(|g| serde_json::from_value(g.clone()).ok())
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn query_by_gender(&self, genders: &[Gender]) -> Result<Vec<UserProfile>, StoreError> {
        let guard = self.read()?;
        let mut out = Vec::new();
        for (id, doc) in guard.iter() {
            let Some(gender) = document_gender(doc) else {
                continue;
            };
            if !genders.contains(&gender) {
                continue;
            }
            match decode(id, doc) {
                Ok(profile) => out.push(profile),
                Err(err) => tracing::warn!(user_id = %id, error = %err, "skipping_malformed_profile"),
            }
        }
        Ok(out)
    }

    async fn get_profile(&self, id: &str) -> Result<Option<UserProfile>, StoreError> {
        self.snapshot(id)
    }

    async fn add_to_set(
        &self,
        user_id: &str,
        field: SetField,
        value: &str,
    ) -> Result<(), StoreError> {
        self.with_document(user_id, |object| {
            let slot = object
                .entry(field.as_str())
                .or_insert_with(|| Value::Array(Vec::new()));
            if slot.is_null() {
                *slot = Value::Array(Vec::new());
            }
            let items = slot.as_array_mut().ok_or_else(|| {
                StoreError::rejected(format!("{field} on {user_id} is not an array"))
            })?;
            if !items.iter().any(|item| item.as_str() == Some(value)) {
                items.push(Value::String(value.to_string()));
            }
            Ok(())
        })
    }

    async fn remove_from_set(
        &self,
        user_id: &str,
        field: SetField,
        value: &str,
    ) -> Result<(), StoreError> {
        self.with_document(user_id, |object| {
            match object.get_mut(field.as_str()) {
                Some(Value::Array(items)) => items.retain(|item| item.as_str() != Some(value)),
                None | Some(Value::Null) => {}
                Some(_) => {
                    return Err(StoreError::rejected(format!(
                        "{field} on {user_id} is not an array"
                    )));
                }
            }
            Ok(())
        })
    }

    async fn set_field(
        &self,
        user_id: &str,
        field: &str,
        value: FieldValue,
    ) -> Result<(), StoreError> {
        let value = match value {
            FieldValue::ServerTimestamp => Value::String(Utc::now().to_rfc3339()),
            FieldValue::Value(value) => value,
        };
        self.with_document(user_id, |object| {
            object.insert(field.to_string(), value);
            Ok(())
        })
    }
}
