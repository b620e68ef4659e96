//! Typed access to an opaque record type
//!
//! The broker stores `data` as bytes and never looks inside. Callers that keep
//! structured values (sessions, route configuration, ...) can wrap a record
//! type in a [`TypedCollection`], which encodes values as JSON on the way in
//! and decodes them on the way out. Decode failures are the caller's problem
//! and surface as `BrokerError::Serialization`.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use databroker_core::{BrokerError, BrokerResult, Record, Version};

use crate::registry::Registry;

/// JSON-encoded view over one record type
pub struct TypedCollection<'a, T> {
    registry: &'a Registry,
    record_type: String,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T> TypedCollection<'a, T>
where
    T: Serialize + DeserializeOwned,
{
    /// Wrap `record_type` of `registry`
    pub fn new(registry: &'a Registry, record_type: impl Into<String>) -> Self {
        Self {
            registry,
            record_type: record_type.into(),
            _marker: PhantomData,
        }
    }

    /// Record type this collection reads and writes
    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    /// Decode a live value
    pub fn get(&self, id: &str) -> BrokerResult<T> {
        let record = self.registry.get(&self.record_type, id)?;
        Self::decode(&record)
    }

    /// Encode and store a value; returns the assigned version
    pub fn put(&self, id: &str, value: &T) -> BrokerResult<Version> {
        let data = serde_json::to_vec(value)
            .map_err(|e| BrokerError::Serialization(e.to_string()))?;
        Ok(self.registry.set(&self.record_type, id, data).version)
    }

    /// Delete a value; true if a live record was tombstoned
    pub fn delete(&self, id: &str) -> bool {
        self.registry.delete(&self.record_type, id).is_some()
    }

    /// Decode the payload of any record, e.g. one received in a sync batch
    pub fn decode(record: &Record) -> BrokerResult<T> {
        serde_json::from_slice(&record.data)
            .map_err(|e| BrokerError::Serialization(e.to_string()))
    }
}

impl Registry {
    /// Typed, JSON-encoded view over `record_type`
    pub fn collection<T>(&self, record_type: impl Into<String>) -> TypedCollection<'_, T>
    where
        T: Serialize + DeserializeOwned,
    {
        TypedCollection::new(self, record_type)
    }
}
