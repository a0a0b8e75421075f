use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use super::domain::PropertyId;
use super::error::LeasingError;
use super::repository::LeasingStore;
use super::retry::CallPolicy;

/// Denormalized counters kept on a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterField {
    ApplicationCount,
    FavoriteCount,
}

impl CounterField {
    pub const fn label(self) -> &'static str {
        match self {
            CounterField::ApplicationCount => "application_count",
            CounterField::FavoriteCount => "favorite_count",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterDelta {
    Increment,
    Decrement,
}

/// A single counter change, applied atomically by the store. Retries reuse
/// `operation_id`, so a change applies at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterAdjustment {
    pub operation_id: String,
    pub property_id: PropertyId,
    pub field: CounterField,
    pub delta: CounterDelta,
}

impl CounterAdjustment {
    pub fn increment(property_id: PropertyId, field: CounterField) -> Self {
        Self::new(property_id, field, CounterDelta::Increment)
    }

    pub fn decrement(property_id: PropertyId, field: CounterField) -> Self {
        Self::new(property_id, field, CounterDelta::Decrement)
    }

    fn new(property_id: PropertyId, field: CounterField, delta: CounterDelta) -> Self {
        Self {
            operation_id: format!("op-{}", Uuid::new_v4().simple()),
            property_id,
            field,
            delta,
        }
    }

    /// Next value for the counter; decrements floor at zero.
    pub fn apply(&self, current: u32) -> u32 {
        match self.delta {
            CounterDelta::Increment => current.saturating_add(1),
            CounterDelta::Decrement => current.saturating_sub(1),
        }
    }
}

/// Serializes counter changes through the store's atomic adjust primitive.
pub struct PropertyCounterMaintainer<S> {
    store: Arc<S>,
    policy: CallPolicy,
}

impl<S> Clone for PropertyCounterMaintainer<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            policy: self.policy.clone(),
        }
    }
}

impl<S> PropertyCounterMaintainer<S>
where
    S: LeasingStore + 'static,
{
    pub fn new(store: Arc<S>, policy: CallPolicy) -> Self {
        Self { store, policy }
    }

    pub async fn increment(
        &self,
        property_id: &PropertyId,
        field: CounterField,
    ) -> Result<u32, LeasingError> {
        self.adjust(CounterAdjustment::increment(property_id.clone(), field))
            .await
    }

    pub async fn decrement(
        &self,
        property_id: &PropertyId,
        field: CounterField,
    ) -> Result<u32, LeasingError> {
        self.adjust(CounterAdjustment::decrement(property_id.clone(), field))
            .await
    }

    pub async fn adjust(&self, adjustment: CounterAdjustment) -> Result<u32, LeasingError> {
        let store = &self.store;
        let value = self
            .policy
            .run("adjust_counter", || store.adjust_counter(adjustment.clone()))
            .await
            .map_err(|err| LeasingError::from_repository(err, "property"))?;

        tracing::debug!(
            property_id = %adjustment.property_id,
            field = adjustment.field.label(),
            value,
            "property counter adjusted"
        );
        Ok(value)
    }
}
