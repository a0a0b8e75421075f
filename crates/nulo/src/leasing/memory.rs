use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::counters::{CounterAdjustment, CounterField};
use super::domain::{
    AccountRecord, Application, ApplicationId, EscrowStatus, EscrowTransaction, Favorite,
    Property, PropertyId, TenantProfile, UserId,
};
use super::repository::{
    CompletionUnit, LeasingStore, RepositoryError, ReviewUnit, SubmissionUnit,
};

/// Stage of a submission commit after which an injected fault fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStage {
    Application,
    EscrowHold,
    CounterIncrement,
}

impl SubmissionStage {
    pub const fn label(self) -> &'static str {
        match self {
            SubmissionStage::Application => "application insert",
            SubmissionStage::EscrowHold => "escrow hold",
            SubmissionStage::CounterIncrement => "counter increment",
        }
    }
}

#[derive(Debug, Default)]
struct Tables {
    properties: HashMap<PropertyId, Property>,
    profiles: HashMap<UserId, TenantProfile>,
    accounts: HashMap<UserId, AccountRecord>,
    applications: HashMap<ApplicationId, Application>,
    escrows: HashMap<ApplicationId, EscrowTransaction>,
    favorites: HashMap<(UserId, PropertyId), Favorite>,
    /// Counter operations already applied, with the value each produced.
    counter_ops: HashMap<String, u32>,
}

/// Process-local store. A single mutex serializes every write, so each trait call is one
/// transaction; submissions are staged and only published once every stage succeeded.
#[derive(Debug, Default, Clone)]
pub struct InMemoryLeasingStore {
    tables: Arc<Mutex<Tables>>,
    submission_fault: Arc<Mutex<Option<SubmissionStage>>>,
}

impl InMemoryLeasingStore {
    /// Make the next submission commit fail right after `stage` was staged.
    pub fn fail_next_submission_at(&self, stage: SubmissionStage) {
        if let Ok(mut fault) = self.submission_fault.lock() {
            *fault = Some(stage);
        }
    }

    pub fn application_count(&self) -> usize {
        self.tables
            .lock()
            .map(|tables| tables.applications.len())
            .unwrap_or_default()
    }

    pub fn escrow_count(&self) -> usize {
        self.tables
            .lock()
            .map(|tables| tables.escrows.len())
            .unwrap_or_default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Corrupted("store mutex poisoned".to_string()))
    }

    fn trip(&self, stage: SubmissionStage) -> Result<(), RepositoryError> {
        let mut fault = self
            .submission_fault
            .lock()
            .map_err(|_| RepositoryError::Corrupted("fault mutex poisoned".to_string()))?;
        if *fault == Some(stage) {
            *fault = None;
            return Err(RepositoryError::Unavailable(format!(
                "injected fault after {}",
                stage.label()
            )));
        }
        Ok(())
    }
}

fn counter_slot(property: &mut Property, field: CounterField) -> &mut u32 {
    match field {
        CounterField::ApplicationCount => &mut property.application_count,
        CounterField::FavoriteCount => &mut property.favorite_count,
    }
}

fn newest_first(mut applications: Vec<Application>) -> Vec<Application> {
    applications.sort_by(|left, right| {
        right
            .created_at
            .cmp(&left.created_at)
            .then_with(|| right.id.0.cmp(&left.id.0))
    });
    applications
}

#[async_trait]
impl LeasingStore for InMemoryLeasingStore {
    async fn fetch_property(&self, id: &PropertyId) -> Result<Option<Property>, RepositoryError> {
        Ok(self.tables()?.properties.get(id).cloned())
    }

    async fn upsert_property(&self, property: Property) -> Result<(), RepositoryError> {
        self.tables()?
            .properties
            .insert(property.id.clone(), property);
        Ok(())
    }

    async fn fetch_profile(
        &self,
        tenant_id: &UserId,
    ) -> Result<Option<TenantProfile>, RepositoryError> {
        Ok(self.tables()?.profiles.get(tenant_id).cloned())
    }

    async fn save_profile(&self, profile: TenantProfile) -> Result<(), RepositoryError> {
        self.tables()?
            .profiles
            .insert(profile.tenant_id.clone(), profile);
        Ok(())
    }

    async fn fetch_account(&self, id: &UserId) -> Result<Option<AccountRecord>, RepositoryError> {
        Ok(self.tables()?.accounts.get(id).cloned())
    }

    async fn save_account(&self, account: AccountRecord) -> Result<(), RepositoryError> {
        self.tables()?.accounts.insert(account.id.clone(), account);
        Ok(())
    }

    async fn commit_completion(&self, unit: CompletionUnit) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        if let Some(account) = unit.account {
            tables.accounts.insert(account.id.clone(), account);
        }
        tables
            .profiles
            .insert(unit.profile.tenant_id.clone(), unit.profile);
        Ok(())
    }

    async fn fetch_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<Application>, RepositoryError> {
        Ok(self.tables()?.applications.get(id).cloned())
    }

    async fn fetch_escrow(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Option<EscrowTransaction>, RepositoryError> {
        Ok(self.tables()?.escrows.get(application_id).cloned())
    }

    async fn applications_for_tenant(
        &self,
        tenant_id: &UserId,
    ) -> Result<Vec<Application>, RepositoryError> {
        let tables = self.tables()?;
        let applications = tables
            .applications
            .values()
            .filter(|application| &application.tenant_id == tenant_id)
            .cloned()
            .collect();
        Ok(newest_first(applications))
    }

    async fn applications_for_landlord(
        &self,
        landlord_id: &UserId,
    ) -> Result<Vec<Application>, RepositoryError> {
        let tables = self.tables()?;
        let applications = tables
            .applications
            .values()
            .filter(|application| {
                tables
                    .properties
                    .get(&application.property_id)
                    .is_some_and(|property| &property.landlord_id == landlord_id)
            })
            .cloned()
            .collect();
        Ok(newest_first(applications))
    }

    async fn commit_submission(&self, unit: SubmissionUnit) -> Result<(), RepositoryError> {
        let SubmissionUnit {
            application,
            escrow,
            counter,
        } = unit;
        let mut tables = self.tables()?;

        let duplicate = tables.applications.contains_key(&application.id)
            || tables.applications.values().any(|existing| {
                existing.tenant_id == application.tenant_id
                    && existing.property_id == application.property_id
            });
        if duplicate {
            return Err(RepositoryError::Conflict);
        }
        self.trip(SubmissionStage::Application)?;

        if tables.escrows.contains_key(&escrow.application_id)
            || escrow.application_id != application.id
        {
            return Err(RepositoryError::Corrupted(format!(
                "escrow {} does not pair with application {}",
                escrow.id, application.id
            )));
        }
        self.trip(SubmissionStage::EscrowHold)?;

        let current = tables
            .properties
            .get_mut(&counter.property_id)
            .map(|property| *counter_slot(property, counter.field))
            .ok_or(RepositoryError::NotFound)?;
        let next = counter.apply(current);
        self.trip(SubmissionStage::CounterIncrement)?;

        // Publish: nothing above touched the tables.
        if let Some(property) = tables.properties.get_mut(&counter.property_id) {
            *counter_slot(property, counter.field) = next;
        }
        tables.counter_ops.insert(counter.operation_id, next);
        tables
            .escrows
            .insert(escrow.application_id.clone(), escrow);
        tables
            .applications
            .insert(application.id.clone(), application);
        Ok(())
    }

    async fn commit_review(&self, unit: ReviewUnit) -> Result<(), RepositoryError> {
        let ReviewUnit {
            expected,
            application,
            escrow,
            property_status,
        } = unit;
        let mut tables = self.tables()?;

        let current = tables
            .applications
            .get(&application.id)
            .map(|stored| stored.status)
            .ok_or(RepositoryError::NotFound)?;
        if current != expected {
            return Err(RepositoryError::StaleState { current });
        }

        if let Some(escrow) = &escrow {
            match tables.escrows.get(&application.id) {
                Some(stored) if stored.status == EscrowStatus::Held => {}
                Some(stored) => {
                    return Err(RepositoryError::Corrupted(format!(
                        "escrow {} is {} while application {} is {}",
                        stored.id, stored.status, application.id, current
                    )))
                }
                None => {
                    return Err(RepositoryError::Corrupted(format!(
                        "application {} has no escrow entry {}",
                        application.id, escrow.id
                    )))
                }
            }
        }

        if property_status.is_some() && !tables.properties.contains_key(&application.property_id)
        {
            return Err(RepositoryError::NotFound);
        }

        if let (Some(status), Some(property)) = (
            property_status,
            tables.properties.get_mut(&application.property_id),
        ) {
            property.status = status;
        }
        if let Some(escrow) = escrow {
            tables
                .escrows
                .insert(escrow.application_id.clone(), escrow);
        }
        tables
            .applications
            .insert(application.id.clone(), application);
        Ok(())
    }

    async fn adjust_counter(&self, adjustment: CounterAdjustment) -> Result<u32, RepositoryError> {
        let mut tables = self.tables()?;
        if let Some(value) = tables.counter_ops.get(&adjustment.operation_id) {
            return Ok(*value);
        }
        let property = tables
            .properties
            .get_mut(&adjustment.property_id)
            .ok_or(RepositoryError::NotFound)?;
        let slot = counter_slot(property, adjustment.field);
        *slot = adjustment.apply(*slot);
        let value = *slot;
        tables.counter_ops.insert(adjustment.operation_id, value);
        Ok(value)
    }

    async fn fetch_favorite(
        &self,
        tenant_id: &UserId,
        property_id: &PropertyId,
    ) -> Result<Option<Favorite>, RepositoryError> {
        Ok(self
            .tables()?
            .favorites
            .get(&(tenant_id.clone(), property_id.clone()))
            .cloned())
    }

    async fn insert_favorite(&self, favorite: Favorite) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        let key = (favorite.tenant_id.clone(), favorite.property_id.clone());
        if tables.favorites.contains_key(&key) {
            return Err(RepositoryError::Conflict);
        }
        tables.favorites.insert(key, favorite);
        Ok(())
    }

    async fn delete_favorite(
        &self,
        tenant_id: &UserId,
        property_id: &PropertyId,
    ) -> Result<Option<Favorite>, RepositoryError> {
        let mut tables = self.tables()?;
        Ok(tables
            .favorites
            .remove(&(tenant_id.clone(), property_id.clone())))
    }
}
