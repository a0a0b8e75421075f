use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use serde_json::Value;

use crate::leasing::counters::CounterAdjustment;
use crate::leasing::domain::{
    AccountRecord, Application, ApplicationId, DocumentKind, DocumentReference, EscrowStatus,
    EscrowTransaction, Favorite, Identity, Property, PropertyId, PropertyStatus, Role,
    TenantProfile, UserId,
};
use crate::leasing::escrow::EscrowLedger;
use crate::leasing::favorites::FavoritesService;
use crate::leasing::memory::InMemoryLeasingStore;
use crate::leasing::onboarding::{CompleteProfile, ProfileService};
use crate::leasing::repository::{
    CompletionUnit, LeasingNotice, LeasingStore, NotificationError, NotificationHook,
    RepositoryError, ReviewUnit, SubmissionUnit,
};
use crate::leasing::retry::CallPolicy;
use crate::leasing::service::ApplicationLifecycle;

pub(super) const RENT: u64 = 150_000;

pub(super) fn tenant() -> Identity {
    Identity::new("tenant-ada", Role::Tenant)
}

pub(super) fn second_tenant() -> Identity {
    Identity::new("tenant-chidi", Role::Tenant)
}

pub(super) fn landlord() -> Identity {
    Identity::new("landlord-bola", Role::Landlord)
}

pub(super) fn other_landlord() -> Identity {
    Identity::new("landlord-emeka", Role::Landlord)
}

pub(super) fn admin() -> Identity {
    Identity::new("admin-root", Role::Admin)
}

pub(super) fn property_id() -> PropertyId {
    PropertyId("prop-lekki-2br".to_string())
}

pub(super) fn property() -> Property {
    Property {
        id: property_id(),
        landlord_id: landlord().id,
        title: "2 bedroom flat, Lekki Phase 1".to_string(),
        rent_amount: RENT,
        status: PropertyStatus::Active,
        application_count: 0,
        favorite_count: 0,
    }
}

pub(super) fn completed_profile(tenant_id: &UserId) -> TenantProfile {
    let mut profile = TenantProfile::new(tenant_id.clone());
    profile.budget = Some(200_000);
    profile.preferred_location = Some("Lekki".to_string());
    profile.bedrooms = Some(2);
    profile.documents.insert(
        DocumentKind::IdDocument,
        DocumentReference("docs/ada/nin.pdf".to_string()),
    );
    profile.documents.insert(
        DocumentKind::ProofOfIncome,
        DocumentReference("docs/ada/payslip.pdf".to_string()),
    );
    profile.onboarding_completed = true;
    profile.profile_completion = 100;
    profile
}

pub(super) fn complete_profile_request(join_rent_credit: bool) -> CompleteProfile {
    CompleteProfile {
        budget: 200_000,
        preferred_location: "Lekki".to_string(),
        bedrooms: 2,
        move_in_date: None,
        id_document: "docs/ada/nin.pdf".to_string(),
        proof_of_income: "docs/ada/payslip.pdf".to_string(),
        references: vec!["referee@example.com".to_string()],
        join_rent_credit,
    }
}

pub(super) fn fast_policy() -> CallPolicy {
    CallPolicy {
        timeout: Duration::from_millis(500),
        max_attempts: 3,
        initial_backoff: Duration::from_millis(1),
    }
}

#[derive(Default)]
pub(super) struct MemoryNotifications {
    notices: Mutex<Vec<LeasingNotice>>,
}

impl MemoryNotifications {
    pub(super) fn notices(&self) -> Vec<LeasingNotice> {
        self.notices.lock().expect("notification mutex poisoned").clone()
    }
}

impl NotificationHook for MemoryNotifications {
    fn notify(&self, notice: LeasingNotice) -> Result<(), NotificationError> {
        self.notices
            .lock()
            .expect("notification mutex poisoned")
            .push(notice);
        Ok(())
    }
}

pub(super) struct FailingNotifications;

impl NotificationHook for FailingNotifications {
    fn notify(&self, _notice: LeasingNotice) -> Result<(), NotificationError> {
        Err(NotificationError::Transport("smtp offline".to_string()))
    }
}

pub(super) struct Harness<S = InMemoryLeasingStore> {
    pub(super) store: Arc<S>,
    pub(super) notifications: Arc<MemoryNotifications>,
    pub(super) lifecycle: ApplicationLifecycle<S, MemoryNotifications>,
    pub(super) profiles: ProfileService<S>,
    pub(super) favorites: FavoritesService<S>,
}

impl<S> Harness<S>
where
    S: LeasingStore + 'static,
{
    pub(super) fn with_policy(store: Arc<S>, policy: CallPolicy) -> Self {
        let notifications = Arc::new(MemoryNotifications::default());
        let lifecycle = ApplicationLifecycle::with_policy(
            store.clone(),
            notifications.clone(),
            EscrowLedger::default(),
            policy.clone(),
        );
        let profiles = ProfileService::new(store.clone(), policy.clone());
        let favorites = FavoritesService::new(store.clone(), policy);
        Self {
            store,
            notifications,
            lifecycle,
            profiles,
            favorites,
        }
    }

    pub(super) async fn property(&self) -> Property {
        self.store
            .fetch_property(&property_id())
            .await
            .expect("fetch property")
            .expect("property seeded")
    }

    pub(super) async fn application(&self, id: &ApplicationId) -> Application {
        self.store
            .fetch_application(id)
            .await
            .expect("fetch application")
            .expect("application stored")
    }

    pub(super) async fn escrow(&self, id: &ApplicationId) -> EscrowTransaction {
        self.store
            .fetch_escrow(id)
            .await
            .expect("fetch escrow")
            .expect("escrow stored")
    }

    /// Escrow status must always be derivable from the application status.
    pub(super) async fn assert_consistent(&self, id: &ApplicationId) {
        let application = self.application(id).await;
        let escrow = self.escrow(id).await;
        assert_eq!(
            escrow.status,
            EscrowStatus::mirroring(application.status),
            "escrow {} diverged from application {}",
            escrow.status,
            application.status
        );
    }
}

/// In-memory store with a seeded property and a tenant whose profile passes the gate.
pub(super) async fn ready_store() -> Arc<InMemoryLeasingStore> {
    let store = Arc::new(InMemoryLeasingStore::default());
    store
        .upsert_property(property())
        .await
        .expect("seed property");
    for identity in [tenant(), second_tenant()] {
        store
            .save_profile(completed_profile(&identity.id))
            .await
            .expect("seed profile");
        store
            .save_account(AccountRecord::new(&identity))
            .await
            .expect("seed account");
    }
    store
}

pub(super) async fn harness() -> Harness {
    Harness::with_policy(ready_store().await, fast_policy())
}

/// Store wrapper that injects infrastructure failures ahead of the real store.
#[derive(Default)]
pub(super) struct FlakyStore {
    pub(super) inner: InMemoryLeasingStore,
    pub(super) unavailable_commits: AtomicU32,
    pub(super) commit_then_fail: AtomicBool,
    pub(super) counter_offline: AtomicBool,
    pub(super) counter_then_fail: AtomicBool,
    pub(super) favorite_then_fail: AtomicBool,
    pub(super) unavailable_completions: AtomicU32,
    pub(super) application_reads_offline: AtomicBool,
    pub(super) escrow_read_delay_ms: AtomicU64,
    pub(super) commit_calls: AtomicU32,
}

fn reset_after_write() -> RepositoryError {
    RepositoryError::Unavailable("connection reset after commit".to_string())
}

impl FlakyStore {
    pub(super) fn over(inner: InMemoryLeasingStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }
}

#[async_trait]
impl LeasingStore for FlakyStore {
    async fn fetch_property(&self, id: &PropertyId) -> Result<Option<Property>, RepositoryError> {
        self.inner.fetch_property(id).await
    }

    async fn upsert_property(&self, property: Property) -> Result<(), RepositoryError> {
        self.inner.upsert_property(property).await
    }

    async fn fetch_profile(
        &self,
        tenant_id: &UserId,
    ) -> Result<Option<TenantProfile>, RepositoryError> {
        self.inner.fetch_profile(tenant_id).await
    }

    async fn save_profile(&self, profile: TenantProfile) -> Result<(), RepositoryError> {
        self.inner.save_profile(profile).await
    }

    async fn fetch_account(&self, id: &UserId) -> Result<Option<AccountRecord>, RepositoryError> {
        self.inner.fetch_account(id).await
    }

    async fn save_account(&self, account: AccountRecord) -> Result<(), RepositoryError> {
        self.inner.save_account(account).await
    }

    async fn commit_completion(&self, unit: CompletionUnit) -> Result<(), RepositoryError> {
        let remaining = self.unavailable_completions.load(Ordering::SeqCst);
        if remaining > 0 {
            self.unavailable_completions
                .store(remaining - 1, Ordering::SeqCst);
            return Err(RepositoryError::Unavailable("database offline".to_string()));
        }
        self.inner.commit_completion(unit).await
    }

    async fn fetch_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<Application>, RepositoryError> {
        if self.application_reads_offline.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("read replica offline".to_string()));
        }
        self.inner.fetch_application(id).await
    }

    async fn fetch_escrow(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Option<EscrowTransaction>, RepositoryError> {
        let delay = self.escrow_read_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.inner.fetch_escrow(application_id).await
    }

    async fn applications_for_tenant(
        &self,
        tenant_id: &UserId,
    ) -> Result<Vec<Application>, RepositoryError> {
        self.inner.applications_for_tenant(tenant_id).await
    }

    async fn applications_for_landlord(
        &self,
        landlord_id: &UserId,
    ) -> Result<Vec<Application>, RepositoryError> {
        self.inner.applications_for_landlord(landlord_id).await
    }

    async fn commit_submission(&self, unit: SubmissionUnit) -> Result<(), RepositoryError> {
        self.commit_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.unavailable_commits.load(Ordering::SeqCst);
        if remaining > 0 {
            self.unavailable_commits.store(remaining - 1, Ordering::SeqCst);
            return Err(RepositoryError::Unavailable("database offline".to_string()));
        }
        if self.commit_then_fail.swap(false, Ordering::SeqCst) {
            self.inner.commit_submission(unit).await?;
            return Err(reset_after_write());
        }
        self.inner.commit_submission(unit).await
    }

    async fn commit_review(&self, unit: ReviewUnit) -> Result<(), RepositoryError> {
        if self.commit_then_fail.swap(false, Ordering::SeqCst) {
            self.inner.commit_review(unit).await?;
            return Err(reset_after_write());
        }
        self.inner.commit_review(unit).await
    }

    async fn adjust_counter(&self, adjustment: CounterAdjustment) -> Result<u32, RepositoryError> {
        if self.counter_offline.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("counter shard offline".to_string()));
        }
        if self.counter_then_fail.swap(false, Ordering::SeqCst) {
            self.inner.adjust_counter(adjustment).await?;
            return Err(reset_after_write());
        }
        self.inner.adjust_counter(adjustment).await
    }

    async fn fetch_favorite(
        &self,
        tenant_id: &UserId,
        property_id: &PropertyId,
    ) -> Result<Option<Favorite>, RepositoryError> {
        self.inner.fetch_favorite(tenant_id, property_id).await
    }

    async fn insert_favorite(&self, favorite: Favorite) -> Result<(), RepositoryError> {
        if self.favorite_then_fail.swap(false, Ordering::SeqCst) {
            self.inner.insert_favorite(favorite).await?;
            return Err(reset_after_write());
        }
        self.inner.insert_favorite(favorite).await
    }

    async fn delete_favorite(
        &self,
        tenant_id: &UserId,
        property_id: &PropertyId,
    ) -> Result<Option<Favorite>, RepositoryError> {
        self.inner.delete_favorite(tenant_id, property_id).await
    }
}

pub(super) async fn flaky_harness() -> Harness<FlakyStore> {
    let inner = ready_store().await;
    let store = Arc::new(FlakyStore::over(inner.as_ref().clone()));
    Harness::with_policy(store, fast_policy())
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
