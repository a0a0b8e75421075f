use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::counters::CounterAdjustment;
use super::domain::{
    AccountRecord, Application, ApplicationId, ApplicationStatus, EscrowTransaction, Favorite,
    Property, PropertyId, PropertyStatus, TenantProfile, UserId,
};

/// Everything a submission writes. Stores must apply it all-or-nothing and reject it with
/// `Conflict` when the tenant already has an application for the property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionUnit {
    pub application: Application,
    pub escrow: EscrowTransaction,
    pub counter: CounterAdjustment,
}

/// Profile and account written together when a tenant finishes onboarding. `account` is
/// `None` when the profile had already crossed the completion gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionUnit {
    pub profile: TenantProfile,
    pub account: Option<AccountRecord>,
}

/// Everything a landlord review writes, guarded by compare-and-set on `expected`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewUnit {
    pub expected: ApplicationStatus,
    pub application: Application,
    /// Replacement escrow entry; the stored entry must still be `held`.
    pub escrow: Option<EscrowTransaction>,
    pub property_status: Option<PropertyStatus>,
}

/// Storage abstraction so the lifecycle services can be exercised in isolation.
#[async_trait]
pub trait LeasingStore: Send + Sync {
    async fn fetch_property(&self, id: &PropertyId) -> Result<Option<Property>, RepositoryError>;
    async fn upsert_property(&self, property: Property) -> Result<(), RepositoryError>;

    async fn fetch_profile(
        &self,
        tenant_id: &UserId,
    ) -> Result<Option<TenantProfile>, RepositoryError>;
    async fn save_profile(&self, profile: TenantProfile) -> Result<(), RepositoryError>;

    async fn fetch_account(&self, id: &UserId) -> Result<Option<AccountRecord>, RepositoryError>;
    async fn save_account(&self, account: AccountRecord) -> Result<(), RepositoryError>;
    /// Writes the profile and the optional account in one transaction.
    async fn commit_completion(&self, unit: CompletionUnit) -> Result<(), RepositoryError>;

    async fn fetch_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<Application>, RepositoryError>;
    async fn fetch_escrow(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Option<EscrowTransaction>, RepositoryError>;
    /// Newest first.
    async fn applications_for_tenant(
        &self,
        tenant_id: &UserId,
    ) -> Result<Vec<Application>, RepositoryError>;
    /// Applications against properties owned by the landlord, newest first.
    async fn applications_for_landlord(
        &self,
        landlord_id: &UserId,
    ) -> Result<Vec<Application>, RepositoryError>;

    /// Any existing application for the (tenant, property) pair is a `Conflict`, even a
    /// rejected one.
    async fn commit_submission(&self, unit: SubmissionUnit) -> Result<(), RepositoryError>;
    /// Fails with `StaleState` when the stored application no longer has `unit.expected`.
    async fn commit_review(&self, unit: ReviewUnit) -> Result<(), RepositoryError>;

    /// Atomic increment/decrement at the storage layer; returns the new value. Replaying an
    /// `operation_id` that already landed returns the value it produced without reapplying.
    async fn adjust_counter(&self, adjustment: CounterAdjustment) -> Result<u32, RepositoryError>;

    async fn fetch_favorite(
        &self,
        tenant_id: &UserId,
        property_id: &PropertyId,
    ) -> Result<Option<Favorite>, RepositoryError>;
    async fn insert_favorite(&self, favorite: Favorite) -> Result<(), RepositoryError>;
    async fn delete_favorite(
        &self,
        tenant_id: &UserId,
        property_id: &PropertyId,
    ) -> Result<Option<Favorite>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("application changed concurrently (now {current})")]
    StaleState { current: ApplicationStatus },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
    #[error("repository state corrupted: {0}")]
    Corrupted(String),
}

/// Fire-and-forget outbound hook (e-mail, SMS, push adapters).
pub trait NotificationHook: Send + Sync {
    fn notify(&self, notice: LeasingNotice) -> Result<(), NotificationError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeTemplate {
    ApplicationReceived,
    ApplicationApproved,
    ApplicationRejected,
}

/// Notification payload so routes/tests can assert integration boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeasingNotice {
    pub template: NoticeTemplate,
    pub recipient: UserId,
    pub application_id: ApplicationId,
    pub details: BTreeMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
