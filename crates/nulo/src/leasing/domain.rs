use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier issued by the identity gateway; shared by tenants, landlords, and admins.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Identifier wrapper for listed properties.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PropertyId(pub String);

/// Identifier wrapper for submitted applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

impl ApplicationId {
    pub fn generate() -> Self {
        Self(format!("app-{}", Uuid::new_v4().simple()))
    }
}

/// Identifier wrapper for escrow ledger entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EscrowId(pub String);

impl EscrowId {
    pub fn generate() -> Self {
        Self(format!("esc-{}", Uuid::new_v4().simple()))
    }
}

/// Token written by the review call that last moved an application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReviewId(pub String);

impl ReviewId {
    pub fn generate() -> Self {
        Self(format!("rev-{}", Uuid::new_v4().simple()))
    }
}

macro_rules! display_inner {
    ($($name:ident),*) => {
        $(impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        })*
    };
}

display_inner!(UserId, PropertyId, ApplicationId, EscrowId, ReviewId);

/// Closed set of roles the identity gateway can vouch for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Tenant,
    Landlord,
    Admin,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Tenant => "tenant",
            Role::Landlord => "landlord",
            Role::Admin => "admin",
        }
    }
}

/// Verified caller as returned by the identity gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub role: Role,
}

impl Identity {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: UserId(id.into()),
            role,
        }
    }
}

/// Account-level verification marker stored next to the trust score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    Partial,
    Approved,
    Rejected,
}

impl VerificationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Partial => "partial",
            VerificationStatus::Approved => "approved",
            VerificationStatus::Rejected => "rejected",
        }
    }
}

/// Profile record carrying the derived trust score for an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: UserId,
    pub role: Role,
    pub trust_score: i32,
    pub verification_status: VerificationStatus,
}

impl AccountRecord {
    pub fn new(identity: &Identity) -> Self {
        Self {
            id: identity.id.clone(),
            role: identity.role,
            trust_score: super::trust::BASE_TRUST_SCORE,
            verification_status: VerificationStatus::Partial,
        }
    }
}

/// Kinds of supporting documents a tenant can attach during onboarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    IdDocument,
    ProofOfIncome,
    ProofOfAddress,
    EmploymentLetter,
}

/// Storage reference (URL or object key) for an uploaded document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentReference(pub String);

impl DocumentReference {
    pub fn is_present(&self) -> bool {
        !self.0.trim().is_empty()
    }
}

/// Tenant onboarding state. `profile_completion` is derived and only written by the
/// completion engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantProfile {
    pub tenant_id: UserId,
    pub budget: Option<u64>,
    pub preferred_location: Option<String>,
    pub bedrooms: Option<u8>,
    pub move_in_date: Option<NaiveDate>,
    pub documents: BTreeMap<DocumentKind, DocumentReference>,
    pub references: Vec<String>,
    pub join_rent_credit: bool,
    pub onboarding_completed: bool,
    pub profile_completion: u8,
    pub profile_completed_at: Option<DateTime<Utc>>,
}

impl TenantProfile {
    /// Empty profile created alongside a tenant account.
    pub fn new(tenant_id: UserId) -> Self {
        Self {
            tenant_id,
            budget: None,
            preferred_location: None,
            bedrooms: None,
            move_in_date: None,
            documents: BTreeMap::new(),
            references: Vec::new(),
            join_rent_credit: false,
            onboarding_completed: false,
            profile_completion: 0,
            profile_completed_at: None,
        }
    }

    pub fn has_budget(&self) -> bool {
        self.budget.is_some_and(|budget| budget > 0)
    }

    pub fn has_preferred_location(&self) -> bool {
        self.preferred_location
            .as_deref()
            .is_some_and(|location| !location.trim().is_empty())
    }

    pub fn has_document(&self, kind: DocumentKind) -> bool {
        self.documents
            .get(&kind)
            .is_some_and(DocumentReference::is_present)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyStatus {
    Draft,
    Active,
    Rented,
    Inactive,
}

impl PropertyStatus {
    pub const fn label(self) -> &'static str {
        match self {
            PropertyStatus::Draft => "draft",
            PropertyStatus::Active => "active",
            PropertyStatus::Rented => "rented",
            PropertyStatus::Inactive => "inactive",
        }
    }
}

/// The slice of a listing the leasing core reads and writes. Text fields, photos, and
/// search metadata live with the external listing service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub id: PropertyId,
    pub landlord_id: UserId,
    pub title: String,
    pub rent_amount: u64,
    pub status: PropertyStatus,
    pub application_count: u32,
    pub favorite_count: u32,
}

/// Application lifecycle: `submitted -> under_review -> {approved, rejected}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Submitted,
    UnderReview,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::UnderReview => "under_review",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, ApplicationStatus::Approved | ApplicationStatus::Rejected)
    }

    pub const fn can_transition_to(self, next: ApplicationStatus) -> bool {
        matches!(
            (self, next),
            (ApplicationStatus::Submitted, ApplicationStatus::UnderReview)
                | (
                    ApplicationStatus::Submitted | ApplicationStatus::UnderReview,
                    ApplicationStatus::Approved | ApplicationStatus::Rejected
                )
        )
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Landlord supplied explanation stored on a rejected application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionNote {
    pub reason: String,
    pub reason_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub tenant_id: UserId,
    pub property_id: PropertyId,
    pub status: ApplicationStatus,
    pub message: Option<String>,
    pub proposed_move_in_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<RejectionNote>,
    pub reviewed_by: Option<UserId>,
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_id: Option<ReviewId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscrowStatus {
    Held,
    Released,
    Refunded,
}

impl EscrowStatus {
    pub const fn label(self) -> &'static str {
        match self {
            EscrowStatus::Held => "held",
            EscrowStatus::Released => "released",
            EscrowStatus::Refunded => "refunded",
        }
    }

    /// The only escrow status consistent with the given application status.
    pub const fn mirroring(status: ApplicationStatus) -> Self {
        match status {
            ApplicationStatus::Submitted | ApplicationStatus::UnderReview => EscrowStatus::Held,
            ApplicationStatus::Approved => EscrowStatus::Released,
            ApplicationStatus::Rejected => EscrowStatus::Refunded,
        }
    }
}

impl fmt::Display for EscrowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Ledger entry for funds notionally held against an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowTransaction {
    pub id: EscrowId,
    pub application_id: ApplicationId,
    pub tenant_id: UserId,
    pub landlord_id: UserId,
    pub property_id: PropertyId,
    pub amount: u64,
    pub currency: String,
    pub status: EscrowStatus,
    pub held_at: DateTime<Utc>,
    pub released_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Favorite {
    pub tenant_id: UserId,
    pub property_id: PropertyId,
    pub created_at: DateTime<Utc>,
}
