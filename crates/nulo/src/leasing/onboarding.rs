use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::completion::{self, MissingField};
use super::domain::{
    AccountRecord, DocumentKind, DocumentReference, Identity, Role, TenantProfile,
    VerificationStatus,
};
use super::error::LeasingError;
use super::repository::{CompletionUnit, LeasingStore};
use super::retry::CallPolicy;
use super::trust::{self, TrustMilestones};

/// Partial tenant update. `onboarding_completed` and `profile_completion` are not settable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub budget: Option<u64>,
    #[serde(default)]
    pub preferred_location: Option<String>,
    #[serde(default)]
    pub bedrooms: Option<u8>,
    #[serde(default)]
    pub move_in_date: Option<NaiveDate>,
    #[serde(default)]
    pub documents: BTreeMap<DocumentKind, String>,
}

/// Final onboarding step: preferences, documents, and rent-credit opt-in in one go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteProfile {
    pub budget: u64,
    pub preferred_location: String,
    pub bedrooms: u8,
    #[serde(default)]
    pub move_in_date: Option<NaiveDate>,
    pub id_document: String,
    pub proof_of_income: String,
    #[serde(default)]
    pub references: Vec<String>,
    #[serde(default)]
    pub join_rent_credit: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionReceipt {
    pub profile: TenantProfile,
    pub trust_score: i32,
    pub verification_status: VerificationStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileStatus {
    pub profile_completion: u8,
    pub onboarding_completed: bool,
    pub trust_score: i32,
    pub verification_status: VerificationStatus,
    pub missing_fields: Vec<MissingField>,
    pub can_apply: bool,
}

/// Tenant-owned profile writes. Every write goes through the completion engine, and the
/// trust score engine runs once when a profile first crosses the completion gate.
pub struct ProfileService<S> {
    store: Arc<S>,
    policy: CallPolicy,
}

impl<S> Clone for ProfileService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            policy: self.policy.clone(),
        }
    }
}

impl<S> ProfileService<S>
where
    S: LeasingStore + 'static,
{
    pub fn new(store: Arc<S>, policy: CallPolicy) -> Self {
        Self { store, policy }
    }

    /// Create the account record and, for tenants, the empty profile. Idempotent.
    pub async fn register(&self, identity: &Identity) -> Result<AccountRecord, LeasingError> {
        let account = self.account(identity).await?;
        self.save_account(account.clone()).await?;

        if identity.role == Role::Tenant && self.load_profile(identity).await?.is_none() {
            self.save_profile(TenantProfile::new(identity.id.clone()))
                .await?;
            info!(tenant_id = %identity.id, "tenant profile created");
        }
        Ok(account)
    }

    pub async fn profile(&self, identity: &Identity) -> Result<TenantProfile, LeasingError> {
        let mut profile = self.require_profile(identity).await?;
        completion::refresh(&mut profile);
        Ok(profile)
    }

    pub async fn update_profile(
        &self,
        identity: &Identity,
        update: ProfileUpdate,
    ) -> Result<TenantProfile, LeasingError> {
        let mut profile = self.require_profile(identity).await?;

        if let Some(budget) = update.budget {
            profile.budget = Some(budget);
        }
        if let Some(location) = update.preferred_location {
            profile.preferred_location = Some(location);
        }
        if let Some(bedrooms) = update.bedrooms {
            profile.bedrooms = Some(bedrooms);
        }
        if let Some(move_in_date) = update.move_in_date {
            profile.move_in_date = Some(move_in_date);
        }
        for (kind, reference) in update.documents {
            profile.documents.insert(kind, DocumentReference(reference));
        }

        let completion = completion::refresh(&mut profile);
        self.save_profile(profile.clone()).await?;
        info!(tenant_id = %identity.id, completion, "tenant profile updated");
        Ok(profile)
    }

    pub async fn complete_profile(
        &self,
        identity: &Identity,
        request: CompleteProfile,
    ) -> Result<CompletionReceipt, LeasingError> {
        let mut profile = self.require_profile(identity).await?;
        let crossing_gate = !profile.onboarding_completed;

        profile.budget = Some(request.budget);
        profile.preferred_location = Some(request.preferred_location);
        profile.bedrooms = Some(request.bedrooms);
        profile.move_in_date = request.move_in_date;
        profile.documents.insert(
            DocumentKind::IdDocument,
            DocumentReference(request.id_document),
        );
        profile.documents.insert(
            DocumentKind::ProofOfIncome,
            DocumentReference(request.proof_of_income),
        );
        profile.references = request.references;
        profile.join_rent_credit = request.join_rent_credit;
        profile.onboarding_completed = true;
        if crossing_gate {
            profile.profile_completed_at = Some(Utc::now());
        }
        completion::refresh(&mut profile);

        let mut account = self.account(identity).await?;
        if crossing_gate {
            let assessment = trust::assess(TrustMilestones {
                profile_completed: true,
                joined_rent_credit: request.join_rent_credit,
            });
            account.trust_score = assessment.trust_score;
            account.verification_status = assessment.verification_status;
        }

        // Profile and trust land together, so a failed write leaves the gate uncrossed.
        let unit = CompletionUnit {
            profile: profile.clone(),
            account: crossing_gate.then(|| account.clone()),
        };
        let store = &self.store;
        self.policy
            .run("commit_completion", || store.commit_completion(unit.clone()))
            .await
            .map_err(|err| LeasingError::from_repository(err, "tenant profile"))?;
        if crossing_gate {
            info!(
                tenant_id = %identity.id,
                trust_score = account.trust_score,
                "tenant profile completed"
            );
        }

        Ok(CompletionReceipt {
            profile,
            trust_score: account.trust_score,
            verification_status: account.verification_status,
        })
    }

    pub async fn profile_status(&self, identity: &Identity) -> Result<ProfileStatus, LeasingError> {
        let profile = self.require_profile(identity).await?;
        let account = self.account(identity).await?;

        Ok(ProfileStatus {
            profile_completion: completion::compute(&profile),
            onboarding_completed: profile.onboarding_completed,
            trust_score: account.trust_score,
            verification_status: account.verification_status,
            missing_fields: completion::missing_fields(&profile),
            can_apply: completion::can_apply(&profile),
        })
    }

    async fn require_profile(&self, identity: &Identity) -> Result<TenantProfile, LeasingError> {
        if identity.role != Role::Tenant {
            return Err(LeasingError::Forbidden(
                "only tenants can access this resource",
            ));
        }
        self.load_profile(identity)
            .await?
            .ok_or(LeasingError::NotFound {
                entity: "tenant profile",
            })
    }

    async fn load_profile(
        &self,
        identity: &Identity,
    ) -> Result<Option<TenantProfile>, LeasingError> {
        let store = &self.store;
        self.policy
            .run("fetch_profile", || store.fetch_profile(&identity.id))
            .await
            .map_err(|err| LeasingError::from_repository(err, "tenant profile"))
    }

    async fn save_profile(&self, profile: TenantProfile) -> Result<(), LeasingError> {
        let store = &self.store;
        self.policy
            .run("save_profile", || store.save_profile(profile.clone()))
            .await
            .map_err(|err| LeasingError::from_repository(err, "tenant profile"))
    }

    async fn account(&self, identity: &Identity) -> Result<AccountRecord, LeasingError> {
        let store = &self.store;
        let stored = self
            .policy
            .run("fetch_account", || store.fetch_account(&identity.id))
            .await
            .map_err(|err| LeasingError::from_repository(err, "account"))?;
        Ok(stored.unwrap_or_else(|| AccountRecord::new(identity)))
    }

    async fn save_account(&self, account: AccountRecord) -> Result<(), LeasingError> {
        let store = &self.store;
        self.policy
            .run("save_account", || store.save_account(account.clone()))
            .await
            .map_err(|err| LeasingError::from_repository(err, "account"))
    }
}
