use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::completion;
use super::counters::{CounterAdjustment, CounterField};
use super::domain::{
    Application, ApplicationId, ApplicationStatus, EscrowTransaction, Identity, PropertyId,
    PropertyStatus, RejectionNote, ReviewId, Role,
};
use super::error::LeasingError;
use super::escrow::EscrowLedger;
use super::repository::{
    LeasingNotice, LeasingStore, NoticeTemplate, NotificationHook, RepositoryError, ReviewUnit,
    SubmissionUnit,
};
use super::retry::CallPolicy;
use crate::config::LeasingConfig;

/// Tenant payload for a new application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitApplication {
    pub property_id: PropertyId,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub proposed_move_in_date: Option<NaiveDate>,
}

/// Landlord payload for a rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectApplication {
    pub reason: String,
    pub reason_code: String,
}

/// Application created by `submit` together with its escrow hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationReceipt {
    pub application: Application,
    pub transaction: EscrowTransaction,
}

/// Application after a landlord decision together with the mirrored escrow entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewOutcome {
    pub application: Application,
    pub transaction: EscrowTransaction,
}

#[derive(Debug, Clone)]
enum Decision {
    BeginReview,
    Approve,
    Reject(RejectionNote),
}

impl Decision {
    fn target(&self) -> ApplicationStatus {
        match self {
            Decision::BeginReview => ApplicationStatus::UnderReview,
            Decision::Approve => ApplicationStatus::Approved,
            Decision::Reject(_) => ApplicationStatus::Rejected,
        }
    }
}

/// Application lifecycle manager: gates submissions on profile completion and keeps the
/// application, its escrow entry, and the property counters moving together.
pub struct ApplicationLifecycle<S, N> {
    store: Arc<S>,
    notifications: Arc<N>,
    ledger: Arc<EscrowLedger>,
    policy: CallPolicy,
}

impl<S, N> Clone for ApplicationLifecycle<S, N> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            notifications: self.notifications.clone(),
            ledger: self.ledger.clone(),
            policy: self.policy.clone(),
        }
    }
}

impl<S, N> ApplicationLifecycle<S, N>
where
    S: LeasingStore + 'static,
    N: NotificationHook + 'static,
{
    pub fn new(store: Arc<S>, notifications: Arc<N>, config: &LeasingConfig) -> Self {
        Self::with_policy(
            store,
            notifications,
            EscrowLedger::new(config.currency.clone()),
            CallPolicy::from_config(config),
        )
    }

    pub fn with_policy(
        store: Arc<S>,
        notifications: Arc<N>,
        ledger: EscrowLedger,
        policy: CallPolicy,
    ) -> Self {
        Self {
            store,
            notifications,
            ledger: Arc::new(ledger),
            policy,
        }
    }

    /// Submit a rental application and open its escrow hold.
    pub async fn submit(
        &self,
        identity: &Identity,
        request: SubmitApplication,
    ) -> Result<ApplicationReceipt, LeasingError> {
        if identity.role != Role::Tenant {
            return Err(LeasingError::Forbidden(
                "only tenants can submit applications",
            ));
        }

        let store = &self.store;
        let tenant_id = &identity.id;
        let profile = self
            .policy
            .run("fetch_profile", || store.fetch_profile(tenant_id))
            .await
            .map_err(|err| LeasingError::from_repository(err, "tenant profile"))?;
        let completion = profile.as_ref().map(completion::compute).unwrap_or(0);
        if !profile.as_ref().is_some_and(completion::can_apply) {
            info!(tenant_id = %identity.id, completion, "submission blocked by profile gate");
            return Err(LeasingError::ProfileIncomplete { completion });
        }

        let property_id = &request.property_id;
        let property = self
            .policy
            .run("fetch_property", || store.fetch_property(property_id))
            .await
            .map_err(|err| LeasingError::from_repository(err, "property"))?
            .ok_or(LeasingError::NotFound { entity: "property" })?;

        let now = Utc::now();
        let application = Application {
            id: ApplicationId::generate(),
            tenant_id: identity.id.clone(),
            property_id: property.id.clone(),
            status: ApplicationStatus::Submitted,
            message: request.message,
            proposed_move_in_date: request.proposed_move_in_date,
            rejection: None,
            reviewed_by: None,
            reviewed_at: None,
            review_id: None,
            created_at: now,
        };
        let transaction =
            self.ledger
                .hold(&application, &property.landlord_id, property.rent_amount, now);
        let unit = SubmissionUnit {
            application: application.clone(),
            escrow: transaction.clone(),
            counter: CounterAdjustment::increment(
                property.id.clone(),
                CounterField::ApplicationCount,
            ),
        };

        // The commit runs detached so a dropped request cannot interrupt it halfway.
        let store = self.store.clone();
        let policy = self.policy.clone();
        tokio::spawn(commit_submission(store, policy, unit))
            .await
            .map_err(LeasingError::internal)??;

        info!(
            application_id = %application.id,
            tenant_id = %application.tenant_id,
            property_id = %application.property_id,
            amount = transaction.amount,
            "application submitted with escrow hold"
        );

        let mut details = BTreeMap::new();
        details.insert("property_id".to_string(), property.id.0.clone());
        details.insert("tenant_id".to_string(), identity.id.0.clone());
        self.notify(LeasingNotice {
            template: NoticeTemplate::ApplicationReceived,
            recipient: property.landlord_id.clone(),
            application_id: application.id.clone(),
            details,
        });

        Ok(ApplicationReceipt {
            application,
            transaction,
        })
    }

    /// Move a submitted application into manual review.
    pub async fn begin_review(
        &self,
        identity: &Identity,
        application_id: &ApplicationId,
    ) -> Result<ReviewOutcome, LeasingError> {
        self.decide(identity, application_id, Decision::BeginReview)
            .await
    }

    /// Approve an application: escrow is released and the property marked rented.
    pub async fn approve(
        &self,
        identity: &Identity,
        application_id: &ApplicationId,
    ) -> Result<ReviewOutcome, LeasingError> {
        self.decide(identity, application_id, Decision::Approve)
            .await
    }

    /// Reject an application: escrow is refunded, the property is left untouched.
    pub async fn reject(
        &self,
        identity: &Identity,
        application_id: &ApplicationId,
        request: RejectApplication,
    ) -> Result<ReviewOutcome, LeasingError> {
        let note = RejectionNote {
            reason: request.reason,
            reason_code: request.reason_code,
        };
        self.decide(identity, application_id, Decision::Reject(note))
            .await
    }

    /// Tenants see their own applications; landlords see those against their properties.
    pub async fn list(&self, identity: &Identity) -> Result<Vec<Application>, LeasingError> {
        let store = &self.store;
        let user_id = &identity.id;
        let result = match identity.role {
            Role::Tenant => {
                self.policy
                    .run("applications_for_tenant", || {
                        store.applications_for_tenant(user_id)
                    })
                    .await
            }
            Role::Landlord => {
                self.policy
                    .run("applications_for_landlord", || {
                        store.applications_for_landlord(user_id)
                    })
                    .await
            }
            Role::Admin => return Err(LeasingError::Forbidden("invalid user type")),
        };
        result.map_err(|err| LeasingError::from_repository(err, "applications"))
    }

    async fn decide(
        &self,
        identity: &Identity,
        application_id: &ApplicationId,
        decision: Decision,
    ) -> Result<ReviewOutcome, LeasingError> {
        if identity.role != Role::Landlord {
            return Err(LeasingError::Forbidden(
                "only landlords can review applications",
            ));
        }

        let store = &self.store;
        let application = self
            .policy
            .run("fetch_application", || store.fetch_application(application_id))
            .await
            .map_err(|err| LeasingError::from_repository(err, "application"))?
            .ok_or(LeasingError::NotFound {
                entity: "application",
            })?;

        let property_id = &application.property_id;
        let owns_property = self
            .policy
            .run("fetch_property", || store.fetch_property(property_id))
            .await
            .map_err(|err| LeasingError::from_repository(err, "property"))?
            .is_some_and(|property| property.landlord_id == identity.id);
        if !owns_property {
            warn!(
                application_id = %application.id,
                landlord_id = %identity.id,
                "review attempted by non-owner"
            );
            return Err(LeasingError::Forbidden(
                "you don't have permission to review this application",
            ));
        }

        let target = decision.target();
        if !application.status.can_transition_to(target) {
            return Err(LeasingError::InvalidTransition {
                current: application.status,
            });
        }

        let held = self
            .policy
            .run("fetch_escrow", || store.fetch_escrow(application_id))
            .await
            .map_err(|err| LeasingError::from_repository(err, "escrow transaction"))?
            .ok_or_else(|| {
                LeasingError::internal(format_args!(
                    "application {application_id} has no escrow entry"
                ))
            })?;

        let now = Utc::now();
        let mut updated = application.clone();
        updated.status = target;
        updated.review_id = Some(ReviewId::generate());
        let (transaction, property_status) = match &decision {
            Decision::BeginReview => (None, None),
            Decision::Approve => {
                updated.reviewed_by = Some(identity.id.clone());
                updated.reviewed_at = Some(now);
                let released = self
                    .ledger
                    .release(&held, now)
                    .map_err(LeasingError::internal)?;
                (Some(released), Some(PropertyStatus::Rented))
            }
            Decision::Reject(note) => {
                updated.reviewed_by = Some(identity.id.clone());
                updated.reviewed_at = Some(now);
                updated.rejection = Some(note.clone());
                let refunded = self
                    .ledger
                    .refund(&held, now)
                    .map_err(LeasingError::internal)?;
                (Some(refunded), None)
            }
        };

        let unit = ReviewUnit {
            expected: application.status,
            application: updated.clone(),
            escrow: transaction.clone(),
            property_status,
        };
        let mut committed = self
            .policy
            .run("commit_review", || store.commit_review(unit.clone()))
            .await;
        // A retried commit whose earlier attempt landed finds its own review id stored.
        if matches!(committed, Err(RepositoryError::StaleState { .. }))
            && self.review_landed(&updated).await?
        {
            info!(application_id = %updated.id, "review commit confirmed after retry");
            committed = Ok(());
        }
        if let Err(err) = committed {
            if let RepositoryError::StaleState { current } = &err {
                info!(
                    application_id = %application_id,
                    %current,
                    attempted = %target,
                    "lost review race"
                );
            }
            return Err(LeasingError::from_repository(err, "application"));
        }

        info!(
            application_id = %updated.id,
            landlord_id = %identity.id,
            from = %application.status,
            to = %target,
            "application reviewed"
        );

        let template = match decision {
            Decision::BeginReview => None,
            Decision::Approve => Some(NoticeTemplate::ApplicationApproved),
            Decision::Reject(_) => Some(NoticeTemplate::ApplicationRejected),
        };
        if let Some(template) = template {
            let mut details = BTreeMap::new();
            details.insert("decision".to_string(), target.label().to_string());
            if let Some(note) = &updated.rejection {
                details.insert("reason_code".to_string(), note.reason_code.clone());
            }
            self.notify(LeasingNotice {
                template,
                recipient: updated.tenant_id.clone(),
                application_id: updated.id.clone(),
                details,
            });
        }

        Ok(ReviewOutcome {
            application: updated,
            transaction: transaction.unwrap_or(held),
        })
    }

    async fn review_landed(&self, expected: &Application) -> Result<bool, LeasingError> {
        let store = &self.store;
        let stored = self
            .policy
            .run("fetch_application", || store.fetch_application(&expected.id))
            .await
            .map_err(|err| LeasingError::from_repository(err, "application"))?;
        Ok(stored.is_some_and(|stored| {
            stored.review_id.is_some() && stored.review_id == expected.review_id
        }))
    }

    fn notify(&self, notice: LeasingNotice) {
        let template = notice.template;
        let application_id = notice.application_id.clone();
        if let Err(err) = self.notifications.notify(notice) {
            warn!(
                application_id = %application_id,
                ?template,
                error = %err,
                "notification dropped"
            );
        }
    }
}

/// Any stored application for the (tenant, property) pair is a duplicate, even a rejected one.
async fn commit_submission<S>(
    store: Arc<S>,
    policy: CallPolicy,
    unit: SubmissionUnit,
) -> Result<(), LeasingError>
where
    S: LeasingStore + 'static,
{
    let application_id = unit.application.id.clone();
    match policy
        .run("commit_submission", || store.commit_submission(unit.clone()))
        .await
    {
        Ok(()) => Ok(()),
        Err(RepositoryError::Conflict) => {
            // Our id is fresh, so finding it stored means an earlier attempt committed.
            match policy
                .run("fetch_application", || store.fetch_application(&application_id))
                .await
            {
                Ok(Some(_)) => Ok(()),
                Ok(None) => Err(LeasingError::DuplicateApplication),
                Err(err) => Err(LeasingError::from_repository(err, "application")),
            }
        }
        Err(err) => Err(LeasingError::from_repository(err, "property")),
    }
}
