//! Tenant readiness scoring for the three-step onboarding wizard.
//!
//! Completion is recomputed from the current field state on every call; the highest
//! satisfied step wins regardless of earlier steps. Because `onboarding_completed` never
//! reverts, a completed profile stays at 100 even if earlier fields are edited later.

use serde::Serialize;

use super::domain::{DocumentKind, TenantProfile};

pub const PREFERENCES_FLOOR: u8 = 33;
pub const DOCUMENTS_FLOOR: u8 = 67;
pub const COMPLETE: u8 = 100;

/// Ordered onboarding checklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStep {
    Preferences,
    Documents,
    Review,
}

impl CompletionStep {
    pub const ALL: [CompletionStep; 3] = [
        CompletionStep::Preferences,
        CompletionStep::Documents,
        CompletionStep::Review,
    ];

    pub const fn floor(self) -> u8 {
        match self {
            CompletionStep::Preferences => PREFERENCES_FLOOR,
            CompletionStep::Documents => DOCUMENTS_FLOOR,
            CompletionStep::Review => COMPLETE,
        }
    }

    pub fn satisfied_by(self, profile: &TenantProfile) -> bool {
        match self {
            CompletionStep::Preferences => {
                profile.has_budget() && profile.has_preferred_location()
            }
            CompletionStep::Documents => {
                profile.has_document(DocumentKind::IdDocument)
                    && profile.has_document(DocumentKind::ProofOfIncome)
            }
            CompletionStep::Review => profile.onboarding_completed,
        }
    }
}

/// Field a tenant still has to provide before the gate can open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingField {
    Budget,
    PreferredLocation,
    IdDocument,
    ProofOfIncome,
}

pub fn compute(profile: &TenantProfile) -> u8 {
    CompletionStep::ALL
        .iter()
        .rev()
        .find(|step| step.satisfied_by(profile))
        .map(|step| step.floor())
        .unwrap_or(0)
}

/// Gate consulted before a tenant may submit an application.
pub fn can_apply(profile: &TenantProfile) -> bool {
    compute(profile) >= COMPLETE
}

/// Recompute and store the derived completion percentage.
pub fn refresh(profile: &mut TenantProfile) -> u8 {
    let completion = compute(profile);
    profile.profile_completion = completion;
    completion
}

pub fn missing_fields(profile: &TenantProfile) -> Vec<MissingField> {
    let mut missing = Vec::new();
    if !profile.has_budget() {
        missing.push(MissingField::Budget);
    }
    if !profile.has_preferred_location() {
        missing.push(MissingField::PreferredLocation);
    }
    if !profile.has_document(DocumentKind::IdDocument) {
        missing.push(MissingField::IdDocument);
    }
    if !profile.has_document(DocumentKind::ProofOfIncome) {
        missing.push(MissingField::ProofOfIncome);
    }
    missing
}
