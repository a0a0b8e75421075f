use super::domain::VerificationStatus;

pub const BASE_TRUST_SCORE: i32 = 50;
pub const PROFILE_COMPLETION_BONUS: i32 = 20;
pub const RENT_CREDIT_BONUS: i32 = 10;

/// Verification milestones the trust score is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrustMilestones {
    pub profile_completed: bool,
    pub joined_rent_credit: bool,
}

/// Trust score and verification marker to persist on the account record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrustAssessment {
    pub trust_score: i32,
    pub verification_status: VerificationStatus,
}

pub fn compute(milestones: TrustMilestones) -> i32 {
    if !milestones.profile_completed {
        return BASE_TRUST_SCORE;
    }

    let mut score = BASE_TRUST_SCORE + PROFILE_COMPLETION_BONUS;
    if milestones.joined_rent_credit {
        score += RENT_CREDIT_BONUS;
    }
    score
}

/// Assessment taken once, at the moment a profile crosses the completion gate.
pub fn assess(milestones: TrustMilestones) -> TrustAssessment {
    let verification_status = if milestones.profile_completed {
        VerificationStatus::Approved
    } else {
        VerificationStatus::Partial
    };

    TrustAssessment {
        trust_score: compute(milestones),
        verification_status,
    }
}
