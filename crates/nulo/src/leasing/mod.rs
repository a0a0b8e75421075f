//! Rental application lifecycle: profile gate, escrow ledger, trust score, and the
//! property counters those transitions keep in step.

pub mod completion;
pub mod counters;
pub mod domain;
pub mod error;
pub mod escrow;
pub mod favorites;
pub mod identity;
pub mod memory;
pub mod onboarding;
pub mod repository;
pub mod retry;
pub mod router;
pub mod service;
pub mod trust;

#[cfg(test)]
mod tests;

pub use counters::{CounterAdjustment, CounterField, PropertyCounterMaintainer};
pub use domain::{
    AccountRecord, Application, ApplicationId, ApplicationStatus, DocumentKind,
    DocumentReference, EscrowId, EscrowStatus, EscrowTransaction, Favorite, Identity, Property,
    PropertyId, PropertyStatus, RejectionNote, ReviewId, Role, TenantProfile, UserId,
    VerificationStatus,
};
pub use error::{ErrorKind, LeasingError};
pub use escrow::{EscrowError, EscrowLedger};
pub use favorites::{AddFavorite, FavoritesService};
pub use identity::{authenticate, IdentityError, IdentityGateway, StaticTokenGateway};
pub use memory::{InMemoryLeasingStore, SubmissionStage};
pub use onboarding::{
    CompleteProfile, CompletionReceipt, ProfileService, ProfileStatus, ProfileUpdate,
};
pub use repository::{
    CompletionUnit, LeasingNotice, LeasingStore, NoticeTemplate, NotificationError,
    NotificationHook, RepositoryError, ReviewUnit, SubmissionUnit,
};
pub use retry::CallPolicy;
pub use router::{leasing_router, LeasingState};
pub use service::{
    ApplicationLifecycle, ApplicationReceipt, RejectApplication, ReviewOutcome,
    SubmitApplication,
};
