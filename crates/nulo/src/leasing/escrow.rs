use chrono::{DateTime, Utc};

use super::domain::{Application, EscrowId, EscrowStatus, EscrowTransaction, UserId};

/// Escrow transitions are only valid out of `held`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EscrowError {
    #[error("escrow {id} is {status}, expected held")]
    NotHeld { id: EscrowId, status: EscrowStatus },
}

/// Ledger abstraction over notional holds; no funds move through here.
#[derive(Debug, Clone)]
pub struct EscrowLedger {
    currency: String,
}

impl EscrowLedger {
    pub fn new(currency: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
        }
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Open a hold for the full amount. The amount is fixed from here on.
    pub fn hold(
        &self,
        application: &Application,
        landlord_id: &UserId,
        amount: u64,
        now: DateTime<Utc>,
    ) -> EscrowTransaction {
        EscrowTransaction {
            id: EscrowId::generate(),
            application_id: application.id.clone(),
            tenant_id: application.tenant_id.clone(),
            landlord_id: landlord_id.clone(),
            property_id: application.property_id.clone(),
            amount,
            currency: self.currency.clone(),
            status: EscrowStatus::Held,
            held_at: now,
            released_at: None,
            refunded_at: None,
        }
    }

    pub fn release(
        &self,
        transaction: &EscrowTransaction,
        now: DateTime<Utc>,
    ) -> Result<EscrowTransaction, EscrowError> {
        let mut released = Self::ensure_held(transaction)?;
        released.status = EscrowStatus::Released;
        released.released_at = Some(now);
        Ok(released)
    }

    pub fn refund(
        &self,
        transaction: &EscrowTransaction,
        now: DateTime<Utc>,
    ) -> Result<EscrowTransaction, EscrowError> {
        let mut refunded = Self::ensure_held(transaction)?;
        refunded.status = EscrowStatus::Refunded;
        refunded.refunded_at = Some(now);
        Ok(refunded)
    }

    fn ensure_held(transaction: &EscrowTransaction) -> Result<EscrowTransaction, EscrowError> {
        if transaction.status != EscrowStatus::Held {
            return Err(EscrowError::NotHeld {
                id: transaction.id.clone(),
                status: transaction.status,
            });
        }
        Ok(transaction.clone())
    }
}

impl Default for EscrowLedger {
    fn default() -> Self {
        Self::new("NGN")
    }
}
