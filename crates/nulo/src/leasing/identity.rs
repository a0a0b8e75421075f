use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use super::domain::Identity;
use super::error::LeasingError;

/// Contract of the external identity service: credential in, verified identity out.
#[async_trait]
pub trait IdentityGateway: Send + Sync {
    async fn verify(&self, credential: &str) -> Result<Identity, IdentityError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("credential rejected")]
    InvalidCredential,
    #[error("identity service unavailable: {0}")]
    Unavailable(String),
}

/// Verify a bearer credential within `timeout`. A missing credential is unauthenticated;
/// an unreachable or slow gateway is surfaced as the retryable unavailable kind.
pub async fn authenticate<G>(
    gateway: &G,
    credential: Option<&str>,
    timeout: Duration,
) -> Result<Identity, LeasingError>
where
    G: IdentityGateway + ?Sized,
{
    let credential = match credential.map(str::trim) {
        Some(value) if !value.is_empty() => value,
        _ => return Err(LeasingError::Unauthenticated),
    };

    match tokio::time::timeout(timeout, gateway.verify(credential)).await {
        Ok(Ok(identity)) => Ok(identity),
        Ok(Err(IdentityError::InvalidCredential)) => Err(LeasingError::Unauthenticated),
        Ok(Err(IdentityError::Unavailable(reason))) => {
            warn!(%reason, "identity gateway unavailable");
            Err(LeasingError::StorageUnavailable)
        }
        Err(_) => {
            warn!(
                timeout_ms = timeout.as_millis() as u64,
                "identity gateway timed out"
            );
            Err(LeasingError::StorageUnavailable)
        }
    }
}

/// Token table standing in for the hosted identity provider in demos and tests.
#[derive(Debug, Default)]
pub struct StaticTokenGateway {
    tokens: RwLock<HashMap<String, Identity>>,
}

impl StaticTokenGateway {
    pub fn issue(&self, token: impl Into<String>, identity: Identity) {
        match self.tokens.write() {
            Ok(mut tokens) => {
                tokens.insert(token.into(), identity);
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(token.into(), identity);
            }
        }
    }
}

#[async_trait]
impl IdentityGateway for StaticTokenGateway {
    async fn verify(&self, credential: &str) -> Result<Identity, IdentityError> {
        let tokens = self
            .tokens
            .read()
            .map_err(|_| IdentityError::Unavailable("token table poisoned".to_string()))?;
        tokens
            .get(credential)
            .cloned()
            .ok_or(IdentityError::InvalidCredential)
    }
}
