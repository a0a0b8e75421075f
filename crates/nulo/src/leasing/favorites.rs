use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::counters::{CounterField, PropertyCounterMaintainer};
use super::domain::{Favorite, Identity, PropertyId, Role};
use super::error::LeasingError;
use super::repository::{LeasingStore, RepositoryError};
use super::retry::CallPolicy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddFavorite {
    pub property_id: PropertyId,
}

/// Favorite toggles. The favorite row and `favorite_count` are written as a saga: when the
/// counter step fails the row change is undone before the error is returned.
pub struct FavoritesService<S> {
    store: Arc<S>,
    counters: PropertyCounterMaintainer<S>,
    policy: CallPolicy,
}

impl<S> Clone for FavoritesService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            counters: self.counters.clone(),
            policy: self.policy.clone(),
        }
    }
}

impl<S> FavoritesService<S>
where
    S: LeasingStore + 'static,
{
    pub fn new(store: Arc<S>, policy: CallPolicy) -> Self {
        let counters = PropertyCounterMaintainer::new(store.clone(), policy.clone());
        Self {
            store,
            counters,
            policy,
        }
    }

    pub async fn add_favorite(
        &self,
        identity: &Identity,
        property_id: &PropertyId,
    ) -> Result<Favorite, LeasingError> {
        require_tenant(identity)?;
        let store = &self.store;

        let exists = self
            .policy
            .run("fetch_property", || store.fetch_property(property_id))
            .await
            .map_err(|err| LeasingError::from_repository(err, "property"))?
            .is_some();
        if !exists {
            return Err(LeasingError::NotFound { entity: "property" });
        }

        let favorite = Favorite {
            tenant_id: identity.id.clone(),
            property_id: property_id.clone(),
            created_at: Utc::now(),
        };
        match self
            .policy
            .run("insert_favorite", || store.insert_favorite(favorite.clone()))
            .await
        {
            Ok(()) => {}
            Err(RepositoryError::Conflict) => {
                // A retried insert whose earlier attempt landed finds its own row.
                let stored = self
                    .policy
                    .run("fetch_favorite", || {
                        store.fetch_favorite(&identity.id, property_id)
                    })
                    .await
                    .map_err(|err| LeasingError::from_repository(err, "favorite"))?;
                if stored.as_ref() != Some(&favorite) {
                    return Err(LeasingError::DuplicateFavorite);
                }
            }
            Err(err) => return Err(LeasingError::from_repository(err, "favorite")),
        }

        if let Err(err) = self
            .counters
            .increment(property_id, CounterField::FavoriteCount)
            .await
        {
            let undo = self
                .policy
                .run("delete_favorite", || {
                    store.delete_favorite(&identity.id, property_id)
                })
                .await;
            if let Err(undo_err) = undo {
                error!(
                    tenant_id = %identity.id,
                    %property_id,
                    error = %undo_err,
                    "failed to compensate favorite insert"
                );
            }
            return Err(err);
        }

        info!(tenant_id = %identity.id, %property_id, "property favorited");
        Ok(favorite)
    }

    pub async fn remove_favorite(
        &self,
        identity: &Identity,
        property_id: &PropertyId,
    ) -> Result<(), LeasingError> {
        require_tenant(identity)?;
        let store = &self.store;

        let removed = self
            .policy
            .run("delete_favorite", || {
                store.delete_favorite(&identity.id, property_id)
            })
            .await
            .map_err(|err| LeasingError::from_repository(err, "favorite"))?
            .ok_or(LeasingError::NotFound { entity: "favorite" })?;

        if let Err(err) = self
            .counters
            .decrement(property_id, CounterField::FavoriteCount)
            .await
        {
            let restore = self
                .policy
                .run("insert_favorite", || store.insert_favorite(removed.clone()))
                .await;
            if let Err(restore_err) = restore {
                error!(
                    tenant_id = %identity.id,
                    %property_id,
                    error = %restore_err,
                    "failed to compensate favorite removal"
                );
            }
            return Err(err);
        }

        info!(tenant_id = %identity.id, %property_id, "favorite removed");
        Ok(())
    }
}

fn require_tenant(identity: &Identity) -> Result<(), LeasingError> {
    if identity.role != Role::Tenant {
        return Err(LeasingError::Forbidden(
            "only tenants can access this resource",
        ));
    }
    Ok(())
}
