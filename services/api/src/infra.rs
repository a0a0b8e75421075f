use metrics_exporter_prometheus::PrometheusHandle;
use nulo::leasing::{
    CallPolicy, Identity, LeasingError, LeasingNotice, LeasingStore, NotificationError,
    NotificationHook, ProfileService, Property, PropertyId, PropertyStatus, Role,
    StaticTokenGateway,
};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Delivery adapter until an e-mail/SMS provider is wired: every notice becomes a log line.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct LogNotifications;

impl NotificationHook for LogNotifications {
    fn notify(&self, notice: LeasingNotice) -> Result<(), NotificationError> {
        info!(
            template = ?notice.template,
            recipient = %notice.recipient,
            application_id = %notice.application_id,
            "notification dispatched"
        );
        Ok(())
    }
}

/// Keeps notices in memory so the demo can print what would have been sent.
#[derive(Default, Clone)]
pub(crate) struct InMemoryNotifications {
    notices: Arc<Mutex<Vec<LeasingNotice>>>,
}

impl NotificationHook for InMemoryNotifications {
    fn notify(&self, notice: LeasingNotice) -> Result<(), NotificationError> {
        let mut guard = self
            .notices
            .lock()
            .map_err(|_| NotificationError::Transport("outbox mutex poisoned".to_string()))?;
        guard.push(notice);
        Ok(())
    }
}

impl InMemoryNotifications {
    pub(crate) fn notices(&self) -> Vec<LeasingNotice> {
        self.notices
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

pub(crate) struct DemoCast {
    pub(crate) tenant: Identity,
    pub(crate) second_tenant: Identity,
    pub(crate) landlord: Identity,
    pub(crate) properties: Vec<PropertyId>,
}

pub(crate) fn demo_cast() -> DemoCast {
    DemoCast {
        tenant: Identity::new("tenant-amaka", Role::Tenant),
        second_tenant: Identity::new("tenant-sola", Role::Tenant),
        landlord: Identity::new("landlord-chuka", Role::Landlord),
        properties: vec![
            PropertyId("prop-lekki-2br".to_string()),
            PropertyId("prop-yaba-studio".to_string()),
        ],
    }
}

/// Load the sample catalog into `store`, register the cast, and issue one bearer token per
/// cast member.
pub(crate) async fn seed_demo<S>(
    store: &Arc<S>,
    gateway: &StaticTokenGateway,
    cast: &DemoCast,
) -> Result<(), LeasingError>
where
    S: LeasingStore + 'static,
{
    let listings = [
        ("2 bedroom flat, Lekki Phase 1", 1_800_000),
        ("Self-contained studio, Yaba", 650_000),
    ];
    for (id, (title, rent_amount)) in cast.properties.iter().zip(listings) {
        store
            .upsert_property(Property {
                id: id.clone(),
                landlord_id: cast.landlord.id.clone(),
                title: title.to_string(),
                rent_amount,
                status: PropertyStatus::Active,
                application_count: 0,
                favorite_count: 0,
            })
            .await
            .map_err(|err| LeasingError::from_repository(err, "property"))?;
    }

    let profiles = ProfileService::new(store.clone(), CallPolicy::default());
    for identity in [&cast.tenant, &cast.second_tenant, &cast.landlord] {
        profiles.register(identity).await?;
        gateway.issue(format!("demo-{}", identity.id), identity.clone());
    }
    Ok(())
}
