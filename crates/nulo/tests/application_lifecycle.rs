//! End-to-end scenarios for the leasing core: onboarding, the completion gate, escrow holds
//! and landlord decisions, driven through the public service facade and HTTP router.

mod common {
    use std::sync::{Arc, Mutex};

    use nulo::config::LeasingConfig;
    use nulo::leasing::{
        Identity, InMemoryLeasingStore, LeasingNotice, LeasingState, LeasingStore,
        NotificationError, NotificationHook, Property, PropertyId, PropertyStatus, Role,
        StaticTokenGateway,
    };

    pub(super) const RENT: u64 = 450_000;

    pub(super) fn tenant() -> Identity {
        Identity::new("tenant-ngozi", Role::Tenant)
    }

    pub(super) fn landlord() -> Identity {
        Identity::new("landlord-tunde", Role::Landlord)
    }

    pub(super) fn property_id() -> PropertyId {
        PropertyId("prop-ikeja-3br".to_string())
    }

    #[derive(Default)]
    pub(super) struct RecordingNotifications {
        notices: Mutex<Vec<LeasingNotice>>,
    }

    impl RecordingNotifications {
        pub(super) fn notices(&self) -> Vec<LeasingNotice> {
            self.notices.lock().expect("notices mutex").clone()
        }
    }

    impl NotificationHook for RecordingNotifications {
        fn notify(&self, notice: LeasingNotice) -> Result<(), NotificationError> {
            self.notices.lock().expect("notices mutex").push(notice);
            Ok(())
        }
    }

    pub(super) type State =
        LeasingState<InMemoryLeasingStore, RecordingNotifications, StaticTokenGateway>;

    pub(super) struct World {
        pub(super) store: Arc<InMemoryLeasingStore>,
        pub(super) notifications: Arc<RecordingNotifications>,
        pub(super) state: Arc<State>,
    }

    pub(super) async fn world() -> World {
        let store = Arc::new(InMemoryLeasingStore::default());
        store
            .upsert_property(Property {
                id: property_id(),
                landlord_id: landlord().id,
                title: "3 bedroom duplex, Ikeja GRA".to_string(),
                rent_amount: RENT,
                status: PropertyStatus::Active,
                application_count: 0,
                favorite_count: 0,
            })
            .await
            .expect("seed property");

        let gateway = StaticTokenGateway::default();
        gateway.issue("tenant-token", tenant());
        gateway.issue("landlord-token", landlord());

        let notifications = Arc::new(RecordingNotifications::default());
        let state = Arc::new(LeasingState::new(
            store.clone(),
            notifications.clone(),
            Arc::new(gateway),
            &LeasingConfig::default(),
        ));
        World {
            store,
            notifications,
            state,
        }
    }
}

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::*;
use nulo::leasing::{
    leasing_router, ApplicationStatus, CompleteProfile, EscrowStatus, LeasingError,
    LeasingStore, NoticeTemplate, PropertyStatus, SubmitApplication,
};

fn completion_request() -> CompleteProfile {
    CompleteProfile {
        budget: 500_000,
        preferred_location: "Ikeja".to_string(),
        bedrooms: 3,
        move_in_date: None,
        id_document: "uploads/ngozi/passport.pdf".to_string(),
        proof_of_income: "uploads/ngozi/bank-statement.pdf".to_string(),
        references: Vec::new(),
        join_rent_credit: true,
    }
}

fn application_request() -> SubmitApplication {
    SubmitApplication {
        property_id: property_id(),
        message: None,
        proposed_move_in_date: None,
    }
}

#[tokio::test]
async fn tenant_journey_from_signup_to_approval() {
    let world = world().await;
    let profiles = &world.state.profiles;
    let applications = &world.state.applications;

    profiles.register(&tenant()).await.expect("tenant registers");
    profiles
        .register(&landlord())
        .await
        .expect("landlord registers");

    assert_eq!(
        applications.submit(&tenant(), application_request()).await,
        Err(LeasingError::ProfileIncomplete { completion: 0 })
    );

    let receipt = profiles
        .complete_profile(&tenant(), completion_request())
        .await
        .expect("profile completes");
    assert_eq!(receipt.trust_score, 80);

    let submitted = applications
        .submit(&tenant(), application_request())
        .await
        .expect("gate open");
    assert_eq!(submitted.transaction.amount, RENT);
    assert_eq!(submitted.transaction.currency, "NGN");

    let reviewing = applications
        .begin_review(&landlord(), &submitted.application.id)
        .await
        .expect("review starts");
    assert_eq!(reviewing.application.status, ApplicationStatus::UnderReview);

    let approved = applications
        .approve(&landlord(), &submitted.application.id)
        .await
        .expect("approved");
    assert_eq!(approved.transaction.status, EscrowStatus::Released);

    let property = world
        .store
        .fetch_property(&property_id())
        .await
        .expect("fetch property")
        .expect("property");
    assert_eq!(property.status, PropertyStatus::Rented);
    assert_eq!(property.application_count, 1);

    let templates: Vec<_> = world
        .notifications
        .notices()
        .into_iter()
        .map(|notice| notice.template)
        .collect();
    assert_eq!(
        templates,
        vec![
            NoticeTemplate::ApplicationReceived,
            NoticeTemplate::ApplicationApproved
        ]
    );
}

#[tokio::test]
async fn router_reports_gate_and_conflicts_as_http_errors() {
    let world = world().await;
    world
        .state
        .profiles
        .register(&tenant())
        .await
        .expect("tenant registers");
    let router = leasing_router(world.state.clone());

    let submit = || {
        Request::builder()
            .method("POST")
            .uri("/api/v1/applications")
            .header(header::AUTHORIZATION, "Bearer tenant-token")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({ "property_id": "prop-ikeja-3br" }).to_string(),
            ))
            .expect("request")
    };

    let response = router
        .clone()
        .oneshot(submit())
        .await
        .expect("router dispatch");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("body");
    let payload: Value = serde_json::from_slice(&body).expect("json");
    assert_eq!(payload["error"], json!("profile_incomplete"));

    world
        .state
        .profiles
        .complete_profile(&tenant(), completion_request())
        .await
        .expect("profile completes");

    let response = router
        .clone()
        .oneshot(submit())
        .await
        .expect("router dispatch");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = router.oneshot(submit()).await.expect("router dispatch");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("body");
    let payload: Value = serde_json::from_slice(&body).expect("json");
    assert_eq!(payload["error"], json!("duplicate_application"));
    assert_eq!(world.store.escrow_count(), 1);
}
