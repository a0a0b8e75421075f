use crate::infra::{demo_cast, seed_demo, InMemoryNotifications};
use clap::Args;
use nulo::config::LeasingConfig;
use nulo::error::AppError;
use nulo::leasing::{
    ApplicationLifecycle, ApplicationReceipt, CallPolicy, CompleteProfile, FavoritesService,
    Identity, InMemoryLeasingStore, LeasingError, LeasingStore, ProfileService, PropertyId,
    RejectApplication, StaticTokenGateway, SubmitApplication,
};
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Currency recorded on escrow holds (defaults to NGN).
    #[arg(long)]
    pub(crate) currency: Option<String>,
    /// Opt the demo tenant into rent credit reporting during onboarding.
    #[arg(long)]
    pub(crate) rent_credit: bool,
    /// Skip the rejection portion of the demo.
    #[arg(long)]
    pub(crate) skip_rejection: bool,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let mut config = LeasingConfig::default();
    if let Some(currency) = args.currency {
        config.currency = currency.trim().to_ascii_uppercase();
    }

    let store = Arc::new(InMemoryLeasingStore::default());
    let notifications = Arc::new(InMemoryNotifications::default());
    let gateway = StaticTokenGateway::default();
    let cast = demo_cast();
    if let Err(err) = seed_demo(&store, &gateway, &cast).await {
        println!("Demo catalog could not be seeded: {err}");
        return Ok(());
    }

    let policy = CallPolicy::from_config(&config);
    let profiles = ProfileService::new(store.clone(), policy.clone());
    let favorites = FavoritesService::new(store.clone(), policy);
    let applications = ApplicationLifecycle::new(store.clone(), notifications.clone(), &config);

    println!("Nulo leasing demo");
    println!("Escrow currency: {}", config.currency);

    let lekki = &cast.properties[0];
    let yaba = &cast.properties[1];

    println!("\nOnboarding");
    for identity in [&cast.tenant, &cast.second_tenant, &cast.landlord] {
        println!("  {} registered as {}", identity.id, identity.role.label());
    }
    match applications.submit(&cast.tenant, request(lekki)).await {
        Err(err) => println!("  Early application blocked: {err}"),
        Ok(_) => println!("  Early application unexpectedly accepted"),
    }

    for (identity, rent_credit) in [(&cast.tenant, args.rent_credit), (&cast.second_tenant, false)]
    {
        match profiles
            .complete_profile(identity, completion(identity, rent_credit))
            .await
        {
            Ok(receipt) => println!(
                "  {} completed onboarding: {}% complete, trust score {}, verification {}",
                identity.id,
                receipt.profile.profile_completion,
                receipt.trust_score,
                receipt.verification_status.label()
            ),
            Err(err) => println!("  {} could not complete onboarding: {err}", identity.id),
        }
    }

    println!("\nFavorites");
    report(
        "favorite",
        &cast.tenant.id,
        favorites.add_favorite(&cast.tenant, lekki).await.map(|_| ()),
    );
    print_counters(store.as_ref(), lekki).await;

    println!("\nApplications");
    let Some(receipt) = submit(&applications, &cast.tenant, lekki).await else {
        return Ok(());
    };
    match applications.submit(&cast.tenant, request(lekki)).await {
        Err(err) => println!("  Second application for the same flat: {err}"),
        Ok(_) => println!("  Second application unexpectedly accepted"),
    }

    let id = &receipt.application.id;
    report(
        "begin review",
        &cast.landlord.id,
        applications.begin_review(&cast.landlord, id).await.map(|_| ()),
    );
    match applications.approve(&cast.landlord, id).await {
        Ok(outcome) => println!(
            "  Approved {}: escrow {} ({} {})",
            outcome.application.id,
            outcome.transaction.status,
            outcome.transaction.amount,
            outcome.transaction.currency
        ),
        Err(err) => println!("  Approval failed: {err}"),
    }
    match applications.approve(&cast.landlord, id).await {
        Err(err) => println!("  Repeated approval: {err}"),
        Ok(_) => println!("  Repeated approval unexpectedly succeeded"),
    }
    print_counters(store.as_ref(), lekki).await;

    if !args.skip_rejection {
        if let Some(receipt) = submit(&applications, &cast.second_tenant, yaba).await {
            let rejection = RejectApplication {
                reason: "Move-in date does not match availability".to_string(),
                reason_code: "DATE_MISMATCH".to_string(),
            };
            match applications
                .reject(&cast.landlord, &receipt.application.id, rejection)
                .await
            {
                Ok(outcome) => println!(
                    "  Rejected {}: escrow {}",
                    outcome.application.id, outcome.transaction.status
                ),
                Err(err) => println!("  Rejection failed: {err}"),
            }
            print_counters(store.as_ref(), yaba).await;
        }
    }

    match applications.list(&cast.landlord).await {
        Ok(listed) => {
            println!("\nLandlord inbox");
            for application in listed {
                println!(
                    "- {} from {} for {}: {}",
                    application.id, application.tenant_id, application.property_id,
                    application.status
                );
            }
        }
        Err(err) => println!("\nLandlord inbox unavailable: {err}"),
    }

    let notices = notifications.notices();
    if notices.is_empty() {
        println!("\nNotifications: none dispatched");
    } else {
        println!("\nNotifications");
        for notice in notices {
            println!(
                "- {:?} to {} (application {})",
                notice.template, notice.recipient, notice.application_id
            );
        }
    }

    Ok(())
}

fn request(property_id: &PropertyId) -> SubmitApplication {
    SubmitApplication {
        property_id: property_id.clone(),
        message: Some("I would like to view the property this week.".to_string()),
        proposed_move_in_date: None,
    }
}

fn completion(identity: &Identity, join_rent_credit: bool) -> CompleteProfile {
    CompleteProfile {
        budget: 2_000_000,
        preferred_location: "Lagos".to_string(),
        bedrooms: 2,
        move_in_date: None,
        id_document: format!("uploads/{}/national-id.pdf", identity.id),
        proof_of_income: format!("uploads/{}/payslip.pdf", identity.id),
        references: Vec::new(),
        join_rent_credit,
    }
}

async fn submit(
    applications: &ApplicationLifecycle<InMemoryLeasingStore, InMemoryNotifications>,
    tenant: &Identity,
    property_id: &PropertyId,
) -> Option<ApplicationReceipt> {
    match applications.submit(tenant, request(property_id)).await {
        Ok(receipt) => {
            println!(
                "  {} applied to {}: application {}, escrow {} {} {}",
                tenant.id,
                property_id,
                receipt.application.id,
                receipt.transaction.status,
                receipt.transaction.amount,
                receipt.transaction.currency
            );
            Some(receipt)
        }
        Err(err) => {
            println!("  {} could not apply to {}: {err}", tenant.id, property_id);
            None
        }
    }
}

async fn print_counters(store: &InMemoryLeasingStore, property_id: &PropertyId) {
    match store.fetch_property(property_id).await {
        Ok(Some(property)) => println!(
            "  {} is {}: {} application(s), {} favorite(s)",
            property.id,
            property.status.label(),
            property.application_count,
            property.favorite_count
        ),
        Ok(None) => println!("  {property_id} is no longer listed"),
        Err(err) => println!("  {property_id} unavailable: {err}"),
    }
}

fn report(action: &str, who: &impl std::fmt::Display, outcome: Result<(), LeasingError>) {
    match outcome {
        Ok(()) => println!("  {who}: {action} ok"),
        Err(err) => println!("  {who}: {action} failed ({})", err.kind().label()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn demo_runs_to_completion() {
        run_demo(DemoArgs {
            currency: Some("usd".to_string()),
            rent_credit: true,
            skip_rejection: false,
        })
        .await
        .expect("demo completes");
    }
}
