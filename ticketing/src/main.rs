//! NightPass demo server.
//!
//! Wires the application from the environment, runs one night at a venue
//! (purchases, door scans, a cancellation) against the in-process
//! collaborators, then keeps the Prometheus endpoint up until Ctrl+C.
//!
//! # Usage
//!
//! ```bash
//! TICKET_SIGNING_SECRET=change-me cargo run --bin nightpass
//! curl localhost:9090/metrics
//! ```

use anyhow::Context;
use chrono::{Duration, Utc};
use metrics_exporter_prometheus::PrometheusBuilder;
use nightpass_core::{Buyer, EventId, EventListing, Money, PaymentMethod, QrCodec, TicketType, UserId};
use nightpass_ticketing::{BiometricMatcher, Config, NightPass, PurchaseRequest, SimulatedBiometrics};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,nightpass_ticketing=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    tracing::info!(
        log_level = %config.server.log_level,
        metrics = %config.metrics_addr(),
        "Configuration loaded"
    );

    let metrics_addr: SocketAddr = config
        .metrics_addr()
        .parse()
        .with_context(|| format!("invalid metrics address {}", config.metrics_addr()))?;
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .context("failed to install Prometheus exporter")?;
    nightpass_ticketing::metrics::register_business_metrics();

    let biometrics = Arc::new(SimulatedBiometrics::new(config.biometrics.match_probability));
    let app = NightPass::builder()
        .with_config(config)
        .with_biometrics(biometrics.clone())
        .build()?;

    run_demo(&app, biometrics.as_ref()).await?;

    tracing::info!("NightPass is running, metrics at http://{metrics_addr}/metrics (Ctrl+C to stop)");
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    Ok(())
}

async fn run_demo(app: &NightPass, biometrics: &dyn BiometricMatcher) -> anyhow::Result<()> {
    let event = EventListing {
        id: EventId::new(),
        name: "Saturday Warehouse Session".to_string(),
        venue_name: "Dock 7".to_string(),
        base_price: Money::from_units(20_000),
        starts_at: Utc::now() + Duration::hours(4),
        capacity: Some(300),
    };
    let buyer = Buyer {
        id: UserId::new(),
        name: "Robin Okafor".to_string(),
        email: "robin@example.com".to_string(),
    };
    let card = PaymentMethod::CreditCard {
        last_four: "4242".to_string(),
    };

    let secure = app
        .service()
        .purchase(PurchaseRequest {
            event: event.clone(),
            buyer: buyer.clone(),
            ticket_type: TicketType::Secure,
            quantity: 2,
            payment_method: card.clone(),
        })
        .await?;
    tracing::info!(
        ticket_id = %secure.id,
        unit_price = %secure.unit_price,
        total = %secure.total_amount,
        commission = %secure.app_commission,
        venue = %secure.venue_revenue,
        "Secure ticket purchased"
    );

    let regular = app
        .service()
        .purchase(PurchaseRequest {
            event: event.clone(),
            buyer,
            ticket_type: TicketType::Regular,
            quantity: 1,
            payment_method: card,
        })
        .await?;

    let door_staff = UserId::new();
    let sample = biometrics.capture().await?;
    for attempt in 1..=2 {
        let outcome = app
            .validator()
            .validate(&secure.qr_code, &sample, door_staff, Some("Main entrance".to_string()))
            .await;
        tracing::info!(
            attempt,
            success = outcome.success,
            reason = outcome.reason.as_deref().unwrap_or("-"),
            "Secure ticket scanned"
        );
    }

    // Same code with the admission count bumped and the old signature kept
    let codec = QrCodec::default();
    let mut tampered = codec.decode(&regular.qr_code)?;
    tampered.payload.quantity = tampered.payload.quantity.saturating_add(4);
    let forged = codec.encode(&tampered)?;
    let outcome = app.validator().validate(&forged, &sample, door_staff, None).await;
    tracing::info!(
        quantity = tampered.payload.quantity,
        reason = outcome.reason.as_deref().unwrap_or("-"),
        "Tampered code scanned"
    );

    let cancelled = app.service().cancel(regular.id, "Plans changed").await?;
    tracing::info!(ticket_id = %cancelled.id, status = %cancelled.status, "Regular ticket cancelled");

    let summary = app.service().sales_summary(event.id).await;
    tracing::info!(
        sold = summary.tickets_sold,
        gross = %summary.gross,
        commission = %summary.app_commission,
        venue = %summary.venue_revenue,
        refunded = %summary.refunded_amount,
        checked_in = summary.checked_in,
        "Event sales"
    );

    Ok(())
}
