use std::sync::{Arc, Mutex};

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use salonbook::config::AppConfig;
use salonbook::db;
use salonbook::handlers;
use salonbook::services::messaging::mail::HttpMailSender;
use salonbook::services::messaging::twilio::TwilioSmsSender;
use salonbook::services::notifications::NotificationQueue;
use salonbook::services::payments::stripe::StripeGateway;
use salonbook::services::reminders::run_reminder_scanner;
use salonbook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();
    anyhow::ensure!(
        !config.stripe_secret_key.is_empty(),
        "STRIPE_SECRET_KEY must be set"
    );

    let conn = db::init_db(&config.database_url)?;
    let db = Arc::new(Mutex::new(conn));

    let sms = TwilioSmsSender::new(
        config.twilio_account_sid.clone(),
        config.twilio_auth_token.clone(),
        config.twilio_phone_number.clone(),
    );
    let mail = HttpMailSender::new(
        config.mail_api_url.clone(),
        config.mail_api_key.clone(),
        config.mail_from.clone(),
    );
    let notifier = NotificationQueue::start(Arc::clone(&db), Box::new(sms), Box::new(mail));
    let payments = StripeGateway::new(
        config.stripe_secret_key.clone(),
        config.stripe_api_base.clone(),
    );

    tracing::info!(
        salon = %config.salon_name,
        utc_offset_minutes = config.salon_utc_offset_minutes,
        "salon configured"
    );

    let state = Arc::new(AppState {
        db,
        config: config.clone(),
        payments: Box::new(payments),
        notifier: Box::new(notifier),
    });

    tokio::spawn(run_reminder_scanner(Arc::clone(&state)));

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route(
            "/api/availability",
            get(handlers::availability::get_availability),
        )
        .route("/api/bookings", post(handlers::bookings::create_booking))
        .route(
            "/api/bookings/:id",
            get(handlers::bookings::get_booking).patch(handlers::bookings::update_booking),
        )
        .route(
            "/api/bookings/:id/check-in",
            post(handlers::bookings::check_in),
        )
        .route(
            "/api/bookings/:id/calendar.ics",
            get(handlers::calendar::download_ics),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
