//! HTTP triggers of the notification pipelines. An external scheduler POSTs
//! to a trigger on its own timer, and the response reports what the run did.
//! Requests carry no body.
use crate::alerts::AlertRunSummary;
use crate::queue::QueueRunSummary;
use crate::senders::{EmailSender, SmsSender};
use crate::App;
use axum::extract::State;
use std::sync::Arc;

mod error;

pub use error::ApiError;

/// Build the agent's API router. When `trigger_secret` is set, the trigger
/// routes require it as a bearer token.
pub fn build_router<SMS: SmsSender, EM: EmailSender>(
    app: Arc<App<SMS, EM>>,
    trigger_secret: Option<String>,
) -> axum::Router<()> {
    use axum::routing::{get, post};

    let mut triggers = axum::Router::new()
        .route("/v1/plate-alerts/run", post(run_plate_alerts::<SMS, EM>))
        .route(
            "/v1/notification-queue/run",
            post(run_notification_queue::<SMS, EM>),
        );

    if let Some(secret) = trigger_secret {
        triggers = triggers.route_layer(axum::middleware::from_fn_with_state(
            Arc::<str>::from(secret),
            authorize,
        ));
    } else {
        tracing::warn!("no trigger secret is configured, pipeline triggers are unauthenticated");
    }

    axum::Router::new()
        .merge(triggers)
        .route("/healthz", get(healthz))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(app)
}

async fn run_plate_alerts<SMS: SmsSender, EM: EmailSender>(
    State(app): State<Arc<App<SMS, EM>>>,
) -> Result<axum::Json<AlertRunSummary>, ApiError> {
    let summary = crate::alerts::run_plate_alerts(&app).await?;
    Ok(axum::Json(summary))
}

async fn run_notification_queue<SMS: SmsSender, EM: EmailSender>(
    State(app): State<Arc<App<SMS, EM>>>,
) -> Result<axum::Json<QueueRunSummary>, ApiError> {
    let summary = crate::queue::run_notification_queue(&app).await?;
    Ok(axum::Json(summary))
}

async fn healthz() -> &'static str {
    "ok"
}

// Middleware which requires the trigger secret as a bearer token.
async fn authorize(
    State(secret): State<Arc<str>>,
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> Result<axum::response::Response, ApiError> {
    let token = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    if token != Some(&*secret) {
        return Err(ApiError::unauthorized());
    }
    Ok(next.run(req).await)
}
