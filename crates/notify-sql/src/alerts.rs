use chrono::{DateTime, Utc};
use models::{AlertType, PlateAlert, Severity};
use sqlx::types::Uuid;

const ALERT_COLUMNS: &str = r#"
    id,
    plate_id,
    alert_type,
    severity,
    first_detected_at,
    last_notified_at,
    resolved_at
"#;

/// Opens an alert for the plate and type, unless one is already open.
/// Returns whether a new alert was inserted. Relies on the partial unique
/// index over open alerts, so concurrent detectors can't open duplicates.
#[tracing::instrument(level = "debug", skip(pool))]
pub async fn open_alert(
    plate_id: Uuid,
    alert_type: AlertType,
    severity: Severity,
    detected_at: DateTime<Utc>,
    pool: &sqlx::PgPool,
) -> sqlx::Result<bool> {
    let inserted: Option<(Uuid,)> = sqlx::query_as(
        r#"
        insert into plate_alerts (plate_id, alert_type, severity, first_detected_at)
        values ($1, $2, $3, $4)
        on conflict (plate_id, alert_type) where resolved_at is null do nothing
        returning id
        "#,
    )
    .bind(plate_id)
    .bind(alert_type)
    .bind(severity)
    .bind(detected_at)
    .fetch_optional(pool)
    .await?;

    Ok(inserted.is_some())
}

#[tracing::instrument(level = "debug", skip(pool))]
pub async fn fetch_open_alerts(pool: &sqlx::PgPool) -> sqlx::Result<Vec<PlateAlert>> {
    sqlx::query_as::<_, PlateAlert>(&format!(
        r#"select {ALERT_COLUMNS} from plate_alerts
        where resolved_at is null
        order by first_detected_at asc"#
    ))
    .fetch_all(pool)
    .await
}

/// Fetches open alerts which were never notified, or were last notified
/// before `cutoff`.
#[tracing::instrument(level = "debug", skip(pool))]
pub async fn fetch_alerts_due_for_notification(
    cutoff: DateTime<Utc>,
    pool: &sqlx::PgPool,
) -> sqlx::Result<Vec<PlateAlert>> {
    sqlx::query_as::<_, PlateAlert>(&format!(
        r#"select {ALERT_COLUMNS} from plate_alerts
        where resolved_at is null
          and (last_notified_at is null or last_notified_at < $1)
        order by first_detected_at asc"#
    ))
    .bind(cutoff)
    .fetch_all(pool)
    .await
}

/// Resolves the given alerts which are still open, returning the number
/// of alerts resolved.
#[tracing::instrument(level = "debug", skip(pool))]
pub async fn resolve_alerts(
    ids: &[Uuid],
    resolved_at: DateTime<Utc>,
    pool: &sqlx::PgPool,
) -> sqlx::Result<u64> {
    if ids.is_empty() {
        return Ok(0);
    }
    let result = sqlx::query(
        r#"
        update plate_alerts set resolved_at = $2
        where id = any($1) and resolved_at is null
        "#,
    )
    .bind(ids)
    .bind(resolved_at)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

#[tracing::instrument(level = "debug", skip(pool))]
pub async fn mark_alerts_notified(
    ids: &[Uuid],
    notified_at: DateTime<Utc>,
    pool: &sqlx::PgPool,
) -> sqlx::Result<u64> {
    if ids.is_empty() {
        return Ok(0);
    }
    let result = sqlx::query("update plate_alerts set last_notified_at = $2 where id = any($1)")
        .bind(ids)
        .bind(notified_at)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
