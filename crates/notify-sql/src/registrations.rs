use models::Registration;
use sqlx::types::Uuid;

const REGISTRATION_COLUMNS: &str = r#"
    id,
    order_id,
    access_token,
    vehicle_year,
    vehicle_make,
    vehicle_model,
    vin,
    customer_name,
    customer_phone,
    customer_email,
    notification_preference,
    stage,
    rejection_notes,
    created_at
"#;

#[tracing::instrument(level = "debug", skip(pool))]
pub async fn fetch_registration(
    id: Uuid,
    pool: &sqlx::PgPool,
) -> sqlx::Result<Option<Registration>> {
    sqlx::query_as::<_, Registration>(&format!(
        "select {REGISTRATION_COLUMNS} from registrations where id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Fetches the registrations having any of the given ids. Unknown ids are
/// silently absent from the result.
#[tracing::instrument(level = "debug", skip(pool))]
pub async fn fetch_registrations(
    ids: &[Uuid],
    pool: &sqlx::PgPool,
) -> sqlx::Result<Vec<Registration>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    sqlx::query_as::<_, Registration>(&format!(
        "select {REGISTRATION_COLUMNS} from registrations where id = any($1)"
    ))
    .bind(ids)
    .fetch_all(pool)
    .await
}
