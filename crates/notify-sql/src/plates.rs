use models::{Plate, PlateAssignment, PlateStatus, PlateType, RentalBooking};
use sqlx::types::Uuid;

const PLATE_COLUMNS: &str = "id, plate_number, plate_type, status, expiration_date";

const ASSIGNMENT_COLUMNS: &str = r#"
    id,
    plate_id,
    assignment_type,
    customer_name,
    customer_phone,
    booking_id,
    registration_id,
    expected_return_date,
    assigned_at,
    returned_at
"#;

#[tracing::instrument(level = "debug", skip(pool))]
pub async fn fetch_plates(ids: &[Uuid], pool: &sqlx::PgPool) -> sqlx::Result<Vec<Plate>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    sqlx::query_as::<_, Plate>(&format!(
        "select {PLATE_COLUMNS} from plates where id = any($1)"
    ))
    .bind(ids)
    .fetch_all(pool)
    .await
}

#[tracing::instrument(level = "debug", skip(pool))]
pub async fn fetch_plates_with_status(
    status: PlateStatus,
    pool: &sqlx::PgPool,
) -> sqlx::Result<Vec<Plate>> {
    sqlx::query_as::<_, Plate>(&format!(
        "select {PLATE_COLUMNS} from plates where status = $1 order by plate_number"
    ))
    .bind(status)
    .fetch_all(pool)
    .await
}

#[tracing::instrument(level = "debug", skip(pool))]
pub async fn fetch_plates_of_type(
    plate_type: PlateType,
    pool: &sqlx::PgPool,
) -> sqlx::Result<Vec<Plate>> {
    sqlx::query_as::<_, Plate>(&format!(
        "select {PLATE_COLUMNS} from plates where plate_type = $1 order by plate_number"
    ))
    .bind(plate_type)
    .fetch_all(pool)
    .await
}

/// Fetches every assignment which has not been returned.
#[tracing::instrument(level = "debug", skip(pool))]
pub async fn fetch_active_assignments(pool: &sqlx::PgPool) -> sqlx::Result<Vec<PlateAssignment>> {
    sqlx::query_as::<_, PlateAssignment>(&format!(
        "select {ASSIGNMENT_COLUMNS} from plate_assignments where returned_at is null"
    ))
    .fetch_all(pool)
    .await
}

#[tracing::instrument(level = "debug", skip(pool))]
pub async fn fetch_active_assignments_for_plates(
    plate_ids: &[Uuid],
    pool: &sqlx::PgPool,
) -> sqlx::Result<Vec<PlateAssignment>> {
    if plate_ids.is_empty() {
        return Ok(Vec::new());
    }
    sqlx::query_as::<_, PlateAssignment>(&format!(
        r#"select {ASSIGNMENT_COLUMNS} from plate_assignments
        where returned_at is null and plate_id = any($1)"#
    ))
    .bind(plate_ids)
    .fetch_all(pool)
    .await
}

#[tracing::instrument(level = "debug", skip(pool))]
pub async fn fetch_bookings(ids: &[Uuid], pool: &sqlx::PgPool) -> sqlx::Result<Vec<RentalBooking>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    sqlx::query_as::<_, RentalBooking>(
        r#"
        select id, status, vehicle_year, vehicle_make, vehicle_model
        from rental_bookings
        where id = any($1)
        "#,
    )
    .bind(ids)
    .fetch_all(pool)
    .await
}
