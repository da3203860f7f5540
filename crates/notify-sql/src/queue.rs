use chrono::{DateTime, Utc};
use models::NotificationQueueItem;
use sqlx::types::Uuid;

/// Fetches unsent customer notifications whose debounce horizon has passed,
/// oldest first.
#[tracing::instrument(level = "debug", skip(pool))]
pub async fn fetch_due(
    now: DateTime<Utc>,
    limit: i64,
    pool: &sqlx::PgPool,
) -> sqlx::Result<Vec<NotificationQueueItem>> {
    sqlx::query_as::<_, NotificationQueueItem>(
        r#"
        select
            id,
            registration_id,
            old_stage,
            new_stage,
            send_after,
            notify_customer,
            sent,
            sent_at,
            error,
            created_at
        from notification_queue
        where sent = false
          and notify_customer = true
          and send_after <= $1
        order by send_after asc, created_at asc
        limit $2
        "#,
    )
    .bind(now)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Marks an item as sent, but only if it is not already. Returns whether
/// this caller won the claim. A concurrent processor that already claimed
/// the item causes a `false` return.
#[tracing::instrument(level = "debug", skip(pool))]
pub async fn claim(id: Uuid, now: DateTime<Utc>, pool: &sqlx::PgPool) -> sqlx::Result<bool> {
    let claimed: Option<(Uuid,)> = sqlx::query_as(
        r#"
        update notification_queue
        set sent = true, sent_at = $2
        where id = $1 and sent = false
        returning id
        "#,
    )
    .bind(id)
    .bind(now)
    .fetch_optional(pool)
    .await?;

    Ok(claimed.is_some())
}

#[tracing::instrument(level = "debug", skip(pool))]
pub async fn set_error(id: Uuid, error: &str, pool: &sqlx::PgPool) -> sqlx::Result<()> {
    sqlx::query("update notification_queue set error = $2 where id = $1")
        .bind(id)
        .bind(error)
        .execute(pool)
        .await?;
    Ok(())
}
