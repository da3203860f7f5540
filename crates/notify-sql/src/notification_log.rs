use models::NewNotificationLog;

/// Appends an entry to the notification audit log.
#[tracing::instrument(level = "debug", skip(entry, pool), fields(
    registration_id = ?entry.registration_id,
    channel = %entry.channel,
    delivered = entry.delivered,
))]
pub async fn insert(entry: &NewNotificationLog, pool: &sqlx::PgPool) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        insert into notification_log (
            registration_id,
            channel,
            old_stage,
            new_stage,
            subject,
            template,
            provider_message_id,
            delivered,
            delivery_error,
            sent_at
        ) values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(entry.registration_id)
    .bind(entry.channel)
    .bind(&entry.old_stage)
    .bind(&entry.new_stage)
    .bind(&entry.subject)
    .bind(&entry.template)
    .bind(&entry.provider_message_id)
    .bind(entry.delivered)
    .bind(&entry.delivery_error)
    .bind(entry.sent_at)
    .execute(pool)
    .await?;
    Ok(())
}
