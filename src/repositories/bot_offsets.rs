use sqlx::SqlitePool;

pub(crate) async fn get_update_offset(
    pool: &SqlitePool,
    bot_name: &str,
) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT update_offset
         FROM bot_offsets
         WHERE bot_name = ?1",
    )
    .bind(bot_name)
    .fetch_optional(pool)
    .await
}

/// Stores the next offset to request; never moves backwards.
pub(crate) async fn upsert_update_offset(
    pool: &SqlitePool,
    bot_name: &str,
    update_offset: i64,
    updated_at: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO bot_offsets (bot_name, update_offset, updated_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT (bot_name) DO UPDATE
         SET update_offset = MAX(bot_offsets.update_offset, excluded.update_offset),
             updated_at = excluded.updated_at",
    )
    .bind(bot_name)
    .bind(update_offset)
    .bind(updated_at)
    .execute(pool)
    .await?;

    Ok(())
}
