pub(super) const INSERT_QUEUE_ITEM: &str = r#"
    INSERT INTO sync_queue (entity_kind, action, payload, status, retry_count, created_at)
    VALUES (?1, ?2, ?3, 'pending', 0, ?4)
    RETURNING id, entity_kind, action, payload, status, retry_count,
              created_at, last_retry_at, last_error
"#;

pub(super) const UPSERT_QUEUE_ITEM: &str = r#"
    INSERT INTO sync_queue (
        id, entity_kind, action, payload, status, retry_count,
        created_at, last_retry_at, last_error
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
    ON CONFLICT(id) DO UPDATE SET
        entity_kind = excluded.entity_kind,
        action = excluded.action,
        payload = excluded.payload,
        status = excluded.status,
        retry_count = excluded.retry_count,
        created_at = excluded.created_at,
        last_retry_at = excluded.last_retry_at,
        last_error = excluded.last_error
"#;

pub(super) const SELECT_QUEUE_ITEM_BY_ID: &str = r#"
    SELECT id, entity_kind, action, payload, status, retry_count,
           created_at, last_retry_at, last_error
    FROM sync_queue
    WHERE id = ?1
"#;

pub(super) const SELECT_QUEUE_ITEMS: &str = r#"
    SELECT id, entity_kind, action, payload, status, retry_count,
           created_at, last_retry_at, last_error
    FROM sync_queue
    WHERE (?1 IS NULL OR entity_kind = ?1)
      AND (?2 IS NULL OR status = ?2)
    ORDER BY created_at ASC, id ASC
"#;

pub(super) const COUNT_QUEUE_ITEMS: &str = r#"
    SELECT COUNT(*) AS count
    FROM sync_queue
    WHERE (?1 IS NULL OR entity_kind = ?1)
      AND (?2 IS NULL OR status = ?2)
"#;

pub(super) const COUNT_NEEDS_ATTENTION: &str = r#"
    SELECT COUNT(*) AS count
    FROM sync_queue
    WHERE status = 'exhausted' OR retry_count >= ?1
"#;

pub(super) const QUARANTINE_QUEUE_ITEM: &str = r#"
    UPDATE sync_queue
    SET status = 'exhausted',
        last_error = ?2
    WHERE id = ?1
      AND (status != 'exhausted' OR last_error IS NOT ?2)
"#;

pub(super) const PATCH_QUEUE_ITEM: &str = r#"
    UPDATE sync_queue
    SET status = COALESCE(?2, status),
        retry_count = COALESCE(?3, retry_count),
        last_retry_at = CASE WHEN ?4 THEN ?5 ELSE last_retry_at END,
        last_error = CASE WHEN ?6 THEN ?7 ELSE last_error END
    WHERE id = ?1
    RETURNING id, entity_kind, action, payload, status, retry_count,
              created_at, last_retry_at, last_error
"#;

pub(super) const DELETE_QUEUE_ITEM: &str = r#"
    DELETE FROM sync_queue WHERE id = ?1
"#;

pub(super) const CLEAR_QUEUE: &str = r#"
    DELETE FROM sync_queue
"#;

pub(super) const SELECT_CACHE_ENTRY: &str = r#"
    SELECT cache_key, value, updated_at
    FROM cache_entries
    WHERE cache_key = ?1
"#;

pub(super) const UPSERT_CACHE_ENTRY: &str = r#"
    INSERT INTO cache_entries (cache_key, value, updated_at)
    VALUES (?1, ?2, ?3)
    ON CONFLICT(cache_key) DO UPDATE SET
        value = excluded.value,
        updated_at = excluded.updated_at
"#;

pub(super) const DELETE_CACHE_ENTRY: &str = r#"
    DELETE FROM cache_entries WHERE cache_key = ?1
"#;

pub(super) const DELETE_CACHE_ENTRIES_BEFORE: &str = r#"
    DELETE FROM cache_entries WHERE updated_at < ?1
"#;

pub(super) const CLEAR_CACHE: &str = r#"
    DELETE FROM cache_entries
"#;
