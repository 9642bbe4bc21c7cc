//! Keyed primitives over the mirrored tables.
//!
//! All of them take a bare connection, so the same call works on a pooled
//! connection or inside a transaction.

use std::collections::HashSet;

use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tina_core::Participant;

use crate::error::{DbError, Result};
use crate::value::{Record, Table};

// Stays well below SQLITE_MAX_VARIABLE_NUMBER once the session id is bound too.
const ID_CHUNK: usize = 500;

/// Ids from `ids` that already exist for the session.
pub async fn find_ids(
    conn: &mut SqliteConnection,
    table: Table,
    session_id: &str,
    ids: &[String],
) -> Result<Vec<String>> {
    let mut found = Vec::new();

    for chunk in ids.chunks(ID_CHUNK) {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT id FROM ");
        qb.push(table.name());
        qb.push(" WHERE session_id = ");
        qb.push_bind(session_id);
        qb.push(" AND id IN (");
        let mut list = qb.separated(", ");
        for id in chunk {
            list.push_bind(id.as_str());
        }
        qb.push(")");

        let rows: Vec<(String,)> = qb.build_query_as().fetch_all(&mut *conn).await?;
        found.extend(rows.into_iter().map(|(id,)| id));
    }

    Ok(found)
}

/// Ids stored for the session that are not in `keep`.
pub async fn find_ids_not_in(
    conn: &mut SqliteConnection,
    table: Table,
    session_id: &str,
    keep: &[String],
) -> Result<Vec<String>> {
    let keep: HashSet<&str> = keep.iter().map(String::as_str).collect();
    let sql = format!("SELECT id FROM {} WHERE session_id = ?", table.name());
    let rows: Vec<(String,)> = sqlx::query_as(&sql)
        .bind(session_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(id,)| id)
        .filter(|id| !keep.contains(id.as_str()))
        .collect())
}

/// Insert rows for the session. With `skip_duplicates`, rows whose key
/// already exists are ignored; otherwise a duplicate fails the call.
pub async fn create_many(
    conn: &mut SqliteConnection,
    table: Table,
    session_id: &str,
    rows: &[Record],
    skip_duplicates: bool,
) -> Result<u64> {
    let now = chrono::Utc::now().timestamp();
    let mut count = 0;

    for row in rows {
        let mut qb = QueryBuilder::<Sqlite>::new(if skip_duplicates {
            "INSERT OR IGNORE INTO "
        } else {
            "INSERT INTO "
        });
        push_insert(&mut qb, table, session_id, row, now);
        count += qb.build().execute(&mut *conn).await?.rows_affected();
    }

    Ok(count)
}

/// Create the row, or overwrite the columns present in `record` if it exists.
pub async fn upsert(
    conn: &mut SqliteConnection,
    table: Table,
    session_id: &str,
    record: &Record,
) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    let mut qb = QueryBuilder::<Sqlite>::new("INSERT INTO ");
    push_insert(&mut qb, table, session_id, record, now);
    qb.push(" ON CONFLICT(session_id, id) DO ");

    if record.is_empty() && !table.has_updated_at() {
        qb.push("NOTHING");
    } else {
        qb.push("UPDATE SET ");
        let mut set = qb.separated(", ");
        for (column, _) in record.fields() {
            set.push(format!("{column} = excluded.{column}"));
        }
        if table.has_updated_at() {
            set.push("updated_at = excluded.updated_at");
        }
    }

    qb.build().execute(&mut *conn).await?;
    Ok(())
}

/// Overwrite the columns present in `record`. Fails with
/// [`DbError::RecordNotFound`] when the key does not exist.
pub async fn update(
    conn: &mut SqliteConnection,
    table: Table,
    session_id: &str,
    record: &Record,
) -> Result<()> {
    let affected = if record.is_empty() && !table.has_updated_at() {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE session_id = ? AND id = ?",
            table.name()
        );
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(session_id)
            .bind(&record.id)
            .fetch_one(&mut *conn)
            .await?;
        count as u64
    } else {
        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE ");
        qb.push(table.name());
        qb.push(" SET ");
        for (i, (column, value)) in record.fields().iter().enumerate() {
            debug_assert!(table.columns().contains(column), "unknown column {column}");
            if i > 0 {
                qb.push(", ");
            }
            qb.push(format!("{column} = "));
            value.push_to(&mut qb);
        }
        if table.has_updated_at() {
            if !record.is_empty() {
                qb.push(", ");
            }
            qb.push("updated_at = ");
            qb.push_bind(chrono::Utc::now().timestamp());
        }
        qb.push(" WHERE session_id = ");
        qb.push_bind(session_id);
        qb.push(" AND id = ");
        qb.push_bind(record.id.as_str());

        qb.build().execute(&mut *conn).await?.rows_affected()
    };

    if affected == 0 {
        return Err(DbError::RecordNotFound {
            table: table.name(),
            id: record.id.clone(),
        });
    }
    Ok(())
}

/// Delete rows for the session. `None` deletes every row of the session.
pub async fn delete_many(
    conn: &mut SqliteConnection,
    table: Table,
    session_id: &str,
    ids: Option<&[String]>,
) -> Result<u64> {
    let Some(ids) = ids else {
        let sql = format!("DELETE FROM {} WHERE session_id = ?", table.name());
        let done = sqlx::query(&sql).bind(session_id).execute(&mut *conn).await?;
        return Ok(done.rows_affected());
    };

    let mut count = 0;
    for chunk in ids.chunks(ID_CHUNK) {
        let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM ");
        qb.push(table.name());
        qb.push(" WHERE session_id = ");
        qb.push_bind(session_id);
        qb.push(" AND id IN (");
        let mut list = qb.separated(", ");
        for id in chunk {
            list.push_bind(id.as_str());
        }
        qb.push(")");
        count += qb.build().execute(&mut *conn).await?.rows_affected();
    }

    Ok(count)
}

/// Read the unread counter of a chat. `None` when the chat does not exist;
/// `Some(None)` when it exists without a counter.
pub async fn chat_unread_count(
    conn: &mut SqliteConnection,
    session_id: &str,
    id: &str,
) -> Result<Option<Option<i64>>> {
    let row: Option<(Option<i64>,)> =
        sqlx::query_as("SELECT unread_count FROM chats WHERE session_id = ? AND id = ?")
            .bind(session_id)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
    Ok(row.map(|(count,)| count))
}

/// Read the embedded participant list of a group. `None` when the group does
/// not exist.
pub async fn group_participants(
    conn: &mut SqliteConnection,
    session_id: &str,
    id: &str,
) -> Result<Option<Vec<Participant>>> {
    let row: Option<(Option<String>,)> =
        sqlx::query_as("SELECT participants FROM group_metadata WHERE session_id = ? AND id = ?")
            .bind(session_id)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

    match row {
        None => Ok(None),
        Some((None,)) => Ok(Some(Vec::new())),
        Some((Some(json),)) => Ok(Some(serde_json::from_str(&json)?)),
    }
}

fn push_insert(
    qb: &mut QueryBuilder<'_, Sqlite>,
    table: Table,
    session_id: &str,
    record: &Record,
    now: i64,
) {
    qb.push(table.name());
    qb.push(" (session_id, id");
    for (column, _) in record.fields() {
        debug_assert!(table.columns().contains(column), "unknown column {column}");
        qb.push(", ");
        qb.push(*column);
    }
    if table.has_updated_at() {
        qb.push(", updated_at");
    }

    qb.push(") VALUES (");
    qb.push_bind(session_id.to_string());
    qb.push(", ");
    qb.push_bind(record.id.clone());
    for (_, value) in record.fields() {
        qb.push(", ");
        value.push_to(qb);
    }
    if table.has_updated_at() {
        qb.push(", ");
        qb.push_bind(now);
    }
    qb.push(")");
}
