use rusqlite::{params, Connection};

use super::parse_timestamp;
use crate::db::DatabaseError;
use crate::models::RemoteMapping;

/// Insert or refresh the mapping for a local order code.
/// Always stamps `updated_at`. Returns the number of rows affected.
pub fn upsert_mapping(
    conn: &Connection,
    local_order_code: &str,
    remote_order_code: &str,
    order_year: Option<i32>,
) -> Result<usize, DatabaseError> {
    let affected = conn.execute(
        "INSERT INTO remote_mappings (local_order_code, remote_order_code, order_year, updated_at)
         VALUES (?1, ?2, ?3, strftime('%Y-%m-%d %H:%M:%f', 'now'))
         ON CONFLICT(local_order_code) DO UPDATE SET
             remote_order_code = excluded.remote_order_code,
             order_year = excluded.order_year,
             updated_at = excluded.updated_at",
        params![local_order_code, remote_order_code, order_year],
    )?;
    Ok(affected)
}

/// Most recently updated mapping for the code, if any.
pub fn get_mapping(
    conn: &Connection,
    local_order_code: &str,
) -> Result<Option<RemoteMapping>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT local_order_code, remote_order_code, order_year, updated_at
         FROM remote_mappings
         WHERE local_order_code = ?1
         ORDER BY updated_at DESC
         LIMIT 1",
    )?;

    let result = stmt.query_row(params![local_order_code], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<i32>>(2)?,
            row.get::<_, String>(3)?,
        ))
    });

    match result {
        Ok((local, remote, year, updated_at)) => Ok(Some(RemoteMapping {
            local_order_code: local,
            remote_order_code: remote,
            order_year: year,
            updated_at: parse_timestamp("updated_at", &updated_at)?,
        })),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn count_mappings(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row("SELECT COUNT(*) FROM remote_mappings", [], |row| row.get(0))?;
    Ok(count)
}
