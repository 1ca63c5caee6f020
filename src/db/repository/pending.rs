use rusqlite::{params, Connection};

use crate::db::DatabaseError;
use crate::models::{PendingItem, SignedFlag};

/// Unsigned lab order items, one per local order code, ordered by code.
///
/// When the same code appears under several encounters the lowest
/// encounter id is used.
pub fn list_pending_items(conn: &Connection, limit: u32) -> Result<Vec<PendingItem>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT local_order_code, MIN(encounter_id)
         FROM lab_order_items
         WHERE signed_flag = 'N' AND TRIM(local_order_code) <> ''
         GROUP BY local_order_code
         ORDER BY local_order_code
         LIMIT ?1",
    )?;
    let rows = stmt
        .query_map(params![limit], |row| {
            Ok(PendingItem {
                local_order_code: row.get::<_, String>(0)?,
                signed_flag: SignedFlag::No,
                encounter_id: row.get::<_, i64>(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn insert_lab_order_item(
    conn: &Connection,
    local_order_code: &str,
    encounter_id: i64,
    signed_flag: SignedFlag,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO lab_order_items (local_order_code, encounter_id, signed_flag)
         VALUES (?1, ?2, ?3)",
        params![local_order_code, encounter_id, signed_flag.as_str()],
    )?;
    Ok(conn.last_insert_rowid())
}
