use std::str::FromStr;

use rusqlite::{params, Connection};

use crate::db::DatabaseError;
use crate::models::{AuditEntry, AuditOutcome};

/// Insert a batch of audit entries into the audit_log table.
pub fn insert_audit_entries(conn: &Connection, entries: &[AuditEntry]) -> Result<(), DatabaseError> {
    let mut stmt = conn.prepare(
        "INSERT INTO audit_log (timestamp, outcome, local_order_code, remote_key, encounter_id, detail)
         VALUES (strftime('%Y-%m-%d %H:%M:%f', 'now'), ?1, ?2, ?3, ?4, ?5)",
    )?;
    for entry in entries {
        stmt.execute(params![
            entry.outcome.as_str(),
            entry.local_order_code,
            entry.remote_key,
            entry.encounter_id,
            entry.detail,
        ])?;
    }
    Ok(())
}

/// Latest audit entries, newest first.
pub fn recent_audit_entries(conn: &Connection, limit: u32) -> Result<Vec<AuditEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT outcome, local_order_code, remote_key, encounter_id, detail
         FROM audit_log ORDER BY id DESC LIMIT ?1",
    )?;
    let rows = stmt
        .query_map(params![limit], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<i64>>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(outcome, local, remote_key, encounter_id, detail)| {
            Ok(AuditEntry {
                outcome: AuditOutcome::from_str(&outcome)?,
                local_order_code: local,
                remote_key,
                encounter_id,
                detail,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    fn entry(outcome: AuditOutcome, code: &str) -> AuditEntry {
        AuditEntry {
            outcome,
            local_order_code: code.into(),
            remote_key: Some("2025-9".into()),
            encounter_id: Some(3),
            detail: "documents=[1]".into(),
        }
    }

    #[test]
    fn entries_round_trip_newest_first() {
        let conn = open_memory_database().unwrap();
        insert_audit_entries(
            &conn,
            &[entry(AuditOutcome::Success, "1"), entry(AuditOutcome::Error, "2")],
        )
        .unwrap();

        let recent = recent_audit_entries(&conn, 10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].local_order_code, "2");
        assert_eq!(recent[0].outcome, AuditOutcome::Error);
    }
}
