use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;

pub fn insert_encounter(
    conn: &Connection,
    encounter_id: i64,
    patient_id: Option<i64>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO encounters (id, patient_id) VALUES (?1, ?2)",
        params![encounter_id, patient_id],
    )?;
    Ok(())
}

pub fn encounter_exists(conn: &Connection, encounter_id: i64) -> Result<bool, DatabaseError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM encounters WHERE id = ?1)",
        params![encounter_id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Patient owning the encounter. `None` when the encounter is unknown or has no patient.
pub fn patient_for_encounter(
    conn: &Connection,
    encounter_id: i64,
) -> Result<Option<i64>, DatabaseError> {
    let patient = conn
        .query_row(
            "SELECT patient_id FROM encounters WHERE id = ?1",
            params![encounter_id],
            |row| row.get::<_, Option<i64>>(0),
        )
        .optional()?;
    Ok(patient.flatten())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn existence_check() {
        let conn = open_memory_database().unwrap();
        insert_encounter(&conn, 77, Some(5)).unwrap();
        assert!(encounter_exists(&conn, 77).unwrap());
        assert!(!encounter_exists(&conn, 78).unwrap());
    }

    #[test]
    fn patient_lookup_handles_missing_and_null() {
        let conn = open_memory_database().unwrap();
        insert_encounter(&conn, 1, Some(900)).unwrap();
        insert_encounter(&conn, 2, None).unwrap();

        assert_eq!(patient_for_encounter(&conn, 1).unwrap(), Some(900));
        assert_eq!(patient_for_encounter(&conn, 2).unwrap(), None);
        assert_eq!(patient_for_encounter(&conn, 3).unwrap(), None);
    }
}
