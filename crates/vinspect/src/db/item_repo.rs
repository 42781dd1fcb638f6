//! Evidence item repository — reads for the `evidence_items` table.
//!
//! Items are inserted once at upload time and never mutated by the
//! pipeline; listing preserves insertion order so the chunker's stable
//! sort keeps upload order within a category.

use rusqlite::{params, Row};

use crate::evidence::EvidenceItem;

use super::{Database, DatabaseError};

fn item_from_row(row: &Row<'_>) -> Result<EvidenceItem, rusqlite::Error> {
    Ok(EvidenceItem {
        id: row.get("id")?,
        category: row.get("category")?,
        byte_size: row.get::<_, i64>("byte_size")? as u64,
        asset_uri: row.get("asset_uri")?,
        obd_code: row.get("obd_code")?,
        obd_description: row.get("obd_description")?,
    })
}

/// Inserts an evidence item for an inspection.
pub fn insert(
    db: &Database,
    inspection_id: &str,
    item: &EvidenceItem,
    created_at: &str,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO evidence_items (id, inspection_id, category, byte_size,
             asset_uri, obd_code, obd_description, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                item.id,
                inspection_id,
                item.category,
                item.byte_size as i64,
                item.asset_uri,
                item.obd_code,
                item.obd_description,
                created_at,
            ],
        )?;
        Ok(())
    })
}

/// Lists all evidence items for an inspection in insertion order.
pub fn list_by_inspection(
    db: &Database,
    inspection_id: &str,
) -> Result<Vec<EvidenceItem>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM evidence_items WHERE inspection_id = ?1 ORDER BY rowid ASC",
        )?;
        let items: Vec<EvidenceItem> = stmt
            .query_map(params![inspection_id], item_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    })
}

/// Lists the OBD2 items carrying a trouble code, in insertion order.
pub fn list_obd_codes(
    db: &Database,
    inspection_id: &str,
) -> Result<Vec<EvidenceItem>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM evidence_items
             WHERE inspection_id = ?1 AND category = 'obd' AND obd_code IS NOT NULL
             ORDER BY rowid ASC",
        )?;
        let items: Vec<EvidenceItem> = stmt
            .query_map(params![inspection_id], item_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    })
}
