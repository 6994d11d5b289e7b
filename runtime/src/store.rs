//! SQLite sink for extracted standards and parcel assignments.
//!
//! Standards are never updated in place. Recording a district again inserts
//! a new row and stamps `superseded_at` on the previous current row, so the
//! full extraction history stays queryable. Assignments are keyed by
//! (jurisdiction, parcel) and replaced wholesale.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;

use zoneatlas::{
    ConfidenceTier, DimensionalStandard, ParcelZoningAssignment, ResolutionMethod, SourceCitation,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS dimensional_standards (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    jurisdiction_id TEXT NOT NULL,
    district_code TEXT NOT NULL,
    district_name TEXT,
    min_lot_area_sqft INTEGER,
    min_lot_width_ft REAL,
    min_lot_depth_ft REAL,
    max_height_ft REAL,
    max_stories INTEGER,
    front_setback_ft REAL,
    side_setback_ft REAL,
    side_corner_setback_ft REAL,
    rear_setback_ft REAL,
    max_lot_coverage_pct REAL,
    max_impervious_pct REAL,
    source_url TEXT NOT NULL,
    retrieved_at TEXT NOT NULL,
    recorded_at TEXT NOT NULL,
    superseded_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_standards_current
    ON dimensional_standards (jurisdiction_id, district_code, superseded_at);
CREATE TABLE IF NOT EXISTS parcel_assignments (
    jurisdiction_id TEXT NOT NULL,
    parcel_id TEXT NOT NULL,
    district_code TEXT NOT NULL,
    confidence TEXT NOT NULL,
    method TEXT NOT NULL,
    resolved_at TEXT NOT NULL,
    PRIMARY KEY (jurisdiction_id, parcel_id)
);
";

const STANDARD_COLUMNS: &str = "jurisdiction_id, district_code, district_name, min_lot_area_sqft, \
    min_lot_width_ft, min_lot_depth_ft, max_height_ft, max_stories, front_setback_ft, \
    side_setback_ft, side_corner_setback_ft, rear_setback_ft, max_lot_coverage_pct, \
    max_impervious_pct, source_url, retrieved_at";

/// Local persistence for pipeline output.
pub struct StandardsStore {
    db: Connection,
}

impl StandardsStore {
    /// Open or create a store at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Connection::open(path)
            .with_context(|| format!("failed to open store: {}", path.display()))?;
        Self::init(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(db: Connection) -> Result<Self> {
        db.execute_batch(SCHEMA)
            .context("failed to create store schema")?;
        Ok(Self { db })
    }

    /// Record a batch of standards, superseding the current row of each district.
    pub fn record_standards(&mut self, standards: &[DimensionalStandard]) -> Result<usize> {
        let now = Utc::now().to_rfc3339();
        let tx = self.db.transaction()?;
        for s in standards {
            tx.execute(
                "UPDATE dimensional_standards SET superseded_at = ?3
                 WHERE jurisdiction_id = ?1 AND district_code = ?2 AND superseded_at IS NULL",
                params![s.jurisdiction_id, s.district_code, now],
            )?;
            tx.execute(
                &format!(
                    "INSERT INTO dimensional_standards ({STANDARD_COLUMNS}, recorded_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"
                ),
                params![
                    s.jurisdiction_id,
                    s.district_code,
                    s.district_name,
                    s.min_lot_area_sqft.map(|v| v as i64),
                    s.min_lot_width_ft,
                    s.min_lot_depth_ft,
                    s.max_height_ft,
                    s.max_stories.map(i64::from),
                    s.front_setback_ft,
                    s.side_setback_ft,
                    s.side_corner_setback_ft,
                    s.rear_setback_ft,
                    s.max_lot_coverage_pct,
                    s.max_impervious_pct,
                    s.source.url,
                    s.source.retrieved_at.to_rfc3339(),
                    now,
                ],
            )?;
        }
        tx.commit().context("failed to commit standards")?;
        Ok(standards.len())
    }

    /// Current (non-superseded) standards of a jurisdiction, ordered by district.
    pub fn current_standards(&self, jurisdiction_id: &str) -> Result<Vec<DimensionalStandard>> {
        let mut stmt = self.db.prepare(&format!(
            "SELECT {STANDARD_COLUMNS} FROM dimensional_standards
             WHERE jurisdiction_id = ?1 AND superseded_at IS NULL
             ORDER BY district_code"
        ))?;
        let rows = stmt
            .query_map(params![jurisdiction_id], read_standard)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(StandardRow::into_standard).collect()
    }

    /// Current standard for one district.
    pub fn standard(&self, jurisdiction_id: &str, district_code: &str) -> Result<Option<DimensionalStandard>> {
        let row = self
            .db
            .query_row(
                &format!(
                    "SELECT {STANDARD_COLUMNS} FROM dimensional_standards
                     WHERE jurisdiction_id = ?1 AND district_code = ?2 AND superseded_at IS NULL"
                ),
                params![jurisdiction_id, district_code],
                read_standard,
            )
            .optional()?;
        row.map(StandardRow::into_standard).transpose()
    }

    /// Number of rows ever recorded for a district, superseded included.
    pub fn history_len(&self, jurisdiction_id: &str, district_code: &str) -> Result<usize> {
        let n: i64 = self.db.query_row(
            "SELECT COUNT(*) FROM dimensional_standards WHERE jurisdiction_id = ?1 AND district_code = ?2",
            params![jurisdiction_id, district_code],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    /// Insert or replace parcel assignments.
    pub fn record_assignments(&mut self, assignments: &[ParcelZoningAssignment]) -> Result<usize> {
        let tx = self.db.transaction()?;
        for a in assignments {
            tx.execute(
                "INSERT OR REPLACE INTO parcel_assignments
                 (jurisdiction_id, parcel_id, district_code, confidence, method, resolved_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    a.jurisdiction_id,
                    a.parcel_id,
                    a.district_code,
                    a.confidence.as_str(),
                    a.method.tag(),
                    a.resolved_at.to_rfc3339(),
                ],
            )?;
        }
        tx.commit().context("failed to commit assignments")?;
        Ok(assignments.len())
    }

    pub fn assignment(&self, jurisdiction_id: &str, parcel_id: &str) -> Result<Option<ParcelZoningAssignment>> {
        let row = self
            .db
            .query_row(
                "SELECT jurisdiction_id, parcel_id, district_code, confidence, method, resolved_at
                 FROM parcel_assignments WHERE jurisdiction_id = ?1 AND parcel_id = ?2",
                params![jurisdiction_id, parcel_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;
        let Some((jurisdiction_id, parcel_id, district_code, confidence, method, resolved_at)) = row
        else {
            return Ok(None);
        };
        Ok(Some(ParcelZoningAssignment {
            jurisdiction_id,
            parcel_id,
            district_code,
            confidence: parse_confidence(&confidence)?,
            method: ResolutionMethod::from_tag(&method)
                .with_context(|| format!("unknown resolution method in store: {method}"))?,
            resolved_at: parse_time(&resolved_at)?,
        }))
    }

    /// Assignment counts per method tag for a jurisdiction.
    pub fn method_counts(&self, jurisdiction_id: &str) -> Result<BTreeMap<String, usize>> {
        let mut stmt = self.db.prepare(
            "SELECT method, COUNT(*) FROM parcel_assignments
             WHERE jurisdiction_id = ?1 GROUP BY method",
        )?;
        let counts = stmt
            .query_map(params![jurisdiction_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
            })?
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        Ok(counts)
    }
}

/// Raw row; timestamps are converted outside the rusqlite closure.
struct StandardRow {
    standard: DimensionalStandard,
    retrieved_at: String,
}

impl StandardRow {
    fn into_standard(self) -> Result<DimensionalStandard> {
        let mut standard = self.standard;
        standard.source.retrieved_at = parse_time(&self.retrieved_at)?;
        Ok(standard)
    }
}

fn read_standard(row: &rusqlite::Row<'_>) -> rusqlite::Result<StandardRow> {
    Ok(StandardRow {
        standard: DimensionalStandard {
            jurisdiction_id: row.get(0)?,
            district_code: row.get(1)?,
            district_name: row.get(2)?,
            min_lot_area_sqft: row.get::<_, Option<i64>>(3)?.map(|v| v as u64),
            min_lot_width_ft: row.get(4)?,
            min_lot_depth_ft: row.get(5)?,
            max_height_ft: row.get(6)?,
            max_stories: row.get::<_, Option<i64>>(7)?.map(|v| v as u32),
            front_setback_ft: row.get(8)?,
            side_setback_ft: row.get(9)?,
            side_corner_setback_ft: row.get(10)?,
            rear_setback_ft: row.get(11)?,
            max_lot_coverage_pct: row.get(12)?,
            max_impervious_pct: row.get(13)?,
            source: SourceCitation {
                url: row.get(14)?,
                retrieved_at: DateTime::<Utc>::MIN_UTC,
            },
        },
        retrieved_at: row.get(15)?,
    })
}

fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("bad timestamp in store: {s}"))?
        .with_timezone(&Utc))
}

fn parse_confidence(s: &str) -> Result<ConfidenceTier> {
    match s {
        "HIGH" => Ok(ConfidenceTier::High),
        "MEDIUM" => Ok(ConfidenceTier::Medium),
        "LOW" => Ok(ConfidenceTier::Low),
        other => anyhow::bail!("unknown confidence tier in store: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standard(code: &str, height: f64) -> DimensionalStandard {
        let source = SourceCitation {
            url: "https://library.example.gov/orange".to_string(),
            retrieved_at: Utc::now(),
        };
        let mut s = DimensionalStandard::empty("orange-county-fl", code, source);
        s.min_lot_area_sqft = Some(10_000);
        s.max_height_ft = Some(height);
        s.max_stories = Some(2);
        s
    }

    fn assignment(parcel: &str, code: &str, method: ResolutionMethod) -> ParcelZoningAssignment {
        ParcelZoningAssignment {
            parcel_id: parcel.to_string(),
            jurisdiction_id: "orange-county-fl".to_string(),
            district_code: code.to_string(),
            confidence: ConfidenceTier::High,
            method,
            resolved_at: Utc::now(),
        }
    }

    #[test]
    fn test_standards_are_superseded_not_mutated() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = StandardsStore::open(&dir.path().join("zoneatlas.db")).unwrap();

        store
            .record_standards(&[standard("R-1AA", 35.0), standard("C-1", 50.0)])
            .unwrap();
        store.record_standards(&[standard("R-1AA", 40.0)]).unwrap();

        let current = store.current_standards("orange-county-fl").unwrap();
        assert_eq!(current.len(), 2);
        assert_eq!(current[0].district_code, "C-1");
        assert_eq!(current[1].max_height_ft, Some(40.0));
        assert_eq!(current[1].min_lot_area_sqft, Some(10_000));
        assert_eq!(current[1].max_stories, Some(2));

        assert_eq!(store.history_len("orange-county-fl", "R-1AA").unwrap(), 2);
        assert_eq!(store.history_len("orange-county-fl", "C-1").unwrap(), 1);
    }

    #[test]
    fn test_missing_standard() {
        let store = StandardsStore::open_in_memory().unwrap();
        assert!(store.standard("orange-county-fl", "R-1").unwrap().is_none());
        assert!(store.current_standards("nowhere").unwrap().is_empty());
    }

    #[test]
    fn test_assignments_replace_per_parcel() {
        let mut store = StandardsStore::open_in_memory().unwrap();
        store
            .record_assignments(&[
                assignment("P1", "R-1", ResolutionMethod::Centroid),
                assignment("P2", "C-1", ResolutionMethod::Envelope),
            ])
            .unwrap();
        store
            .record_assignments(&[assignment("P1", "R-2", ResolutionMethod::BboxOffset25)])
            .unwrap();

        let p1 = store.assignment("orange-county-fl", "P1").unwrap().unwrap();
        assert_eq!(p1.district_code, "R-2");
        assert_eq!(p1.method, ResolutionMethod::BboxOffset25);
        assert_eq!(p1.confidence, ConfidenceTier::High);

        let counts = store.method_counts("orange-county-fl").unwrap();
        assert_eq!(counts.get("bbox_offset_25"), Some(&1));
        assert_eq!(counts.get("envelope"), Some(&1));
        assert_eq!(counts.get("centroid"), None);
    }
}
