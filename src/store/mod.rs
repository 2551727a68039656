pub mod import;
pub mod migrations;

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde::Serialize;
use tracing::{info, warn};

use crate::lookup::rank_name_matches;
use crate::scoring::{Category, CategoryId, CategoryScoreTuple, Province, ProvinceId};
use crate::source::{ScoreMatrix, ScoreRecord, YearlyScore};
use crate::store::import::{read_import_rows, sha256_hex, ImportRow};
use crate::store::migrations::BASE_MIGRATION;

pub struct ScoreStore {
    conn: Connection,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ImportSummary {
    pub source_path: String,
    pub content_hash: String,
    pub rows: usize,
    pub provinces: usize,
    pub categories: usize,
    pub replaced: usize,
    pub skipped: bool,
}

impl ScoreStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed creating store directory: {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed opening score store: {}", path.display()))?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_read_only(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| {
            format!(
                "score store not found or unreadable: {} (run `province-scores import` first)",
                path.display()
            )
        })?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(BASE_MIGRATION)?;
        Ok(())
    }

    pub fn upsert_province(&self, province: &Province) -> Result<()> {
        self.conn.execute(
            r#"
INSERT INTO provinces(province_id, province_name) VALUES (?1, ?2)
ON CONFLICT(province_id) DO UPDATE SET province_name = excluded.province_name
"#,
            params![province.id, province.name],
        )?;
        Ok(())
    }

    pub fn upsert_category(&self, category: &Category) -> Result<()> {
        self.conn.execute(
            r#"
INSERT INTO categories(category_id, category_name) VALUES (?1, ?2)
ON CONFLICT(category_id) DO UPDATE SET category_name = excluded.category_name
"#,
            params![category.id, category.name],
        )?;
        Ok(())
    }

    pub fn insert_score(&self, record: &ScoreRecord) -> Result<()> {
        self.conn.execute(
            r#"
INSERT INTO investment_scores(
    province_id, category_id, year,
    current_status_score, trend_score, attractiveness_score, priority_score
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
"#,
            params![
                record.province_id,
                record.category_id,
                record.year,
                record.current_status_score,
                record.trend_score,
                record.attractiveness_score,
                record.priority_score
            ],
        )?;
        Ok(())
    }

    pub fn provinces(&self) -> Result<Vec<Province>> {
        let mut stmt = self
            .conn
            .prepare("SELECT province_id, province_name FROM provinces ORDER BY province_id")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Province {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn categories(&self) -> Result<Vec<Category>> {
        let mut stmt = self
            .conn
            .prepare("SELECT category_id, category_name FROM categories ORDER BY category_id")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Category {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn latest_scores(&self, category: CategoryId) -> Result<Vec<(ProvinceId, CategoryScoreTuple)>> {
        let mut stmt = self.conn.prepare(
            r#"
SELECT province_id,
       AVG(current_status_score),
       AVG(trend_score),
       AVG(attractiveness_score),
       AVG(priority_score)
FROM investment_scores
WHERE category_id = ?1
  AND year = (SELECT MAX(year) FROM investment_scores WHERE category_id = ?1)
GROUP BY province_id
ORDER BY province_id
"#,
        )?;
        let rows = stmt
            .query_map(params![category], |row| {
                let tuple = CategoryScoreTuple::from_percent(
                    row.get::<_, Option<f64>>(1)?,
                    row.get::<_, Option<f64>>(2)?,
                    row.get::<_, Option<f64>>(3)?,
                    row.get::<_, Option<f64>>(4)?,
                );
                Ok((row.get::<_, ProvinceId>(0)?, tuple))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn score_matrix(&self, categories: &[CategoryId]) -> Result<ScoreMatrix> {
        let mut matrix = ScoreMatrix {
            provinces: self.provinces()?,
            ..ScoreMatrix::default()
        };
        for category in categories {
            for (province, tuple) in self.latest_scores(*category)? {
                matrix.insert(province, *category, tuple);
            }
        }
        Ok(matrix)
    }

    pub fn search_provinces(&self, query: &str, limit: usize) -> Result<Vec<Province>> {
        Ok(rank_name_matches(&self.provinces()?, query, limit))
    }

    pub fn province_history(&self, province: ProvinceId) -> Result<Vec<YearlyScore>> {
        let mut stmt = self.conn.prepare(
            r#"
SELECT year,
       category_id,
       AVG(current_status_score),
       AVG(trend_score),
       AVG(attractiveness_score),
       AVG(priority_score)
FROM investment_scores
WHERE province_id = ?1
GROUP BY year, category_id
ORDER BY year, category_id
"#,
        )?;
        let rows = stmt
            .query_map(params![province], |row| {
                Ok(YearlyScore {
                    year: row.get(0)?,
                    category_id: row.get(1)?,
                    scores: CategoryScoreTuple::from_percent(
                        row.get::<_, Option<f64>>(2)?,
                        row.get::<_, Option<f64>>(3)?,
                        row.get::<_, Option<f64>>(4)?,
                        row.get::<_, Option<f64>>(5)?,
                    ),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn has_import(&self, content_hash: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT id FROM import_history WHERE content_hash = ?1 LIMIT 1",
                params![content_hash],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn import_csv(&self, path: &Path, force: bool) -> Result<ImportSummary> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed reading score export: {}", path.display()))?;
        let content_hash = sha256_hex(&bytes);
        let source_path = path.display().to_string();

        if !force && self.has_import(&content_hash)? {
            warn!("{source_path} was already imported (sha256 {content_hash}); skipping");
            return Ok(ImportSummary {
                source_path,
                content_hash,
                rows: 0,
                provinces: 0,
                categories: 0,
                replaced: 0,
                skipped: true,
            });
        }

        let rows = read_import_rows(bytes.as_slice())
            .with_context(|| format!("failed parsing score export: {}", path.display()))?;
        let summary = self.import_rows(&rows, &source_path, &content_hash)?;
        info!(
            rows = summary.rows,
            provinces = summary.provinces,
            categories = summary.categories,
            replaced = summary.replaced,
            "imported {source_path}"
        );
        Ok(summary)
    }

    /// Rows already stored for an imported (province, category, year) are
    /// replaced, not averaged with the new ones.
    pub fn import_rows(
        &self,
        rows: &[ImportRow],
        source_path: &str,
        content_hash: &str,
    ) -> Result<ImportSummary> {
        let tx = self.conn.unchecked_transaction()?;
        let keys = rows
            .iter()
            .map(|row| (row.province_id, row.category_id, row.year))
            .collect::<BTreeSet<_>>();
        let mut replaced = 0;
        for (province, category, year) in &keys {
            replaced += self.conn.execute(
                "DELETE FROM investment_scores WHERE province_id = ?1 AND category_id = ?2 AND year = ?3",
                params![province, category, year],
            )?;
        }

        let mut provinces = BTreeSet::new();
        let mut categories = BTreeSet::new();
        for row in rows {
            if provinces.insert(row.province_id) {
                self.upsert_province(&row.province())?;
            }
            if categories.insert(row.category_id) {
                self.upsert_category(&row.category())?;
            }
            self.insert_score(&row.record())?;
        }
        self.conn.execute(
            r#"
INSERT INTO import_history(source_path, content_hash, row_count, imported_at)
VALUES (?1, ?2, ?3, ?4)
"#,
            params![
                source_path,
                content_hash,
                rows.len() as i64,
                Utc::now().to_rfc3339()
            ],
        )?;
        tx.commit()?;

        Ok(ImportSummary {
            source_path: source_path.to_string(),
            content_hash: content_hash.to_string(),
            rows: rows.len(),
            provinces: provinces.len(),
            categories: categories.len(),
            replaced,
            skipped: false,
        })
    }
}
