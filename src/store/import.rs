use std::io::Read;

use anyhow::{Context, Result};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::scoring::{Category, CategoryId, Province, ProvinceId};
use crate::source::ScoreRecord;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ImportRow {
    pub province_id: ProvinceId,
    pub province_name: String,
    pub category_id: CategoryId,
    pub category_name: String,
    pub year: i32,
    pub current_status_score: Option<f64>,
    pub trend_score: Option<f64>,
    pub attractiveness_score: Option<f64>,
    pub priority_score: Option<f64>,
}

impl ImportRow {
    pub fn province(&self) -> Province {
        Province {
            id: self.province_id,
            name: self.province_name.trim().to_string(),
        }
    }

    pub fn category(&self) -> Category {
        Category {
            id: self.category_id,
            name: self.category_name.trim().to_string(),
        }
    }

    pub fn record(&self) -> ScoreRecord {
        ScoreRecord {
            province_id: self.province_id,
            category_id: self.category_id,
            year: self.year,
            current_status_score: self.current_status_score,
            trend_score: self.trend_score,
            attractiveness_score: self.attractiveness_score,
            priority_score: self.priority_score,
        }
    }
}

pub fn read_import_rows<R: Read>(reader: R) -> Result<Vec<ImportRow>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut rows = Vec::new();
    for (idx, row) in csv_reader.deserialize::<ImportRow>().enumerate() {
        // header is line 1
        let row = row.with_context(|| format!("invalid score row at line {}", idx + 2))?;
        rows.push(row);
    }
    Ok(rows)
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
