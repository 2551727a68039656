use anyhow::Result;

use crate::aggregator::{ProvinceAggregateScore, RankingReport};
use crate::compare::ProvinceComparison;
use crate::lookup::ProvinceHistory;
use crate::scoring::weights::WeightSummary;
use crate::scoring::{Category, Province};

fn optional(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.4}")).unwrap_or_default()
}

pub fn ranking_to_csv(report: &RankingReport, top: Option<usize>) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "rank",
        "province_id",
        "province_name",
        "blended_score",
        "data_available",
    ])?;
    let limit = top.unwrap_or(report.provinces.len());
    for entry in report.provinces.iter().take(limit) {
        writer.write_record([
            entry.rank.to_string(),
            entry.province_id.to_string(),
            entry.province_name.clone(),
            format!("{:.4}", entry.blended_score),
            entry.data_available.to_string(),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

pub fn province_to_csv(score: &ProvinceAggregateScore) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "province_id",
        "province_name",
        "sector",
        "blended_score",
        "rank",
        "total_provinces",
        "data_available",
        "category_id",
        "raw_score",
        "weight",
        "weighted_score",
    ])?;
    for entry in &score.per_category {
        writer.write_record([
            score.province_id.to_string(),
            score.province_name.clone(),
            score.sector.as_slug().to_string(),
            format!("{:.4}", score.blended_score),
            score.rank.to_string(),
            score.total_provinces.to_string(),
            score.data_available.to_string(),
            entry.category_id.to_string(),
            optional(entry.raw_score),
            format!("{:.4}", entry.weight),
            format!("{:.4}", entry.weighted_score),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

pub fn weights_to_csv(summary: &WeightSummary) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(["category_id", "weight", "balancer"])?;
    for (id, weight) in summary.weights.iter() {
        writer.write_record([
            id.to_string(),
            format!("{weight:.4}"),
            (summary.balancer == Some(id)).to_string(),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

pub fn comparison_to_csv(cmp: &ProvinceComparison) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "field",
        "left_province_id",
        "left",
        "right_province_id",
        "right",
        "difference",
    ])?;
    for field in &cmp.fields {
        writer.write_record([
            field.field.label().to_string(),
            cmp.left.province_id.to_string(),
            optional(field.left),
            cmp.right.province_id.to_string(),
            optional(field.right),
            optional(field.difference),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

pub fn history_to_csv(history: &ProvinceHistory) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "province_id",
        "province_name",
        "year",
        "category_id",
        "current_status",
        "trend",
        "attractiveness",
        "priority",
    ])?;
    for entry in &history.years {
        writer.write_record([
            history.province_id.to_string(),
            history.province_name.clone(),
            entry.year.to_string(),
            entry.category_id.to_string(),
            optional(entry.scores.current_status),
            optional(entry.scores.trend),
            optional(entry.scores.attractiveness),
            optional(entry.scores.priority),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

pub fn provinces_to_csv(provinces: &[Province]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(["province_id", "province_name"])?;
    for p in provinces {
        writer.write_record([p.id.to_string(), p.name.clone()])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

pub fn categories_to_csv(categories: &[Category]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(["category_id", "category_name"])?;
    for c in categories {
        writer.write_record([c.id.to_string(), c.name.clone()])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::weights::normalize_weights;
    use crate::scoring::CategoryScoreTuple;
    use crate::source::YearlyScore;
    use std::collections::HashMap;

    #[test]
    fn weights_csv_flags_balancer() {
        let weights = normalize_weights(&[5, 9], &HashMap::from([(5, 0.75)])).unwrap();
        let csv = weights_to_csv(&WeightSummary::new(weights)).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "category_id,weight,balancer");
        assert_eq!(lines[1], "5,0.7500,false");
        assert_eq!(lines[2], "9,0.2500,true");
    }

    #[test]
    fn history_csv_leaves_missing_fields_empty() {
        let history = ProvinceHistory {
            province_id: 6,
            province_name: "Ankara".to_string(),
            category_id: Some(1),
            years: vec![YearlyScore {
                year: 2023,
                category_id: 1,
                scores: CategoryScoreTuple {
                    trend: Some(0.25),
                    ..CategoryScoreTuple::default()
                },
            }],
        };
        let csv = history_to_csv(&history).unwrap();
        assert_eq!(csv.lines().nth(1), Some("6,Ankara,2023,1,,0.2500,,"));
    }

    #[test]
    fn province_names_are_quoted_when_needed() {
        let csv = provinces_to_csv(&[Province {
            id: 1,
            name: "Adana, TR".to_string(),
        }])
        .unwrap();
        assert!(csv.contains("\"Adana, TR\""));
    }
}
