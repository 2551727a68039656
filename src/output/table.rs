use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};

use crate::aggregator::{ProvinceAggregateScore, RankingReport};
use crate::compare::ProvinceComparison;
use crate::lookup::ProvinceHistory;
use crate::scoring::weights::WeightSummary;
use crate::scoring::{Category, CategoryId, Province};
use crate::store::ImportSummary;

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn score_text(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.3}"))
        .unwrap_or_else(|| "-".to_string())
}

fn category_label(categories: &[Category], id: CategoryId) -> String {
    categories
        .iter()
        .find(|c| c.id == id)
        .map(|c| format!("{} ({id})", c.name))
        .unwrap_or_else(|| id.to_string())
}

pub fn render_ranking_table(report: &RankingReport, top: Option<usize>) -> String {
    let mut table = new_table();
    table.set_header(vec!["Rank", "Province", "Name", "Blended Score", "Data"]);

    let limit = top.unwrap_or(report.provinces.len());
    for entry in report.provinces.iter().take(limit) {
        let data_cell = if entry.data_available {
            Cell::new("yes").fg(Color::Green)
        } else {
            Cell::new("no data").fg(Color::DarkGrey)
        };
        table.add_row(Row::from(vec![
            Cell::new(entry.rank),
            Cell::new(entry.province_id),
            Cell::new(&entry.province_name),
            Cell::new(format!("{:.3}", entry.blended_score)),
            data_cell,
        ]));
    }
    table.to_string()
}

pub fn render_province_table(score: &ProvinceAggregateScore, categories: &[Category]) -> String {
    let mut summary = new_table();
    summary.set_header(vec!["Province", "Sector", "Blended Score", "Rank", "Data"]);
    let data_cell = if score.data_available {
        Cell::new("yes").fg(Color::Green)
    } else {
        Cell::new("no data").fg(Color::Red)
    };
    summary.add_row(Row::from(vec![
        Cell::new(format!("{} ({})", score.province_name, score.province_id)),
        Cell::new(score.sector.to_string()),
        Cell::new(format!("{:.3}", score.blended_score)),
        Cell::new(format!("{}/{}", score.rank, score.total_provinces)),
        data_cell,
    ]));

    let mut breakdown = new_table();
    breakdown.set_header(vec!["Category", "Raw Score", "Weight", "Weighted"]);
    for entry in &score.per_category {
        breakdown.add_row(vec![
            category_label(categories, entry.category_id),
            score_text(entry.raw_score),
            format!("{:.3}", entry.weight),
            format!("{:.3}", entry.weighted_score),
        ]);
    }

    let mut composite = new_table();
    composite.set_header(vec!["Current Status", "Trend", "Potential"]);
    composite.add_row(vec![
        format!("{:.3}", score.composite.current_status),
        format!("{:.3}", score.composite.trend),
        format!("{:.3}", score.composite.potential),
    ]);

    format!("{summary}\n{breakdown}\n{composite}")
}

pub fn render_weights_table(summary: &WeightSummary, categories: &[Category]) -> String {
    let mut table = new_table();
    table.set_header(vec!["Category", "Weight", "Role"]);
    for (id, weight) in summary.weights.iter() {
        let role = if summary.balancer == Some(id) {
            Cell::new("balancer").fg(Color::Yellow)
        } else {
            Cell::new("")
        };
        table.add_row(Row::from(vec![
            Cell::new(category_label(categories, id)),
            Cell::new(format!("{weight:.4}")),
            role,
        ]));
    }
    table.add_row(vec![
        "Total".to_string(),
        format!("{:.4}", summary.total),
        format!(
            "bounds [{:.2}, {:.2}]",
            summary.min_weight, summary.max_weight
        ),
    ]);
    table.to_string()
}

pub fn render_comparison_table(cmp: &ProvinceComparison) -> String {
    let mut table = new_table();
    table.set_header(vec![
        "Field".to_string(),
        cmp.left.province_name.clone(),
        cmp.right.province_name.clone(),
        "Difference".to_string(),
    ]);
    for field in &cmp.fields {
        let diff_cell = match field.difference {
            Some(d) if d > 0.0 => Cell::new(format!("+{d:.3}")).fg(Color::Green),
            Some(d) if d < 0.0 => Cell::new(format!("{d:.3}")).fg(Color::Red),
            Some(d) => Cell::new(format!("{d:.3}")),
            None => Cell::new("-"),
        };
        table.add_row(Row::from(vec![
            Cell::new(field.field.label()),
            Cell::new(score_text(field.left)),
            Cell::new(score_text(field.right)),
            diff_cell,
        ]));
    }
    table.add_row(vec![
        "Overall".to_string(),
        score_text(cmp.left.overall),
        score_text(cmp.right.overall),
        String::new(),
    ]);
    let leader = match cmp.leader {
        Some(id) if id == cmp.left.province_id => cmp.left.province_name.clone(),
        Some(_) => cmp.right.province_name.clone(),
        None => "-".to_string(),
    };
    table.add_row(vec![
        format!("Leader ({})", cmp.sector),
        leader,
        String::new(),
        String::new(),
    ]);
    table.to_string()
}

pub fn render_provinces_table(provinces: &[Province]) -> String {
    let mut table = new_table();
    table.set_header(vec!["Id", "Province"]);
    for p in provinces {
        table.add_row(vec![p.id.to_string(), p.name.clone()]);
    }
    table.to_string()
}

pub fn render_categories_table(categories: &[Category]) -> String {
    let mut table = new_table();
    table.set_header(vec!["Id", "Category"]);
    for c in categories {
        table.add_row(vec![c.id.to_string(), c.name.clone()]);
    }
    table.to_string()
}

pub fn render_history_table(history: &ProvinceHistory, categories: &[Category]) -> String {
    let mut table = new_table();
    table.set_header(vec![
        "Year",
        "Category",
        "Current Status",
        "Trend",
        "Attractiveness",
        "Priority",
    ]);
    for entry in &history.years {
        table.add_row(vec![
            entry.year.to_string(),
            category_label(categories, entry.category_id),
            score_text(entry.scores.current_status),
            score_text(entry.scores.trend),
            score_text(entry.scores.attractiveness),
            score_text(entry.scores.priority),
        ]);
    }
    format!(
        "{} ({})\n{table}",
        history.province_name, history.province_id
    )
}

pub fn render_import_table(summary: &ImportSummary) -> String {
    let mut table = new_table();
    table.set_header(vec!["File", "Rows", "Provinces", "Categories", "Status"]);
    let status = if summary.skipped {
        Cell::new("already imported").fg(Color::Yellow)
    } else {
        Cell::new("imported").fg(Color::Green)
    };
    table.add_row(Row::from(vec![
        Cell::new(&summary.source_path),
        Cell::new(summary.rows),
        Cell::new(summary.provinces),
        Cell::new(summary.categories),
        status,
    ]));
    table.to_string()
}
