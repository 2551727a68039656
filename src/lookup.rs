use serde::Serialize;

use crate::error::AggregationError;
use crate::scoring::{CategoryId, Province, ProvinceId};
use crate::source::{ScoreSource, YearlyScore};

pub const MIN_QUERY_CHARS: usize = 2;
pub const SEARCH_LIMIT: usize = 10;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProvinceHistory {
    pub province_id: ProvinceId,
    pub province_name: String,
    pub category_id: Option<CategoryId>,
    pub years: Vec<YearlyScore>,
}

pub fn fold_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .filter(|c| *c != '\u{307}')
        .map(|c| if c == 'ı' { 'i' } else { c })
        .collect()
}

/// Exact matches first, then prefix matches, then substring matches; ties
/// ordered by name.
pub fn rank_name_matches(provinces: &[Province], query: &str, limit: usize) -> Vec<Province> {
    let needle = fold_name(query);
    if needle.is_empty() {
        return Vec::new();
    }

    let mut matches = provinces
        .iter()
        .filter_map(|province| {
            let folded = fold_name(&province.name);
            let tier = if folded == needle {
                0
            } else if folded.starts_with(&needle) {
                1
            } else if folded.contains(&needle) {
                2
            } else {
                return None;
            };
            Some((tier, folded, province))
        })
        .collect::<Vec<_>>();
    matches.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    matches
        .into_iter()
        .take(limit)
        .map(|(_, _, province)| province.clone())
        .collect()
}

pub async fn search_provinces(
    source: &dyn ScoreSource,
    query: &str,
) -> Result<Vec<Province>, AggregationError> {
    let query = query.trim();
    if query.chars().count() < MIN_QUERY_CHARS {
        return Err(AggregationError::InvalidSearchQuery(format!(
            "at least {MIN_QUERY_CHARS} characters required, got `{query}`"
        )));
    }
    source
        .search_provinces(query, SEARCH_LIMIT)
        .await
        .map_err(AggregationError::UpstreamFetchFailure)
}

/// Accepts either a numeric id or an exact (case-folded) province name.
pub async fn resolve_province(
    source: &dyn ScoreSource,
    key: &str,
) -> Result<Province, AggregationError> {
    let key = key.trim();
    let provinces = source
        .provinces()
        .await
        .map_err(AggregationError::UpstreamFetchFailure)?;

    if let Ok(id) = key.parse::<ProvinceId>() {
        return provinces
            .into_iter()
            .find(|p| p.id == id)
            .ok_or(AggregationError::ProvinceNotFound(id));
    }
    let folded = fold_name(key);
    provinces
        .into_iter()
        .find(|p| fold_name(&p.name) == folded)
        .ok_or_else(|| AggregationError::UnknownProvinceName(key.to_string()))
}

pub async fn province_history(
    source: &dyn ScoreSource,
    key: &str,
    category: Option<CategoryId>,
) -> Result<ProvinceHistory, AggregationError> {
    let province = resolve_province(source, key).await?;
    let mut years = source
        .province_history(province.id)
        .await
        .map_err(AggregationError::UpstreamFetchFailure)?;
    if let Some(category) = category {
        years.retain(|entry| entry.category_id == category);
    }
    Ok(ProvinceHistory {
        province_id: province.id,
        province_name: province.name,
        category_id: category,
        years,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::memory::InMemoryScoreSource;
    use crate::source::ScoreRecord;

    fn province(id: ProvinceId, name: &str) -> Province {
        Province {
            id,
            name: name.to_string(),
        }
    }

    fn catalog() -> Vec<Province> {
        vec![
            province(6, "Ankara"),
            province(7, "Antalya"),
            province(34, "İstanbul"),
            province(35, "İzmir"),
            province(55, "Samsun"),
            province(76, "Iğdır"),
        ]
    }

    fn record(province_id: ProvinceId, category_id: CategoryId, year: i32, priority: f64) -> ScoreRecord {
        ScoreRecord {
            province_id,
            category_id,
            year,
            current_status_score: None,
            trend_score: None,
            attractiveness_score: None,
            priority_score: Some(priority),
        }
    }

    fn source() -> InMemoryScoreSource {
        InMemoryScoreSource::new(
            catalog(),
            Vec::new(),
            vec![
                record(34, 1, 2021, 60.0),
                record(34, 1, 2023, 80.0),
                record(34, 2, 2023, 40.0),
                record(6, 1, 2023, 50.0),
            ],
        )
    }

    #[test]
    fn folding_handles_dotted_capitals() {
        assert_eq!(fold_name(" İstanbul "), "istanbul");
        assert_eq!(fold_name("IĞDIR"), fold_name("iğdır"));
    }

    #[test]
    fn exact_then_prefix_then_substring() {
        let mut provinces = catalog();
        provinces.push(province(90, "Ankaralı"));
        provinces.push(province(91, "Yeni Ankara"));
        let names: Vec<String> = rank_name_matches(&provinces, "ankara", 10)
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Ankara", "Ankaralı", "Yeni Ankara"]);
    }

    #[test]
    fn matches_are_capped() {
        let names: Vec<ProvinceId> = rank_name_matches(&catalog(), "an", 2)
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(names, vec![6, 7]);
    }

    #[tokio::test]
    async fn short_query_is_rejected() {
        let err = search_provinces(&source(), " a ").await.unwrap_err();
        assert!(matches!(err, AggregationError::InvalidSearchQuery(_)));
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn search_ignores_case() {
        let found = search_provinces(&source(), "istan").await.unwrap();
        assert_eq!(found, vec![province(34, "İstanbul")]);
    }

    #[tokio::test]
    async fn resolves_by_id_or_name() {
        let source = source();
        assert_eq!(resolve_province(&source, "35").await.unwrap().name, "İzmir");
        assert_eq!(resolve_province(&source, "izmir").await.unwrap().id, 35);
        assert!(matches!(
            resolve_province(&source, "82").await,
            Err(AggregationError::ProvinceNotFound(82))
        ));
        assert!(matches!(
            resolve_province(&source, "Atlantis").await,
            Err(AggregationError::UnknownProvinceName(_))
        ));
        // a name is matched exactly, not as a prefix
        assert!(resolve_province(&source, "Ank").await.is_err());
    }

    #[tokio::test]
    async fn history_lists_all_years() {
        let history = province_history(&source(), "istanbul", None).await.unwrap();
        assert_eq!(history.province_id, 34);
        let keys: Vec<(i32, CategoryId)> = history.years.iter().map(|y| (y.year, y.category_id)).collect();
        assert_eq!(keys, vec![(2021, 1), (2023, 1), (2023, 2)]);
        assert_eq!(history.years[0].scores.priority, Some(0.6));

        let filtered = province_history(&source(), "34", Some(2)).await.unwrap();
        assert_eq!(filtered.years.len(), 1);
        assert_eq!(filtered.category_id, Some(2));
    }

    #[tokio::test]
    async fn history_of_province_without_rows_is_empty() {
        let history = province_history(&source(), "Samsun", None).await.unwrap();
        assert!(history.years.is_empty());
    }
}
