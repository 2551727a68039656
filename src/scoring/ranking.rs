use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::scoring::ProvinceId;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RankedProvince {
    pub province_id: ProvinceId,
    pub blended_score: f64,
    pub rank: usize,
    pub data_available: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredProvince {
    pub province_id: ProvinceId,
    pub blended_score: f64,
    pub data_available: bool,
}

// rank = 1 + count(strictly higher), so [0.9, 0.9, 0.5] ranks as [1, 1, 3]
pub fn rank_provinces(mut scored: Vec<ScoredProvince>) -> Vec<RankedProvince> {
    scored.sort_by(compare_scored);

    let mut out = Vec::with_capacity(scored.len());
    let mut previous: Option<(f64, usize)> = None;
    for (idx, entry) in scored.into_iter().enumerate() {
        let rank = match previous {
            Some((score, rank)) if score == entry.blended_score => rank,
            _ => idx + 1,
        };
        previous = Some((entry.blended_score, rank));
        out.push(RankedProvince {
            province_id: entry.province_id,
            blended_score: entry.blended_score,
            rank,
            data_available: entry.data_available,
        });
    }
    out
}

pub fn rank_of(ranking: &[RankedProvince], province_id: ProvinceId) -> Option<usize> {
    ranking
        .iter()
        .find(|entry| entry.province_id == province_id)
        .map(|entry| entry.rank)
}

fn compare_scored(a: &ScoredProvince, b: &ScoredProvince) -> Ordering {
    b.blended_score
        .total_cmp(&a.blended_score)
        .then_with(|| a.province_id.cmp(&b.province_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(province_id: ProvinceId, blended_score: f64) -> ScoredProvince {
        ScoredProvince {
            province_id,
            blended_score,
            data_available: true,
        }
    }

    #[test]
    fn ties_share_the_best_rank() {
        let ranking = rank_provinces(vec![scored(1, 0.9), scored(2, 0.9), scored(3, 0.5)]);
        let ranks: Vec<usize> = ranking.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 1, 3]);
    }

    #[test]
    fn ties_are_listed_by_province_id() {
        let ranking = rank_provinces(vec![scored(34, 0.7), scored(6, 0.7), scored(35, 0.8)]);
        let order: Vec<ProvinceId> = ranking.iter().map(|r| r.province_id).collect();
        assert_eq!(order, vec![35, 6, 34]);
        assert_eq!(rank_of(&ranking, 34), Some(2));
        assert_eq!(rank_of(&ranking, 6), Some(2));
        assert_eq!(rank_of(&ranking, 99), None);
    }

    #[test]
    fn empty_input_yields_empty_ranking() {
        assert!(rank_provinces(Vec::new()).is_empty());
    }
}
