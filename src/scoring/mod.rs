pub mod blend;
pub mod ranking;
pub mod weights;

use std::collections::{BTreeMap, HashMap};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

pub type ProvinceId = u32;
pub type CategoryId = u32;

pub type ProvinceScores = BTreeMap<CategoryId, CategoryScoreTuple>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Sector {
    #[default]
    #[serde(alias = "kamu")]
    Public,
    #[serde(alias = "ozel", alias = "özel")]
    Private,
}

impl Sector {
    pub const ALL: [Sector; 2] = [Sector::Public, Sector::Private];

    pub fn as_slug(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }
}

impl Display for Sector {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let display = match self {
            Self::Public => "Public",
            Self::Private => "Private",
        };
        write!(f, "{display}")
    }
}

#[derive(Debug, Error)]
#[error("unknown sector: {0} (expected public or private)")]
pub struct SectorParseError(pub String);

impl FromStr for Sector {
    type Err = SectorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        match normalized.as_str() {
            "public" | "kamu" => Ok(Self::Public),
            "private" | "ozel" | "özel" => Ok(Self::Private),
            _ => Err(SectorParseError(s.to_string())),
        }
    }
}

/// Unit scale. `None` means no row; a stored zero is a real observation.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryScoreTuple {
    pub current_status: Option<f64>,
    pub trend: Option<f64>,
    pub attractiveness: Option<f64>,
    pub priority: Option<f64>,
}

impl CategoryScoreTuple {
    pub fn from_percent(
        current_status: Option<f64>,
        trend: Option<f64>,
        attractiveness: Option<f64>,
        priority: Option<f64>,
    ) -> Self {
        Self {
            current_status: percent_to_unit(current_status),
            trend: percent_to_unit(trend),
            attractiveness: percent_to_unit(attractiveness),
            priority: percent_to_unit(priority),
        }
    }

    pub fn primary(&self, sector: Sector) -> Option<f64> {
        match sector {
            Sector::Public => self.priority,
            Sector::Private => self.attractiveness,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.current_status.is_none()
            && self.trend.is_none()
            && self.attractiveness.is_none()
            && self.priority.is_none()
    }
}

pub fn percent_to_unit(value: Option<f64>) -> Option<f64> {
    value
        .filter(|v| v.is_finite())
        .map(|v| (v / 100.0).clamp(0.0, 1.0))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Province {
    pub id: ProvinceId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

/// The last entry is the balancer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryWeights {
    entries: Vec<(CategoryId, f64)>,
}

impl CategoryWeights {
    pub fn from_entries(entries: Vec<(CategoryId, f64)>) -> Self {
        Self { entries }
    }

    pub fn get(&self, id: CategoryId) -> Option<f64> {
        self.entries
            .iter()
            .find(|(candidate, _)| *candidate == id)
            .map(|(_, weight)| *weight)
    }

    pub fn ids(&self) -> Vec<CategoryId> {
        self.entries.iter().map(|(id, _)| *id).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CategoryId, f64)> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn sum(&self) -> f64 {
        self.entries.iter().map(|(_, weight)| weight).sum()
    }

    pub fn balancer(&self) -> Option<CategoryId> {
        self.entries.last().map(|(id, _)| *id)
    }

    pub fn to_map(&self) -> HashMap<CategoryId, f64> {
        self.entries.iter().copied().collect()
    }
}

impl Serialize for CategoryWeights {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, weight) in &self.entries {
            map.serialize_entry(&id.to_string(), weight)?;
        }
        map.end()
    }
}

#[derive(Debug, Error)]
#[error("invalid id list `{raw}`: {reason}")]
pub struct IdListParseError {
    pub raw: String,
    pub reason: String,
}

pub fn parse_id_list(raw: &str) -> Result<Vec<u32>, IdListParseError> {
    let mut out = Vec::new();
    for piece in raw.split(',') {
        let trimmed = piece.trim();
        if trimmed.is_empty() {
            continue;
        }
        let id = trimmed.parse::<u32>().map_err(|e| IdListParseError {
            raw: raw.to_string(),
            reason: format!("`{trimmed}` is not an id ({e})"),
        })?;
        out.push(id);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sector_accepts_legacy_spellings() {
        assert_eq!("kamu".parse::<Sector>().unwrap(), Sector::Public);
        assert_eq!(" Private ".parse::<Sector>().unwrap(), Sector::Private);
        assert_eq!("özel".parse::<Sector>().unwrap(), Sector::Private);
        assert!("mixed".parse::<Sector>().is_err());
        let parsed: Sector = serde_json::from_str("\"ozel\"").unwrap();
        assert_eq!(parsed, Sector::Private);
        assert_eq!(serde_json::to_string(&Sector::Public).unwrap(), "\"public\"");
    }

    #[test]
    fn percent_scale_zero_is_an_observation() {
        let tuple = CategoryScoreTuple::from_percent(Some(0.0), None, Some(150.0), Some(42.0));
        assert_eq!(tuple.current_status, Some(0.0));
        assert_eq!(tuple.trend, None);
        assert_eq!(tuple.attractiveness, Some(1.0));
        assert_eq!(tuple.priority, Some(0.42));
        assert_eq!(tuple.primary(Sector::Public), Some(0.42));
        assert_eq!(tuple.primary(Sector::Private), Some(1.0));
    }

    #[test]
    fn nan_scores_become_missing() {
        let tuple = CategoryScoreTuple::from_percent(Some(f64::NAN), None, None, None);
        assert!(tuple.is_empty());
    }

    #[test]
    fn weights_serialize_in_selection_order() {
        let weights = CategoryWeights::from_entries(vec![(9, 0.5), (2, 0.25), (4, 0.25)]);
        let json = serde_json::to_string(&weights).unwrap();
        assert_eq!(json, r#"{"9":0.5,"2":0.25,"4":0.25}"#);
        assert_eq!(weights.balancer(), Some(4));
    }

    #[test]
    fn id_list_keeps_duplicates_and_rejects_garbage() {
        assert_eq!(parse_id_list("3, 1,3,").unwrap(), vec![3, 1, 3]);
        assert!(parse_id_list("1,x").is_err());
    }
}
