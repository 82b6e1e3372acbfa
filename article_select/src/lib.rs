use serde::{Deserialize, Serialize};

pub mod catalog;
pub mod milp;

pub use catalog::{Catalog, DataError, Dimension, IncidenceMatrix};
pub use milp::{
    build_model, select_articles, ExtractionError, MicroLpSolver, MilpSolver, Model, ModelBuilder, ModelError,
    ScipCliSolver, SelectionError, SelectionReport, SolveResult, SolveStatus,
};

/// Article record as handed over by the loading layer, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: String,
    pub reporter: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub cost: f64,
    pub clicks: i64,
}

impl ItemRecord {
    pub fn new(id: &str, reporter: &str, kind: &str, cost: f64, clicks: i64) -> Self {
        Self {
            id: id.to_string(),
            reporter: Some(reporter.to_string()),
            kind: Some(kind.to_string()),
            cost,
            clicks,
        }
    }
}

/// Validated article. Immutable once it is part of a [`Catalog`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub reporter: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub cost: f64,
    pub clicks: u64,
}

fn default_overflow_penalty() -> f64 {
    100.0
}

fn default_repetition_reward() -> f64 {
    115.0
}

/// Tunable parameters of the selection model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Minimum total clicks over the selected articles.
    pub target_clicks: u64,
    /// Objective cost per article beyond the first one of a reporter.
    #[serde(default = "default_overflow_penalty")]
    pub overflow_penalty: f64,
    /// Objective reward per type that ends up with two or more articles.
    #[serde(default = "default_repetition_reward")]
    pub repetition_reward: f64,
}

impl SelectionConfig {
    pub fn new(target_clicks: u64) -> Self {
        Self {
            target_clicks,
            overflow_penalty: default_overflow_penalty(),
            repetition_reward: default_repetition_reward(),
        }
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_from_json() {
        let cfg = SelectionConfig::from_json(r#"{ "target_clicks": 4200 }"#).unwrap();
        assert_eq!(cfg, SelectionConfig::new(4200));
        assert_eq!(cfg.overflow_penalty, 100.0);
        assert_eq!(cfg.repetition_reward, 115.0);
    }

    #[test]
    fn test_config_overrides() {
        let cfg = SelectionConfig::from_json(
            r#"{ "target_clicks": 10, "overflow_penalty": 0, "repetition_reward": 1.5 }"#,
        )
        .unwrap();
        assert_eq!(cfg.overflow_penalty, 0.0);
        assert_eq!(cfg.repetition_reward, 1.5);
    }

    #[test]
    fn test_record_type_field_name() {
        let rec: ItemRecord = serde_json::from_str(
            r#"{ "id": "A1", "reporter": "X", "type": "P", "cost": 10, "clicks": 100 }"#,
        )
        .unwrap();
        assert_eq!(rec, ItemRecord::new("A1", "X", "P", 10.0, 100));

        let missing: ItemRecord =
            serde_json::from_str(r#"{ "id": "A2", "reporter": null, "type": "P", "cost": 1, "clicks": 1 }"#)
                .unwrap();
        assert!(missing.reporter.is_none());
    }
}
