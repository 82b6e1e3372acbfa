//! Validated article catalog and its incidence structures.
//!
//! Every item belongs to exactly one reporter and exactly one type, so each
//! dimension partitions the item set. The incidence is stored as adjacency
//! lists over integer ids: per item its category index, per category its
//! member items.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::{Item, ItemRecord};

/// Malformed input detected while loading the catalog.
#[derive(Debug, Error, PartialEq)]
pub enum DataError {
    #[error("no items to select from")]
    NoItems,
    /// Position of the offending record in the input sequence.
    #[error("record #{0} has an empty id")]
    EmptyId(usize),
    #[error("duplicate item id `{0}`")]
    DuplicateId(String),
    #[error("item `{id}` has a missing or empty {field}")]
    MissingField { id: String, field: &'static str },
    #[error("item `{id}` has invalid cost {cost}")]
    InvalidCost { id: String, cost: f64 },
    #[error("item `{id}` has negative clicks {clicks}")]
    NegativeClicks { id: String, clicks: i64 },
}

/// Categorical dimension an incidence matrix is built over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dimension {
    Reporter,
    Type,
}

impl Dimension {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Reporter => "reporter",
            Dimension::Type => "type",
        }
    }
}

/// Sparse 0/1 membership of items in the categories of one dimension.
#[derive(Debug, Clone)]
pub struct IncidenceMatrix {
    /// distinct category values, first-appearance order
    values: Vec<String>,
    /// item index -> category index
    category_of: Vec<usize>,
    /// category index -> item indices, ascending
    members: Vec<Vec<usize>>,
}

impl IncidenceMatrix {
    fn build<'a>(keys: impl Iterator<Item = &'a str>) -> Self {
        let mut values: Vec<String> = vec![];
        let mut index: HashMap<&'a str, usize> = HashMap::new();
        let mut category_of = vec![];
        let mut members: Vec<Vec<usize>> = vec![];

        for (item, key) in keys.enumerate() {
            let cat = *index.entry(key).or_insert_with(|| {
                values.push(key.to_string());
                members.push(vec![]);
                values.len() - 1
            });
            category_of.push(cat);
            members[cat].push(item);
        }

        Self {
            values,
            category_of,
            members,
        }
    }

    /// Distinct category values.
    pub fn categories(&self) -> &[String] {
        &self.values
    }

    pub fn category_count(&self) -> usize {
        self.values.len()
    }

    /// Incidence entry: 1 iff `item` belongs to `category`.
    pub fn get(&self, item: usize, category: usize) -> u8 {
        u8::from(self.category_of.get(item) == Some(&category))
    }

    /// Sum of the item's row over all categories. Always 1 for a loaded item.
    pub fn row_sum(&self, item: usize) -> u32 {
        (0..self.category_count())
            .map(|c| u32::from(self.get(item, c)))
            .sum()
    }

    pub fn category_of(&self, item: usize) -> usize {
        self.category_of[item]
    }

    /// Items whose incidence with `category` is 1.
    pub fn members(&self, category: usize) -> &[usize] {
        &self.members[category]
    }

    pub fn index_of(&self, value: &str) -> Option<usize> {
        self.values.iter().position(|v| v == value)
    }
}

/// Loaded, validated set of articles plus the reporter and type incidence.
#[derive(Debug, Clone)]
pub struct Catalog {
    items: Vec<Item>,
    by_reporter: IncidenceMatrix,
    by_type: IncidenceMatrix,
}

impl Catalog {
    pub fn new(records: impl IntoIterator<Item = ItemRecord>) -> Result<Self, DataError> {
        let mut items = vec![];
        let mut seen: HashSet<String> = HashSet::new();
        for (pos, rec) in records.into_iter().enumerate() {
            let item = validate_record(pos, rec)?;
            if !seen.insert(item.id.clone()) {
                return Err(DataError::DuplicateId(item.id));
            }
            items.push(item);
        }
        if items.is_empty() {
            return Err(DataError::NoItems);
        }

        let by_reporter = IncidenceMatrix::build(items.iter().map(|i| i.reporter.as_str()));
        let by_type = IncidenceMatrix::build(items.iter().map(|i| i.kind.as_str()));

        debug!(
            items = items.len(),
            reporters = by_reporter.category_count(),
            types = by_type.category_count(),
            "catalog loaded"
        );

        Ok(Self {
            items,
            by_reporter,
            by_type,
        })
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn reporters(&self) -> &[String] {
        self.by_reporter.categories()
    }

    pub fn types(&self) -> &[String] {
        self.by_type.categories()
    }

    pub fn by_reporter(&self) -> &IncidenceMatrix {
        &self.by_reporter
    }

    pub fn by_type(&self) -> &IncidenceMatrix {
        &self.by_type
    }

    pub fn incidence(&self, dimension: Dimension) -> &IncidenceMatrix {
        match dimension {
            Dimension::Reporter => &self.by_reporter,
            Dimension::Type => &self.by_type,
        }
    }

    pub fn total_clicks(&self) -> u64 {
        self.items.iter().map(|i| i.clicks).sum()
    }
}

fn validate_record(pos: usize, rec: ItemRecord) -> Result<Item, DataError> {
    if rec.id.trim().is_empty() {
        return Err(DataError::EmptyId(pos));
    }
    let id = rec.id;

    let reporter = non_blank(rec.reporter).ok_or_else(|| DataError::MissingField {
        id: id.clone(),
        field: "reporter",
    })?;
    let kind = non_blank(rec.kind).ok_or_else(|| DataError::MissingField {
        id: id.clone(),
        field: "type",
    })?;
    if !rec.cost.is_finite() || rec.cost < 0.0 {
        return Err(DataError::InvalidCost { id, cost: rec.cost });
    }
    let clicks = u64::try_from(rec.clicks).map_err(|_| DataError::NegativeClicks {
        id: id.clone(),
        clicks: rec.clicks,
    })?;

    Ok(Item {
        id,
        reporter,
        kind,
        cost: rec.cost,
        clicks,
    })
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}
