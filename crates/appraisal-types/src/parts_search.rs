use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::value::{lenient_f64, lenient_string};

/// One catalogue hit returned by a parts search.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartResult {
    pub id: String,
    pub name: String,
    #[serde(alias = "desc")]
    pub description: String,
    #[serde(alias = "oem_code", deserialize_with = "lenient_string")]
    pub part_number: String,
    #[serde(alias = "unit_price", deserialize_with = "lenient_f64")]
    pub price: f64,
    pub source: String,
    pub supplier: String,
    pub condition: String,
}

/// A past search, kept for the history panel and the summary counters.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchRecord {
    pub id: String,
    pub query: Value,
    pub results_count: usize,
}

/// Running counters over the whole parts-search session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSummary {
    pub total_searches: u64,
    pub total_results: u64,
    pub selected_count: usize,
    pub estimated_cost: f64,
    pub last_search: String,
}

/// The `partsSearch` section.
///
/// `selected` and `unselected` partition the known results: a part id is
/// in at most one of them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartsSearch {
    pub selected: Vec<PartResult>,
    #[serde(alias = "unselected_parts")]
    pub unselected: Vec<PartResult>,
    #[serde(alias = "search_history")]
    pub history: Vec<SearchRecord>,
    pub summary: SearchSummary,
}

impl PartsSearch {
    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.iter().any(|p| p.id == id)
    }

    pub fn is_unselected(&self, id: &str) -> bool {
        self.unselected.iter().any(|p| p.id == id)
    }

    pub fn has_search(&self, search_id: &str) -> bool {
        self.history.iter().any(|h| h.id == search_id)
    }

    /// Recompute the derived summary fields from the two lists.
    pub fn refresh_summary(&mut self) {
        self.summary.selected_count = self.selected.len();
        let cost: f64 = self.selected.iter().map(|p| p.price).sum();
        self.summary.estimated_cost = (cost * 100.0).round() / 100.0;
    }
}
