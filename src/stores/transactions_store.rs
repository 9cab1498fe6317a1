use dioxus::prelude::*;
use gloo_storage::{LocalStorage, Storage};
use serde::{Deserialize, Serialize};

use crate::virtual_list::Filters;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirectionFilter {
    #[default]
    All,
    Credits,
    Debits,
}

impl DirectionFilter {
    pub const ALL: [DirectionFilter; 3] = [DirectionFilter::All, DirectionFilter::Credits, DirectionFilter::Debits];

    pub fn label(&self) -> &'static str {
        match self {
            DirectionFilter::All => "All",
            DirectionFilter::Credits => "Money in",
            DirectionFilter::Debits => "Money out",
        }
    }

    fn query_value(&self) -> Option<&'static str> {
        match self {
            DirectionFilter::All => None,
            DirectionFilter::Credits => Some("credit"),
            DirectionFilter::Debits => Some("debit"),
        }
    }
}

/// Filter chips shown above the transaction list
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionFilters {
    pub direction: DirectionFilter,
    #[serde(default)]
    pub pending_only: bool,
}

impl TransactionFilters {
    /// Filter map sent with every page request
    pub fn to_filters(&self) -> Filters {
        let mut filters = Filters::new();
        if let Some(direction) = self.direction.query_value() {
            filters.insert("direction".to_string(), direction.to_string());
        }
        if self.pending_only {
            filters.insert("status".to_string(), "pending".to_string());
        }
        filters
    }
}

/// Global filter state
pub static TRANSACTION_FILTERS: GlobalSignal<TransactionFilters> = Signal::global(TransactionFilters::default);

const STORAGE_KEY: &str = "ledgerscroll:filters";

/// Load the last used filters from localStorage
pub fn init_filters() {
    if let Ok(saved) = LocalStorage::get::<TransactionFilters>(STORAGE_KEY) {
        log::info!("Loaded transaction filters from storage: {:?}", saved);
        *TRANSACTION_FILTERS.write() = saved;
    }
}

fn update_filters(f: impl FnOnce(&mut TransactionFilters)) {
    let mut next = TRANSACTION_FILTERS.read().clone();
    f(&mut next);

    if *TRANSACTION_FILTERS.read() == next {
        return;
    }

    if let Err(e) = LocalStorage::set(STORAGE_KEY, &next) {
        log::warn!("Failed to save transaction filters: {}", e);
    }
    *TRANSACTION_FILTERS.write() = next;
}

pub fn set_direction_filter(direction: DirectionFilter) {
    update_filters(|filters| filters.direction = direction);
}

pub fn toggle_pending_only() {
    update_filters(|filters| filters.pending_only = !filters.pending_only);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sends_no_filters() {
        assert!(TransactionFilters::default().to_filters().is_empty());
    }

    #[test]
    fn test_filter_map() {
        let filters = TransactionFilters {
            direction: DirectionFilter::Debits,
            pending_only: true,
        }
        .to_filters();

        assert_eq!(filters.get("direction").map(String::as_str), Some("debit"));
        assert_eq!(filters.get("status").map(String::as_str), Some("pending"));
    }

    #[test]
    fn test_saved_filters_without_pending_flag() {
        let parsed: TransactionFilters = serde_json::from_str(r#"{"direction":"Credits"}"#).unwrap();
        assert_eq!(parsed.direction, DirectionFilter::Credits);
        assert!(!parsed.pending_only);
    }
}
