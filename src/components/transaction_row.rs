use crate::utils::format::{format_amount, truncate_text};
use crate::utils::time::format_posted_date;
use crate::virtual_list::TransactionRecord;

const DESCRIPTION_MAX_CHARS: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Credit,
    Debit,
}

impl Direction {
    pub fn css_class(&self) -> &'static str {
        match self {
            Direction::Credit => "tx-row__amount tx-row__amount--credit",
            Direction::Debit => "tx-row__amount tx-row__amount--debit",
        }
    }
}

/// Display strings for one transaction row.
///
/// Missing fields render as empty cells; the record is never validated here.
#[derive(Clone, Debug, PartialEq)]
pub struct RowCells {
    pub date: String,
    pub description: String,
    pub category: String,
    pub amount: String,
    pub direction: Direction,
    pub pending: bool,
}

impl RowCells {
    pub fn from_record(record: &TransactionRecord) -> Self {
        let minor_units = record.field("amount").and_then(|v| v.as_i64()).unwrap_or(0);
        let currency = record.str_field("currency").unwrap_or("USD");
        let description = record
            .str_field("description")
            .or_else(|| record.str_field("merchant"))
            .unwrap_or("");

        Self {
            date: format_posted_date(record.field("postedAt")),
            description: truncate_text(description, DESCRIPTION_MAX_CHARS),
            category: record.str_field("category").unwrap_or("").to_string(),
            amount: format_amount(minor_units, currency),
            direction: if minor_units < 0 { Direction::Debit } else { Direction::Credit },
            pending: record.str_field("status") == Some("pending"),
        }
    }
}
