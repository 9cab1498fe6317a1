// UI Components
// This module contains all reusable UI components

pub mod transaction_list;
pub mod transaction_row;

pub use transaction_list::TransactionList;
pub use transaction_row::{Direction, RowCells};
