// Utility functions
// Helper functions for common operations

pub mod format;
pub mod time;

pub use format::{format_amount, format_count_compact, format_with_separator, truncate_text};
pub use time::{format_posted_date, parse_posted_at};
