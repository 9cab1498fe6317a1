// External services
// HTTP clients for the backends the app talks to

pub mod transactions_api;

pub use transactions_api::{HttpRecordSource, DEFAULT_LIST_CONTEXT, TRANSACTIONS_API_BASE};
