//! Windowing and row recycling for very long, incrementally loaded lists.
//!
//! Only the rows inside a buffered window around the viewport own a display
//! node; nodes are recycled through a bounded pool as the window moves.
//! Pages are fetched with cursor pagination as the viewport nears the end of
//! the loaded rows, and the scroll position survives reloads.
//!
//! The engine is platform-neutral. `web` binds it to the browser DOM.

pub mod clock;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod geometry;
pub mod loader;
pub mod persistence;
pub mod pool;
pub mod scheduler;
pub mod store;
pub mod window;

#[cfg(target_arch = "wasm32")]
pub mod web;

#[cfg(test)]
mod testing;

pub use clock::{Clock, SystemClock};
pub use config::{VirtualListConfig, DEFAULT_BUFFER_SIZE, DEFAULT_PAGE_SIZE, RECYCLE_POOL_SIZE};
pub use coordinator::{ListController, ListDeps, ListStatus, ListenerRegistry, Spawner, ViewportHost};
pub use error::LoadError;
pub use geometry::{compute_dimensions, Dimensions, WindowMode};
pub use loader::{Filters, LoadOutcome, LoadTrigger, PageRequest, RecordPage, RecordSource};
pub use persistence::{MemoryStateStore, PersistedScrollState, ScrollStateStore};
pub use pool::{NodeHandle, NodePool, PoolStats, RowNode};
pub use store::{RecordStore, TransactionRecord};
pub use window::{compute_window, RenderWindow, RowRenderer};
