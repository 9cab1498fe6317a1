//! Tunable constants for the virtual list engine.

/// Long-term capacity of the node pool
pub const RECYCLE_POOL_SIZE: usize = 40;

/// Rows rendered above/below the viewport
pub const DEFAULT_BUFFER_SIZE: usize = 5;

/// Records requested per page
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Configuration for windowing, loading and persistence behavior
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VirtualListConfig {
    /// Number of rows to render above/below the visible range
    pub buffer_size: usize,

    /// Maximum number of nodes the pool retains
    pub pool_capacity: usize,

    /// Range changes of at most this many rows on each side are ignored
    pub hysteresis_rows: usize,

    /// Records requested per page
    pub page_size: usize,

    /// Fraction of the scrollable distance that triggers a load (0.0 - 1.0)
    pub load_threshold_ratio: f64,

    /// Minimum time between two load starts (ms)
    pub min_load_delay_ms: u64,

    /// First retry delay; doubles on each further attempt (ms)
    pub retry_base_ms: u64,

    /// Automatic retries after the first attempt fails; the failure becomes
    /// terminal once all of them fail too
    pub max_retries: u32,

    /// Random jitter added to (or subtracted from) each retry delay (ms)
    pub retry_jitter_ms: u64,

    /// Trailing-edge debounce for scroll persistence (ms)
    pub persist_debounce_ms: u64,

    /// Offsets closer than this to the last persisted one are not written (px)
    pub persist_min_delta_px: f64,

    /// Scroll/resize handler throttle interval (ms)
    pub throttle_ms: u64,

    /// How long the "position restored" indicator stays visible (ms)
    pub restored_indicator_ms: u64,

    /// Root margin for the proximity sentinel observer (px)
    pub sentinel_root_margin_px: u32,
}

impl Default for VirtualListConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            pool_capacity: RECYCLE_POOL_SIZE,
            hysteresis_rows: 2,
            page_size: DEFAULT_PAGE_SIZE,
            load_threshold_ratio: 0.8,
            min_load_delay_ms: 300,
            retry_base_ms: 2000,
            max_retries: 3,
            retry_jitter_ms: 250,
            persist_debounce_ms: 500,
            persist_min_delta_px: 50.0,
            throttle_ms: 16,
            restored_indicator_ms: 2000,
            sentinel_root_margin_px: 300,
        }
    }
}

impl VirtualListConfig {
    /// Fetches made for one load before it fails terminally (first try plus retries)
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}
