use serde::{Deserialize, Serialize};

/// Default number of pending fills a buffered handle holds before flushing.
pub const DEFAULT_BUFFER_CAPACITY: usize = 1024;

/// Configuration for a [`BookStore`](crate::BookStore).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Allow `book`, `remove` and `clear` from threads other than the one
    /// that constructed the store.
    pub allow_cross_thread_booking: bool,
    /// Buffer capacity for `SharedBuffered` entries booked without one.
    pub default_buffer_capacity: usize,
    /// `store_on_exit` for entries booked without an explicit choice.
    pub store_on_exit_default: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            allow_cross_thread_booking: false,
            default_buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            store_on_exit_default: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = StoreConfig::default();
        assert!(!c.allow_cross_thread_booking);
        assert_eq!(c.default_buffer_capacity, 1024);
        assert!(!c.store_on_exit_default);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let c: StoreConfig = serde_json::from_str(r#"{"store_on_exit_default": true}"#).unwrap();
        assert!(c.store_on_exit_default);
        assert_eq!(c.default_buffer_capacity, DEFAULT_BUFFER_CAPACITY);
    }
}
