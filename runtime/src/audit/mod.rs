//! Operator review queue.

pub mod logger;

pub use logger::{read_events, ReviewEvent, ReviewKind, ReviewQueue};
