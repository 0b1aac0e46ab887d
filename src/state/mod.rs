//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `EntryState`: lifecycle of a single frontier entry (queued, dispatched, terminal)
//! - `PolitenessThrottle`: per-host minimum-delay gate shared by fetch tasks

mod entry_state;
mod throttle;

// Re-export main types
pub use entry_state::EntryState;
pub use throttle::{effective_delay, PolitenessThrottle};
