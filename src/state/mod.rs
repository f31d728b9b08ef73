//! State module for tracking item lifecycles
//!
//! # Components
//!
//! - `ItemStatus`: lifecycle status of a stored subreddit
//! - `Classification`: closed set of outcomes of a metadata fetch
//! - `transition`: the table mapping outcomes onto stored rows

mod item_status;
mod lifecycle;

// Re-export main types
pub use item_status::{Classification, ItemStatus};
pub use lifecycle::{transition, CounterEffect, DeleteReason, ItemAction, Transition};
