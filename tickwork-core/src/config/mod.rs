//! Engine configuration
//!
//! Policy knobs shared by all components. With the `serde` feature the
//! configuration can be stored as postcard binary data.

pub mod types;

pub use types::*;
