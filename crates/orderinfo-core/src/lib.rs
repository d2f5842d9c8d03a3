#![doc = include_str!("../README.md")]

mod common;
pub use common::*;
// Public re-export so downstream crates can access `ferroid` via
// `orderinfo_core::ferroid`
pub use ferroid;
