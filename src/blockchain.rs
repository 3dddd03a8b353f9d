// Thin re-export module: implementation is in `blockchain/core.rs` (blocks,
// chain management, link validation, shared state).

pub mod core;
pub use core::*;
