// Test helper modules
//
// Integration tests drive the real routes and services through
// `actix_web::test`, with in-memory stores and a sandbox gateway behind the
// repository and gateway traits.
//
// Usage:
//   #[path = "../helpers/mod.rs"]
//   mod helpers;
//   use helpers::*;

#![allow(dead_code)]

pub mod memory_store;

pub use gateway_sandbox::*;
pub use memory_store::*;
pub use test_data::*;
pub use test_server::*;
