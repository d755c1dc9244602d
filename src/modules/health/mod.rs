pub mod controllers;

pub use controllers::{configure, readiness_check};
