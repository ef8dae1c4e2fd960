//! Glue between the CLI and the `declarative` crate
//!
//! 1. Loading - Compile schema definitions and decode request files
//! 2. Display - Render change sets, reports and violations

pub mod differ;
pub mod loader;

pub use loader::{load_request, load_shape};
