//! Domain types and rules for the generation studio.
//!
//! Everything in this crate is pure: no I/O, no async. The engine and
//! persistence crates build on these types.

pub mod columns;
pub mod error;
pub mod job;
pub mod references;
pub mod types;
pub mod validation;
pub mod versions;
