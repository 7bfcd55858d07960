//! Helpers for testing sync cycles and deletion runs without a real table.
//!
//! - [`records`] builds job offer items and snapshots
//! - [`source`] wraps a source table to inject failures
//! - [`clock`] provides a controllable [`crate::sync::Clock`]
//! - [`failpoints`] configures failpoints for the duration of a test
pub mod clock;
pub mod failpoints;
pub mod records;
pub mod source;
