//! Test harness for the `parapet` binary.
//!
//! Fixtures live in `tests/fixtures/` at the workspace root.

#[cfg(test)]
pub mod cli;
