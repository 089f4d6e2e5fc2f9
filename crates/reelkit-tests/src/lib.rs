//! Integration test crate for ReelKit.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! It depends on the core, cache, and effects crates to verify they
//! work together.

#[cfg(test)]
mod cache_engine;

#[cfg(test)]
mod effects;

#[cfg(test)]
mod profiles;
