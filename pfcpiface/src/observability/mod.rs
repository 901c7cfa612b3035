//! Structured logging vocabulary shared by every layer of the crate.
//!
//! Library code only emits `tracing` events; subscriber installation is left to
//! binaries and tests.

pub mod events;
pub mod fields;
