//! Deterministic, pure logic shared by the orchestrator.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data and return deterministic outputs suitable for tests.

pub mod approval;
pub mod budget;
pub mod errors;
pub mod event;
pub mod types;
