//! In-memory platform backend for tests.

pub mod backend;

pub use backend::{FailStep, MockDevice, MockDirectory, MockPacket};
