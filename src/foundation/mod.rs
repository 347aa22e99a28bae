//! Time and size primitives, sample/pixel buffers and the error type.

pub mod buffer;
pub mod core;
pub mod error;
pub mod math;
