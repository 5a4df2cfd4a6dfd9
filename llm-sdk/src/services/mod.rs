//! Backend client implementations

pub mod canned;
pub mod gemini;
mod common;

pub use common::UserAgent;
