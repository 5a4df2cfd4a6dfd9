//! # LLM SDK
//!
//! Generative model access for the civic ticket pipeline.
//!
//! This crate provides:
//!
//! - `GenerativeBackend`: the capability trait agents are built against
//! - `GeminiClient`: a typed client for the Gemini REST API
//! - `CannedBackend`: a deterministic scripted backend for offline runs
//! - `ServiceError`: normalized error handling with call context
//! - Configuration providers for loading backend settings

pub mod core;
pub use core::{GenerativeBackend, ImagePart, StructuredResponse};

pub mod services;
pub use services::canned::{BackendCall, CannedBackend};
pub use services::gemini::{GeminiClient, GeminiClientBuilder};

pub mod error;
pub use error::{ErrorContext, Result, ServiceError};

pub mod config;
pub use config::{ConfigProvider, EnvConfigProvider, GeminiConfig, MemoryConfigProvider, ServiceConfig};

#[cfg(test)]
mod tests;
