//! Vigil LLM - Model backends
//!
//! Concrete implementations of the [`vigil_core::LlmBackend`] seam. The
//! review pipeline wraps a backend in its generation and review adapters,
//! which turn backend failures into fallback candidates or fail-open
//! verdicts.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod anthropic;
pub mod config;

pub use anthropic::{AnthropicBackend, ANTHROPIC_VERSION};
pub use config::{LlmConfig, DEFAULT_API_KEY_ENV, DEFAULT_BASE_URL, DEFAULT_MODEL};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
