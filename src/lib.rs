// src/lib.rs

//! novelfetch: resilient fetch and chapter-download engine for web novels.

pub mod browser;
pub mod config;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod models;
pub mod pipeline;
pub mod sites;
pub mod storage;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::Engine;
pub use error::{AppError, Result};
pub use pipeline::{DownloadRequest, JobHooks};
