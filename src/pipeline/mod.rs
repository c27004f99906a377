//! Job-level flows built on the fetch layer, the adapters and the stores.
//!
//! - `download`: concurrent chapter downloads with resume and cancellation
//! - `normalize`: final ordering and prologue numbering
//! - `search`: multi-site search aggregation

pub mod download;
pub mod normalize;
pub mod search;

pub use download::{CancelFn, Coordinator, DownloadRequest, JobHooks, ProgressFn};
pub use normalize::{NormalizeOptions, normalize_chapters};
pub use search::{SearchAggregator, group_results};
