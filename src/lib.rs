pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{HttpFetcher, LocalStorage};
pub use app::{DexApp, ScrapeRequest, ScrapeTarget};
pub use config::DexConfig;
pub use core::etl::EtlEngine;
pub use domain::model::{Dataset, MergeReport, Record};
pub use utils::error::{EtlError, Result};
