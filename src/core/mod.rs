pub mod dataset;
pub mod etl;
pub mod merge;
pub mod queries;
pub mod regions;

pub use crate::domain::model::{Record, TransformResult};
pub use crate::domain::ports::{ConfigProvider, PageFetcher, Pipeline, Storage};
pub use crate::utils::error::Result;
