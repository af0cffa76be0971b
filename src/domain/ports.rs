use crate::domain::model::{Dataset, Record, TransformResult};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::future::Future;
use std::time::Duration;

/// 檔案中繼資料
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub size: u64,
    pub modified: Option<DateTime<Local>>,
}

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(&self, path: &str, data: &[u8]) -> impl Future<Output = Result<()>> + Send;
    fn remove_file(&self, path: &str) -> impl Future<Output = Result<()>> + Send;
    /// 檔案不存在時回傳 None
    fn file_info(&self, path: &str) -> impl Future<Output = Result<Option<FileInfo>>> + Send;
}

/// 下載 HTML 頁面
pub trait PageFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    /// 網站根網址，例如 https://www.serebii.net
    fn site_root(&self) -> &str;
    fn dataset_path(&self, dataset: Dataset) -> String;
    fn moves_path(&self, generation: u8) -> String;
    /// 能力資料的文字報表
    fn abilities_text_path(&self) -> String;
    fn request_delay(&self) -> Duration;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<Record>>;
    async fn transform(&self, data: Vec<Record>) -> Result<TransformResult>;
    async fn load(&self, result: TransformResult) -> Result<String>;
}
