//! 流程單元測試共用的記憶體儲存與假頁面來源

use crate::config::toml_config::DexConfig;
use crate::domain::ports::{FileInfo, PageFetcher, Storage};
use crate::utils::error::{EtlError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const SITE_ROOT: &str = "https://dex.test";

#[derive(Clone, Default)]
pub struct MockStorage {
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_json(&self, path: &str, value: &Value) {
        let data = serde_json::to_vec(value).unwrap();
        self.files.lock().await.insert(path.to_string(), data);
    }

    pub async fn get_json(&self, path: &str) -> Option<Value> {
        let files = self.files.lock().await;
        files.get(path).map(|data| serde_json::from_slice(data).unwrap())
    }

    pub async fn contains(&self, path: &str) -> bool {
        self.files.lock().await.contains_key(path)
    }
}

impl Storage for MockStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let files = self.files.lock().await;
        files.get(path).cloned().ok_or_else(|| {
            EtlError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("File not found: {}", path),
            ))
        })
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let mut files = self.files.lock().await;
        files.insert(path.to_string(), data.to_vec());
        Ok(())
    }

    async fn remove_file(&self, path: &str) -> Result<()> {
        self.files.lock().await.remove(path);
        Ok(())
    }

    async fn file_info(&self, path: &str) -> Result<Option<FileInfo>> {
        let files = self.files.lock().await;
        Ok(files.get(path).map(|data| FileInfo {
            size: data.len() as u64,
            modified: None,
        }))
    }
}

/// 以 URL 對應頁面內容，沒有登記的 URL 回傳 404
#[derive(Clone, Default)]
pub struct MockFetcher {
    pages: Arc<HashMap<String, String>>,
    requested: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    pub fn new(pages: &[(&str, &str)]) -> Self {
        let pages = pages
            .iter()
            .map(|(path, page)| (format!("{}{}", SITE_ROOT, path), page.to_string()))
            .collect();
        Self {
            pages: Arc::new(pages),
            requested: Arc::default(),
        }
    }

    pub async fn requested(&self) -> Vec<String> {
        self.requested.lock().await.clone()
    }
}

impl PageFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.requested.lock().await.push(url.to_string());
        self.pages.get(url).cloned().ok_or_else(|| EtlError::HttpStatus {
            url: url.to_string(),
            status: 404,
        })
    }
}

pub fn mock_config() -> DexConfig {
    let mut config = DexConfig::default();
    config.sources.site_root = SITE_ROOT.to_string();
    config.request.delay_ms = 0;
    config
}
