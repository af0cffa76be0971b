use crate::domain::ports::PageFetcher;
use crate::utils::error::{EtlError, Result};
use reqwest::Client;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// 依序抓取頁面，每次請求前固定等待
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    delay: Duration,
}

impl HttpFetcher {
    pub fn new(delay: Duration, timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .gzip(true)
            .build()?;

        Ok(Self { client, delay })
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        tracing::debug!("🌐 GET {}", url);
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EtlError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.text().await?)
    }
}

/// 把頁面上的連結轉成絕對網址
pub fn resolve_url(site_root: &str, link: &str) -> String {
    let root = site_root.trim_end_matches('/');
    if link.starts_with("http://") || link.starts_with("https://") {
        link.to_string()
    } else if let Some(path) = link.strip_prefix('/') {
        format!("{}/{}", root, path)
    } else {
        format!("{}/{}", root, link)
    }
}
