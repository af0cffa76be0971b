pub mod abilities;
pub mod details;
pub mod game_dex;
pub mod items;
pub mod moves;
pub mod national_dex;
pub mod spreadsheet;
#[cfg(test)]
pub(crate) mod testing;

pub use abilities::AbilitiesPipeline;
pub use details::DetailsPipeline;
pub use game_dex::GameDexPipeline;
pub use items::ItemsPipeline;
pub use moves::MovesPipeline;
pub use national_dex::NationalDexPipeline;
pub use spreadsheet::SpreadsheetPipeline;

use crate::core::dataset;
use crate::domain::model::{Record, TransformResult};
use crate::domain::ports::Storage;
use crate::utils::error::Result;
use serde_json::Value;

/// 逐筆抓取時的範圍
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrapeOptions {
    /// 從第幾筆開始 (0 起算)
    pub start: usize,
    /// 最多處理幾筆，None 為全部
    pub limit: Option<usize>,
}

impl ScrapeOptions {
    pub fn new(start: usize, limit: Option<usize>) -> Self {
        Self { start, limit }
    }

    /// 套用 start/limit 後的切片
    pub fn window<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = self.start.min(items.len());
        let end = match self.limit {
            Some(limit) => start.saturating_add(limit).min(items.len()),
            None => items.len(),
        };
        &items[start..end]
    }
}

/// 記錄陣列 → JSON 陣列文件
pub(crate) fn records_document(records: &[Record]) -> Value {
    Value::Array(records.iter().cloned().map(Value::from).collect())
}

/// 先備份既有檔案，再寫出主文件與額外輸出
pub(crate) async fn write_outputs<S: Storage>(
    storage: &S,
    path: &str,
    backup: Option<&str>,
    result: &TransformResult,
) -> Result<String> {
    dataset::backup_before_write(storage, path, backup).await?;
    dataset::save_json(storage, path, &result.document).await?;

    for output in &result.extra_outputs {
        storage.write_file(&output.path, &output.contents).await?;
        tracing::info!("📝 Wrote {}", output.path);
    }

    Ok(path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrape_window() {
        let items = [1, 2, 3, 4, 5];
        assert_eq!(ScrapeOptions::default().window(&items), &items);
        assert_eq!(ScrapeOptions::new(1, Some(2)).window(&items), &[2, 3]);
        assert_eq!(ScrapeOptions::new(4, Some(10)).window(&items), &[5]);
        assert!(ScrapeOptions::new(9, None).window(&items).is_empty());
    }
}
