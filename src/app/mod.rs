// App layer: scraper pipelines, management tools and the interactive menu.

pub mod menu;
pub mod pipelines;
pub mod tools;

use crate::adapters::{HttpFetcher, LocalStorage};
use crate::config::toml_config::DexConfig;
use crate::core::etl::EtlEngine;
use crate::domain::model::Record;
use crate::domain::ports::{ConfigProvider, Pipeline};
use crate::utils::error::{EtlError, Result};
use pipelines::{
    AbilitiesPipeline, DetailsPipeline, GameDexPipeline, ItemsPipeline, MovesPipeline,
    NationalDexPipeline, ScrapeOptions, SpreadsheetPipeline,
};
use std::fmt;
use tools::DexTools;

/// 可執行的抓取種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum ScrapeTarget {
    /// 全國圖鑑
    Basic,
    /// 個別頁面詳細資料
    Details,
    /// 各遊戲圖鑑編號
    Games,
    Abilities,
    Moves,
    Items,
    /// 依序執行全部
    All,
}

impl ScrapeTarget {
    pub const SEQUENCE: [ScrapeTarget; 6] = [
        ScrapeTarget::Basic,
        ScrapeTarget::Details,
        ScrapeTarget::Games,
        ScrapeTarget::Abilities,
        ScrapeTarget::Moves,
        ScrapeTarget::Items,
    ];
}

impl fmt::Display for ScrapeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScrapeTarget::Basic => "basic",
            ScrapeTarget::Details => "details",
            ScrapeTarget::Games => "games",
            ScrapeTarget::Abilities => "abilities",
            ScrapeTarget::Moves => "moves",
            ScrapeTarget::Items => "items",
            ScrapeTarget::All => "all",
        };
        f.write_str(name)
    }
}

/// 一次抓取的參數
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrapeRequest {
    pub target: ScrapeTarget,
    pub options: ScrapeOptions,
    pub generation: u8,
}

impl ScrapeRequest {
    pub fn new(target: ScrapeTarget) -> Self {
        Self {
            target,
            options: ScrapeOptions::default(),
            generation: 9,
        }
    }
}

/// 連接設定、儲存與各流程的應用程式
pub struct DexApp {
    config: DexConfig,
    storage: LocalStorage,
    monitor: bool,
}

impl DexApp {
    pub fn new(config: DexConfig, monitor: bool) -> Self {
        let storage = LocalStorage::new(config.project.root.clone());
        Self {
            config,
            storage,
            monitor,
        }
    }

    pub fn config(&self) -> &DexConfig {
        &self.config
    }

    pub fn storage(&self) -> &LocalStorage {
        &self.storage
    }

    pub fn tools(&self) -> DexTools<LocalStorage> {
        DexTools::new(self.storage.clone(), self.config.clone())
    }

    pub fn spreadsheet(&self) -> SpreadsheetPipeline<LocalStorage, DexConfig> {
        SpreadsheetPipeline::new(
            self.storage.clone(),
            self.config.clone(),
            self.config.spreadsheet.clone(),
        )
    }

    fn fetcher(&self) -> Result<HttpFetcher> {
        HttpFetcher::new(
            self.config.request_delay(),
            self.config.request_timeout(),
            &self.config.request.user_agent,
        )
    }

    async fn run_pipeline<P: Pipeline>(&self, pipeline: P) -> Result<String> {
        EtlEngine::new_with_monitoring(pipeline, self.monitor).run().await
    }

    async fn run_one(&self, target: ScrapeTarget, request: &ScrapeRequest) -> Result<String> {
        let storage = self.storage.clone();
        let config = self.config.clone();
        let fetcher = self.fetcher()?;
        let options = request.options;

        match target {
            ScrapeTarget::Basic => {
                self.run_pipeline(NationalDexPipeline::new(storage, fetcher, config))
                    .await
            }
            ScrapeTarget::Details => {
                self.run_pipeline(DetailsPipeline::new(storage, fetcher, config, options))
                    .await
            }
            ScrapeTarget::Games => {
                self.run_pipeline(GameDexPipeline::new(storage, fetcher, config, options))
                    .await
            }
            ScrapeTarget::Abilities => {
                self.run_pipeline(AbilitiesPipeline::new(storage, fetcher, config, options.limit))
                    .await
            }
            ScrapeTarget::Moves => {
                let pipeline =
                    MovesPipeline::new(storage, fetcher, config, request.generation, options.limit)?;
                self.run_pipeline(pipeline).await
            }
            ScrapeTarget::Items => {
                self.run_pipeline(ItemsPipeline::new(storage, fetcher, config, options.limit))
                    .await
            }
            ScrapeTarget::All => Err(EtlError::ProcessingError {
                message: "'all' must be expanded into individual scrapers".to_string(),
            }),
        }
    }

    /// 執行抓取，回傳寫出的檔案路徑
    ///
    /// `All` 依序執行每一種抓取；單一種類的可恢復錯誤只記錄下來，不中斷後續種類。
    pub async fn scrape(&self, request: ScrapeRequest) -> Result<Vec<String>> {
        if request.target != ScrapeTarget::All {
            return Ok(vec![self.run_one(request.target, &request).await?]);
        }

        let mut outputs = Vec::new();
        for target in ScrapeTarget::SEQUENCE {
            tracing::info!("--- Running {} scraper ---", target);
            match self.run_one(target, &request).await {
                Ok(path) => outputs.push(path),
                Err(e) if e.is_recoverable() => {
                    tracing::error!("❌ {} scraper failed: {}", target, e);
                }
                Err(e) => return Err(e),
            }
        }
        tracing::info!("✅ All scrapers completed");
        Ok(outputs)
    }

    /// 抓取單一寶可夢並回傳合併結果，不寫檔
    pub async fn preview(&self, name: &str) -> Result<Option<Record>> {
        let pipeline = DetailsPipeline::new(
            self.storage.clone(),
            self.fetcher()?,
            self.config.clone(),
            ScrapeOptions::default(),
        );
        pipeline.preview(name).await
    }

    /// 試算表匯入；`confirm` 在轉換前與合併前各詢問一次，取消時回傳 None
    pub async fn import<F>(&self, mut confirm: F) -> Result<Option<String>>
    where
        F: FnMut(&str) -> Result<bool>,
    {
        let pipeline = self.spreadsheet();
        let summary = pipeline.analyze().await?;
        println!("=== Spreadsheet Analysis ===");
        println!("Workbook: {}", pipeline.workbook_path());
        println!("Sheets: {}", summary.sheet_names.join(", "));
        println!(
            "{}: {} rows, {} columns (first columns: {})",
            summary.sheet,
            summary.row_count,
            summary.column_count,
            summary.first_columns.join(", ")
        );
        println!("Base forms (-00) found: {}", summary.base_forms);

        if !confirm("Proceed with import?")? {
            println!("Import cancelled");
            return Ok(None);
        }

        let records = pipeline.extract().await?;
        if records.is_empty() {
            println!("No Pokémon rows found in the spreadsheet");
            return Ok(None);
        }
        println!("Sample converted Pokémon:");
        for (i, record) in records.iter().take(2).enumerate() {
            println!("  {}. {}", i + 1, record.name().unwrap_or("Unknown"));
            if let Some(types) = record.get("types") {
                println!("     Types: {}", types);
            }
            if let Some(stats) = record.get("base_stats") {
                println!("     Base Stats: {}", stats);
            }
        }

        if !confirm(&format!("Merge {} Pokémon with existing data?", records.len()))? {
            println!("Merge cancelled");
            return Ok(None);
        }

        let result = pipeline.transform(records).await?;
        println!(
            "Merged {} existing, added {} new, total {}",
            result.report.merged, result.report.added, result.report.total
        );
        let path = pipeline.load(result).await?;
        println!("✅ Spreadsheet import completed, data saved to {}", path);
        Ok(Some(path))
    }
}
