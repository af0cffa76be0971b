//! 資料管理工具: 狀態、備份、驗證、摘要、試算表檢查、去重、重設、CSV 匯出。

use crate::app::pipelines::spreadsheet::{self, SheetSummary};
use crate::config::toml_config::DexConfig;
use crate::core::{dataset, merge};
use crate::domain::model::{Dataset, Record};
use crate::domain::ports::{ConfigProvider, Storage};
use crate::utils::error::Result;
use chrono::Local;
use serde_json::{json, Value};
use std::fmt;
use std::io::{Cursor, Write};
use zip::write::{FileOptions, ZipWriter};

/// 可執行的抓取種類數 (專案摘要用)
const SCRAPER_COUNT: usize = 6;

/// 驗證報告最多列出的缺欄位問題
const MAX_FIELD_ISSUES: usize = 10;

const COVERAGE_FIELDS: [(&str, &str); 6] = [
    ("types", "Types"),
    ("abilities", "Abilities"),
    ("base_stats", "Base Stats"),
    ("physical_info", "Physical Info"),
    ("game_appearances", "Game Appearances"),
    ("evolution_info", "Evolution Info"),
];

#[derive(Debug, Clone, PartialEq)]
pub enum DatasetState {
    Missing,
    Invalid,
    Entries(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetStatus {
    pub dataset: Dataset,
    pub path: String,
    pub state: DatasetState,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Coverage {
    pub label: &'static str,
    pub count: usize,
    pub total: usize,
}

impl Coverage {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.count as f64 / self.total as f64 * 100.0
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub datasets: Vec<DatasetStatus>,
    pub coverage: Vec<Coverage>,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Pokemon Data Collection System Status ===")?;
        writeln!(f)?;
        writeln!(f, "Data Files Status:")?;
        for status in &self.datasets {
            let label = crate::utils::text::title_case(status.dataset.key());
            match status.state {
                DatasetState::Entries(count) => {
                    writeln!(f, "  ✓ {}: {} entries ({})", label, count, status.path)?
                }
                DatasetState::Invalid => writeln!(f, "  ✗ {}: Error loading ({})", label, status.path)?,
                DatasetState::Missing => writeln!(f, "  ○ {}: Not found ({})", label, status.path)?,
            }
        }

        if !self.coverage.is_empty() {
            writeln!(f)?;
            writeln!(f, "Pokemon Data Completeness:")?;
            for coverage in &self.coverage {
                writeln!(
                    f,
                    "    {}: {}/{} ({:.1}%)",
                    coverage.label,
                    coverage.count,
                    coverage.total,
                    coverage.percent()
                )?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub total: usize,
    pub duplicates: Vec<String>,
    pub issues: Vec<String>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.duplicates.is_empty() && self.issues.is_empty()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clean() {
            return writeln!(f, "Data integrity check passed! ({} entries)", self.total);
        }
        writeln!(f, "Data integrity issues found:")?;
        if !self.duplicates.is_empty() {
            writeln!(f, "  - Duplicate Pokemon names: {}", self.duplicates.join(", "))?;
        }
        for issue in &self.issues {
            writeln!(f, "  - {}", issue)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpreadsheetStatus {
    pub path: String,
    pub size: u64,
    pub modified: Option<String>,
    pub sheets: Vec<String>,
    pub summary: Option<SheetSummary>,
    pub error: Option<String>,
}

impl fmt::Display for SpreadsheetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "✅ Spreadsheet found: {}", self.path)?;
        writeln!(
            f,
            "   Size: {} bytes ({:.1} MB)",
            self.size,
            self.size as f64 / (1024.0 * 1024.0)
        )?;
        if let Some(modified) = &self.modified {
            writeln!(f, "   Last modified: {}", modified)?;
        }
        if let Some(error) = &self.error {
            return writeln!(f, "   Error reading spreadsheet: {}", error);
        }
        writeln!(f, "   Sheets: {}", self.sheets.join(", "))?;
        if let Some(summary) = &self.summary {
            writeln!(
                f,
                "   {} sheet: {} rows, {} columns",
                summary.sheet, summary.row_count, summary.column_count
            )?;
            if summary.has_ref_id {
                writeln!(f, "   Base forms (-00): {} entries", summary.base_forms)?;
            } else {
                writeln!(f, "   Warning: 'ref_id' column not found")?;
            }
        }
        Ok(())
    }
}

/// 名稱、類型等以文字呈現的欄位: 陣列以分隔字串相連
fn joined(value: Option<&Value>, separator: &str) -> String {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(separator),
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    }
}

/// 能力可能是名稱清單，或試算表的 `{regular, hidden}`
fn ability_names(record: &Record) -> String {
    match record.get("abilities") {
        Some(Value::Object(map)) => {
            let mut names: Vec<String> = Vec::new();
            if let Some(Value::Array(regular)) = map.get("regular") {
                names.extend(regular.iter().filter_map(Value::as_str).map(str::to_string));
            }
            if let Some(hidden) = map.get("hidden").and_then(Value::as_str) {
                names.push(hidden.to_string());
            }
            names.join(", ")
        }
        other => joined(other, ", "),
    }
}

fn stat(record: &Record, key: &str) -> String {
    record
        .get("base_stats")
        .and_then(|stats| stats.get(key))
        .filter(|v| !v.is_null())
        .map(|v| v.to_string())
        .unwrap_or_default()
}

pub struct DexTools<S: Storage> {
    storage: S,
    config: DexConfig,
}

impl<S: Storage> DexTools<S> {
    pub fn new(storage: S, config: DexConfig) -> Self {
        Self { storage, config }
    }

    async fn pokemon(&self) -> Result<Vec<Record>> {
        dataset::load_records(&self.storage, &self.config.dataset_path(Dataset::Pokemon), None).await
    }

    /// 各資料集筆數與寶可夢資料完整度
    pub async fn status(&self) -> Result<StatusReport> {
        let mut datasets = Vec::with_capacity(Dataset::ALL.len());
        for kind in Dataset::ALL {
            let path = self.config.dataset_path(kind);
            let state = if self.storage.file_info(&path).await?.is_none() {
                DatasetState::Missing
            } else {
                match dataset::load_value(&self.storage, &path).await? {
                    Some(value) => DatasetState::Entries(dataset::count_entries(&value, kind.records_field())),
                    None => DatasetState::Invalid,
                }
            };
            datasets.push(DatasetStatus {
                dataset: kind,
                path,
                state,
            });
        }

        let pokemon = self.pokemon().await?;
        let coverage = if pokemon.is_empty() {
            Vec::new()
        } else {
            COVERAGE_FIELDS
                .iter()
                .map(|&(field, label)| Coverage {
                    label,
                    count: pokemon
                        .iter()
                        .filter(|p| p.get(field).is_some_and(|v| !merge::is_empty_value(v)))
                        .count(),
                    total: pokemon.len(),
                })
                .collect()
        };

        Ok(StatusReport { datasets, coverage })
    }

    /// 所有資料檔 (含各世代招式檔) 的路徑，已去重
    fn data_files(&self) -> Vec<String> {
        let mut paths: Vec<String> = Dataset::ALL
            .iter()
            .map(|d| self.config.dataset_path(*d))
            .collect();
        paths.extend((1..=9).map(|generation| self.config.moves_path(generation)));
        paths.push(self.config.abilities_text_path());

        let mut unique = Vec::with_capacity(paths.len());
        for path in paths {
            if !unique.contains(&path) {
                unique.push(path);
            }
        }
        unique
    }

    /// 把現有資料檔打包成 `backup_YYYYmmdd_HHMMSS.zip`，沒有任何檔案時回傳 None
    pub async fn backup_all(&self) -> Result<Option<String>> {
        let mut files = Vec::new();
        for path in self.data_files() {
            if self.storage.file_info(&path).await?.is_some() {
                let data = self.storage.read_file(&path).await?;
                files.push((path, data));
            }
        }
        if files.is_empty() {
            tracing::warn!("⚠️ No data files to back up");
            return Ok(None);
        }

        let archive = {
            let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
            for (path, data) in &files {
                let name = path.rsplit('/').next().unwrap_or(path);
                zip.start_file::<_, ()>(name, FileOptions::default())?;
                zip.write_all(data)?;
                tracing::info!("   Backed up {}", path);
            }
            zip.finish()?.into_inner()
        };

        let target = format!(
            "{}/{}",
            self.config.data.backups_dir.trim_end_matches('/'),
            Local::now().format("backup_%Y%m%d_%H%M%S.zip")
        );
        self.storage.write_file(&target, &archive).await?;
        tracing::info!("🗄️ Backup completed: {} ({} files)", target, files.len());
        Ok(Some(target))
    }

    /// 重複名稱與缺少名稱或編號的記錄
    pub async fn validate(&self) -> Result<ValidationReport> {
        let pokemon = self.pokemon().await?;

        let mut seen = std::collections::HashMap::new();
        let mut duplicates: Vec<String> = Vec::new();
        let mut issues = Vec::new();
        for (i, record) in pokemon.iter().enumerate() {
            match record.name() {
                Some(name) => {
                    let count = seen.entry(name.to_lowercase()).or_insert(0);
                    *count += 1;
                    if *count == 2 {
                        duplicates.push(name.to_string());
                    }
                }
                None => issues.push(format!("Pokemon {}: missing name", i)),
            }
            let has_number = ["number", "pokedex_number"]
                .iter()
                .any(|key| record.get(key).is_some_and(|v| !merge::is_empty_value(v)));
            if !has_number {
                issues.push(format!("Pokemon {}: missing number", i));
            }
        }
        issues.truncate(MAX_FIELD_ISSUES);

        Ok(ValidationReport {
            total: pokemon.len(),
            duplicates,
            issues,
        })
    }

    /// 寫出專案摘要，回傳 (路徑, 內容)
    pub async fn export_summary(&self) -> Result<(String, Value)> {
        let mut counts = serde_json::Map::new();
        for kind in Dataset::ALL {
            if let Some(value) = dataset::load_value(&self.storage, &self.config.dataset_path(kind)).await? {
                counts.insert(
                    kind.key().to_string(),
                    json!(dataset::count_entries(&value, kind.records_field())),
                );
            }
        }

        let summary = json!({
            "project_info": {
                "name": self.config.project.name,
                "data_files": Dataset::ALL.len(),
                "scrapers": SCRAPER_COUNT,
            },
            "data_counts": counts,
        });

        let path = self.config.data.summary.clone();
        dataset::save_json(&self.storage, &path, &summary).await?;
        tracing::info!("📝 Summary exported to {}", path);
        Ok((path, summary))
    }

    /// 試算表檔案資訊；檔案不存在時回傳 None
    pub async fn spreadsheet_status(&self) -> Result<Option<SpreadsheetStatus>> {
        let sheet = &self.config.spreadsheet;
        let Some(info) = self.storage.file_info(&sheet.path).await? else {
            return Ok(None);
        };

        let mut status = SpreadsheetStatus {
            path: sheet.path.clone(),
            size: info.size,
            modified: info.modified.map(|m| m.format("%Y-%m-%d %H:%M:%S").to_string()),
            sheets: Vec::new(),
            summary: None,
            error: None,
        };

        let bytes = self.storage.read_file(&sheet.path).await?;
        match spreadsheet::workbook_sheets(bytes.clone()) {
            Ok(sheets) => {
                if sheets.contains(&sheet.sheet) {
                    match spreadsheet::read_sheet(bytes, &sheet.sheet, sheet.header_row) {
                        Ok(data) => status.summary = Some(spreadsheet::summarize(&sheet.sheet, &data)),
                        Err(e) => status.error = Some(e.to_string()),
                    }
                }
                status.sheets = sheets;
            }
            Err(e) => status.error = Some(e.to_string()),
        }

        Ok(Some(status))
    }

    /// 合併同名記錄並存檔，回傳移除的筆數
    pub async fn clean_duplicates(&self) -> Result<usize> {
        let path = self.config.dataset_path(Dataset::Pokemon);
        let pokemon = self.pokemon().await?;
        let (deduped, removed) = merge::dedupe_by_name(pokemon);
        if removed == 0 {
            tracing::info!("✨ No duplicate entries found");
            return Ok(0);
        }

        dataset::backup_before_write(&self.storage, &path, None).await?;
        dataset::save_json(&self.storage, &path, &deduped).await?;
        tracing::info!("🧹 Removed {} duplicate entries from {}", removed, path);
        Ok(removed)
    }

    /// 刪除資料集檔案，回傳檔案原本是否存在
    pub async fn reset(&self, dataset: Dataset) -> Result<bool> {
        let path = self.config.dataset_path(dataset);
        if self.storage.file_info(&path).await?.is_none() {
            return Ok(false);
        }
        self.storage.remove_file(&path).await?;
        tracing::info!("🗑️ Reset {} dataset ({})", dataset, path);
        Ok(true)
    }

    /// 寶可夢資料攤平成 CSV，回傳筆數
    pub async fn export_csv(&self, path: &str) -> Result<usize> {
        let pokemon = self.pokemon().await?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record([
            "number",
            "name",
            "types",
            "abilities",
            "hp",
            "attack",
            "defense",
            "sp_attack",
            "sp_defense",
            "speed",
        ])?;
        for record in &pokemon {
            let number = match record.get("number").or_else(|| record.get("pokedex_number")) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
            writer.write_record([
                number,
                record.name().unwrap_or_default().to_string(),
                joined(record.get("types"), "/"),
                ability_names(record),
                stat(record, "hp"),
                stat(record, "attack"),
                stat(record, "defense"),
                stat(record, "sp_attack"),
                stat(record, "sp_defense"),
                stat(record, "speed"),
            ])?;
        }

        let data = writer.into_inner().map_err(|e| e.into_error())?;
        self.storage.write_file(path, &data).await?;
        tracing::info!("📤 Exported {} Pokémon to {}", pokemon.len(), path);
        Ok(pokemon.len())
    }
}
