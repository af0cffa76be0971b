use super::{records_document, write_outputs};
use crate::adapters::http::resolve_url;
use crate::core::{dataset, merge};
use crate::domain::model::{Dataset, Record, TransformResult};
use crate::domain::ports::{ConfigProvider, PageFetcher, Pipeline, Storage};
use crate::utils::error::Result;
use crate::utils::html;
use crate::utils::text::{extract_number, title_case};
use regex::Regex;
use scraper::Html;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// 額外掃描的分類頁
const CATEGORY_PAGES: [&str; 5] = ["tm", "berry", "ball", "medicine", "keyitem"];

const LOCATION_KEYWORDS: [&str; 10] = [
    "route", "city", "town", "cave", "forest", "mountain", "tower", "gym", "shop", "mart",
];

const GAME_NAMES: [&str; 30] = [
    "red",
    "blue",
    "yellow",
    "gold",
    "silver",
    "crystal",
    "ruby",
    "sapphire",
    "emerald",
    "firered",
    "leafgreen",
    "diamond",
    "pearl",
    "platinum",
    "heartgold",
    "soulsilver",
    "black",
    "white",
    "x",
    "y",
    "omega ruby",
    "alpha sapphire",
    "sun",
    "moon",
    "ultra sun",
    "ultra moon",
    "sword",
    "shield",
    "scarlet",
    "violet",
];

const DESCRIPTION_NOISE: [&str; 4] = ["copyright", "serebii", "navigation", "menu"];

const DESCRIPTION_LIMIT: usize = 300;

static GAME_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    GAME_NAMES
        .iter()
        .map(|game| {
            let pattern = format!(r"\b{}\b", regex::escape(game));
            (*game, Regex::new(&pattern).expect("valid game name regex"))
        })
        .collect()
});

// 位置列中的遊戲名稱 (區分大小寫)
static LOCATION_GAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(Red|Blue|Yellow|Gold|Silver|Ruby|Sapphire|Diamond|Pearl|Black|White|X|Y)\b")
        .expect("valid location game regex")
});

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemLocation {
    pub location: String,
    pub method: String,
    pub game: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemRecord {
    pub name: String,
    pub category: String,
    pub description: String,
    pub effect: String,
    pub buy_price: Option<i64>,
    pub sell_price: Option<i64>,
    pub locations: Vec<ItemLocation>,
    pub games_available: Vec<String>,
}

/// `potion.shtml`、`/itemdex/potion.shtml` → `potion`
fn item_file(href: &str) -> Option<String> {
    let stem = href.strip_suffix(".shtml")?;
    if href.starts_with("http") {
        return None;
    }
    let stem = if let Some(rest) = stem.strip_prefix("/itemdex/") {
        rest
    } else if stem.starts_with('/') {
        return None;
    } else {
        stem
    };
    let file = stem.rsplit('/').next().unwrap_or(stem);
    if file.is_empty() || file == "index" {
        None
    } else {
        Some(file.to_string())
    }
}

/// 索引頁或分類頁上的道具檔名
pub fn parse_item_links(page: &str) -> Result<Vec<String>> {
    let document = Html::parse_document(page);
    let mut files: Vec<String> = Vec::new();
    for link in document.select(&html::selector("a[href]")?) {
        if let Some(file) = link.value().attr("href").and_then(item_file) {
            if !files.contains(&file) {
                files.push(file);
            }
        }
    }
    Ok(files)
}

/// 檔名推得的分類
fn category_from_file(file: &str) -> &'static str {
    let file = file.to_lowercase();
    if file.contains("tm") {
        "Technical Machine"
    } else if file.contains("berry") {
        "Berry"
    } else if file.contains("ball") {
        "Poké Ball"
    } else {
        "General Item"
    }
}

fn truncate_description(text: &str) -> String {
    if text.chars().count() > DESCRIPTION_LIMIT {
        let head: String = text.chars().take(DESCRIPTION_LIMIT).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// 頁面文字中出現的遊戲，依字母排序
fn games_available(content: &str) -> Vec<String> {
    let content = content.to_lowercase();
    let mut games: Vec<String> = GAME_PATTERNS
        .iter()
        .filter(|(_, re)| re.is_match(&content))
        .map(|(game, _)| title_case(game))
        .collect();
    games.sort();
    games.dedup();
    games
}

fn item_locations(document: &Html) -> Result<Vec<ItemLocation>> {
    let mut locations = Vec::new();
    for row in document.select(&html::selector("tr")?) {
        let texts: Vec<String> = html::cells(row).into_iter().map(html::text).collect();
        if texts.len() < 2 {
            continue;
        }

        let game = texts
            .iter()
            .find(|t| LOCATION_GAME.is_match(t))
            .cloned()
            .unwrap_or_else(|| "Various".to_string());

        for (i, text) in texts.iter().enumerate() {
            let lower = text.to_lowercase();
            if !LOCATION_KEYWORDS.iter().any(|k| lower.contains(k)) {
                continue;
            }
            let method = texts
                .get(i + 1)
                .filter(|m| !m.is_empty() && m.chars().count() < 50)
                .cloned()
                .unwrap_or_else(|| "Found".to_string());
            locations.push(ItemLocation {
                location: text.clone(),
                method,
                game: game.clone(),
            });
        }
    }
    Ok(locations)
}

/// 解析單一道具頁
pub fn parse_item_page(page: &str, file: &str) -> Result<ItemRecord> {
    let document = Html::parse_document(page);

    let mut item = ItemRecord {
        name: String::new(),
        category: String::new(),
        description: String::new(),
        effect: String::new(),
        buy_price: None,
        sell_price: None,
        locations: Vec::new(),
        games_available: Vec::new(),
    };

    if let Some(title) = document.select(&html::selector("title")?).next() {
        let title = html::raw_text(title);
        if let Some((name, _)) = title.split_once(" - ") {
            item.name = name.trim().to_string();
        }
    }

    for row in document.select(&html::selector("tr")?) {
        let cells = html::cells(row);
        if cells.len() < 2 {
            continue;
        }
        let header = html::text(cells[0]).to_lowercase();
        let value = html::text(cells[1]);

        if header.contains("category") || header.contains("type") {
            item.category = value;
        } else if header.contains("description") || header.contains("effect") {
            if header.contains("effect") {
                item.effect = value.clone();
            }
            item.description = value;
        } else if header.contains("price") {
            let price = extract_number(&value.replace(',', ""));
            if header.contains("buy") {
                item.buy_price = price.or(item.buy_price);
            } else if header.contains("sell") {
                item.sell_price = price.or(item.sell_price);
            }
        }
    }

    item.locations = item_locations(&document)?;
    item.games_available = games_available(&document.root_element().text().collect::<String>());

    if item.category.is_empty() {
        item.category = category_from_file(file).to_string();
    }

    if item.description.is_empty() {
        for element in document.select(&html::selector("p, div")?) {
            let text = html::text(element);
            let lower = text.to_lowercase();
            if text.chars().count() > 30 && !DESCRIPTION_NOISE.iter().any(|n| lower.contains(n)) {
                item.description = truncate_description(&text);
                break;
            }
        }
    }

    if item.name.is_empty() {
        item.name = title_case(&file.replace('-', " "));
    }

    Ok(item)
}

/// 依分類統計並輸出摘要
fn log_summary(items: &[Record]) {
    let mut categories: BTreeMap<&str, usize> = BTreeMap::new();
    let mut total_locations = 0;
    let mut with_prices = 0;
    for item in items {
        *categories
            .entry(item.get_str("category").unwrap_or("Unknown"))
            .or_default() += 1;
        total_locations += item
            .get("locations")
            .and_then(|l| l.as_array())
            .map_or(0, Vec::len);
        if !merge::is_empty_value(item.get("buy_price").unwrap_or(&serde_json::Value::Null))
            || !merge::is_empty_value(item.get("sell_price").unwrap_or(&serde_json::Value::Null))
        {
            with_prices += 1;
        }
    }

    tracing::info!("📊 Items: {} total, {} locations, {} with prices", items.len(), total_locations, with_prices);
    for (category, count) in &categories {
        tracing::info!("   {}: {}", category, count);
    }
}

/// 道具圖鑑抓取
pub struct ItemsPipeline<S: Storage, F: PageFetcher, C: ConfigProvider> {
    storage: S,
    fetcher: F,
    config: C,
    limit: Option<usize>,
}

impl<S: Storage, F: PageFetcher, C: ConfigProvider> ItemsPipeline<S, F, C> {
    pub fn new(storage: S, fetcher: F, config: C, limit: Option<usize>) -> Self {
        Self {
            storage,
            fetcher,
            config,
            limit,
        }
    }

    fn itemdex_url(&self, page: &str) -> String {
        resolve_url(self.config.site_root(), &format!("/itemdex/{}", page))
    }

    async fn item_files(&self) -> Result<Vec<String>> {
        let index = self.fetcher.fetch(&self.itemdex_url("")).await?;
        let mut files = parse_item_links(&index)?;

        for category in CATEGORY_PAGES {
            let url = self.itemdex_url(&format!("{}.shtml", category));
            match self.fetcher.fetch(&url).await {
                Ok(page) => {
                    for file in parse_item_links(&page)? {
                        if !files.contains(&file) {
                            files.push(file);
                        }
                    }
                }
                Err(e) if e.is_recoverable() => {
                    tracing::warn!("⚠️ Skipping {} items: {}", category, e);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(files)
    }
}

#[async_trait::async_trait]
impl<S: Storage, F: PageFetcher, C: ConfigProvider> Pipeline for ItemsPipeline<S, F, C> {
    async fn extract(&self) -> Result<Vec<Record>> {
        let mut files = self.item_files().await?;
        tracing::info!("🎒 Found {} items to scrape", files.len());
        if let Some(limit) = self.limit {
            files.truncate(limit);
        }

        let mut records = Vec::with_capacity(files.len());
        for (i, file) in files.iter().enumerate() {
            tracing::info!("[{}/{}] Processing {}", i + 1, files.len(), file);
            let url = self.itemdex_url(&format!("{}.shtml", file));

            let item = match self.fetcher.fetch(&url).await {
                Ok(page) => parse_item_page(&page, file)?,
                Err(e) if e.is_recoverable() => {
                    tracing::warn!("⚠️ Skipping {}: {}", file, e);
                    continue;
                }
                Err(e) => return Err(e),
            };
            tracing::info!(
                "   ✓ {} - {}, {} locations",
                item.name,
                item.category,
                item.locations.len()
            );

            if let Some(record) = Record::from_serialize(&item)? {
                records.push(record);
            }
        }

        Ok(records)
    }

    async fn transform(&self, data: Vec<Record>) -> Result<TransformResult> {
        let path = self.config.dataset_path(Dataset::Items);
        let existing = dataset::load_records(&self.storage, &path, Dataset::Items.records_field()).await?;
        let (merged, report) = merge::replace_by_name(existing, data.clone());
        log_summary(&merged);

        Ok(TransformResult {
            processed_records: data,
            document: records_document(&merged),
            report,
            extra_outputs: Vec::new(),
        })
    }

    async fn load(&self, result: TransformResult) -> Result<String> {
        let path = self.config.dataset_path(Dataset::Items);
        write_outputs(&self.storage, &path, None, &result).await
    }
}
