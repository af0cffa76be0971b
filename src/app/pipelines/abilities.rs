use super::write_outputs;
use crate::adapters::http::resolve_url;
use crate::core::{dataset, merge};
use crate::domain::model::{Dataset, OutputFile, Record, TransformResult};
use crate::domain::ports::{ConfigProvider, PageFetcher, Pipeline, Storage};
use crate::utils::error::Result;
use crate::utils::html;
use chrono::Local;
use scraper::{ElementRef, Html};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::fmt::Write as _;

/// 能力索引下拉選單中的一個項目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbilityLink {
    pub name: String,
    pub link: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AbilityInteractions {
    pub blocks: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AbilityRecord {
    pub name: String,
    pub japanese_name: String,
    pub game_description: String,
    pub technical_effect: String,
    pub full_description: String,
    pub interactions: AbilityInteractions,
    pub pokemon: Vec<String>,
}

/// 解析能力索引頁的兩個下拉選單 (A-L、M-Z)
pub fn parse_ability_index(page: &str) -> Result<Vec<AbilityLink>> {
    let document = Html::parse_document(page);
    let option_sel = html::selector("select option")?;
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for form_name in ["ability", "ability2"] {
        let form_sel = html::selector(&format!("form[name=\"{}\"]", form_name))?;
        let Some(form) = document.select(&form_sel).next() else {
            continue;
        };

        for option in form.select(&option_sel) {
            let link = option.value().attr("value").unwrap_or_default();
            let name = html::stripped_text(option);
            if link.is_empty() || link == "index.shtml" || name.contains("AbilityDex") {
                continue;
            }

            let link = link.strip_prefix('/').unwrap_or(link).to_string();
            if seen.insert((name.to_lowercase(), link.to_lowercase())) {
                links.push(AbilityLink { name, link });
            } else {
                tracing::debug!("   Skipping duplicate ability {}", name);
            }
        }
    }

    Ok(links)
}

fn row_texts(row: ElementRef<'_>) -> Vec<String> {
    html::cells(row).into_iter().map(html::stripped_text).collect()
}

/// 解析能力詳細頁
pub fn parse_ability_page(page: &str) -> Result<AbilityRecord> {
    let document = Html::parse_document(page);
    let mut ability = AbilityRecord {
        name: "Unknown".to_string(),
        ..Default::default()
    };

    for css in ["h1", "h2", "title"] {
        if let Some(el) = document.select(&html::selector(css)?).next() {
            ability.name = html::stripped_text(el);
            break;
        }
    }

    let table_sel = html::selector("table.dextable")?;
    let row_sel = html::selector("tr")?;
    let mut game_text = String::new();
    let mut in_depth = String::new();

    for table in document.select(&table_sel) {
        let rows: Vec<Vec<String>> = table.select(&row_sel).map(row_texts).collect();

        for (i, cells) in rows.iter().enumerate() {
            let next = rows.get(i + 1);

            if cells.iter().any(|c| c.contains("Jp. Name")) {
                if let Some(jp) = next.and_then(|r| r.get(3)) {
                    ability.japanese_name = jp.clone();
                }
            }
            if cells.iter().any(|c| c.contains("Game's Text:")) {
                if let Some(text) = next.and_then(|r| r.first()) {
                    game_text = text.clone();
                }
            }
            if cells.iter().any(|c| c.contains("In-Depth Effect:")) {
                if let Some(text) = next.and_then(|r| r.first()) {
                    in_depth = text.clone();
                }
            }
            for cell in cells {
                if cell.contains("Blocks") && cell != "Blocks" {
                    ability.interactions.blocks.push(cell.clone());
                }
            }
        }

        // 第一列有 "No." 的表格是擁有此能力的寶可夢
        let is_pokemon_table = table
            .select(&row_sel)
            .next()
            .is_some_and(|first| html::cells(first).into_iter().any(|c| html::raw_text(c).contains("No.")));
        if is_pokemon_table {
            for cells in rows.iter().skip(2) {
                if let Some(name) = cells.get(2).filter(|n| !n.is_empty()) {
                    if !ability.pokemon.contains(name) {
                        ability.pokemon.push(name.clone());
                    }
                }
            }
        }
    }

    ability.full_description = match (game_text.is_empty(), in_depth.is_empty()) {
        (false, false) => format!("{} (Effect: {})", game_text, in_depth),
        (false, true) => game_text.clone(),
        (true, false) => in_depth.clone(),
        (true, true) => "Description not found".to_string(),
    };
    ability.game_description = game_text;
    ability.technical_effect = in_depth;

    Ok(ability)
}

/// 能力資料的純文字報表
pub fn render_text_report(abilities: &[Record]) -> String {
    let rule = "=".repeat(80);
    let mut out = String::new();
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "POKEMON ABILITY DEX");
    let _ = writeln!(out, "Scraped from Serebii.net");
    let _ = writeln!(out, "Total Abilities: {}", abilities.len());
    let _ = writeln!(out, "{}\n", rule);

    for (i, ability) in abilities.iter().enumerate() {
        let field = |key: &str| ability.get_str(key).unwrap_or_default();
        let list = |value: Option<&Value>| -> Vec<String> {
            value
                .and_then(Value::as_array)
                .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
                .unwrap_or_default()
        };

        let _ = writeln!(out, "[{:03}] {}", i + 1, field("name").to_uppercase());
        let _ = writeln!(out, "{}", "-".repeat(60));
        if !field("japanese_name").is_empty() {
            let _ = writeln!(out, "Japanese Name: {}", field("japanese_name"));
        }
        let _ = writeln!(out, "Game Description: {}", field("game_description"));
        if !field("technical_effect").is_empty() {
            let _ = writeln!(out, "Technical Effect: {}", field("technical_effect"));
        }

        let blocks = list(ability.get("interactions").and_then(|i| i.get("blocks")));
        if !blocks.is_empty() {
            let _ = writeln!(out, "Interactions:");
            for block in &blocks {
                let _ = writeln!(out, "  - {}", block);
            }
        }

        let pokemon = list(ability.get("pokemon"));
        if !pokemon.is_empty() {
            let _ = writeln!(out, "Pokemon with this ability ({}):", pokemon.len());
            let mut shown = pokemon.iter().take(10).cloned().collect::<Vec<_>>().join(", ");
            if pokemon.len() > 10 {
                let _ = write!(shown, " ... and {} more", pokemon.len() - 10);
            }
            let _ = writeln!(out, "  {}", shown);
        }

        let _ = writeln!(out, "\n{}\n", rule);
    }

    out
}

/// 能力圖鑑抓取，輸出 JSON 與文字報表
pub struct AbilitiesPipeline<S: Storage, F: PageFetcher, C: ConfigProvider> {
    storage: S,
    fetcher: F,
    config: C,
    limit: Option<usize>,
}

impl<S: Storage, F: PageFetcher, C: ConfigProvider> AbilitiesPipeline<S, F, C> {
    pub fn new(storage: S, fetcher: F, config: C, limit: Option<usize>) -> Self {
        Self {
            storage,
            fetcher,
            config,
            limit,
        }
    }

    fn index_url(&self) -> String {
        format!("{}/abilitydex/", self.config.site_root().trim_end_matches('/'))
    }
}

#[async_trait::async_trait]
impl<S: Storage, F: PageFetcher, C: ConfigProvider> Pipeline for AbilitiesPipeline<S, F, C> {
    async fn extract(&self) -> Result<Vec<Record>> {
        let index = self.fetcher.fetch(&self.index_url()).await?;
        let mut links = parse_ability_index(&index)?;
        tracing::info!("📚 Found {} unique abilities", links.len());
        if let Some(limit) = self.limit {
            links.truncate(limit);
        }

        let mut records = Vec::with_capacity(links.len());
        for (i, entry) in links.iter().enumerate() {
            tracing::info!("[{}/{}] Processing {}", i + 1, links.len(), entry.name);
            let url = resolve_url(self.config.site_root(), &entry.link);

            let ability = match self.fetcher.fetch(&url).await {
                Ok(page) => parse_ability_page(&page)?,
                Err(e) if e.is_recoverable() => {
                    tracing::warn!("⚠️ Skipping {}: {}", entry.name, e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            if let Some(record) = Record::from_serialize(&ability)? {
                records.push(record);
            }
        }

        Ok(records)
    }

    async fn transform(&self, data: Vec<Record>) -> Result<TransformResult> {
        let path = self.config.dataset_path(Dataset::Abilities);
        let existing =
            dataset::load_records(&self.storage, &path, Dataset::Abilities.records_field()).await?;
        let (merged, report) = merge::replace_by_name(existing, data.clone());

        let document = json!({
            "metadata": {
                "source": "Serebii.net",
                "scraped_date": Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
                "total_abilities": merged.len(),
                "version": "1.0",
            },
            "abilities": merged,
        });
        let report_text = render_text_report(&merged);

        Ok(TransformResult {
            processed_records: data,
            document,
            report,
            extra_outputs: vec![OutputFile {
                path: self.config.abilities_text_path(),
                contents: report_text.into_bytes(),
            }],
        })
    }

    async fn load(&self, result: TransformResult) -> Result<String> {
        let path = self.config.dataset_path(Dataset::Abilities);
        write_outputs(&self.storage, &path, None, &result).await
    }
}
