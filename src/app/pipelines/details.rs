use super::{records_document, write_outputs, ScrapeOptions};
use crate::core::{dataset, merge, regions};
use crate::domain::model::{Dataset, Record, TransformResult};
use crate::domain::ports::{ConfigProvider, PageFetcher, Pipeline, Storage};
use crate::utils::error::Result;
use crate::utils::html;
use crate::utils::text::{self, clean_text, extract_number, format_name_for_url};
use regex::Regex;
use scraper::{ElementRef, Html};
use serde_json::{json, Map, Value};
use std::sync::LazyLock;

static EVOLUTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)evolve|evolution").expect("valid evolution regex"));

/// 每處理幾隻存檔一次
const CHECKPOINT_EVERY: usize = 50;

/// 解析個別寶可夢頁面，回傳只含抓到欄位的部分記錄 (不含名稱)
pub fn parse_details(page: &str) -> Result<Record> {
    let document = Html::parse_document(page);
    let mut record = Record::new();

    let mut physical = Map::new();
    let mut appearances = Map::new();
    for cell in document.select(&html::selector("td.fooinfo")?) {
        let cell_text = html::stripped_text(cell);
        if regions::mentions_region(&cell_text) {
            add_dex_appearances(&cell_text, &mut appearances);
        } else if is_species(&cell_text) {
            if !physical.contains_key("species") {
                physical.insert("species".into(), Value::from(clean_text(&cell_text)));
            }
        } else if text::has_height_and_weight(&cell_text) {
            physical.extend(text::parse_height_weight(&cell_text));
        }
    }
    if !physical.is_empty() {
        record.insert("physical_info", physical);
    }
    if !appearances.is_empty() {
        record.insert("game_appearances", appearances);
    }

    parse_table_rows(&document, &mut record)?;

    let evolution_text = evolution_texts(&document);
    if !evolution_text.is_empty() {
        record.insert(
            "evolution_info",
            json!({"has_evolution_data": true, "evolution_text": evolution_text}),
        );
    }

    let location_tables = document
        .select(&html::selector("table")?)
        .filter(|table| is_location_table(*table))
        .count();
    if location_tables > 0 {
        record.insert(
            "locations",
            json!({"has_location_data": true, "location_count": location_tables}),
        );
    }

    Ok(record)
}

fn is_species(cell_text: &str) -> bool {
    cell_text.ends_with("Pokémon") || cell_text.ends_with("Pokemon")
}

fn add_dex_appearances(cell_text: &str, appearances: &mut Map<String, Value>) {
    for entry in regions::parse_dex_info(cell_text) {
        let region = regions::simplify_region_name(&entry.region);
        for game in regions::map_region_to_games(&entry.region) {
            appearances.insert(
                game.to_string(),
                json!({"dex_number": entry.number, "available": true, "region": region}),
            );
        }
    }
}

fn parse_table_rows(document: &Html, record: &mut Record) -> Result<()> {
    for row in document.select(&html::selector("tr")?) {
        let cells = html::cells(row);
        if cells.len() < 2 {
            continue;
        }
        let header = clean_text(&html::raw_text(cells[0]));
        let value = clean_text(&html::raw_text(cells[1]));
        let key = header.to_lowercase();

        if key.contains("ability") {
            record
                .object_mut("abilities_detailed")
                .insert(header, Value::from(value));
        } else if key.contains("egg group") {
            let groups: Vec<&str> = value.split(", ").collect();
            record
                .object_mut("breeding_info")
                .insert("egg_groups".into(), json!(groups));
        } else if key.contains("gender ratio") {
            record
                .object_mut("breeding_info")
                .insert("gender_ratio".into(), Value::from(value));
        } else if key.contains("catch rate") {
            record.insert("catch_rate", extract_number(&value));
        } else if key.contains("base happiness") {
            record.insert("base_happiness", extract_number(&value));
        } else if key.contains("growth rate") {
            record.insert("growth_rate", value);
        }
    }
    Ok(())
}

fn evolution_texts(document: &Html) -> Vec<String> {
    document
        .root_element()
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            if !EVOLUTION.is_match(text) {
                return None;
            }
            let parent = node.parent().and_then(ElementRef::wrap)?;
            if matches!(parent.value().name(), "script" | "style") {
                return None;
            }
            Some(parent)
        })
        .take(3)
        .map(|parent| clean_text(&html::raw_text(parent)))
        .filter(|t| t.chars().count() > 10 && t.chars().count() < 200)
        .collect()
}

fn is_location_table(table: ElementRef<'_>) -> bool {
    table.value().classes().any(|class| {
        let class = class.to_lowercase();
        class.contains("location") || class.contains("encounter")
    })
}

/// 逐隻抓取個別頁面，補齊外觀、地區圖鑑、繁殖、進化與出沒資訊
pub struct DetailsPipeline<S: Storage, F: PageFetcher, C: ConfigProvider> {
    storage: S,
    fetcher: F,
    config: C,
    options: ScrapeOptions,
}

impl<S: Storage, F: PageFetcher, C: ConfigProvider> DetailsPipeline<S, F, C> {
    pub fn new(storage: S, fetcher: F, config: C, options: ScrapeOptions) -> Self {
        Self {
            storage,
            fetcher,
            config,
            options,
        }
    }

    fn page_url(&self, name: &str) -> String {
        format!(
            "{}/pokemon/{}/",
            self.config.site_root().trim_end_matches('/'),
            format_name_for_url(name)
        )
    }

    async fn scrape_one(&self, name: &str) -> Result<Record> {
        let page = self.fetcher.fetch(&self.page_url(name)).await?;
        let mut partial = parse_details(&page)?;
        partial.insert("name", name);
        Ok(partial)
    }

    /// 只抓一隻並回傳合併後的結果，不寫檔
    pub async fn preview(&self, name: &str) -> Result<Option<Record>> {
        let path = self.config.dataset_path(Dataset::Pokemon);
        let existing = dataset::load_records(&self.storage, &path, None).await?;
        let wanted = name.trim().to_lowercase();

        let Some(entity) = existing.iter().find(|p| p.identity().as_deref() == Some(wanted.as_str())) else {
            tracing::warn!("⚠️ {} not found in {}", name, path);
            return Ok(None);
        };
        let Some(entity_name) = entity.name() else {
            return Ok(None);
        };

        let partial = self.scrape_one(entity_name).await?;
        Ok(Some(merge::merge_records(entity, &partial)))
    }

    async fn checkpoint(&self, scraped: &[Record]) -> Result<()> {
        let path = self.config.dataset_path(Dataset::Pokemon);
        let existing = dataset::load_records(&self.storage, &path, None).await?;
        let (merged, _) = merge::merge_into_dataset(existing, scraped.to_vec());
        dataset::save_json(&self.storage, &path, &records_document(&merged)).await?;
        tracing::info!("💾 Progress saved ({} entities scraped)", scraped.len());
        Ok(())
    }
}

#[async_trait::async_trait]
impl<S: Storage, F: PageFetcher, C: ConfigProvider> Pipeline for DetailsPipeline<S, F, C> {
    async fn extract(&self) -> Result<Vec<Record>> {
        let path = self.config.dataset_path(Dataset::Pokemon);
        let existing = dataset::load_records(&self.storage, &path, None).await?;
        if existing.is_empty() {
            tracing::warn!("⚠️ No entities in {}, run the national dex scrape first", path);
            return Ok(Vec::new());
        }

        let names: Vec<String> = self
            .options
            .window(&existing)
            .iter()
            .filter_map(|p| p.name().map(str::to_string))
            .collect();
        let total = existing.len();
        tracing::info!("🔎 Scraping details for {} of {} entities", names.len(), total);

        let mut scraped = Vec::with_capacity(names.len());
        for (offset, name) in names.iter().enumerate() {
            let position = self.options.start + offset + 1;
            tracing::info!("[{}/{}] Processing {}", position, total, name);

            match self.scrape_one(name).await {
                Ok(partial) => scraped.push(partial),
                Err(e) if e.is_recoverable() => {
                    tracing::warn!("⚠️ Skipping {}: {}", name, e);
                    continue;
                }
                Err(e) => return Err(e),
            }

            if position % CHECKPOINT_EVERY == 0 {
                self.checkpoint(&scraped).await?;
            }
        }

        Ok(scraped)
    }

    async fn transform(&self, data: Vec<Record>) -> Result<TransformResult> {
        let path = self.config.dataset_path(Dataset::Pokemon);
        let existing = dataset::load_records(&self.storage, &path, None).await?;
        let (merged, report) = merge::merge_into_dataset(existing, data.clone());

        Ok(TransformResult {
            processed_records: data,
            document: records_document(&merged),
            report,
            extra_outputs: Vec::new(),
        })
    }

    async fn load(&self, result: TransformResult) -> Result<String> {
        let path = self.config.dataset_path(Dataset::Pokemon);
        write_outputs(&self.storage, &path, None, &result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::pipelines::testing::{mock_config, MockFetcher, MockStorage};
    use crate::core::etl::EtlEngine;

    const PAGE: &str = r#"<html><head><script>var evolution = "ignored script text";</script></head><body>
<table class="dextable">
  <tr><td class="fooinfo">Seed Pokémon</td></tr>
  <tr><td class="fooinfo">2'04"0.7m</td><td class="fooinfo">15.2lbs6.9kg</td><td class="fooinfo">2'04" 0.7m 15.2lbs 6.9kg</td></tr>
  <tr><td class="fooinfo">National:#0001Kanto (RBY):#001Johto (HGSS):#231Unova (BW):#000</td></tr>
</table>
<table>
  <tr><td>Hidden Ability</td><td>Chlorophyll &amp; more</td></tr>
  <tr><td>Egg Groups</td><td>Monster, Grass</td></tr>
  <tr><th>Gender Ratio</th><td>Male: 87.5% Female: 12.5%</td></tr>
  <tr><td>Catch Rate</td><td>45 (5.9%)</td></tr>
  <tr><td>Base Happiness</td><td>50</td></tr>
  <tr><td>Growth Rate</td><td>Medium Slow</td></tr>
</table>
<p>Bulbasaur evolves into Ivysaur at level 16.</p>
<p>Evolution</p>
<table class="locationTable"><tr><td>Route 1</td></tr></table>
<table class="EncounterList"><tr><td>Route 2</td></tr></table>
</body></html>"#;

    #[test]
    fn test_parse_physical_and_dex_info() {
        let record = parse_details(PAGE).unwrap();
        let physical = record.get("physical_info").unwrap();
        assert_eq!(physical["species"], "Seed Pokémon");
        assert_eq!(physical["height_feet"], 2);
        assert_eq!(physical["weight_kilograms"], 6.9);

        let games = record.get("game_appearances").unwrap();
        assert_eq!(games["Red"], json!({"dex_number": 1, "available": true, "region": "Kanto"}));
        assert_eq!(games["HeartGold"]["dex_number"], 231);
        assert_eq!(games["White"]["dex_number"], 0);
        assert!(games.get("National").is_none());
    }

    #[test]
    fn test_parse_table_rows() {
        let record = parse_details(PAGE).unwrap();
        assert_eq!(
            record.get("abilities_detailed").unwrap()["Hidden Ability"],
            "Chlorophyll & more"
        );
        let breeding = record.get("breeding_info").unwrap();
        assert_eq!(breeding["egg_groups"], json!(["Monster", "Grass"]));
        assert_eq!(breeding["gender_ratio"], "Male: 87.5% Female: 12.5%");
        assert_eq!(record.get("catch_rate").unwrap(), 45);
        assert_eq!(record.get("base_happiness").unwrap(), 50);
        assert_eq!(record.get_str("growth_rate"), Some("Medium Slow"));
    }

    #[test]
    fn test_evolution_and_locations() {
        let record = parse_details(PAGE).unwrap();
        let evolution = record.get("evolution_info").unwrap();
        assert_eq!(evolution["has_evolution_data"], true);
        // the short "Evolution" paragraph is matched but too short to keep
        assert_eq!(
            evolution["evolution_text"],
            json!(["Bulbasaur evolves into Ivysaur at level 16."])
        );
        assert_eq!(record.get("locations").unwrap()["location_count"], 2);
    }

    #[test]
    fn test_empty_page_yields_empty_record() {
        let record = parse_details("<html><body><p>nothing</p></body></html>").unwrap();
        assert!(record.data.is_empty());
    }

    async fn seeded_storage() -> MockStorage {
        let storage = MockStorage::new();
        storage
            .put_json(
                "data/pokemon_data.json",
                &json!([
                    {"name": "Bulbasaur", "number": "#0001", "types": ["Grass", "Poison"]},
                    {"name": "Ivysaur", "number": "#0002"}
                ]),
            )
            .await;
        storage
    }

    #[tokio::test]
    async fn test_pipeline_merges_details_into_dataset() {
        let storage = seeded_storage().await;
        let fetcher = MockFetcher::new(&[("/pokemon/bulbasaur/", PAGE)]);
        let pipeline = DetailsPipeline::new(
            storage.clone(),
            fetcher,
            mock_config(),
            ScrapeOptions::default(),
        );

        EtlEngine::new(pipeline).run().await.unwrap();

        let saved = storage.get_json("data/pokemon_data.json").await.unwrap();
        assert_eq!(saved.as_array().unwrap().len(), 2);
        assert_eq!(saved[0]["types"], json!(["Grass", "Poison"]));
        assert_eq!(saved[0]["physical_info"]["species"], "Seed Pokémon");
        // Ivysaur's page is missing, so its record is untouched
        assert_eq!(saved[1], json!({"name": "Ivysaur", "number": "#0002"}));
    }

    #[tokio::test]
    async fn test_preview_does_not_write() {
        let storage = seeded_storage().await;
        let fetcher = MockFetcher::new(&[("/pokemon/bulbasaur/", PAGE)]);
        let pipeline = DetailsPipeline::new(
            storage.clone(),
            fetcher,
            mock_config(),
            ScrapeOptions::default(),
        );

        let record = pipeline.preview("BULBASAUR").await.unwrap().unwrap();
        assert_eq!(record.get_str("number"), Some("#0001"));
        assert!(record.get("breeding_info").is_some());
        assert!(pipeline.preview("Mew").await.unwrap().is_none());

        let saved = storage.get_json("data/pokemon_data.json").await.unwrap();
        assert!(saved[0].get("breeding_info").is_none());
        assert!(!storage.contains("data/pokemon_data_backup.json").await);
    }
}
