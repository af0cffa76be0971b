use super::{records_document, write_outputs, ScrapeOptions};
use crate::core::{dataset, merge, regions};
use crate::domain::model::{Dataset, Record, TransformResult};
use crate::domain::ports::{ConfigProvider, PageFetcher, Pipeline, Storage};
use crate::utils::error::Result;
use crate::utils::html;
use crate::utils::text::format_name_for_page;
use scraper::Html;
use serde_json::{json, Map, Value};

/// 從個別頁面的圖鑑儲存格取出各遊戲的地區圖鑑編號
pub fn parse_game_appearances(page: &str) -> Result<Map<String, Value>> {
    let document = Html::parse_document(page);
    let mut appearances = Map::new();

    for cell in document.select(&html::selector("td.fooinfo")?) {
        let text = html::stripped_text(cell);
        if !regions::mentions_region(&text) {
            continue;
        }
        for entry in regions::parse_dex_info(&text) {
            let games = regions::map_region_to_games(&entry.region);
            if !games.is_empty() {
                tracing::debug!("🎮 {} #{} -> {}", entry.region, entry.number, games.join(", "));
            }
            for game in games {
                appearances.insert(
                    game.to_string(),
                    json!({"dex_number": entry.number, "available": true}),
                );
            }
        }
    }

    Ok(appearances)
}

/// 只更新 `game_appearances` 的輕量抓取
pub struct GameDexPipeline<S: Storage, F: PageFetcher, C: ConfigProvider> {
    storage: S,
    fetcher: F,
    config: C,
    options: ScrapeOptions,
}

impl<S: Storage, F: PageFetcher, C: ConfigProvider> GameDexPipeline<S, F, C> {
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
            format_name_for_page(name)
        )
    }
}

#[async_trait::async_trait]
impl<S: Storage, F: PageFetcher, C: ConfigProvider> Pipeline for GameDexPipeline<S, F, C> {
    async fn extract(&self) -> Result<Vec<Record>> {
        let path = self.config.dataset_path(Dataset::Pokemon);
        let existing = dataset::load_records(&self.storage, &path, None).await?;
        let names: Vec<String> = self
            .options
            .window(&existing)
            .iter()
            .filter_map(|p| p.name().map(str::to_string))
            .collect();

        let mut scraped = Vec::new();
        for (i, name) in names.iter().enumerate() {
            tracing::info!("[{}/{}] Processing {}", i + 1, names.len(), name);

            let appearances = match self.fetcher.fetch(&self.page_url(name)).await {
                Ok(page) => parse_game_appearances(&page)?,
                Err(e) if e.is_recoverable() => {
                    tracing::warn!("⚠️ Skipping {}: {}", name, e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            if appearances.is_empty() {
                tracing::info!("   No dex entries found for {}", name);
                continue;
            }

            let mut record = Record::new();
            record.insert("name", name.as_str());
            record.insert("game_appearances", appearances);
            scraped.push(record);
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

    #[test]
    fn test_parse_game_appearances() {
        let page = r#"<table>
<tr><td class="fooinfo">National:#0025Kanto (Let's Go):#025Galar:#194Paldea:#074Kitakami:#000</td></tr>
<tr><td class="fooinfo">Mouse Pokémon</td></tr>
</table>"#;
        let appearances = parse_game_appearances(page).unwrap();

        assert_eq!(appearances["Let's Go Eevee"], json!({"dex_number": 25, "available": true}));
        assert_eq!(appearances["Shield"]["dex_number"], 194);
        // Kitakami shares the Scarlet/Violet slot and comes later in the cell
        assert_eq!(appearances["Scarlet"]["dex_number"], 0);
        assert_eq!(appearances.len(), 6);
    }

    #[test]
    fn test_page_without_dex_cells() {
        assert!(parse_game_appearances("<p>Missing</p>").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pipeline_updates_appearances_and_skips_failures() {
        let storage = MockStorage::new();
        storage
            .put_json(
                "data/pokemon_data.json",
                &json!([
                    {
                        "name": "Pikachu",
                        "number": "#0025",
                        "game_appearances": {
                            "Shield": {"dex_number": 194, "available": true, "location": "Route 4"}
                        }
                    },
                    {"name": "Mr. Mime", "number": "#0122"}
                ]),
            )
            .await;
        let fetcher = MockFetcher::new(&[(
            "/pokemon/pikachu/",
            r#"<td class="fooinfo">National:#0025Galar:#194Paldea:#074</td>"#,
        )]);

        let pipeline = GameDexPipeline::new(
            storage.clone(),
            fetcher.clone(),
            mock_config(),
            ScrapeOptions::default(),
        );
        let path = EtlEngine::new(pipeline).run().await.unwrap();
        assert_eq!(path, "data/pokemon_data.json");

        let saved = storage.get_json(&path).await.unwrap();
        let pikachu = &saved[0]["game_appearances"];
        assert_eq!(pikachu["Shield"]["location"], "Route 4");
        assert_eq!(pikachu["Violet"]["dex_number"], 74);
        assert!(saved[1].get("game_appearances").is_none());

        // the failed page was requested and skipped
        assert!(fetcher
            .requested()
            .await
            .contains(&"https://dex.test/pokemon/mrmime/".to_string()));
        assert!(storage.contains("data/pokemon_data_backup.json").await);
    }
}
