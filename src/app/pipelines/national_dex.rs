use super::{records_document, write_outputs};
use crate::core::{dataset, merge};
use crate::domain::model::{Dataset, Record, TransformResult};
use crate::domain::ports::{ConfigProvider, PageFetcher, Pipeline, Storage};
use crate::utils::error::Result;
use crate::utils::html;
use crate::utils::text::type_from_image_src;
use scraper::{ElementRef, Html};
use serde::Serialize;

/// 全國圖鑑的最後一號
const LAST_NATIONAL_NUMBER: u32 = 1025;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BaseStats {
    pub hp: Option<u32>,
    pub attack: Option<u32>,
    pub defense: Option<u32>,
    pub sp_attack: Option<u32>,
    pub sp_defense: Option<u32>,
    pub speed: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NationalDexEntry {
    pub number: String,
    pub name: String,
    pub abilities: Vec<String>,
    pub types: Vec<String>,
    pub base_stats: BaseStats,
}

/// 解析全國圖鑑頁
pub fn parse_national_dex(page: &str) -> Result<Vec<NationalDexEntry>> {
    let document = Html::parse_document(page);
    let table_sel = html::selector("table.dextable")?;
    let row_sel = html::selector("tr")?;
    let td_sel = html::selector("td")?;
    let link_sel = html::selector("a")?;
    let img_sel = html::selector("img")?;

    let mut entries = Vec::new();
    for table in document.select(&table_sel) {
        for row in table.select(&row_sel) {
            let cols: Vec<ElementRef> = row.select(&td_sel).collect();
            if cols.len() < 12 {
                continue;
            }

            let number = html::stripped_text(cols[0]);
            let Some(numeric) = number.strip_prefix('#').and_then(|n| n.parse::<u32>().ok()) else {
                continue;
            };

            let name = cols[3]
                .select(&link_sel)
                .next()
                .map(html::stripped_text)
                .unwrap_or_else(|| html::stripped_text(cols[3]));
            if name.is_empty() || name == "Unknown" {
                continue;
            }

            let mut abilities: Vec<String> = Vec::new();
            let mut types: Vec<String> = Vec::new();
            for col in &cols {
                for link in col.select(&link_sel) {
                    let is_ability = link.value().attr("href").is_some_and(|h| h.contains("abilitydex"));
                    let ability = html::stripped_text(link);
                    if is_ability && !ability.is_empty() && !abilities.contains(&ability) {
                        abilities.push(ability);
                    }
                }
                for img in col.select(&img_sel) {
                    if let Some(kind) = img.value().attr("src").and_then(type_from_image_src) {
                        if !types.contains(&kind) {
                            types.push(kind);
                        }
                    }
                }
            }

            let stat = |index: usize| -> Option<u32> {
                let value = html::stripped_text(*cols.get(index)?);
                if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
                    value.parse().ok()
                } else {
                    None
                }
            };

            entries.push(NationalDexEntry {
                number,
                name,
                abilities,
                types,
                base_stats: BaseStats {
                    hp: stat(7),
                    attack: stat(8),
                    defense: stat(9),
                    sp_attack: stat(10),
                    sp_defense: stat(11),
                    speed: stat(12),
                },
            });

            if numeric >= LAST_NATIONAL_NUMBER {
                break;
            }
        }
    }

    Ok(entries)
}

/// 全國圖鑑抓取: 編號、名稱、能力、屬性、種族值
pub struct NationalDexPipeline<S: Storage, F: PageFetcher, C: ConfigProvider> {
    storage: S,
    fetcher: F,
    config: C,
}

impl<S: Storage, F: PageFetcher, C: ConfigProvider> NationalDexPipeline<S, F, C> {
    pub fn new(storage: S, fetcher: F, config: C) -> Self {
        Self {
            storage,
            fetcher,
            config,
        }
    }

    fn page_url(&self) -> String {
        format!(
            "{}/pokemon/nationalpokedex.shtml",
            self.config.site_root().trim_end_matches('/')
        )
    }
}

#[async_trait::async_trait]
impl<S: Storage, F: PageFetcher, C: ConfigProvider> Pipeline for NationalDexPipeline<S, F, C> {
    async fn extract(&self) -> Result<Vec<Record>> {
        let url = self.page_url();
        tracing::info!("📖 Fetching national dex from {}", url);
        let page = self.fetcher.fetch(&url).await?;

        let entries = parse_national_dex(&page)?;
        if entries.is_empty() {
            tracing::warn!("⚠️ No dex rows found on {}", url);
        }

        let mut records = Vec::with_capacity(entries.len());
        for entry in &entries {
            tracing::debug!("➕ {} {} {:?}", entry.number, entry.name, entry.types);
            if let Some(record) = Record::from_serialize(entry)? {
                records.push(record);
            }
        }
        Ok(records)
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

    const PAGE: &str = r#"<html><body>
<table class="dextable">
<tr><td>No.</td><td>Pic</td><td></td><td>Name</td><td>Abilities</td><td>Type</td><td></td><td>HP</td><td>Att</td><td>Def</td><td>S.Att</td><td>S.Def</td><td>Spd</td></tr>
<tr>
  <td class="fooinfo"> #0001 </td><td><img src="/pokemon/small/001.png"></td><td></td>
  <td><a href="/pokedex-sv/bulbasaur/">Bulbasaur</a></td>
  <td><a href="/abilitydex/overgrow.shtml">Overgrow</a><a href="/abilitydex/chlorophyll.shtml">Chlorophyll</a><a href="/abilitydex/overgrow.shtml">Overgrow</a></td>
  <td><img src="/pokedex-bw/type/grass.gif"><img src="/pokedex-bw/type/poison.gif"></td><td></td>
  <td>45</td><td>49</td><td>49</td><td>65</td><td>65</td><td>45</td>
</tr>
<tr>
  <td>#1025</td><td></td><td></td><td>Pecharunt</td><td></td>
  <td><img src="/pokedex-bw/type/poison.png"></td><td></td>
  <td>88</td><td>?</td><td>160</td><td>88</td><td>88</td><td>88</td>
</tr>
<tr>
  <td>#1026</td><td></td><td></td><td>Nobody</td><td></td><td></td><td></td>
  <td>1</td><td>1</td><td>1</td><td>1</td><td>1</td><td>1</td>
</tr>
</table></body></html>"#;

    #[test]
    fn test_parse_national_dex() {
        let entries = parse_national_dex(PAGE).unwrap();
        assert_eq!(entries.len(), 2);

        let bulbasaur = &entries[0];
        assert_eq!(bulbasaur.number, "#0001");
        assert_eq!(bulbasaur.name, "Bulbasaur");
        assert_eq!(bulbasaur.abilities, vec!["Overgrow", "Chlorophyll"]);
        assert_eq!(bulbasaur.types, vec!["Grass", "Poison"]);
        assert_eq!(bulbasaur.base_stats.hp, Some(45));
        assert_eq!(bulbasaur.base_stats.speed, Some(45));

        // name without a link, non-numeric stat becomes null
        let pecharunt = &entries[1];
        assert_eq!(pecharunt.name, "Pecharunt");
        assert_eq!(pecharunt.types, vec!["Poison"]);
        assert_eq!(pecharunt.base_stats.attack, None);
        assert_eq!(pecharunt.base_stats.defense, Some(160));
    }

    #[test]
    fn test_entry_serializes_to_record_shape() {
        let entries = parse_national_dex(PAGE).unwrap();
        let record = Record::from_serialize(&entries[1]).unwrap().unwrap();
        assert_eq!(record.get_str("number"), Some("#1025"));
        assert!(record.get("base_stats").unwrap().get("attack").unwrap().is_null());
    }
}
