use crate::core::dataset;
use crate::domain::model::{Dataset, Record};
use crate::domain::ports::{ConfigProvider, Storage};
use crate::utils::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `pokemon_games.json` 中的一個世代
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameGeneration {
    pub generation: u32,
    pub region: String,
    pub platform: String,
    pub games: Vec<String>,
}

/// 某款遊戲中可取得的寶可夢
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameDexEntry {
    pub name: String,
    pub national_number: String,
    pub game_dex_number: Option<i64>,
}

/// 對已儲存資料集的查詢
#[derive(Debug, Clone, Default)]
pub struct DexQueries {
    pokemon: Vec<Record>,
    generations: Vec<GameGeneration>,
}

impl DexQueries {
    pub fn new(pokemon: Vec<Record>, generations: Vec<GameGeneration>) -> Self {
        Self {
            pokemon,
            generations,
        }
    }

    pub async fn load<S: Storage, C: ConfigProvider>(storage: &S, config: &C) -> Result<Self> {
        let pokemon =
            dataset::load_records(storage, &config.dataset_path(Dataset::Pokemon), None).await?;

        let generations = match dataset::load_value(storage, &config.dataset_path(Dataset::Games)).await? {
            Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
                tracing::warn!("⚠️ Games dataset has an unexpected shape: {}", e);
                Vec::new()
            }),
            None => Vec::new(),
        };

        Ok(Self::new(pokemon, generations))
    }

    pub fn pokemon(&self) -> &[Record] {
        &self.pokemon
    }

    pub fn names(&self) -> Vec<&str> {
        self.pokemon.iter().filter_map(Record::name).collect()
    }

    pub fn national_numbers(&self) -> Vec<&str> {
        self.pokemon.iter().filter_map(|p| p.get_str("number")).collect()
    }

    /// 每隻寶可夢的指定欄位 (abilities、types、base_stats...)
    pub fn field_values(&self, field: &str) -> Vec<&Value> {
        self.pokemon.iter().filter_map(|p| p.get(field)).collect()
    }

    pub fn pokemon_by_name(&self, name: &str) -> Option<&Record> {
        let wanted = name.trim().to_lowercase();
        self.pokemon
            .iter()
            .find(|p| p.identity().as_deref() == Some(wanted.as_str()))
    }

    /// 接受 `#0001`、`1` 或 `0001`
    pub fn pokemon_by_number(&self, number: &str) -> Option<&Record> {
        let number = number.trim();
        let wanted = match number.strip_prefix('#') {
            Some(_) => number.to_string(),
            None => format!("#{:04}", number.parse::<u32>().ok()?),
        };
        self.pokemon
            .iter()
            .find(|p| p.get_str("number") == Some(wanted.as_str()))
    }

    pub fn all_games(&self) -> Vec<&str> {
        self.generations
            .iter()
            .flat_map(|g| g.games.iter().map(String::as_str))
            .collect()
    }

    pub fn generation_info(&self, generation: u32) -> Option<&GameGeneration> {
        self.generations.iter().find(|g| g.generation == generation)
    }

    pub fn games_by_generation(&self, generation: u32) -> Option<&[String]> {
        self.generation_info(generation).map(|g| g.games.as_slice())
    }

    pub fn games_by_region(&self, region: &str) -> Option<&[String]> {
        self.generations
            .iter()
            .find(|g| g.region.eq_ignore_ascii_case(region.trim()))
            .map(|g| g.games.as_slice())
    }

    pub fn games_by_platform(&self, platform: &str) -> Vec<&str> {
        let wanted = platform.to_lowercase();
        self.generations
            .iter()
            .filter(|g| g.platform.to_lowercase().contains(&wanted))
            .flat_map(|g| g.games.iter().map(String::as_str))
            .collect()
    }

    /// 依遊戲內圖鑑編號排序，沒有編號的排最後
    pub fn pokemon_in_game(&self, game: &str) -> Vec<GameDexEntry> {
        let mut entries: Vec<GameDexEntry> = self
            .pokemon
            .iter()
            .filter_map(|p| {
                let appearance = p.get("game_appearances")?.get(game)?;
                if !appearance.get("available").and_then(Value::as_bool).unwrap_or(false) {
                    return None;
                }
                Some(GameDexEntry {
                    name: p.name()?.to_string(),
                    national_number: p.get_str("number").unwrap_or_default().to_string(),
                    game_dex_number: appearance.get("dex_number").and_then(Value::as_i64),
                })
            })
            .collect();

        entries.sort_by_key(|e| match e.game_dex_number {
            Some(n) if n != 0 => n,
            _ => 9999,
        });
        entries
    }

    pub fn game_availability(&self, name: &str) -> Option<&Map<String, Value>> {
        self.pokemon_by_name(name)?
            .get("game_appearances")?
            .as_object()
    }

    pub fn count_in_game(&self, game: &str) -> usize {
        self.pokemon_in_game(game).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixture() -> DexQueries {
        let pokemon: Vec<Record> = serde_json::from_value(json!([
            {"name": "Bulbasaur", "number": "#0001", "types": ["Grass", "Poison"],
             "game_appearances": {"Red": {"dex_number": 1, "available": true}}},
            {"name": "Mew", "number": "#0151", "types": ["Psychic"],
             "game_appearances": {"Red": {"dex_number": 151, "available": false},
                                  "Scarlet": {"dex_number": 0, "available": true}}},
            {"name": "Pikachu", "number": "#0025", "types": ["Electric"],
             "game_appearances": {"Scarlet": {"dex_number": 74, "available": true}}}
        ]))
        .unwrap();
        let generations: Vec<GameGeneration> = serde_json::from_value(json!([
            {"generation": 1, "region": "Kanto", "platform": "Game Boy", "games": ["Red", "Blue", "Yellow"]},
            {"generation": 9, "region": "Paldea", "platform": "Nintendo Switch", "games": ["Scarlet", "Violet"]}
        ]))
        .unwrap();
        DexQueries::new(pokemon, generations)
    }

    #[test]
    fn test_lookup_by_name_and_number() {
        let queries = fixture();
        assert_eq!(queries.names(), vec!["Bulbasaur", "Mew", "Pikachu"]);
        assert_eq!(queries.pokemon_by_name("PIKACHU").unwrap().get_str("number"), Some("#0025"));
        assert_eq!(queries.pokemon_by_number("25").unwrap().name(), Some("Pikachu"));
        assert_eq!(queries.pokemon_by_number("#0151").unwrap().name(), Some("Mew"));
        assert!(queries.pokemon_by_number("abc").is_none());
        assert_eq!(queries.field_values("types").len(), 3);
    }

    #[test]
    fn test_game_lookups() {
        let queries = fixture();
        assert_eq!(queries.all_games().len(), 5);
        assert_eq!(queries.games_by_generation(9).unwrap(), ["Scarlet", "Violet"]);
        assert_eq!(queries.games_by_region("kanto").unwrap().len(), 3);
        assert_eq!(queries.games_by_platform("switch"), vec!["Scarlet", "Violet"]);
        assert!(queries.games_by_generation(4).is_none());
    }

    #[test]
    fn test_pokemon_in_game_sorted_with_missing_numbers_last() {
        let queries = fixture();
        let scarlet = queries.pokemon_in_game("Scarlet");
        assert_eq!(scarlet[0].name, "Pikachu");
        assert_eq!(scarlet[1].name, "Mew");
        assert_eq!(queries.count_in_game("Red"), 1);
        assert_eq!(queries.game_availability("mew").unwrap().len(), 2);
    }
}
