//! 主圖鑑試算表匯入。
//!
//! 讀取工作表中的基本型態列 (`ref_id` 以 `-00` 結尾，或有名稱但沒有 `ref_id`)，
//! 轉換成與網站抓取相同形狀的記錄後合併進寶可夢資料集。

use super::{records_document, write_outputs};
use crate::config::toml_config::SpreadsheetConfig;
use crate::core::{dataset, merge};
use crate::domain::model::{Dataset, Record, TransformResult};
use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
use crate::utils::error::{EtlError, Result};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::io::Cursor;

const STAT_COLUMNS: [(&str, &str); 6] = [
    ("hp", "HP"),
    ("attack", "Attack"),
    ("defense", "Defense"),
    ("sp_attack", "Sp. Atk"),
    ("sp_defense", "Sp. Def"),
    ("speed", "Speed"),
];

const PHYSICAL_COLUMNS: [(&str, &str); 5] = [
    ("height", "Height"),
    ("weight", "Weight"),
    ("color", "Color"),
    ("shape", "Shape"),
    ("footprint", "Footprint"),
];

const MECHANICS_COLUMNS: [(&str, &str); 3] = [
    ("ev_yield", "EV Yield"),
    ("catch_rate", "Catch Rate"),
    ("base_exp", "Base EXP"),
];

// (欄位, dex_entries 鍵)
const DEX_TEXT_COLUMNS: [(&str, &str); 30] = [
    ("Red Dex Text", "red"),
    ("Blue Dex Text", "blue"),
    ("Yellow Dex Text", "yellow"),
    ("Gold Dex Text", "gold"),
    ("Silver Dex Text", "silver"),
    ("Crystal Dex Text", "crystal"),
    ("Ruby Dex Text", "ruby"),
    ("Sapphire Dex Text", "sapphire"),
    ("Emerald Dex Text", "emerald"),
    ("FireRed Dex Text", "firered"),
    ("LeafGreen Dex Text", "leafgreen"),
    ("Diamond Dex Text", "diamond"),
    ("Pearl Dex Text", "pearl"),
    ("Platinum Dex Text", "platinum"),
    ("HeartGold Dex Text", "heartgold"),
    ("SoulSilver Dex Text", "soulsilver"),
    ("Black Dex Text", "black"),
    ("White Dex Text", "white"),
    ("Black 2 Dex Text", "black2"),
    ("White 2 Dex Text", "white2"),
    ("X Dex Text", "x"),
    ("Y Dex Text", "y"),
    ("Omega Ruby Dex Text", "omegaruby"),
    ("Alpha Sapphire Dex Text", "alphasapphire"),
    ("Sun Dex Text", "sun"),
    ("Moon Dex Text", "moon"),
    ("Ultra Sun Dex Text", "ultrasun"),
    ("Ultra Moon Dex Text", "ultramoon"),
    ("Sword Dex Text", "sword"),
    ("Shield Dex Text", "shield"),
];

struct GameColumn {
    dex: &'static str,
    game: &'static str,
    location: &'static str,
}

const fn game(dex: &'static str, game: &'static str, location: &'static str) -> GameColumn {
    GameColumn { dex, game, location }
}

// 遊戲名稱與網站抓取的 game_appearances 一致
const GAME_COLUMNS: [GameColumn; 42] = [
    game("Red", "Red", "Red Location"),
    game("Blue", "Blue", "Blue Location"),
    game("Yellow", "Yellow", "Yellow Location"),
    game("Gold", "Gold", "Gold Location"),
    game("Silver", "Silver", "Silver Location"),
    game("Crystal", "Crystal", "Crystal Location"),
    game("Ruby", "Ruby", "Ruby Location"),
    game("Sapphire", "Sapphire", "Sapphire Location"),
    game("Emerald", "Emerald", "Emerald Location"),
    game("FireRed", "FireRed", "FireRed Location"),
    game("LeafGreen", "LeafGreen", "LeafGreen Location"),
    game("Diamond", "Diamond", "Diamond Location"),
    game("Pearl", "Pearl", "Pearl Location"),
    game("Platinum", "Platinum", "Platinum Location"),
    game("HeartGold", "HeartGold", "HeartGold Location"),
    game("SoulSilver", "SoulSilver", "SoulSilver Location"),
    game("Black", "Black", "Black Location"),
    game("White", "White", "White Location"),
    game("Black-2", "Black 2", "Black 2 Location"),
    game("White-2", "White 2", "White 2 Location"),
    game("X", "X", "X Location"),
    game("Y", "Y", "Y Location"),
    game("Omega-Ruby", "Omega Ruby", "Omega Ruby Location"),
    game("Alpha-Sapphire", "Alpha Sapphire", "Alpha Sapphire Location"),
    game("Sun", "Sun", "Sun Location"),
    game("Moon", "Moon", "Moon Location"),
    game("Ultra-Sun", "Ultra Sun", "Ultra Sun Location"),
    game("Ultra-Moon", "Ultra Moon", "Ultra Moon Location"),
    game("Lets-Go-Pikachu", "Let's Go Pikachu", "Let's Go Pikachu Location"),
    game("Lets-Go-Eevee", "Let's Go Eevee", "Let's Go Eevee Location"),
    game("Sword", "Sword", "Sword Location"),
    game("Shield", "Shield", "Shield Location"),
    game("The-Isle-Of-Armor", "The Isle of Armor", "The Isle of Armor Location"),
    game("The Crown Tundra", "The Crown Tundra", "The Crown Tundra Location"),
    game("Brilliant-Diamond", "Brilliant Diamond", "Brilliant Diamond Location"),
    game("Shining-Pearl", "Shining Pearl", "Shining Pearl Location"),
    game("Legends-Arceus", "Legends Arceus", "Legends: Arceus Location"),
    game("Scarlet", "Scarlet", "Scarlet Location"),
    game("Violet", "Violet", "Violet Location"),
    game("The-Teal-Mask", "The Teal Mask", "The Teal Mask Location"),
    game("The-Indigo-Disk", "The Indigo Disk", "The Indigo Disk Location"),
    game("Legends-Z-A", "Legends Z-A", "Legends: Z-A Location"),
];

/// 工作表內容: 標題列之後的每一列都是 標題 → 值 (空儲存格省略)
#[derive(Debug, Clone, Default)]
pub struct SheetData {
    pub sheet_names: Vec<String>,
    pub headers: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
}

/// 試算表結構摘要
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetSummary {
    pub sheet_names: Vec<String>,
    pub sheet: String,
    pub row_count: usize,
    pub column_count: usize,
    pub first_columns: Vec<String>,
    pub base_forms: usize,
    pub has_ref_id: bool,
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Int(i) => json!(i),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => json!(*f as i64),
        Data::Float(f) => json!(f),
        Data::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                Value::Null
            } else {
                json!(s)
            }
        }
        Data::Bool(b) => json!(b),
        Data::DateTime(_) => json!(cell.to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => json!(s),
        Data::Error(_) | Data::Empty => Value::Null,
    }
}

fn header_text(cell: &Data) -> String {
    match cell_value(cell) {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// 活頁簿中的工作表名稱
pub fn workbook_sheets(bytes: Vec<u8>) -> Result<Vec<String>> {
    let workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    Ok(workbook.sheet_names())
}

/// 讀取工作表，`header_row` 為工作表中的絕對列號 (從 0 起算)
pub fn read_sheet(bytes: Vec<u8>, sheet: &str, header_row: usize) -> Result<SheetData> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let sheet_names = workbook.sheet_names();
    if !sheet_names.iter().any(|name| name == sheet) {
        return Err(EtlError::DatasetError {
            dataset: "spreadsheet".to_string(),
            message: format!("sheet '{}' not found (available: {})", sheet, sheet_names.join(", ")),
        });
    }

    let range = workbook.worksheet_range(sheet)?;
    let first_row = range.start().map_or(0, |(row, _)| row as usize);
    let skip = header_row.saturating_sub(first_row);

    let mut rows = range.rows().skip(skip);
    let headers: Vec<String> = rows
        .next()
        .map(|row| row.iter().map(header_text).collect())
        .unwrap_or_default();

    let mut data = Vec::new();
    for row in rows {
        let mut map = Map::new();
        for (header, cell) in headers.iter().zip(row) {
            if header.is_empty() {
                continue;
            }
            let value = cell_value(cell);
            if !value.is_null() {
                map.insert(header.clone(), value);
            }
        }
        if !map.is_empty() {
            data.push(map);
        }
    }

    Ok(SheetData {
        sheet_names,
        headers: headers.into_iter().filter(|h| !h.is_empty()).collect(),
        rows: data,
    })
}

fn ref_id(row: &Map<String, Value>) -> Option<String> {
    match row.get("ref_id")? {
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn is_base_form(row: &Map<String, Value>) -> bool {
    ref_id(row).is_some_and(|id| id.ends_with("-00"))
}

/// 基本型態列，或有名稱但沒有 ref_id 的列
pub fn is_import_row(row: &Map<String, Value>) -> bool {
    is_base_form(row) || (row.contains_key("Name") && ref_id(row).is_none())
}

/// 數字或可解析成數字的文字 → 整數
fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f as i64),
        _ => None,
    }
}

fn copy_columns(row: &Map<String, Value>, columns: &[(&str, &str)]) -> Map<String, Value> {
    columns
        .iter()
        .filter_map(|(key, column)| row.get(*column).map(|v| (key.to_string(), v.clone())))
        .collect()
}

fn present<'a>(row: &'a Map<String, Value>, columns: &[&str]) -> Vec<&'a Value> {
    columns.iter().filter_map(|c| row.get(*c)).collect()
}

fn game_appearances(row: &Map<String, Value>) -> Map<String, Value> {
    let mut appearances = Map::new();
    for column in &GAME_COLUMNS {
        let Some(dex_number) = row.get(column.dex).and_then(integer) else {
            continue;
        };
        let mut entry = json!({"dex_number": dex_number, "available": true});
        if let Some(location) = row.get(column.location).map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }) {
            if !matches!(location.to_lowercase().as_str(), "nan" | "none") {
                entry["location"] = json!(location);
            }
        }
        appearances.insert(column.game.to_string(), entry);
    }
    appearances
}

/// 單列 → 寶可夢記錄，沒有名稱時回傳 None
pub fn row_to_record(row: &Map<String, Value>) -> Option<Record> {
    let name = row.get("Name")?;
    let mut record = Record::new();
    record.insert("name", name.clone());

    if let Some(number) = row
        .get("National Dex #")
        .or_else(|| row.get("National Dex Number"))
        .and_then(integer)
    {
        record.insert("pokedex_number", number);
    }
    for (key, column) in [("species", "Species"), ("form", "Form")] {
        if let Some(value) = row.get(column) {
            record.insert(key, value.clone());
        }
    }

    let types: Vec<&Value> = [("Type 1 Helper", "Type 1"), ("Type 2 Helper", "Type 2")]
        .iter()
        .filter_map(|(helper, plain)| row.get(*helper).or_else(|| row.get(*plain)))
        .collect();
    if !types.is_empty() {
        record.insert("types", json!(types));
    }

    let mut abilities = Map::new();
    let regular = present(row, &["Ability 1", "Ability 2"]);
    if !regular.is_empty() {
        abilities.insert("regular".to_string(), json!(regular));
    }
    if let Some(hidden) = row.get("Hidden Ability") {
        abilities.insert("hidden".to_string(), hidden.clone());
    }
    if !abilities.is_empty() {
        record.insert("abilities", abilities);
    }

    let mut base_stats: Map<String, Value> = STAT_COLUMNS
        .iter()
        .filter_map(|(key, column)| row.get(*column).and_then(integer).map(|v| (key.to_string(), json!(v))))
        .collect();
    if let Some(total) = row.get("BST").and_then(integer) {
        base_stats.insert("total".to_string(), json!(total));
    }
    if !base_stats.is_empty() {
        record.insert("base_stats", base_stats);
    }

    let physical = copy_columns(row, &PHYSICAL_COLUMNS);
    if !physical.is_empty() {
        record.insert("physical_info", physical);
    }

    let mut breeding = Map::new();
    let egg_groups = present(row, &["Egg Group 1", "Egg Group 2"]);
    if !egg_groups.is_empty() {
        breeding.insert("egg_groups".to_string(), json!(egg_groups));
    }
    if let Some(ratio) = row.get("Gender Ratio") {
        breeding.insert("gender_ratio".to_string(), merge::clean_gender_ratio(ratio));
    }
    breeding.extend(copy_columns(
        row,
        &[
            ("egg_cycles", "Egg Cycles"),
            ("base_friendship", "Base Friendship"),
            ("growth_rate", "Growth Rate"),
        ],
    ));
    if !breeding.is_empty() {
        record.insert("breeding_info", breeding);
    }

    let mechanics = copy_columns(row, &MECHANICS_COLUMNS);
    if !mechanics.is_empty() {
        record.insert("game_mechanics", mechanics);
    }

    let dex_entries: Map<String, Value> = DEX_TEXT_COLUMNS
        .iter()
        .filter_map(|(column, key)| match row.get(*column) {
            Some(Value::String(text)) => Some((key.to_string(), json!(text))),
            Some(other) => Some((key.to_string(), json!(other.to_string()))),
            None => None,
        })
        .collect();
    if !dex_entries.is_empty() {
        record.insert("dex_entries", dex_entries);
    }

    let appearances = game_appearances(row);
    if !appearances.is_empty() {
        record.insert("game_appearances", appearances);
    }

    Some(record)
}

/// 工作表結構摘要
pub fn summarize(sheet: &str, data: &SheetData) -> SheetSummary {
    SheetSummary {
        sheet_names: data.sheet_names.clone(),
        sheet: sheet.to_string(),
        row_count: data.rows.len(),
        column_count: data.headers.len(),
        first_columns: data.headers.iter().take(5).cloned().collect(),
        base_forms: data.rows.iter().filter(|row| is_base_form(row)).count(),
        has_ref_id: data.headers.iter().any(|h| h == "ref_id"),
    }
}

/// 試算表匯入流程
pub struct SpreadsheetPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
    sheet: SpreadsheetConfig,
}

impl<S: Storage, C: ConfigProvider> SpreadsheetPipeline<S, C> {
    pub fn new(storage: S, config: C, sheet: SpreadsheetConfig) -> Self {
        Self {
            storage,
            config,
            sheet,
        }
    }

    pub fn workbook_path(&self) -> &str {
        &self.sheet.path
    }

    async fn read(&self) -> Result<SheetData> {
        if self.storage.file_info(&self.sheet.path).await?.is_none() {
            return Err(EtlError::DatasetError {
                dataset: "spreadsheet".to_string(),
                message: format!("workbook not found: {}", self.sheet.path),
            });
        }
        let bytes = self.storage.read_file(&self.sheet.path).await?;
        read_sheet(bytes, &self.sheet.sheet, self.sheet.header_row)
    }

    /// 讀取並摘要工作表，不做任何寫入
    pub async fn analyze(&self) -> Result<SheetSummary> {
        let data = self.read().await?;
        Ok(summarize(&self.sheet.sheet, &data))
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for SpreadsheetPipeline<S, C> {
    async fn extract(&self) -> Result<Vec<Record>> {
        tracing::info!("📗 Reading {} [{}]", self.sheet.path, self.sheet.sheet);
        let data = self.read().await?;
        let summary = summarize(&self.sheet.sheet, &data);
        tracing::info!(
            "   {} rows, {} columns, {} base forms",
            summary.row_count,
            summary.column_count,
            summary.base_forms
        );

        let records: Vec<Record> = data
            .rows
            .iter()
            .filter(|row| is_import_row(row))
            .filter_map(row_to_record)
            .collect();
        tracing::info!("🔁 Converted {} Pokémon from the spreadsheet", records.len());
        Ok(records)
    }

    async fn transform(&self, data: Vec<Record>) -> Result<TransformResult> {
        let path = self.config.dataset_path(Dataset::Pokemon);
        let existing = dataset::load_records(&self.storage, &path, None).await?;
        tracing::info!("   Existing data: {} Pokémon", existing.len());
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
        write_outputs(&self.storage, &path, Some(&self.sheet.backup), &result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_import_row_filter() {
        assert!(is_import_row(&row(json!({"ref_id": "0001-00", "Name": "Bulbasaur"}))));
        assert!(!is_import_row(&row(json!({"ref_id": "0003-01", "Name": "Mega Venusaur"}))));
        assert!(is_import_row(&row(json!({"Name": "Missingno"}))));
        assert!(!is_import_row(&row(json!({"HP": 10}))));
    }

    #[test]
    fn test_row_to_record() {
        let data = row(json!({
            "ref_id": "0001-00",
            "Name": "Bulbasaur",
            "National Dex #": 1,
            "Species": "Seed Pokémon",
            "Type 1": "Grass",
            "Type 2 Helper": "Poison",
            "Ability 1": "Overgrow",
            "Hidden Ability": "Chlorophyll",
            "HP": 45, "Attack": 49, "Sp. Atk": 65, "BST": 318,
            "Height": "0.7 m",
            "Egg Group 1": "Monster", "Egg Group 2": "Grass",
            "Gender Ratio": "G,e,n,d,e,r,l,e,s,s",
            "Egg Cycles": 20,
            "Catch Rate": 45,
            "Red Dex Text": "A strange seed was planted on its back at birth.",
            "Red": 153,
            "Red Location": "Pallet Town",
            "Legends-Z-A": "None",
            "Sword": "nan?"
        }));
        let record = row_to_record(&data).unwrap();

        assert_eq!(record.name(), Some("Bulbasaur"));
        assert_eq!(record.get("pokedex_number"), Some(&json!(1)));
        assert_eq!(record.get("types"), Some(&json!(["Grass", "Poison"])));
        assert_eq!(
            record.get("abilities"),
            Some(&json!({"regular": ["Overgrow"], "hidden": "Chlorophyll"}))
        );
        assert_eq!(
            record.get("base_stats"),
            Some(&json!({"hp": 45, "attack": 49, "sp_attack": 65, "total": 318}))
        );
        assert_eq!(record.get("physical_info"), Some(&json!({"height": "0.7 m"})));
        assert_eq!(record.get("breeding_info").unwrap()["gender_ratio"], "Genderless");
        assert_eq!(record.get("breeding_info").unwrap()["egg_groups"], json!(["Monster", "Grass"]));
        assert_eq!(record.get("game_mechanics"), Some(&json!({"catch_rate": 45})));
        assert!(record.get("dex_entries").unwrap()["red"].as_str().unwrap().starts_with("A strange"));

        let games = record.get("game_appearances").unwrap();
        assert_eq!(
            games["Red"],
            json!({"dex_number": 153, "available": true, "location": "Pallet Town"})
        );
        // non-numeric dex cells are ignored
        assert!(games.get("Legends Z-A").is_none());
        assert!(games.get("Sword").is_none());
    }

    #[test]
    fn test_row_without_name() {
        assert!(row_to_record(&row(json!({"ref_id": "0001-00"}))).is_none());
    }

    #[test]
    fn test_cell_values() {
        assert_eq!(cell_value(&Data::Float(20.0)), json!(20));
        assert_eq!(cell_value(&Data::Float(0.5)), json!(0.5));
        assert_eq!(cell_value(&Data::String("  ".to_string())), Value::Null);
        assert_eq!(cell_value(&Data::Empty), Value::Null);
    }
}
