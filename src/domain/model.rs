use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// 一筆資料記錄，序列化時即為扁平的 JSON 物件
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    pub data: Map<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(data: Map<String, Value>) -> Self {
        Self { data }
    }

    /// 從任意可序列化結構建立記錄，非物件時回傳 None
    pub fn from_serialize<T: Serialize>(value: &T) -> crate::utils::error::Result<Option<Self>> {
        match serde_json::to_value(value)? {
            Value::Object(data) => Ok(Some(Self { data })),
            _ => Ok(None),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    pub fn name(&self) -> Option<&str> {
        self.get_str("name").map(str::trim).filter(|n| !n.is_empty())
    }

    /// 身分鍵: 名稱小寫
    pub fn identity(&self) -> Option<String> {
        self.name().map(str::to_lowercase)
    }

    /// 取得 (必要時建立) 巢狀物件欄位
    pub fn object_mut(&mut self, key: &str) -> &mut Map<String, Value> {
        let slot = self
            .data
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        match slot {
            Value::Object(map) => map,
            _ => unreachable!("slot was just replaced with an object"),
        }
    }
}

impl From<Map<String, Value>> for Record {
    fn from(data: Map<String, Value>) -> Self {
        Self { data }
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Object(record.data)
    }
}

/// 專案管理的資料集
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Dataset {
    Pokemon,
    Abilities,
    Moves,
    Items,
    Games,
}

impl Dataset {
    pub const ALL: [Dataset; 5] = [
        Dataset::Pokemon,
        Dataset::Abilities,
        Dataset::Moves,
        Dataset::Items,
        Dataset::Games,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Dataset::Pokemon => "pokemon",
            Dataset::Abilities => "abilities",
            Dataset::Moves => "moves",
            Dataset::Items => "items",
            Dataset::Games => "games",
        }
    }

    /// 包裝格式檔案中記錄陣列所在的欄位
    pub fn records_field(self) -> Option<&'static str> {
        match self {
            Dataset::Abilities => Some("abilities"),
            Dataset::Moves => Some("moves"),
            _ => None,
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Dataset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dataset::ALL
            .into_iter()
            .find(|d| d.key().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown dataset: {}", s))
    }
}

/// 合併統計
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// 新增的記錄
    pub added: usize,
    /// 與既有記錄合併 (或取代) 的記錄
    pub merged: usize,
    /// 沒有名稱而略過的記錄
    pub skipped: usize,
    /// 合併後總數
    pub total: usize,
}

/// 額外輸出檔 (例如能力的文字報表)
#[derive(Debug, Clone)]
pub struct OutputFile {
    pub path: String,
    pub contents: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    /// 本次處理 (抓取或匯入) 的記錄
    pub processed_records: Vec<Record>,
    /// 要寫入資料集檔案的完整 JSON 文件
    pub document: Value,
    pub report: MergeReport,
    pub extra_outputs: Vec<OutputFile>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_serializes_flat() {
        let mut record = Record::new();
        record.insert("name", "Bulbasaur");
        record.insert("number", "#0001");
        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            r##"{"name":"Bulbasaur","number":"#0001"}"##
        );
    }

    #[test]
    fn test_identity_is_case_insensitive() {
        let record: Record = serde_json::from_value(json!({"name": " Mr. Mime "})).unwrap();
        assert_eq!(record.identity().as_deref(), Some("mr. mime"));
        let unnamed: Record = serde_json::from_value(json!({"name": ""})).unwrap();
        assert_eq!(unnamed.identity(), None);
    }

    #[test]
    fn test_object_mut_replaces_non_objects() {
        let mut record: Record = serde_json::from_value(json!({"physical_info": null})).unwrap();
        record.object_mut("physical_info").insert("species".into(), json!("Seed Pokémon"));
        assert_eq!(record.data["physical_info"]["species"], "Seed Pokémon");
    }

    #[test]
    fn test_dataset_from_str() {
        assert_eq!("Moves".parse::<Dataset>().unwrap(), Dataset::Moves);
        assert!("berries".parse::<Dataset>().is_err());
    }
}
