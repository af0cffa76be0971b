//! 記錄合併規則。
//!
//! 同一個實體可能來自增量抓取、試算表匯入或上一次執行的結果。合併時以既有
//! 記錄為基礎，只填補、延伸，或對少數指定欄位以新值覆寫；已知欄位不會被刪除。

use crate::domain::model::{MergeReport, Record};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// 以新值整體覆寫的欄位
const OVERRIDE_KEYS: &[&str] = &["evolution_info"];

/// JSON 中視為「空」的值: null、false、0、""、[]、{}
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

/// 整理性別比例字串
///
/// 試算表有時把 "Genderless" 存成 "G,e,n,d,e,r,l,e,s,s"；含數字或百分比的
/// 比例字串只去除頭尾空白。
pub fn clean_gender_ratio(value: &Value) -> Value {
    let Some(raw) = value.as_str() else {
        return value.clone();
    };
    let val = raw.trim();

    if val.chars().any(|c| c.is_ascii_digit()) || val.contains('%') {
        return Value::from(val);
    }

    if val.contains(',') {
        let joined: String = val.chars().filter(|c| *c != ',' && *c != ' ').collect();
        if !joined.is_empty() && joined.chars().all(char::is_alphabetic) {
            return Value::from(capitalize(&joined));
        }
        return Value::from(val.replace(", ", ""));
    }

    Value::from(val)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// 在合併前整理輸入記錄 (目前只有性別比例)
fn normalize_incoming(incoming: &Record) -> Record {
    let mut normalized = incoming.clone();
    if let Some(Value::Object(breeding)) = normalized.data.get_mut("breeding_info") {
        if let Some(ratio) = breeding.get_mut("gender_ratio") {
            *ratio = clean_gender_ratio(ratio);
        }
    }
    normalized
}

/// 空值才填入
fn fill_missing(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        let missing = target.get(key).map_or(true, is_empty_value);
        if missing && !is_empty_value(value) {
            target.insert(key.clone(), value.clone());
        }
    }
}

fn merge_base_stats(target: &mut Map<String, Value>, incoming: &Map<String, Value>) {
    // null 的數值代表來源沒有資料，不覆寫
    for (stat, value) in incoming {
        if !value.is_null() {
            target.insert(stat.clone(), value.clone());
        }
    }
}

fn merge_game_appearances(target: &mut Map<String, Value>, incoming: &Map<String, Value>) {
    for (game, game_data) in incoming {
        if let (Some(Value::Object(existing_game)), Value::Object(new_game)) =
            (target.get_mut(game), game_data)
        {
            if let Some(location) = new_game.get("location").filter(|l| !is_empty_value(l)) {
                existing_game.insert("location".to_string(), location.clone());
            }
            fill_missing(existing_game, new_game);
            continue;
        }

        if target.get(game).map_or(true, is_empty_value) {
            target.insert(game.clone(), game_data.clone());
        }
    }
}

fn merge_breeding_info(target: &mut Map<String, Value>, incoming: &Map<String, Value>) {
    for (key, value) in incoming {
        if key == "gender_ratio" {
            if !is_empty_value(value) {
                target.insert(key.clone(), value.clone());
            }
        } else if target.get(key).map_or(true, is_empty_value) && !is_empty_value(value) {
            target.insert(key.clone(), value.clone());
        }
    }
}

fn append_unique(target: &mut Vec<Value>, incoming: &[Value]) {
    for item in incoming {
        if !target.contains(item) {
            target.push(item.clone());
        }
    }
}

/// 合併兩筆描述同一實體的記錄，以 `existing` 為基礎
pub fn merge_records(existing: &Record, incoming: &Record) -> Record {
    let incoming = normalize_incoming(incoming);
    let mut merged = existing.clone();

    for (key, new_value) in &incoming.data {
        if OVERRIDE_KEYS.contains(&key.as_str()) {
            if !is_empty_value(new_value) {
                merged.data.insert(key.clone(), new_value.clone());
            }
            continue;
        }

        let Some(current) = merged.data.get_mut(key) else {
            merged.data.insert(key.clone(), new_value.clone());
            continue;
        };

        if is_empty_value(current) {
            if !is_empty_value(new_value) {
                *current = new_value.clone();
            }
            continue;
        }

        match (key.as_str(), current, new_value) {
            ("base_stats", Value::Object(target), Value::Object(stats)) => {
                merge_base_stats(target, stats);
            }
            ("game_appearances", Value::Object(target), Value::Object(games)) => {
                merge_game_appearances(target, games);
            }
            ("breeding_info", Value::Object(target), Value::Object(breeding)) => {
                merge_breeding_info(target, breeding);
            }
            (_, Value::Object(target), Value::Object(source)) => {
                fill_missing(target, source);
            }
            (_, Value::Array(target), Value::Array(items)) => {
                append_unique(target, items);
            }
            // 其餘情況保留既有值
            _ => {}
        }
    }

    merged
}

/// 依名稱把重複記錄折疊進第一筆，回傳 (結果, 移除的筆數)
pub fn dedupe_by_name(records: Vec<Record>) -> (Vec<Record>, usize) {
    let mut result: Vec<Record> = Vec::with_capacity(records.len());
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut removed = 0;

    for record in records {
        match record.identity() {
            Some(id) => match index.get(&id) {
                Some(&pos) => {
                    result[pos] = merge_records(&result[pos], &record);
                    removed += 1;
                }
                None => {
                    index.insert(id, result.len());
                    result.push(record);
                }
            },
            None => result.push(record),
        }
    }

    (result, removed)
}

fn identity_index(records: &[Record]) -> HashMap<String, usize> {
    records
        .iter()
        .enumerate()
        .filter_map(|(pos, record)| record.identity().map(|id| (id, pos)))
        .collect()
}

/// 實體資料集的合併: 同名記錄以 `merge_records` 合併，新記錄依序加到最後
pub fn merge_into_dataset(existing: Vec<Record>, incoming: Vec<Record>) -> (Vec<Record>, MergeReport) {
    let (mut dataset, _) = dedupe_by_name(existing);
    let mut index = identity_index(&dataset);
    let mut report = MergeReport::default();

    for record in incoming {
        let Some(id) = record.identity() else {
            report.skipped += 1;
            continue;
        };

        match index.get(&id) {
            Some(&pos) => {
                dataset[pos] = merge_records(&dataset[pos], &record);
                report.merged += 1;
            }
            None => {
                index.insert(id, dataset.len());
                dataset.push(normalize_incoming(&record));
                report.added += 1;
            }
        }
    }

    report.total = dataset.len();
    (dataset, report)
}

/// 招式、能力、道具的合併: 同名記錄整筆取代，未重新抓取的記錄保留
pub fn replace_by_name(existing: Vec<Record>, incoming: Vec<Record>) -> (Vec<Record>, MergeReport) {
    let (mut dataset, _) = dedupe_by_name(existing);
    let mut index = identity_index(&dataset);
    let mut report = MergeReport::default();

    for record in incoming {
        let Some(id) = record.identity() else {
            report.skipped += 1;
            continue;
        };

        match index.get(&id) {
            Some(&pos) => {
                dataset[pos] = record;
                report.merged += 1;
            }
            None => {
                index.insert(id, dataset.len());
                dataset.push(record);
                report.added += 1;
            }
        }
    }

    report.total = dataset.len();
    (dataset, report)
}
