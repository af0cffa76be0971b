use crate::domain::model::Record;
use crate::domain::ports::Storage;
use crate::utils::error::{EtlError, Result};
use serde::Serialize;
use serde_json::Value;
use std::io::ErrorKind;

/// 讀取 JSON 檔案；檔案不存在或格式錯誤時回傳 None
pub async fn load_value<S: Storage>(storage: &S, path: &str) -> Result<Option<Value>> {
    let bytes = match storage.read_file(path).await {
        Ok(bytes) => bytes,
        Err(EtlError::IoError(e)) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!("📄 {} does not exist yet", path);
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    match serde_json::from_slice(&bytes) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            tracing::warn!("⚠️ {} is not valid JSON ({}), treating it as empty", path, e);
            Ok(None)
        }
    }
}

/// 從文件中取出記錄陣列: 頂層陣列，或包裝物件中的指定欄位
pub fn records_from_value(value: Value, field: Option<&str>) -> Vec<Record> {
    let items = match (value, field) {
        (Value::Array(items), _) => items,
        (Value::Object(mut map), Some(field)) => match map.remove(field) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(data) => Some(Record::from_map(data)),
            _ => None,
        })
        .collect()
}

/// 讀取資料集記錄，檔案不存在時為空
pub async fn load_records<S: Storage>(
    storage: &S,
    path: &str,
    field: Option<&str>,
) -> Result<Vec<Record>> {
    Ok(load_value(storage, path)
        .await?
        .map(|value| records_from_value(value, field))
        .unwrap_or_default())
}

/// 以兩格縮排寫出 JSON (保留非 ASCII 字元)
pub async fn save_json<S: Storage, T: Serialize + ?Sized>(
    storage: &S,
    path: &str,
    value: &T,
) -> Result<()> {
    let data = serde_json::to_vec_pretty(value)?;
    storage.write_file(path, &data).await
}

/// `data/items_data.json` → `data/items_data_backup.json`
pub fn backup_path(path: &str) -> String {
    match path.strip_suffix(".json") {
        Some(stem) => format!("{}_backup.json", stem),
        None => format!("{}_backup", path),
    }
}

/// 寫入前先把既有檔案複製一份，回傳備份路徑
pub async fn backup_before_write<S: Storage>(
    storage: &S,
    path: &str,
    backup: Option<&str>,
) -> Result<Option<String>> {
    if storage.file_info(path).await?.is_none() {
        return Ok(None);
    }

    let target = backup.map(str::to_string).unwrap_or_else(|| backup_path(path));
    let data = storage.read_file(path).await?;
    storage.write_file(&target, &data).await?;
    tracing::info!("🗄️ Backed up {} to {}", path, target);
    Ok(Some(target))
}

/// 計算項目數: 陣列長度、包裝物件的記錄數或物件鍵數
pub fn count_entries(value: &Value, field: Option<&str>) -> usize {
    match value {
        Value::Array(items) => items.len(),
        Value::Object(map) => match field.and_then(|f| map.get(f)) {
            Some(Value::Array(items)) => items.len(),
            _ => map.len(),
        },
        _ => 0,
    }
}
