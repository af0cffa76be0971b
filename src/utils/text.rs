use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

static HEIGHT_IMPERIAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(\d+)'(\d+)""#).expect("valid height regex"));
static HEIGHT_METRIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.?\d*)m").expect("valid height regex"));
static WEIGHT_IMPERIAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.?\d*)lbs").expect("valid weight regex"));
static WEIGHT_METRIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.?\d*)kg").expect("valid weight regex"));

/// 轉成網站路徑用的名稱: 小寫並移除空白、句點、撇號與連字號
pub fn format_name_for_url(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| !matches!(c, ' ' | '.' | '\'' | '-'))
        .collect()
}

/// 個別頁面網址只移除空白、句點與撇號
pub fn format_name_for_page(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| !matches!(c, ' ' | '.' | '\''))
        .collect()
}

/// 取第一段數字 (允許千分位逗號) 轉成整數
pub fn extract_number(text: &str) -> Option<i64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let digits: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == ',')
        .filter(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

pub fn clean_text(text: &str) -> String {
    text.trim()
        .replace('\n', " ")
        .replace('\r', "")
        .replace('\t', " ")
}

/// 字首大寫 (以非字母字元分隔單字)
pub fn title_case(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut at_word_start = true;
    for c in text.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                result.extend(c.to_uppercase());
            } else {
                result.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            result.push(c);
            at_word_start = true;
        }
    }
    result
}

/// `/pokedex-bw/type/grass.gif` → `Grass`
pub fn type_from_image_src(src: &str) -> Option<String> {
    let (_, tail) = src.split_once("/type/")?;
    let name = tail.trim_end_matches(".gif").trim_end_matches(".png");
    if name.is_empty() {
        None
    } else {
        Some(title_case(name))
    }
}

/// 從身高體重欄位解析英制與公制數值
pub fn parse_height_weight(text: &str) -> Map<String, Value> {
    let mut info = Map::new();

    if let Some(caps) = HEIGHT_IMPERIAL.captures(text) {
        info.insert("height_imperial".into(), Value::from(&caps[0]));
        if let (Ok(feet), Ok(inches)) = (caps[1].parse::<i64>(), caps[2].parse::<i64>()) {
            info.insert("height_feet".into(), Value::from(feet));
            info.insert("height_inches".into(), Value::from(inches));
        }
    }

    if let Some(caps) = HEIGHT_METRIC.captures(text) {
        info.insert("height_metric".into(), Value::from(&caps[0]));
        if let Ok(meters) = caps[1].parse::<f64>() {
            info.insert("height_meters".into(), Value::from(meters));
        }
    }

    if let Some(caps) = WEIGHT_IMPERIAL.captures(text) {
        info.insert("weight_imperial".into(), Value::from(&caps[0]));
        if let Ok(pounds) = caps[1].parse::<f64>() {
            info.insert("weight_pounds".into(), Value::from(pounds));
        }
    }

    if let Some(caps) = WEIGHT_METRIC.captures(text) {
        info.insert("weight_metric".into(), Value::from(&caps[0]));
        if let Ok(kilograms) = caps[1].parse::<f64>() {
            info.insert("weight_kilograms".into(), Value::from(kilograms));
        }
    }

    info
}

pub fn has_height_and_weight(text: &str) -> bool {
    (HEIGHT_IMPERIAL.is_match(text) || HEIGHT_METRIC.is_match(text))
        && (WEIGHT_IMPERIAL.is_match(text) || WEIGHT_METRIC.is_match(text))
}
