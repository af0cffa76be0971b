use regex::Regex;
use std::sync::LazyLock;

static DEX_ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([^#:]+?):#(\d+)").expect("valid dex entry regex"));

/// 地區圖鑑儲存格中出現的關鍵字
const REGION_KEYWORDS: &[&str] = &[
    "National",
    "Kanto",
    "Johto",
    "Hoenn",
    "Sinnoh",
    "Unova",
    "Kalos",
    "Alola",
    "Galar",
    "Paldea",
    "Hisui",
    "Central",
    "Isle of Armor",
    "Crown Tundra",
    "Kitakami",
    "Blueberry",
    "Lumiose",
];

struct RegionRule {
    all_of: &'static [&'static str],
    none_of: &'static [&'static str],
    games: &'static [&'static str],
}

const fn rule(
    all_of: &'static [&'static str],
    none_of: &'static [&'static str],
    games: &'static [&'static str],
) -> RegionRule {
    RegionRule {
        all_of,
        none_of,
        games,
    }
}

// 依序比對，第一個符合的規則決定遊戲
static REGION_RULES: &[RegionRule] = &[
    rule(&["National"], &[], &[]),
    rule(&["Kanto", "RBY"], &[], &["Red", "Blue", "Yellow"]),
    rule(&["Kanto", "FRLG"], &[], &["FireRed", "LeafGreen"]),
    rule(&["Kanto", "Let's Go"], &[], &["Let's Go Pikachu", "Let's Go Eevee"]),
    rule(&["Kanto", "LGPE"], &[], &["Let's Go Pikachu", "Let's Go Eevee"]),
    rule(&["Johto", "GSC"], &[], &["Gold", "Silver", "Crystal"]),
    rule(&["Johto", "HGSS"], &[], &["HeartGold", "SoulSilver"]),
    rule(&["Hoenn", "RSE"], &[], &["Ruby", "Sapphire", "Emerald"]),
    rule(&["Hoenn", "ORAS"], &[], &["Omega Ruby", "Alpha Sapphire"]),
    rule(&["Sinnoh", "DP"], &[], &["Diamond", "Pearl", "Platinum"]),
    rule(&["Sinnoh", "BDSP"], &[], &["Brilliant Diamond", "Shining Pearl"]),
    rule(&["Unova", "B2W2"], &[], &["Black 2", "White 2"]),
    rule(&["Unova", "BW"], &["B2W2"], &["Black", "White"]),
    rule(&["Kalos", "Central"], &[], &["X", "Y"]),
    rule(&["Coastal Kalos"], &[], &["X", "Y"]),
    rule(&["Mountain Kalos"], &[], &["X", "Y"]),
    rule(&["Alola", "USUM"], &[], &["Ultra Sun", "Ultra Moon"]),
    rule(&["Alola", "SM"], &["USUM"], &["Sun", "Moon"]),
    rule(&["Galar"], &[], &["Sword", "Shield"]),
    rule(&["Isle of Armor"], &[], &["Sword", "Shield"]),
    rule(&["Crown Tundra"], &[], &["Sword", "Shield"]),
    rule(&["Paldea"], &[], &["Scarlet", "Violet"]),
    rule(&["Kitakami"], &[], &["Scarlet", "Violet"]),
    rule(&["Blueberry"], &[], &["Scarlet", "Violet"]),
    rule(&["Lumiose"], &[], &["Legends Z-A"]),
    rule(&["Hisui"], &[], &["Legends Arceus"]),
];

// (小寫關鍵字, 標準名稱)
const REGION_LABELS: &[(&str, &str)] = &[
    ("kanto", "Kanto"),
    ("johto", "Johto"),
    ("hoenn", "Hoenn"),
    ("sinnoh", "Sinnoh"),
    ("unova", "Unova"),
    ("kalos", "Kalos"),
    ("alola", "Alola"),
    ("galar", "Galar"),
    ("paldea", "Paldea"),
    ("hisui", "Hisui"),
    ("lumiose", "Lumiose"),
    ("isle of armor", "Isle of Armor"),
    ("crown tundra", "Crown Tundra"),
    ("blueberry", "Blueberry Academy"),
    ("kitakami", "Kitakami"),
];

/// 一筆地區圖鑑編號
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DexEntry {
    pub region: String,
    pub number: u32,
}

/// 解析像 `National:#0001Kanto (RBY):#001` 這樣串接的圖鑑文字
pub fn parse_dex_info(text: &str) -> Vec<DexEntry> {
    DEX_ENTRY
        .captures_iter(text)
        .filter_map(|caps| {
            let number = caps[2].parse::<u32>().ok()?;
            Some(DexEntry {
                region: caps[1].trim().to_string(),
                number,
            })
        })
        .collect()
}

/// 儲存格文字是否提到地區圖鑑 (含 `#` 與地區名稱)
pub fn mentions_region(text: &str) -> bool {
    text.contains('#') && REGION_KEYWORDS.iter().any(|k| text.contains(k))
}

/// 地區圖鑑對應的遊戲，全國圖鑑與未知地區回傳空陣列
pub fn map_region_to_games(region: &str) -> &'static [&'static str] {
    REGION_RULES
        .iter()
        .find(|r| {
            r.all_of.iter().all(|k| region.contains(k))
                && !r.none_of.iter().any(|k| region.contains(k))
        })
        .map(|r| r.games)
        .unwrap_or(&[])
}

/// 地區名稱標準化，未知時原樣回傳
pub fn simplify_region_name(region: &str) -> String {
    let lower = region.to_lowercase();
    REGION_LABELS
        .iter()
        .find(|(key, _)| lower.contains(key))
        .map(|(_, label)| label.to_string())
        .unwrap_or_else(|| region.to_string())
}
