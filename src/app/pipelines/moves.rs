use super::write_outputs;
use crate::core::{dataset, merge};
use crate::domain::model::{Record, TransformResult};
use crate::domain::ports::{ConfigProvider, PageFetcher, Pipeline, Storage};
use crate::utils::error::{EtlError, Result};
use crate::utils::html;
use crate::utils::text::{title_case, type_from_image_src};
use chrono::Local;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};

/// 各世代招式圖鑑的差異
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationConfig {
    pub generation: u8,
    /// 網站上的招式圖鑑目錄，例如 `attackdex-sv`
    pub path: &'static str,
    pub games: &'static [&'static str],
    pub critical_hit_rate: bool,
    pub z_move: bool,
    pub max_move: bool,
    pub arceus: bool,
    pub za: bool,
    pub contests: bool,
    pub physical_special_split: bool,
}

const fn generation(
    generation: u8,
    path: &'static str,
    games: &'static [&'static str],
    flags: [bool; 7],
) -> GenerationConfig {
    GenerationConfig {
        generation,
        path,
        games,
        critical_hit_rate: flags[0],
        z_move: flags[1],
        max_move: flags[2],
        arceus: flags[3],
        za: flags[4],
        contests: flags[5],
        physical_special_split: flags[6],
    }
}

// flags: 會心率、Z 招式、極巨招式、阿爾宙斯、Z-A、華麗大賽、物特分家
pub static GENERATIONS: [GenerationConfig; 9] = [
    generation(1, "attackdex-rby", &["Red", "Blue", "Yellow"], [false, false, false, false, false, false, false]),
    generation(2, "attackdex-gs", &["Gold", "Silver", "Crystal"], [false, false, false, false, false, false, false]),
    generation(3, "attackdex", &["Ruby", "Sapphire", "Emerald"], [false, false, false, false, false, true, false]),
    generation(4, "attackdex-dp", &["Diamond", "Pearl", "Platinum"], [true, false, false, false, false, true, true]),
    generation(5, "attackdex-bw", &["Black", "White", "Black 2", "White 2"], [false, false, false, false, false, false, true]),
    generation(6, "attackdex-xy", &["X", "Y", "Omega Ruby", "Alpha Sapphire"], [true, false, false, false, false, true, true]),
    generation(7, "attackdex-sm", &["Sun", "Moon", "Ultra Sun", "Ultra Moon"], [true, true, false, false, false, false, true]),
    generation(8, "attackdex-swsh", &["Sword", "Shield", "Legends: Arceus"], [true, false, true, true, false, false, true]),
    generation(9, "attackdex-sv", &["Scarlet", "Violet", "Legends: Z-A"], [true, false, false, false, true, false, true]),
];

impl GenerationConfig {
    pub fn for_generation(generation: u8) -> Result<&'static GenerationConfig> {
        GENERATIONS
            .iter()
            .find(|g| g.generation == generation)
            .ok_or_else(|| EtlError::InvalidConfigValueError {
                field: "generation".to_string(),
                value: generation.to_string(),
                reason: "Supported generations are 1-9".to_string(),
            })
    }
}

const SKIP_PATTERNS: &[&str] = &[
    "index",
    "nav",
    "menu",
    "generation",
    "pokemon",
    "games",
    "archive",
    "privacy",
    "discord",
    "home",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Learner {
    pub dex_number: String,
    pub name: String,
    pub form: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ArceusData {
    pub power_points: Option<u32>,
    pub base_power_standard: Option<u32>,
    pub base_power_agile: Option<u32>,
    pub base_power_strong: Option<u32>,
    pub accuracy: Option<u32>,
    pub battle_effect: String,
    pub effect_rate_standard: String,
    pub effect_rate_strong: String,
    pub speed_priority_standard: i32,
    pub speed_priority_strong: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LegendsZaData {
    pub cooldown: String,
    pub base_power_za: String,
    pub distance: String,
    pub effect_rate_za: String,
    pub effect_duration: String,
    pub frame_data: String,
    pub base_critical_hit_rate_za: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContestData {
    pub contest_type: String,
    pub appeal: String,
    pub jam: String,
    pub effect: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MoveRecord {
    pub name: String,
    pub battle_type: String,
    pub category: String,
    pub power_points: Option<u32>,
    pub base_power: Option<u32>,
    pub accuracy: Option<u32>,
    pub battle_effect: String,
    pub secondary_effect: String,
    pub effect_rate: String,
    pub speed_priority: i32,
    pub pokemon_hit_in_battle: String,
    pub physical_contact: bool,
    pub sound_type: bool,
    pub punch_move: bool,
    pub biting_move: bool,
    pub snatchable: bool,
    pub slicing_move: bool,
    pub bullet_type: bool,
    pub wind_move: bool,
    pub powder_move: bool,
    pub metronome: bool,
    pub affected_by_gravity: bool,
    pub defrosts_when_used: bool,
    pub reflected_by_magic_coat: bool,
    pub blocked_by_protect: bool,
    pub copyable_by_mirror_move: bool,
    pub learned_by: Vec<Learner>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_critical_hit_rate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z_move_power: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z_move_effect: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_move_power: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_move_effect: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arceus_data: Option<ArceusData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pokemon_legends_za_data: Option<LegendsZaData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contest: Option<ContestData>,
}

impl MoveRecord {
    /// 依世代建立含預設值的空記錄
    pub fn for_generation(config: &GenerationConfig) -> Self {
        let empty = || Some(Value::String(String::new()));
        Self {
            base_critical_hit_rate: config.critical_hit_rate.then(String::new),
            z_move_power: if config.z_move { empty() } else { None },
            z_move_effect: config.z_move.then(String::new),
            max_move_power: if config.max_move { empty() } else { None },
            max_move_effect: config.max_move.then(String::new),
            arceus_data: config.arceus.then(ArceusData::default),
            pokemon_legends_za_data: config.za.then(LegendsZaData::default),
            contest: config.contests.then(ContestData::default),
            ..Default::default()
        }
    }
}

fn digits(text: &str) -> Option<u32> {
    if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) {
        text.parse().ok()
    } else {
        None
    }
}

fn signed(text: &str) -> Option<i32> {
    digits(text.strip_prefix('-').unwrap_or(text))?;
    text.parse().ok()
}

/// "Standard: 80 Agile: 60 Strong: 100" 中某個標籤後面的值
fn labeled_value<'a>(text: &'a str, label: &str) -> Option<&'a str> {
    let mut tokens = text.split_whitespace();
    tokens.by_ref().find(|t| *t == label)?;
    tokens.next()
}

fn yes(cell: Option<&ElementRef<'_>>) -> bool {
    cell.is_some_and(|c| html::text(*c).eq_ignore_ascii_case("yes"))
}

fn filename_title(file: &str, separator: char) -> String {
    title_case(&file.replace(separator, " "))
}

/// 從招式圖鑑首頁的下拉選單取出招式檔名
pub fn parse_move_list(page: &str, config: &GenerationConfig) -> Result<Vec<String>> {
    let document = Html::parse_document(page);
    let marker = format!("/{}/", config.path);
    let mut files: Vec<String> = Vec::new();

    for option in document.select(&html::selector("select option")?) {
        let value = option.value().attr("value").unwrap_or_default();
        if !value.contains(&marker) || !value.ends_with(".shtml") {
            continue;
        }
        let Some((_, tail)) = value.rsplit_once(&marker) else {
            continue;
        };
        let file = tail.trim_end_matches(".shtml").to_string();
        if !file.is_empty() && !files.contains(&file) {
            files.push(file);
        }
    }

    files.retain(|file| {
        let lower = file.to_lowercase();
        let bare: String = file.chars().filter(|c| !matches!(c, '-' | '_')).collect();
        !SKIP_PATTERNS.iter().any(|p| lower.contains(p))
            && (2..=50).contains(&file.chars().count())
            && !bare.is_empty()
            && bare.chars().all(char::is_alphanumeric)
    });

    Ok(files)
}

/// 解析單一招式頁面
pub fn parse_move_page(page: &str, file: &str, config: &GenerationConfig) -> Result<MoveRecord> {
    let document = Html::parse_document(page);
    let mut record = MoveRecord::for_generation(config);

    record.name = match document.select(&html::selector("title")?).next() {
        Some(title) => {
            let title = html::raw_text(title);
            match title.rsplit_once(" - ") {
                Some((_, name)) => name.trim().to_string(),
                None => filename_title(file, '_'),
            }
        }
        None => filename_title(file, '_'),
    };

    let row_sel = html::selector("tr")?;
    let fooinfo_sel = html::selector("td.fooinfo")?;
    let img_sel = html::selector("img")?;

    for table in document.select(&html::selector("table.dextable")?) {
        let rows: Vec<ElementRef> = table.select(&row_sel).collect();
        for (i, row) in rows.iter().enumerate() {
            let next = rows.get(i + 1).copied();
            let next_cells = next.map(html::data_cells).unwrap_or_default();

            for cell in html::cells(*row) {
                let cell_text = html::text(cell);
                parse_move_cell(
                    &cell_text,
                    &rows[i..],
                    next,
                    &next_cells,
                    &fooinfo_sel,
                    &img_sel,
                    config,
                    &mut record,
                );
            }
        }
    }

    record.learned_by = parse_learners(&document)?;
    if record.name.is_empty() {
        record.name = filename_title(file, '-');
    }
    Ok(record)
}

#[allow(clippy::too_many_arguments)]
fn parse_move_cell(
    cell_text: &str,
    remaining: &[ElementRef<'_>],
    next: Option<ElementRef<'_>>,
    next_cells: &[ElementRef<'_>],
    fooinfo_sel: &Selector,
    img_sel: &Selector,
    config: &GenerationConfig,
    record: &mut MoveRecord,
) {
    if cell_text.contains("Battle Type") {
        if let Some(kind) = next_cells
            .get(1)
            .and_then(|c| html::first_attr(*c, img_sel, "src"))
            .and_then(type_from_image_src)
        {
            record.battle_type = kind;
        }
    } else if cell_text.contains("Category") {
        if let Some(category) = category_from_cells(next_cells, img_sel) {
            record.category = category;
        }
    } else if cell_text.contains("Power Points") {
        if next_cells.len() >= 3 {
            record.power_points = digits(&html::text(next_cells[0]));
            record.base_power = digits(&html::text(next_cells[1]));
            record.accuracy = digits(&html::text(next_cells[2]));
        }
    } else if cell_text.contains("Battle Effect:") {
        if let Some(effect) = next.and_then(|row| row.select(fooinfo_sel).next()) {
            record.battle_effect = html::text(effect);
        }
    } else if cell_text.contains("Secondary Effect:") {
        if next_cells.len() >= 2 {
            let source = if html::has_class(next_cells[0], "fooinfo") {
                next_cells[0]
            } else {
                next_cells[1]
            };
            record.secondary_effect = html::text(source);
            if next_cells.len() >= 3 {
                record.effect_rate = html::text(next_cells[next_cells.len() - 1]);
            }
        }
    } else if cell_text.contains("Base Critical Hit Rate") {
        if next_cells.len() >= 3 {
            if config.critical_hit_rate {
                record.base_critical_hit_rate = Some(html::text(next_cells[0]));
            }
            if let Some(priority) = signed(&html::text(next_cells[1])) {
                record.speed_priority = priority;
            }
            record.pokemon_hit_in_battle = html::text(next_cells[2]);
        }
    } else if cell_text.contains("Physical Contact") {
        if next_cells.len() >= 5 {
            record.physical_contact = yes(next_cells.first());
            record.sound_type = yes(next_cells.get(1));
            record.punch_move = yes(next_cells.get(2));
            record.biting_move = yes(next_cells.get(3));
            record.snatchable = yes(next_cells.get(4));
        }
    } else if cell_text.contains("Slicing Move") {
        if next_cells.len() >= 5 {
            record.slicing_move = yes(next_cells.first());
            record.bullet_type = yes(next_cells.get(1));
            record.wind_move = yes(next_cells.get(2));
            record.powder_move = yes(next_cells.get(3));
            record.metronome = yes(next_cells.get(4));
        }
    } else if cell_text.contains("Affected by Gravity") {
        if next_cells.len() >= 5 {
            record.affected_by_gravity = yes(next_cells.first());
            record.defrosts_when_used = yes(next_cells.get(1));
            record.reflected_by_magic_coat = yes(next_cells.get(2));
            record.blocked_by_protect = yes(next_cells.get(3));
            record.copyable_by_mirror_move = yes(next_cells.get(4));
        }
    } else if config.z_move
        && (cell_text.contains("Corresponding Z-Move") || cell_text.contains("Z-Move Power"))
    {
        if next_cells.len() >= 2 {
            record.z_move_effect = Some(html::text(next_cells[0]));
            if let Some(power) = digits(&html::text(next_cells[1])) {
                record.z_move_power = Some(Value::from(power));
            }
        }
    } else if config.max_move
        && (cell_text.contains("Corresponding Max Move") || cell_text.contains("MaxMove Power"))
    {
        if next_cells.len() >= 2 {
            record.max_move_effect = Some(html::text(next_cells[0]));
            if let Some(power) = digits(&html::text(next_cells[1])) {
                record.max_move_power = Some(Value::from(power));
            }
        }
    } else if config.za
        && (cell_text.contains("Pokémon Legends: Z-A Data") || cell_text.contains("Pokemon Legends: Z-A Data"))
    {
        if let Some(za) = record.pokemon_legends_za_data.as_mut() {
            parse_za_section(remaining, za);
        }
    } else if config.arceus && cell_text.contains("Legends: Arceus") {
        if let Some(arceus) = record.arceus_data.as_mut() {
            parse_arceus_section(remaining, arceus);
        }
    }
}

/// 分類圖示可能在 `/physical/` 之類的目錄，或是 `/type/physical.png`
fn category_from_cells(cells: &[ElementRef<'_>], img_sel: &Selector) -> Option<String> {
    let sources: Vec<&str> = cells
        .iter()
        .filter_map(|cell| html::first_attr(*cell, img_sel, "src"))
        .collect();

    for src in &sources {
        for (dir, category) in [("/physical/", "Physical"), ("/special/", "Special"), ("/status/", "Status")] {
            if src.contains(dir) {
                return Some(category.to_string());
            }
        }
    }

    sources
        .iter()
        .filter_map(|src| type_from_image_src(src))
        .find_map(|name| match name.as_str() {
            "Physical" | "Special" | "Status" => Some(name),
            "Other" => Some("Status".to_string()),
            _ => None,
        })
}

fn parse_za_section(rows: &[ElementRef<'_>], za: &mut LegendsZaData) {
    for (i, row) in rows.iter().enumerate() {
        let cells = html::data_cells(*row);
        let values = rows.get(i + 1).map(|r| html::data_cells(*r)).unwrap_or_default();
        let mentions = |needle: &str| cells.iter().any(|c| html::raw_text(*c).contains(needle));

        if cells.len() >= 3 && mentions("Cooldown") {
            if values.len() >= 3 {
                za.cooldown = html::text(values[0]);
                za.base_power_za = html::text(values[1]);
                za.distance = html::text(values[2]);
            }
        } else if cells.len() >= 3 && mentions("Effect Rate") {
            if values.len() >= 3 {
                za.effect_rate_za = html::text(values[0]);
                za.effect_duration = html::text(values[1]);
                za.frame_data = html::raw_text(values[2])
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ");
            }
        } else if cells.len() == 1 && mentions("Base Critical Hit Rate") {
            if let Some(value) = values.first() {
                za.base_critical_hit_rate_za = html::text(*value);
            }
        }
    }
}

fn parse_arceus_section(rows: &[ElementRef<'_>], arceus: &mut ArceusData) {
    for row in rows {
        let cells = html::data_cells(*row);
        let Some(first) = cells.first() else {
            continue;
        };
        let first_text = html::text(*first);
        let texts: Vec<String> = cells.iter().map(|c| html::raw_text(*c)).collect();

        if texts.iter().any(|t| t.contains("Base Power")) {
            if first_text.contains("Standard:") {
                if let Some(v) = labeled_value(&first_text, "Standard:").and_then(digits) {
                    arceus.base_power_standard = Some(v);
                }
                if let Some(v) = labeled_value(&first_text, "Agile:").and_then(digits) {
                    arceus.base_power_agile = Some(v);
                }
                if let Some(v) = labeled_value(&first_text, "Strong:").and_then(digits) {
                    arceus.base_power_strong = Some(v);
                }
            }
        } else if texts.iter().any(|t| t.contains("Speed") && t.contains("Priority")) {
            if first_text.contains("Standard:") {
                if let Some(v) = labeled_value(&first_text, "Standard:").and_then(signed) {
                    arceus.speed_priority_standard = v;
                }
                if let Some(v) = labeled_value(&first_text, "Strong:").and_then(signed) {
                    arceus.speed_priority_strong = v;
                }
            }
        }
    }
}

fn learn_method(previous_text: &str) -> &'static str {
    let text = previous_text.to_lowercase();
    if text.contains("move reminder") || text.contains("move tutor") {
        "Move Tutor"
    } else if text.contains("breeding") || text.contains("egg move") {
        "Breeding"
    } else if text.contains("z-a") {
        "Z-A Level Up"
    } else if text.contains("machine") || text.contains("tm") {
        "TM"
    } else {
        "Level Up"
    }
}

fn form_from_image(src: &str) -> Option<&'static str> {
    let lower = src.to_lowercase();
    if src.contains("-h.png") || src.contains("-h/") {
        Some("Hisuian")
    } else if src.contains("-a.png") || src.contains("-a/") {
        Some("Alolan")
    } else if src.contains("-g.png") || src.contains("-g/") {
        Some("Galarian")
    } else if src.contains("-p.png") || src.contains("-p/") {
        Some("Paldean")
    } else if lower.contains("-mega") {
        Some("Mega")
    } else if lower.contains("-gmax") {
        Some("Gigantamax")
    } else {
        None
    }
}

/// 第一個以外的 dextable/dextab 表格列出可學會此招式的寶可夢
pub fn parse_learners(document: &Html) -> Result<Vec<Learner>> {
    let row_sel = html::selector("tr")?;
    let link_sel = html::selector("a")?;
    let img_sel = html::selector("img")?;
    let mut learners = Vec::new();

    let table_sel = html::selector("table")?;
    let tables = document
        .select(&table_sel)
        .filter(|t| html::class_contains(*t, "dextab"))
        .skip(1);

    for table in tables {
        let method = learn_method(&html::previous_sibling_texts(table, 10).join(" "));

        for row in table.select(&row_sel).skip(2) {
            let cells = html::data_cells(row);
            if cells.len() < 4 {
                continue;
            }

            let dex_text = html::text(cells[0]);
            let Some(number) = dex_text.strip_prefix('#').map(str::trim) else {
                continue;
            };
            if dex_text.chars().count() < 4 || digits(number).is_none() {
                continue;
            }
            let dex_number = format!("{:0>4}", number);

            let linked_name = cells.iter().find_map(|cell| {
                let link = cell.select(&link_sel).next()?;
                let text = html::text(link);
                (!text.is_empty() && !text.chars().all(|c| c.is_ascii_digit())).then_some(text)
            });
            let name = linked_name.or_else(|| {
                cells[2..cells.len().min(5)].iter().find_map(|cell| {
                    let text = html::stripped_text(*cell);
                    (!text.is_empty()
                        && !text.chars().all(|c| c.is_ascii_digit())
                        && !text.starts_with("Lv"))
                    .then_some(text)
                })
            });
            let Some(name) = name else {
                continue;
            };

            let form = cells
                .iter()
                .take(5)
                .filter_map(|cell| html::first_attr(*cell, &img_sel, "src"))
                .find_map(form_from_image)
                .unwrap_or("Normal");

            let level = cells
                .iter()
                .rev()
                .take(3)
                .find_map(|cell| html::text(*cell).strip_prefix("Lv. ")?.trim().parse::<u32>().ok());

            learners.push(Learner {
                dex_number,
                name,
                form: form.to_string(),
                method: method.to_string(),
                level,
            });
        }
    }

    let mut seen = HashSet::new();
    learners.retain(|l| seen.insert((l.dex_number.clone(), l.form.clone(), l.method.clone(), l.level)));
    Ok(learners)
}

fn log_summary(moves: &[Record]) {
    let mut types: BTreeMap<&str, usize> = BTreeMap::new();
    let mut categories: BTreeMap<&str, usize> = BTreeMap::new();
    let mut relationships = 0;

    for record in moves {
        *types.entry(record.get_str("battle_type").unwrap_or("Unknown")).or_default() += 1;
        *categories.entry(record.get_str("category").unwrap_or("Unknown")).or_default() += 1;
        relationships += record
            .get("learned_by")
            .and_then(Value::as_array)
            .map_or(0, Vec::len);
    }

    tracing::info!(
        "📊 Moves: {}, learner relationships: {}, types: {}, categories: {}",
        moves.len(),
        relationships,
        types.len(),
        categories.len()
    );
}

/// 單一世代的招式圖鑑抓取
pub struct MovesPipeline<S: Storage, F: PageFetcher, C: ConfigProvider> {
    storage: S,
    fetcher: F,
    config: C,
    generation: &'static GenerationConfig,
    limit: Option<usize>,
}

impl<S: Storage, F: PageFetcher, C: ConfigProvider> MovesPipeline<S, F, C> {
    pub fn new(storage: S, fetcher: F, config: C, generation: u8, limit: Option<usize>) -> Result<Self> {
        Ok(Self {
            storage,
            fetcher,
            config,
            generation: GenerationConfig::for_generation(generation)?,
            limit,
        })
    }

    pub fn generation(&self) -> &GenerationConfig {
        self.generation
    }

    fn dex_url(&self, file: Option<&str>) -> String {
        let root = self.config.site_root().trim_end_matches('/');
        match file {
            Some(file) => format!("{}/{}/{}.shtml", root, self.generation.path, file),
            None => format!("{}/{}/", root, self.generation.path),
        }
    }
}

#[async_trait::async_trait]
impl<S: Storage, F: PageFetcher, C: ConfigProvider> Pipeline for MovesPipeline<S, F, C> {
    async fn extract(&self) -> Result<Vec<Record>> {
        let number = self.generation.generation;
        let index = self.fetcher.fetch(&self.dex_url(None)).await?;
        let mut files = parse_move_list(&index, self.generation)?;
        tracing::info!("⚔️ Found {} Gen {} moves", files.len(), number);
        if let Some(limit) = self.limit {
            files.truncate(limit);
        }

        let mut records = Vec::new();
        let mut skipped = 0;
        for (i, file) in files.iter().enumerate() {
            tracing::info!("[{:3}/{}] Scraping {}", i + 1, files.len(), file);

            let page = match self.fetcher.fetch(&self.dex_url(Some(file))).await {
                Ok(page) => page,
                Err(e) if e.is_recoverable() => {
                    tracing::warn!("⚠️ Failed to scrape {}: {}", file, e);
                    continue;
                }
                Err(e) => return Err(e),
            };
            let record = parse_move_page(&page, file, self.generation)?;

            if record.learned_by.is_empty() {
                tracing::info!(
                    "   {} ({}) has no learners in Gen {}, skipping",
                    record.name,
                    record.battle_type,
                    number
                );
                skipped += 1;
                continue;
            }
            tracing::debug!("   ✓ {} learned by {}", record.name, record.learned_by.len());
            if let Some(record) = Record::from_serialize(&record)? {
                records.push(record);
            }
        }

        if skipped > 0 {
            tracing::info!("⚠️ Skipped {} moves nobody can learn in Gen {}", skipped, number);
        }
        Ok(records)
    }

    async fn transform(&self, data: Vec<Record>) -> Result<TransformResult> {
        let generation = self.generation;
        let path = self.config.moves_path(generation.generation);
        let existing = dataset::load_records(&self.storage, &path, Some("moves")).await?;
        let (merged, report) = merge::replace_by_name(existing, data.clone());
        log_summary(&merged);

        let document = json!({
            "metadata": {
                "generation": generation.generation,
                "games": generation.games,
                "source": format!("Serebii.net AttackDex-Gen{}", generation.generation),
                "scraped_date": Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
                "total_moves": merged.len(),
                "merge_info": {
                    "new_moves": report.added,
                    "updated_moves": report.merged,
                    "total_after_merge": merged.len(),
                },
            },
            "moves": merged,
        });

        Ok(TransformResult {
            processed_records: data,
            document,
            report,
            extra_outputs: Vec::new(),
        })
    }

    async fn load(&self, result: TransformResult) -> Result<String> {
        let path = self.config.moves_path(self.generation.generation);
        write_outputs(&self.storage, &path, None, &result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(n: u8) -> &'static GenerationConfig {
        GenerationConfig::for_generation(n).unwrap()
    }

    const MOVE_PAGE: &str = r#"<html><head><title>Serebii.net Pokémon Scarlet &amp; Violet AttackDex - Razor Leaf</title></head><body>
<table class="dextable">
  <tr><td>Attack Name</td><td>Battle Type</td><td>Category</td></tr>
  <tr><td>Razor Leaf</td><td><img src="/pokedex-bw/type/grass.gif"></td><td><img src="/attackdex-sv/physical/physical.png"></td></tr>
  <tr><td>Power Points</td><td>Base Power</td><td>Accuracy</td></tr>
  <tr><td>25</td><td>55</td><td>95</td></tr>
  <tr><td>Battle Effect:</td></tr>
  <tr><td class="fooinfo">High critical hit ratio.</td></tr>
  <tr><td>Secondary Effect:</td><td>Effect Rate:</td></tr>
  <tr><td class="fooinfo">None</td><td>x</td><td>-- %</td></tr>
  <tr><td>Base Critical Hit Rate</td><td>Speed Priority</td><td>Pokémon Hit in Battle</td></tr>
  <tr><td>12.5%</td><td>-1</td><td>Many Others</td></tr>
  <tr><td>Physical Contact</td><td>Sound-Type</td><td>Punch Move</td><td>Biting Move</td><td>Snatchable</td></tr>
  <tr><td>No</td><td>No</td><td>No</td><td>No</td><td>No</td></tr>
  <tr><td>Slicing Move</td><td>Bullet Type</td><td>Wind Move</td><td>Powder Move</td><td>Metronome</td></tr>
  <tr><td>Yes</td><td>No</td><td>No</td><td>No</td><td>Yes</td></tr>
  <tr><td>Affected by Gravity</td><td>Defrosts When Used</td><td>Reflected By Magic Coat</td><td>Blocked by Protect</td><td>Copyable by Mirror Move</td></tr>
  <tr><td>Yes</td><td>No</td><td>No</td><td>YES</td><td>Yes</td></tr>
  <tr><td>Pokémon Legends: Z-A Data</td></tr>
  <tr><td>Cooldown</td><td>Base Power</td><td>Distance</td></tr>
  <tr><td>2</td><td>60</td><td>Short</td></tr>
  <tr><td>Effect Rate</td><td>Effect Duration</td><td>Frame Data</td></tr>
  <tr><td>--</td><td>--</td><td>Startup:
     10	frames</td></tr>
  <tr><td>Base Critical Hit Rate</td></tr>
  <tr><td>+1</td></tr>
</table>
<div>
<h3>Level Up</h3>
<table class="dextable">
  <tr><th>No.</th><th>Pic</th><th>Name</th><th>Type</th></tr>
  <tr><th colspan="4">sub header</th></tr>
  <tr><td>#001</td><td><img src="/pokearth/sprites/sv/001.png"></td><td><a href="/pokedex-sv/bulbasaur">Bulbasaur</a></td><td>Grass</td><td>Lv. 20</td></tr>
  <tr><td>#001</td><td><img src="/pokearth/sprites/sv/001.png"></td><td><a href="/pokedex-sv/bulbasaur">Bulbasaur</a></td><td>Grass</td><td>Lv. 20</td></tr>
  <tr><td>#0058</td><td><img src="/pokearth/sprites/sv/058-h.png"></td><td>Growlithe</td><td>Fire</td></tr>
  <tr><td>Total</td><td></td><td></td><td></td></tr>
</table>
<p>Technical Machine</p>
<table class="dextable">
  <tr><th>No.</th></tr><tr><th>x</th></tr>
  <tr><td>#152</td><td><a href="/x">152</a></td><td><a href="/chikorita">Chikorita</a></td><td>Grass</td></tr>
</table>
</div>
</body></html>"#;

    #[test]
    fn test_generation_config() {
        assert_eq!(config(3).path, "attackdex");
        assert!(config(3).contests && !config(3).critical_hit_rate);
        assert!(config(7).z_move);
        assert!(config(8).max_move && config(8).arceus);
        assert!(config(9).za);
        assert!(GenerationConfig::for_generation(10).is_err());
    }

    #[test]
    fn test_parse_move_list() {
        let page = r#"<select>
<option value="/attackdex-sv/index.shtml">AttackDex</option>
<option value="/attackdex-sv/razorleaf.shtml">Razor Leaf</option>
<option value="/attackdex-sv/razorleaf.shtml">Razor Leaf</option>
<option value="/attackdex-sv/u-turn.shtml">U-turn</option>
<option value="/attackdex-sv/x.shtml">X</option>
<option value="/attackdex-sm/tackle.shtml">Tackle</option>
<option value="/attackdex-sv/pokemon.shtml">Pokemon</option>
</select>"#;
        assert_eq!(parse_move_list(page, config(9)).unwrap(), vec!["razorleaf", "u-turn"]);
    }

    #[test]
    fn test_parse_move_details() {
        let record = parse_move_page(MOVE_PAGE, "razorleaf", config(9)).unwrap();
        assert_eq!(record.name, "Razor Leaf");
        assert_eq!(record.battle_type, "Grass");
        assert_eq!(record.category, "Physical");
        assert_eq!((record.power_points, record.base_power, record.accuracy), (Some(25), Some(55), Some(95)));
        assert_eq!(record.battle_effect, "High critical hit ratio.");
        assert_eq!(record.secondary_effect, "None");
        assert_eq!(record.effect_rate, "-- %");
        assert_eq!(record.base_critical_hit_rate.as_deref(), Some("12.5%"));
        assert_eq!(record.speed_priority, -1);
        assert_eq!(record.pokemon_hit_in_battle, "Many Others");
        assert!(!record.physical_contact);
        assert!(record.slicing_move && record.metronome);
        assert!(record.blocked_by_protect && record.copyable_by_mirror_move);
        assert!(record.arceus_data.is_none() && record.contest.is_none());
    }

    #[test]
    fn test_parse_legends_za_block() {
        let record = parse_move_page(MOVE_PAGE, "razorleaf", config(9)).unwrap();
        let za = record.pokemon_legends_za_data.unwrap();
        assert_eq!(za.cooldown, "2");
        assert_eq!(za.base_power_za, "60");
        assert_eq!(za.distance, "Short");
        assert_eq!(za.frame_data, "Startup: 10 frames");
        assert_eq!(za.base_critical_hit_rate_za, "+1");
    }

    #[test]
    fn test_parse_learners() {
        let record = parse_move_page(MOVE_PAGE, "razorleaf", config(9)).unwrap();
        assert_eq!(
            record.learned_by,
            vec![
                Learner { dex_number: "0001".into(), name: "Bulbasaur".into(), form: "Normal".into(), method: "Level Up".into(), level: Some(20) },
                Learner { dex_number: "0058".into(), name: "Growlithe".into(), form: "Hisuian".into(), method: "Level Up".into(), level: None },
                Learner { dex_number: "0152".into(), name: "Chikorita".into(), form: "Normal".into(), method: "TM".into(), level: None },
            ]
        );
    }

    #[test]
    fn test_arceus_block() {
        let page = r#"<html><head><title>AttackDex - Tackle</title></head><body><table class="dextable">
<tr><td>Legends: Arceus Data</td></tr>
<tr><td>Standard: 40 Agile: 30 Strong: 55</td><td>Base Power</td></tr>
<tr><td>Standard: 0 Strong: -1</td><td>Speed Priority</td></tr>
</table></body></html>"#;
        let record = parse_move_page(page, "tackle", config(8)).unwrap();
        let arceus = record.arceus_data.unwrap();
        assert_eq!(arceus.base_power_standard, Some(40));
        assert_eq!(arceus.base_power_agile, Some(30));
        assert_eq!(arceus.base_power_strong, Some(55));
        assert_eq!(arceus.speed_priority_strong, -1);
        assert_eq!(record.max_move_power, Some(Value::String(String::new())));
        assert!(record.learned_by.is_empty());
    }

    #[test]
    fn test_name_falls_back_to_filename() {
        let record = parse_move_page("<html><body></body></html>", "double_edge", config(1)).unwrap();
        assert_eq!(record.name, "Double Edge");
        assert!(record.base_critical_hit_rate.is_none());
    }
}
