use crate::adapters::http::DEFAULT_USER_AGENT;
use crate::domain::model::Dataset;
use crate::domain::ports::ConfigProvider;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 專案設定，全部欄位都有預設值
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DexConfig {
    pub project: ProjectConfig,
    pub sources: SourcesConfig,
    pub data: DataConfig,
    pub request: RequestConfig,
    pub spreadsheet: SpreadsheetConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub name: String,
    /// 所有相對路徑的基準目錄
    pub root: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub site_root: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub pokemon: String,
    pub abilities: String,
    pub abilities_text: String,
    /// `{generation}` 會被替換成世代編號
    pub moves: String,
    pub items: String,
    pub games: String,
    pub backups_dir: String,
    pub summary: String,
    /// 狀態頁顯示的招式世代
    pub status_generation: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    pub delay_ms: u64,
    pub timeout_seconds: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpreadsheetConfig {
    pub path: String,
    pub sheet: String,
    /// 標題列位置 (從 0 起算)
    pub header_row: usize,
    pub backup: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "Pokemon Data Scraper".to_string(),
            root: ".".to_string(),
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            site_root: "https://www.serebii.net".to_string(),
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            pokemon: "data/pokemon_data.json".to_string(),
            abilities: "data/abilities_data.json".to_string(),
            abilities_text: "data/abilities_data.txt".to_string(),
            moves: "data/moves_data_gen{generation}.json".to_string(),
            items: "data/items_data.json".to_string(),
            games: "data/pokemon_games.json".to_string(),
            backups_dir: "data/backups".to_string(),
            summary: "data/project_summary.json".to_string(),
            status_generation: 9,
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            delay_ms: 500,
            timeout_seconds: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Default for SpreadsheetConfig {
    fn default() -> Self {
        Self {
            path: "Master_Pokedex_Database.xlsx".to_string(),
            sheet: "MasterDex".to_string(),
            header_row: 1,
            backup: "data/pokemon_data_backup_before_excel.json".to_string(),
        }
    }
}

impl DexConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${SEREBII_MIRROR})，未設定的變數保留原文
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| EtlError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.into_owned())
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("project.name", &self.project.name)?;
        validation::validate_path("project.root", &self.project.root)?;
        validation::validate_url("sources.site_root", &self.sources.site_root)?;

        for (field, path) in [
            ("data.pokemon", &self.data.pokemon),
            ("data.abilities", &self.data.abilities),
            ("data.abilities_text", &self.data.abilities_text),
            ("data.items", &self.data.items),
            ("data.games", &self.data.games),
            ("data.backups_dir", &self.data.backups_dir),
            ("data.summary", &self.data.summary),
            ("spreadsheet.backup", &self.spreadsheet.backup),
        ] {
            validation::validate_path(field, path)?;
        }

        if !self.data.moves.contains("{generation}") {
            return Err(EtlError::InvalidConfigValueError {
                field: "data.moves".to_string(),
                value: self.data.moves.clone(),
                reason: "Path must contain the {generation} placeholder".to_string(),
            });
        }
        validation::validate_range("data.status_generation", self.data.status_generation, 1, 9)?;

        validation::validate_range("request.delay_ms", self.request.delay_ms, 0, 60_000)?;
        validation::validate_range("request.timeout_seconds", self.request.timeout_seconds, 1, 300)?;
        validation::validate_non_empty_string("request.user_agent", &self.request.user_agent)?;

        validation::validate_extension(
            "spreadsheet.path",
            &self.spreadsheet.path,
            &["xlsx", "xlsm", "xls", "ods"],
        )?;
        validation::validate_non_empty_string("spreadsheet.sheet", &self.spreadsheet.sheet)?;

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request.timeout_seconds)
    }
}

impl ConfigProvider for DexConfig {
    fn site_root(&self) -> &str {
        &self.sources.site_root
    }

    fn dataset_path(&self, dataset: Dataset) -> String {
        match dataset {
            Dataset::Pokemon => self.data.pokemon.clone(),
            Dataset::Abilities => self.data.abilities.clone(),
            Dataset::Moves => self.moves_path(self.data.status_generation),
            Dataset::Items => self.data.items.clone(),
            Dataset::Games => self.data.games.clone(),
        }
    }

    fn moves_path(&self, generation: u8) -> String {
        self.data
            .moves
            .replace("{generation}", &generation.to_string())
    }

    fn abilities_text_path(&self) -> String {
        self.data.abilities_text.clone()
    }

    fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request.delay_ms)
    }
}

impl Validate for DexConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_match_project_layout() {
        let config = DexConfig::default();
        assert_eq!(config.site_root(), "https://www.serebii.net");
        assert_eq!(config.dataset_path(Dataset::Pokemon), "data/pokemon_data.json");
        assert_eq!(config.dataset_path(Dataset::Moves), "data/moves_data_gen9.json");
        assert_eq!(config.moves_path(3), "data/moves_data_gen3.json");
        assert_eq!(config.request_delay(), Duration::from_millis(500));
        assert_eq!(config.spreadsheet.header_row, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let toml_content = r#"
[sources]
site_root = "http://localhost:8080"

[request]
delay_ms = 0
"#;

        let config = DexConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.site_root(), "http://localhost:8080");
        assert_eq!(config.request.delay_ms, 0);
        assert_eq!(config.request.timeout_seconds, 10);
        assert_eq!(config.spreadsheet.sheet, "MasterDex");
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("DEX_TEST_MIRROR", "https://mirror.example.com");

        let toml_content = r#"
[sources]
site_root = "${DEX_TEST_MIRROR}"
"#;

        let config = DexConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.site_root(), "https://mirror.example.com");

        std::env::remove_var("DEX_TEST_MIRROR");
    }

    #[test]
    fn test_config_validation() {
        let bad_url = DexConfig::from_toml_str("[sources]\nsite_root = \"serebii\"\n").unwrap();
        assert!(bad_url.validate().is_err());

        let bad_moves =
            DexConfig::from_toml_str("[data]\nmoves = \"data/moves.json\"\n").unwrap();
        assert!(bad_moves.validate().is_err());

        let bad_timeout =
            DexConfig::from_toml_str("[request]\ntimeout_seconds = 0\n").unwrap();
        assert!(bad_timeout.validate().is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[project]\nname = \"file-test\"\n")
            .unwrap();

        let config = DexConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.project.name, "file-test");
        assert_eq!(config.project.root, ".");
    }

    #[test]
    fn test_invalid_toml() {
        let err = DexConfig::from_toml_str("[request\n").unwrap_err();
        assert!(matches!(err, EtlError::ConfigValidationError { .. }));
    }
}
