use crate::app::ScrapeTarget;
use crate::config::toml_config::DexConfig;
use crate::domain::model::Dataset;
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use clap::{Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "pokedex-etl")]
#[command(about = "Collects Pokémon data from Serebii.net and a master spreadsheet into JSON datasets")]
pub struct CliConfig {
    /// TOML 設定檔
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// 覆寫 project.root
    #[arg(long, global = true)]
    pub root: Option<String>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log CPU and memory usage between phases")]
    pub monitor: bool,

    /// 未指定時進入互動選單
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Show dataset counts and Pokémon data coverage
    Status,
    /// Import the master spreadsheet into the Pokémon dataset
    Import {
        /// Skip the confirmation prompts
        #[arg(short, long)]
        yes: bool,
    },
    /// Run a scraper
    Scrape {
        #[arg(value_enum)]
        kind: ScrapeTarget,
        /// Maximum number of entities to process
        #[arg(long)]
        limit: Option<usize>,
        /// Index of the first entity (details and games)
        #[arg(long, default_value_t = 0)]
        start: usize,
        /// Move generation (1-9)
        #[arg(long, default_value_t = 9, value_parser = clap::value_parser!(u8).range(1..=9))]
        generation: u8,
        /// Scrape one Pokémon's details and print the merged record without saving
        #[arg(long, value_name = "NAME")]
        preview: Option<String>,
    },
    /// Archive every dataset file into the backups directory
    Backup,
    /// Check for duplicate names and missing fields
    Validate,
    /// Export the project summary JSON
    Summary,
    /// Show workbook information
    SpreadsheetStatus,
    /// Merge duplicate Pokémon entries
    Dedupe,
    /// Delete a dataset file
    Reset {
        #[arg(value_enum)]
        dataset: Dataset,
        #[arg(short, long)]
        yes: bool,
    },
    /// Flatten the Pokémon dataset to CSV
    ExportCsv {
        #[arg(default_value = "data/pokemon_export.csv")]
        path: String,
    },
    /// Look up saved data
    #[command(subcommand)]
    Query(QueryCommand),
    /// Interactive menu
    Menu,
}

#[derive(Debug, Clone, Subcommand)]
pub enum QueryCommand {
    /// All Pokémon names
    Names,
    /// All national dex numbers
    Numbers,
    /// One Pokémon by name (case-insensitive)
    Pokemon { name: String },
    /// One Pokémon by national number (#0001, 1)
    Number { number: String },
    /// Games, optionally filtered
    Games {
        #[arg(long)]
        generation: Option<u32>,
        #[arg(long)]
        region: Option<String>,
        #[arg(long)]
        platform: Option<String>,
    },
    /// Pokémon available in a game, ordered by that game's dex number
    InGame { game: String },
    /// Games a Pokémon appears in
    Appearances { name: String },
    /// Number of Pokémon available in a game
    Count { game: String },
}

impl CliConfig {
    /// 載入設定檔 (或預設值) 並套用命令列覆寫
    pub fn resolve(&self) -> Result<DexConfig> {
        let mut config = match &self.config {
            Some(path) => {
                tracing::info!("📁 Loading configuration from: {}", path);
                DexConfig::from_file(path)?
            }
            None => DexConfig::default(),
        };

        if let Some(root) = &self.root {
            tracing::info!("🔧 Project root overridden to: {}", root);
            config.project.root = root.clone();
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_scrape_command() {
        let cli = CliConfig::parse_from([
            "pokedex-etl",
            "scrape",
            "moves",
            "--generation",
            "3",
            "--limit",
            "10",
            "--verbose",
        ]);
        assert!(cli.verbose);
        match cli.command {
            Some(Command::Scrape {
                kind,
                limit,
                generation,
                start,
                preview,
            }) => {
                assert_eq!(kind, ScrapeTarget::Moves);
                assert_eq!(limit, Some(10));
                assert_eq!(generation, 3);
                assert_eq!(start, 0);
                assert!(preview.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_generation_out_of_range_rejected() {
        let result = CliConfig::try_parse_from(["pokedex-etl", "scrape", "moves", "--generation", "10"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_no_subcommand_means_menu() {
        let cli = CliConfig::parse_from(["pokedex-etl"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_parse_query_and_reset() {
        let cli = CliConfig::parse_from(["pokedex-etl", "query", "in-game", "Scarlet"]);
        assert!(matches!(
            cli.command,
            Some(Command::Query(QueryCommand::InGame { ref game })) if game == "Scarlet"
        ));

        let cli = CliConfig::parse_from(["pokedex-etl", "reset", "items", "--yes"]);
        assert!(matches!(
            cli.command,
            Some(Command::Reset { dataset: Dataset::Items, yes: true })
        ));
    }

    #[test]
    fn test_resolve_applies_root_override() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[request]\ndelay_ms = 0\n").unwrap();

        let cli = CliConfig::parse_from([
            "pokedex-etl",
            "--config",
            file.path().to_str().unwrap(),
            "--root",
            "/tmp/dex",
            "status",
        ]);
        let config = cli.resolve().unwrap();
        assert_eq!(config.project.root, "/tmp/dex");
        assert_eq!(config.request.delay_ms, 0);
    }

    #[test]
    fn test_resolve_rejects_invalid_config() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[request]\ntimeout_seconds = 0\n").unwrap();

        let cli = CliConfig::parse_from(["pokedex-etl", "-c", file.path().to_str().unwrap(), "status"]);
        assert!(cli.resolve().is_err());
    }
}
