use clap::Parser;
use pokedex_etl::app::menu::DexMenu;
use pokedex_etl::app::pipelines::ScrapeOptions;
use pokedex_etl::config::{CliConfig, Command, QueryCommand};
use pokedex_etl::core::queries::DexQueries;
use pokedex_etl::utils::logger;
use pokedex_etl::{DexApp, DexConfig, EtlError, ScrapeRequest};
use serde::Serialize;
use std::io::{self, BufRead, Write};

/// 在終端機詢問 y/n
fn ask_yes_no(question: &str) -> pokedex_etl::Result<bool> {
    print!("{} (y/n): ", question);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> pokedex_etl::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn query(app: &DexApp, command: QueryCommand) -> pokedex_etl::Result<()> {
    let queries = DexQueries::load(app.storage(), app.config()).await?;
    match command {
        QueryCommand::Names => print_json(&queries.names()),
        QueryCommand::Numbers => print_json(&queries.national_numbers()),
        QueryCommand::Pokemon { name } => match queries.pokemon_by_name(&name) {
            Some(record) => print_json(record),
            None => {
                println!("No Pokémon named {}", name);
                Ok(())
            }
        },
        QueryCommand::Number { number } => match queries.pokemon_by_number(&number) {
            Some(record) => print_json(record),
            None => {
                println!("No Pokémon with number {}", number);
                Ok(())
            }
        },
        QueryCommand::Games {
            generation,
            region,
            platform,
        } => {
            if let Some(generation) = generation {
                print_json(&queries.games_by_generation(generation).unwrap_or_default())
            } else if let Some(region) = region {
                print_json(&queries.games_by_region(&region).unwrap_or_default())
            } else if let Some(platform) = platform {
                print_json(&queries.games_by_platform(&platform))
            } else {
                print_json(&queries.all_games())
            }
        }
        QueryCommand::InGame { game } => print_json(&queries.pokemon_in_game(&game)),
        QueryCommand::Appearances { name } => match queries.game_availability(&name) {
            Some(appearances) => print_json(appearances),
            None => {
                println!("No game appearances recorded for {}", name);
                Ok(())
            }
        },
        QueryCommand::Count { game } => {
            println!("{}: {} Pokémon", game, queries.count_in_game(&game));
            Ok(())
        }
    }
}

async fn run(app: &DexApp, command: Command) -> pokedex_etl::Result<()> {
    let tools = app.tools();
    match command {
        Command::Status => print!("{}", tools.status().await?),
        Command::Import { yes } => {
            let confirm = |question: &str| if yes { Ok(true) } else { ask_yes_no(question) };
            app.import(confirm).await?;
        }
        Command::Scrape {
            kind,
            limit,
            start,
            generation,
            preview,
        } => {
            if let Some(name) = preview {
                match app.preview(&name).await? {
                    Some(record) => print_json(&record)?,
                    None => println!("{} is not in the Pokémon dataset", name),
                }
                return Ok(());
            }

            let request = ScrapeRequest {
                target: kind,
                options: ScrapeOptions::new(start, limit),
                generation,
            };
            for path in app.scrape(request).await? {
                println!("📁 Output saved to: {}", path);
            }
        }
        Command::Backup => match tools.backup_all().await? {
            Some(path) => println!("✅ Backup completed: {}", path),
            None => println!("No data files to back up"),
        },
        Command::Validate => print!("{}", tools.validate().await?),
        Command::Summary => {
            let (path, summary) = tools.export_summary().await?;
            println!("Summary exported to {}", path);
            print_json(&summary)?;
        }
        Command::SpreadsheetStatus => match tools.spreadsheet_status().await? {
            Some(status) => print!("{}", status),
            None => println!("❌ Spreadsheet not found: {}", app.config().spreadsheet.path),
        },
        Command::Dedupe => {
            let removed = tools.clean_duplicates().await?;
            println!("Removed {} duplicate entries", removed);
        }
        Command::Reset { dataset, yes } => {
            if yes || ask_yes_no(&format!("Really reset {}? This cannot be undone", dataset))? {
                if tools.reset(dataset).await? {
                    println!("Reset {} dataset", dataset);
                } else {
                    println!("{} dataset doesn't exist", dataset);
                }
            }
        }
        Command::ExportCsv { path } => {
            let count = tools.export_csv(&path).await?;
            println!("📤 Exported {} Pokémon to {}", count, path);
        }
        Command::Query(command) => query(app, command).await?,
        Command::Menu => {
            let stdin = io::stdin();
            let mut menu = DexMenu::new(app, stdin.lock(), io::stdout());
            menu.run().await?;
        }
    }
    Ok(())
}

fn report_failure(e: &EtlError) -> ! {
    // 記錄詳細錯誤信息
    tracing::error!(
        "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    std::process::exit(e.severity().exit_code().max(1))
}

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    // 初始化日誌
    logger::init_cli_logger(cli.verbose);

    tracing::info!("Starting pokedex-etl");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let config: DexConfig = match cli.resolve() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {}", e);
            report_failure(&e);
        }
    };

    if cli.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let app = DexApp::new(config, cli.monitor);
    let command = cli.command.clone().unwrap_or(Command::Menu);

    if let Err(e) = run(&app, command).await {
        report_failure(&e);
    }
}
