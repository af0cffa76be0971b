use anyhow::Result;
use pokedex_etl::core::queries::DexQueries;
use pokedex_etl::{Dataset, DexApp, DexConfig};
use serde_json::json;
use std::io::Read;
use tempfile::TempDir;

fn setup() -> (TempDir, DexApp) {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    std::fs::create_dir_all(root.join("data")).unwrap();

    let pokemon = json!([
        {
            "name": "Pikachu",
            "number": "#0025",
            "types": ["Electric"],
            "abilities": ["Static"],
            "base_stats": {"hp": 35, "attack": 55},
            "game_appearances": {
                "Scarlet": {"dex_number": 74, "available": true},
                "Shield": {"dex_number": 194, "available": true}
            }
        },
        {
            "name": "Eevee",
            "number": "#0133",
            "types": ["Normal"],
            "game_appearances": {"Scarlet": {"dex_number": 181, "available": true}}
        },
        {"name": "pikachu", "physical_info": {"species": "Mouse Pokémon"}}
    ]);
    std::fs::write(root.join("data/pokemon_data.json"), serde_json::to_vec(&pokemon).unwrap()).unwrap();

    let games = json!([
        {"generation": 8, "region": "Galar", "platform": "Nintendo Switch", "games": ["Sword", "Shield"]},
        {"generation": 9, "region": "Paldea", "platform": "Nintendo Switch", "games": ["Scarlet", "Violet"]}
    ]);
    std::fs::write(root.join("data/pokemon_games.json"), serde_json::to_vec(&games).unwrap()).unwrap();
    std::fs::write(
        root.join("data/items_data.json"),
        serde_json::to_vec(&json!([{"name": "Potion"}])).unwrap(),
    )
    .unwrap();

    let mut config = DexConfig::default();
    config.project.root = root.to_str().unwrap().to_string();
    (temp_dir, DexApp::new(config, false))
}

#[tokio::test]
async fn test_validate_then_dedupe_workflow() -> Result<()> {
    let (_temp_dir, app) = setup();
    let tools = app.tools();

    let report = tools.validate().await?;
    assert_eq!(report.total, 3);
    assert_eq!(report.duplicates, vec!["pikachu".to_string()]);
    assert!(!report.is_clean());

    assert_eq!(tools.clean_duplicates().await?, 1);

    let queries = DexQueries::load(app.storage(), app.config()).await?;
    assert_eq!(queries.names(), vec!["Pikachu", "Eevee"]);
    let pikachu = queries.pokemon_by_name("PIKACHU").unwrap();
    assert_eq!(pikachu.get("physical_info").unwrap()["species"], "Mouse Pokémon");

    let report = tools.validate().await?;
    assert!(report.duplicates.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_queries_over_saved_datasets() -> Result<()> {
    let (_temp_dir, app) = setup();
    let queries = DexQueries::load(app.storage(), app.config()).await?;

    assert_eq!(queries.pokemon_by_number("25").unwrap().name(), Some("Pikachu"));
    assert_eq!(queries.all_games(), vec!["Sword", "Shield", "Scarlet", "Violet"]);
    assert_eq!(
        queries.games_by_region("paldea").unwrap(),
        &["Scarlet".to_string(), "Violet".to_string()]
    );
    assert_eq!(queries.games_by_platform("switch").len(), 4);

    let scarlet = queries.pokemon_in_game("Scarlet");
    assert_eq!(scarlet.len(), 2);
    assert_eq!(scarlet[0].name, "Pikachu");
    assert_eq!(scarlet[1].game_dex_number, Some(181));
    assert_eq!(queries.count_in_game("Shield"), 1);
    assert_eq!(queries.count_in_game("Violet"), 0);
    Ok(())
}

#[tokio::test]
async fn test_backup_export_and_reset() -> Result<()> {
    let (temp_dir, app) = setup();
    let tools = app.tools();

    let archive_path = tools.backup_all().await?.unwrap();
    let file = std::fs::File::open(temp_dir.path().join(&archive_path))?;
    let mut archive = zip::ZipArchive::new(file)?;
    let mut names: Vec<String> = (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "items_data.json".to_string(),
            "pokemon_data.json".to_string(),
            "pokemon_games.json".to_string(),
        ]
    );
    let mut items = String::new();
    archive
        .by_name("items_data.json")
        .unwrap()
        .read_to_string(&mut items)
        .unwrap();
    assert!(items.contains("Potion"));

    let exported = tools.export_csv("data/export.csv").await?;
    assert_eq!(exported, 3);
    let csv = std::fs::read_to_string(temp_dir.path().join("data/export.csv"))?;
    assert!(csv.lines().next().unwrap().starts_with("number,name,"));
    assert!(csv.contains("Eevee"));

    assert!(tools.reset(Dataset::Items).await?);
    assert!(!temp_dir.path().join("data/items_data.json").exists());
    assert!(!tools.reset(Dataset::Items).await?);

    let status = tools.status().await?;
    assert!(status.to_string().contains("Items: Not found"));
    Ok(())
}
