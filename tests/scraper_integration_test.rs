use httpmock::prelude::*;
use pokedex_etl::{DexApp, DexConfig, ScrapeRequest, ScrapeTarget};
use serde_json::{json, Value};
use std::path::Path;
use tempfile::TempDir;

const NATIONAL_DEX: &str = r#"<html><body>
<table class="dextable">
<tr><td>No.</td><td>Pic</td><td></td><td>Name</td><td>Abilities</td><td>Type</td><td></td><td>HP</td><td>Att</td><td>Def</td><td>S.Att</td><td>S.Def</td><td>Spd</td></tr>
<tr>
  <td>#0001</td><td></td><td></td><td><a href="/pokedex-sv/bulbasaur/">Bulbasaur</a></td>
  <td><a href="/abilitydex/overgrow.shtml">Overgrow</a><a href="/abilitydex/chlorophyll.shtml">Chlorophyll</a></td>
  <td><img src="/pokedex-bw/type/grass.gif"><img src="/pokedex-bw/type/poison.gif"></td><td></td>
  <td>45</td><td>49</td><td>49</td><td>65</td><td>65</td><td>45</td>
</tr>
<tr>
  <td>#0002</td><td></td><td></td><td><a href="/pokedex-sv/ivysaur/">Ivysaur</a></td>
  <td><a href="/abilitydex/overgrow.shtml">Overgrow</a></td>
  <td><img src="/pokedex-bw/type/grass.gif"><img src="/pokedex-bw/type/poison.gif"></td><td></td>
  <td>60</td><td>62</td><td>63</td><td>80</td><td>80</td><td>60</td>
</tr>
</table></body></html>"#;

const ABILITY_INDEX: &str = r#"<html><body>
<form name="ability"><select>
  <option value="index.shtml">AbilityDex A-L</option>
  <option value="/abilitydex/chlorophyll.shtml">Chlorophyll</option>
</select></form>
<form name="ability2"><select>
  <option value="/abilitydex/overgrow.shtml">Overgrow</option>
</select></form>
</body></html>"#;

const OVERGROW: &str = r#"<html><head><title>Serebii.net AbilityDex - Overgrow</title></head><body>
<h1>Overgrow</h1>
<table class="dextable">
  <tr><td>Game's Text:</td></tr>
  <tr><td>Powers up Grass-type moves when the Pokémon's HP is low.</td></tr>
</table>
<table class="dextable">
  <tr><td>No.</td><td>Pic</td><td>Name</td></tr>
  <tr><td>sub</td><td>header</td><td>row</td></tr>
  <tr><td>#001</td><td></td><td>Bulbasaur</td></tr>
</table>
</body></html>"#;

fn test_app(server: &MockServer, root: &Path) -> DexApp {
    let mut config = DexConfig::default();
    config.project.root = root.to_str().unwrap().to_string();
    config.sources.site_root = server.base_url();
    config.request.delay_ms = 0;
    DexApp::new(config, false)
}

fn read_json(root: &Path, path: &str) -> Value {
    let data = std::fs::read(root.join(path)).unwrap();
    serde_json::from_slice(&data).unwrap()
}

#[tokio::test]
async fn test_basic_scrape_merges_with_existing_dataset() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::create_dir_all(temp_dir.path().join("data")).unwrap();
    std::fs::write(
        temp_dir.path().join("data/pokemon_data.json"),
        serde_json::to_vec(&json!([
            {"name": "Bulbasaur", "types": ["Grass"], "physical_info": {"species": "Seed Pokémon"}}
        ]))
        .unwrap(),
    )
    .unwrap();

    let server = MockServer::start();
    let dex_mock = server.mock(|when, then| {
        when.method(GET).path("/pokemon/nationalpokedex.shtml");
        then.status(200)
            .header("Content-Type", "text/html")
            .body(NATIONAL_DEX);
    });

    let app = test_app(&server, temp_dir.path());
    let outputs = app.scrape(ScrapeRequest::new(ScrapeTarget::Basic)).await.unwrap();

    dex_mock.assert();
    assert_eq!(outputs, vec!["data/pokemon_data.json".to_string()]);

    let saved = read_json(temp_dir.path(), "data/pokemon_data.json");
    let pokemon = saved.as_array().unwrap();
    assert_eq!(pokemon.len(), 2);

    // scraped fields are added, earlier fields survive
    let bulbasaur = &pokemon[0];
    assert_eq!(bulbasaur["number"], "#0001");
    assert_eq!(bulbasaur["types"], json!(["Grass", "Poison"]));
    assert_eq!(bulbasaur["physical_info"]["species"], "Seed Pokémon");
    assert_eq!(bulbasaur["base_stats"]["sp_attack"], 65);
    assert_eq!(pokemon[1]["name"], "Ivysaur");

    assert!(temp_dir.path().join("data/pokemon_data_backup.json").exists());
}

#[tokio::test]
async fn test_abilities_scrape_writes_json_and_report() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start();

    let index_mock = server.mock(|when, then| {
        when.method(GET).path("/abilitydex/");
        then.status(200).body(ABILITY_INDEX);
    });
    let overgrow_mock = server.mock(|when, then| {
        when.method(GET).path("/abilitydex/overgrow.shtml");
        then.status(200).body(OVERGROW);
    });
    let chlorophyll_mock = server.mock(|when, then| {
        when.method(GET).path("/abilitydex/chlorophyll.shtml");
        then.status(503);
    });

    let app = test_app(&server, temp_dir.path());
    let outputs = app
        .scrape(ScrapeRequest::new(ScrapeTarget::Abilities))
        .await
        .unwrap();

    index_mock.assert();
    overgrow_mock.assert();
    chlorophyll_mock.assert();
    assert_eq!(outputs, vec!["data/abilities_data.json".to_string()]);

    let saved = read_json(temp_dir.path(), "data/abilities_data.json");
    assert_eq!(saved["metadata"]["total_abilities"], 1);
    assert_eq!(saved["metadata"]["source"], "Serebii.net");
    assert_eq!(saved["abilities"][0]["name"], "Overgrow");
    assert_eq!(saved["abilities"][0]["pokemon"], json!(["Bulbasaur"]));

    let report = std::fs::read_to_string(temp_dir.path().join("data/abilities_data.txt")).unwrap();
    assert!(report.contains("Total Abilities: 1"));
    assert!(report.contains("[001] OVERGROW"));
}

#[tokio::test]
async fn test_single_scraper_reports_network_failure() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start();
    let dex_mock = server.mock(|when, then| {
        when.method(GET).path("/pokemon/nationalpokedex.shtml");
        then.status(500);
    });

    let app = test_app(&server, temp_dir.path());
    let err = app
        .scrape(ScrapeRequest::new(ScrapeTarget::Basic))
        .await
        .unwrap_err();

    dex_mock.assert();
    assert!(err.is_recoverable());
    assert!(!temp_dir.path().join("data/pokemon_data.json").exists());
}
