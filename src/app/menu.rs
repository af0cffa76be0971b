//! 互動式選單: 主選單 1-11 與資料管理子選單 1-7。

use super::{DexApp, ScrapeRequest, ScrapeTarget};
use crate::app::pipelines::ScrapeOptions;
use crate::domain::model::Dataset;
use crate::domain::ports::ConfigProvider;
use crate::utils::error::Result;
use std::io::{BufRead, Write};

const SEPARATOR_WIDTH: usize = 50;

/// 讀一行輸入，輸入結束時回傳 None
fn ask<R: BufRead, W: Write>(input: &mut R, output: &mut W, prompt: &str) -> Result<Option<String>> {
    write!(output, "{}", prompt)?;
    output.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn confirm<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> Result<bool> {
    let answer = ask(input, output, &format!("{} (y/n): ", question))?;
    Ok(answer.is_some_and(|a| a.eq_ignore_ascii_case("y")))
}

/// 空白或 `all` 為不限
fn parse_limit(answer: &str) -> Option<usize> {
    if answer.is_empty() || answer.eq_ignore_ascii_case("all") {
        None
    } else {
        answer.parse().ok()
    }
}

pub struct DexMenu<'a, R: BufRead, W: Write> {
    app: &'a DexApp,
    input: R,
    output: W,
}

impl<'a, R: BufRead, W: Write> DexMenu<'a, R, W> {
    pub fn new(app: &'a DexApp, input: R, output: W) -> Self {
        Self { app, input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn ask(&mut self, prompt: &str) -> Result<Option<String>> {
        ask(&mut self.input, &mut self.output, prompt)
    }

    fn confirm(&mut self, question: &str) -> Result<bool> {
        confirm(&mut self.input, &mut self.output, question)
    }

    fn show_menu(&mut self) -> Result<()> {
        let pokemon = self.app.config().dataset_path(Dataset::Pokemon);
        let abilities = self.app.config().dataset_path(Dataset::Abilities);
        let items = self.app.config().dataset_path(Dataset::Items);
        let spreadsheet = self.app.config().spreadsheet.path.clone();
        let out = &mut self.output;

        writeln!(out, "=== Pokemon Data Collection System ===")?;
        writeln!(out)?;
        writeln!(out, "Data Sources:")?;
        writeln!(out, "1. Show project status - [READ ONLY]")?;
        writeln!(out)?;
        writeln!(out, "Spreadsheet Import:")?;
        writeln!(out, "2. Import from {} - [MERGES WITH {}]", spreadsheet, pokemon)?;
        writeln!(out)?;
        writeln!(out, "Web Scrapers:")?;
        writeln!(out, "3. Run basic Pokemon scraper - [SAVES TO {}]", pokemon)?;
        writeln!(out, "4. Run detailed Pokemon scraper - [HAS PREVIEW & SAVE OPTIONS]")?;
        writeln!(out, "5. Run game dex scraper - [SAVES TO {}]", pokemon)?;
        writeln!(out, "6. Run abilities scraper - [SAVES TO {}]", abilities)?;
        writeln!(out, "7. Run moves scraper - [SAVES TO ONE FILE PER GENERATION]")?;
        writeln!(out, "8. Run items scraper - [SAVES TO {}]", items)?;
        writeln!(out, "9. Run all scrapers (complete collection) - [SAVES ALL DATA]")?;
        writeln!(out)?;
        writeln!(out, "Tools & Management:")?;
        writeln!(out, "10. Data management tools - [BACKUP/VALIDATION TOOLS]")?;
        writeln!(out, "11. Exit")?;
        writeln!(out)?;
        Ok(())
    }

    /// 主迴圈，直到選擇離開或輸入結束
    pub async fn run(&mut self) -> Result<()> {
        loop {
            self.show_menu()?;
            let Some(choice) = self.ask("Choose option (1-11): ")? else {
                break;
            };

            let outcome = match choice.as_str() {
                "1" => self.show_status().await,
                "2" => self.import().await,
                "3" => self.scrape(ScrapeRequest::new(ScrapeTarget::Basic)).await,
                "4" => self.details().await,
                "5" => self.scrape_with_limit(ScrapeTarget::Games).await,
                "6" => self.scrape_with_limit(ScrapeTarget::Abilities).await,
                "7" => self.moves().await,
                "8" => self.scrape_with_limit(ScrapeTarget::Items).await,
                "9" => self.scrape(ScrapeRequest::new(ScrapeTarget::All)).await,
                "10" => self.data_menu().await,
                "11" => {
                    writeln!(self.output, "Goodbye!")?;
                    break;
                }
                _ => {
                    writeln!(self.output, "Invalid choice.")?;
                    Ok(())
                }
            };

            if let Err(e) = outcome {
                tracing::error!("❌ {}", e);
                writeln!(self.output, "{}", e.user_friendly_message())?;
                writeln!(self.output, "Suggestion: {}", e.recovery_suggestion())?;
            }
            writeln!(self.output, "\n{}\n", "=".repeat(SEPARATOR_WIDTH))?;
        }
        Ok(())
    }

    async fn show_status(&mut self) -> Result<()> {
        let report = self.app.tools().status().await?;
        write!(self.output, "{}", report)?;
        Ok(())
    }

    async fn import(&mut self) -> Result<()> {
        let app = self.app;
        let input = &mut self.input;
        let output = &mut self.output;
        app.import(|question| confirm(input, output, question)).await?;
        Ok(())
    }

    async fn scrape(&mut self, request: ScrapeRequest) -> Result<()> {
        let outputs = self.app.scrape(request).await?;
        for path in outputs {
            writeln!(self.output, "💾 Saved {}", path)?;
        }
        Ok(())
    }

    async fn scrape_with_limit(&mut self, target: ScrapeTarget) -> Result<()> {
        let Some(answer) = self.ask("How many to scrape? (Enter for all): ")? else {
            return Ok(());
        };
        let mut request = ScrapeRequest::new(target);
        request.options = ScrapeOptions::new(0, parse_limit(&answer));
        self.scrape(request).await
    }

    async fn details(&mut self) -> Result<()> {
        writeln!(self.output, "1. Preview one Pokemon (no save)")?;
        writeln!(self.output, "2. Scrape and save a range")?;
        match self.ask("Choose option (1-2): ")?.as_deref() {
            Some("1") => {
                let Some(name) = self.ask("Pokemon name: ")? else {
                    return Ok(());
                };
                match self.app.preview(&name).await? {
                    Some(record) => {
                        let pretty = serde_json::to_string_pretty(&record)?;
                        writeln!(self.output, "{}", pretty)?;
                    }
                    None => writeln!(self.output, "{} is not in the dataset", name)?,
                }
                Ok(())
            }
            Some("2") => {
                let start = self
                    .ask("Start from which index? ")?
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0);
                let limit = self
                    .ask("How many to process (or 'all')? ")?
                    .and_then(|s| parse_limit(&s));
                let mut request = ScrapeRequest::new(ScrapeTarget::Details);
                request.options = ScrapeOptions::new(start, limit);
                self.scrape(request).await
            }
            _ => {
                writeln!(self.output, "Invalid choice.")?;
                Ok(())
            }
        }
    }

    async fn moves(&mut self) -> Result<()> {
        let generation = loop {
            let Some(answer) = self.ask("Which generation would you like to scrape? (1-9): ")? else {
                return Ok(());
            };
            match answer.parse::<u8>() {
                Ok(generation) if (1..=9).contains(&generation) => break generation,
                _ => writeln!(self.output, "Please enter a number between 1 and 9")?,
            }
        };
        let Some(answer) = self.ask("How many moves? (Enter for all): ")? else {
            return Ok(());
        };

        let mut request = ScrapeRequest::new(ScrapeTarget::Moves);
        request.generation = generation;
        request.options = ScrapeOptions::new(0, parse_limit(&answer));
        self.scrape(request).await
    }

    async fn data_menu(&mut self) -> Result<()> {
        loop {
            writeln!(self.output, "=== Data Management Tools ===")?;
            writeln!(self.output, "1. Backup current data")?;
            writeln!(self.output, "2. Validate data integrity")?;
            writeln!(self.output, "3. Export data summary")?;
            writeln!(self.output, "4. Check spreadsheet status")?;
            writeln!(self.output, "5. Clean up duplicate entries")?;
            writeln!(self.output, "6. Reset specific dataset")?;
            writeln!(self.output, "7. Return to main menu")?;

            let Some(choice) = self.ask("Choose option (1-7): ")? else {
                return Ok(());
            };
            let tools = self.app.tools();
            match choice.as_str() {
                "1" => match tools.backup_all().await? {
                    Some(path) => writeln!(self.output, "Backup completed: {}", path)?,
                    None => writeln!(self.output, "No data files to back up")?,
                },
                "2" => {
                    let report = tools.validate().await?;
                    write!(self.output, "{}", report)?;
                }
                "3" => {
                    let (path, summary) = tools.export_summary().await?;
                    writeln!(self.output, "Summary exported to {}", path)?;
                    writeln!(self.output, "{}", serde_json::to_string_pretty(&summary)?)?;
                }
                "4" => match tools.spreadsheet_status().await? {
                    Some(status) => write!(self.output, "{}", status)?,
                    None => {
                        writeln!(
                            self.output,
                            "❌ Spreadsheet not found: {}",
                            self.app.config().spreadsheet.path
                        )?;
                        writeln!(self.output, "   Place the workbook in the project root directory")?;
                    }
                },
                "5" => {
                    let removed = tools.clean_duplicates().await?;
                    writeln!(self.output, "Removed {} duplicate entries", removed)?;
                }
                "6" => self.reset_dataset().await?,
                "7" => return Ok(()),
                _ => writeln!(self.output, "Invalid choice.")?,
            }
            writeln!(self.output)?;
        }
    }

    async fn reset_dataset(&mut self) -> Result<()> {
        writeln!(self.output, "Available datasets to reset:")?;
        for (i, dataset) in Dataset::ALL.iter().enumerate() {
            let path = self.app.config().dataset_path(*dataset);
            writeln!(self.output, "{}. {} ({})", i + 1, dataset, path)?;
        }

        let Some(choice) = self.ask("Choose dataset to reset (number or 'cancel'): ")? else {
            return Ok(());
        };
        if choice.eq_ignore_ascii_case("cancel") {
            return Ok(());
        }
        let Some(dataset) = choice
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| Dataset::ALL.get(i).copied())
        else {
            writeln!(self.output, "Invalid choice")?;
            return Ok(());
        };

        if !self.confirm(&format!("Really reset {}? This cannot be undone", dataset))? {
            return Ok(());
        }
        if self.app.tools().reset(dataset).await? {
            writeln!(self.output, "Reset {} dataset", dataset)?;
        } else {
            writeln!(self.output, "{} dataset doesn't exist", dataset)?;
        }
        Ok(())
    }
}
