//! Loads the predefined roleplay scenarios from disk.
//!
//! Each scenario is one JSON file in the scenarios directory. Files that
//! fail to parse are skipped with a warning so one bad file cannot take
//! the whole catalogue down.

use anyhow::{Context, Result};
use samtale_core::scenario::{ScenarioContext, ScenarioStore};
use std::path::Path;
use tracing::{info, warn};

pub struct FileScenarioStore {
    scenarios: Vec<ScenarioContext>,
}

impl FileScenarioStore {
    /// Reads every `*.json` file in the directory. An empty or missing
    /// directory yields an empty catalogue; ad-hoc scenarios still work.
    pub fn load(dir: &Path) -> Result<Self> {
        let mut scenarios = Vec::new();
        if !dir.exists() {
            warn!(path = %dir.display(), "scenarios directory does not exist; starting with an empty catalogue");
            return Ok(Self { scenarios });
        }
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read scenarios directory {}", dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_scenario(&path) {
                Ok(scenario) => scenarios.push(scenario),
                Err(error) => {
                    warn!(path = %path.display(), %error, "skipping unreadable scenario file");
                }
            }
        }
        scenarios.sort_by(|a, b| a.title.cmp(&b.title));
        info!(count = scenarios.len(), "loaded scenario catalogue");
        Ok(Self { scenarios })
    }

    #[cfg(test)]
    fn from_scenarios(scenarios: Vec<ScenarioContext>) -> Self {
        Self { scenarios }
    }
}

fn read_scenario(path: &Path) -> Result<ScenarioContext> {
    let raw = std::fs::read_to_string(path)?;
    let scenario = serde_json::from_str(&raw)?;
    Ok(scenario)
}

impl ScenarioStore for FileScenarioStore {
    fn list(&self) -> Vec<ScenarioContext> {
        self.scenarios.clone()
    }

    fn get(&self, title: &str) -> Option<ScenarioContext> {
        self.scenarios.iter().find(|s| s.title == title).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(title: &str) -> ScenarioContext {
        ScenarioContext {
            title: title.to_string(),
            description: String::new(),
            prompt_addition: String::new(),
            first_message: None,
        }
    }

    #[test]
    fn get_finds_by_exact_title() {
        let store =
            FileScenarioStore::from_scenarios(vec![scenario("Hos lægen"), scenario("Supermarked")]);
        assert!(store.get("Supermarked").is_some());
        assert!(store.get("supermarked").is_none());
        assert_eq!(store.list().len(), 2);
    }

    #[test]
    fn missing_directory_yields_an_empty_catalogue() {
        let store = FileScenarioStore::load(Path::new("/nonexistent/scenarios")).unwrap();
        assert!(store.list().is_empty());
    }

    #[test]
    fn loads_and_sorts_json_files() {
        let dir = std::env::temp_dir().join("samtale-scenario-store-test");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("b.json"),
            r#"{"title":"Supermarked","first_message":"Velkommen!"}"#,
        )
        .unwrap();
        std::fs::write(dir.join("a.json"), r#"{"title":"Hos lægen"}"#).unwrap();
        std::fs::write(dir.join("broken.json"), "{not json").unwrap();
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let store = FileScenarioStore::load(&dir).unwrap();
        let titles: Vec<_> = store.list().into_iter().map(|s| s.title).collect();
        assert_eq!(titles, vec!["Hos lægen", "Supermarked"]);
        assert_eq!(
            store.get("Supermarked").unwrap().opening_line(),
            Some("Velkommen!")
        );

        let _ = std::fs::remove_dir_all(&dir);
    }
}
