use anyhow::Result;

use parimate_matching::PhraseMatcher;

use crate::config::ParimateConfig;

pub fn handle(text: &str, phrase: &str, config: &ParimateConfig) -> Result<()> {
    let found = PhraseMatcher::from_config(&config.matching).find(text, phrase);
    tracing::debug!(matched = found.matched, ratio = found.ratio, "Phrase searched");
    println!("{}", serde_json::to_string_pretty(&found)?);
    Ok(())
}
