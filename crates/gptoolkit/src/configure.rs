//! Interactive configuration for gptoolkit.
//!
//! Stores the completion API key and prepares the data directory.

use anyhow::{Context, Result};
use colored::Colorize;
use dialoguer::Password;
use std::fs;
use std::path::Path;

use gptoolkit_core::{FileSecretStore, OPENAI_SECRET};

use crate::config::{AppConfig, CONFIG_FILE_NAME};

pub fn handle_configure(api_key: Option<String>, app_dir: &Path) -> Result<()> {
    // Step 1: Get the key, prompting when it was not passed on the command line
    let api_key = match api_key {
        Some(key) => key,
        None => Password::new()
            .with_prompt("Enter your OpenAI API key")
            .interact()
            .context("Failed to read API key")?,
    };

    let api_key = api_key.trim();
    if api_key.is_empty() {
        anyhow::bail!("API key must not be empty");
    }

    // Step 2: Data directory
    fs::create_dir_all(app_dir)
        .with_context(|| format!("Failed to create {}", app_dir.display()))?;

    // Step 3: Store the key
    let store = FileSecretStore::in_dir(app_dir);
    store
        .set(OPENAI_SECRET, api_key)
        .context("Failed to store API key")?;

    eprintln!(
        "{} OpenAI API key stored in {}",
        "✓".bright_green(),
        store.path().display()
    );

    // Step 4: Default config, never overwriting an existing one
    let config_path = app_dir.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        eprintln!(
            "  Keeping existing config at {}",
            config_path.display().to_string().dimmed()
        );
    } else {
        fs::write(&config_path, AppConfig::default_contents())
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
        eprintln!(
            "{} Config saved to {}",
            "✓".bright_green(),
            config_path.display()
        );
    }

    eprintln!(
        "{} App data directory set to {}",
        "✓".bright_green(),
        app_dir.display()
    );

    print_getting_started();

    Ok(())
}

/// Print the getting started guide
pub fn print_getting_started() {
    eprintln!();
    eprintln!("{}", "Getting started:".bold());
    eprintln!(
        "  {} Store a prompt: {}",
        "1.".dimmed(),
        "gptoolkit add --prompt \"Summarize: \" --engine text-davinci-003 --use-case summarization"
            .bright_cyan()
    );
    eprintln!(
        "  {} Find prompts: {}",
        "2.".dimmed(),
        "gptoolkit search --use-case summ".bright_cyan()
    );
    eprintln!(
        "  {} Run a completion: {}",
        "3.".dimmed(),
        "gptoolkit complete --use-case summarization \"text...\"".bright_cyan()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use gptoolkit_core::SecretProvider;

    #[test]
    fn test_configure_writes_key_and_config() {
        let dir = tempfile::tempdir().unwrap();
        let app_dir = dir.path().join(".gptoolkit");

        handle_configure(Some("  sk-test \n".to_string()), &app_dir).unwrap();

        let store = FileSecretStore::in_dir(&app_dir);
        assert_eq!(store.get(OPENAI_SECRET).unwrap().as_deref(), Some("sk-test"));
        assert!(AppConfig::load(&app_dir).unwrap().is_some());
    }

    #[test]
    fn test_configure_keeps_existing_config() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&config_path, "timeout_secs = 5\n").unwrap();

        handle_configure(Some("sk".to_string()), dir.path()).unwrap();

        assert_eq!(
            fs::read_to_string(&config_path).unwrap(),
            "timeout_secs = 5\n"
        );
    }

    #[test]
    fn test_blank_key_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(handle_configure(Some("   ".to_string()), dir.path()).is_err());
    }
}
