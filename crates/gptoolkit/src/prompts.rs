use anyhow::Result;
use colored::Colorize;

use gptoolkit_db::{Database, NewParameter, ParameterFilter, ParameterRecord};
use gptoolkit_logging::{LogEvent, Logger};

/// Arguments of `gptoolkit add`.
pub struct AddArgs {
    pub prompt: String,
    pub engine: String,
    pub use_case: String,
    pub description: String,
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: f64,
}

pub fn handle_add(db: &Database, logger: &Logger, args: AddArgs) -> Result<()> {
    let new = NewParameter::new(
        args.prompt,
        args.engine,
        args.api_key.unwrap_or_default(),
        args.use_case,
        args.description,
    )
    .with_max_tokens(args.max_tokens)
    .with_temperature(args.temperature);

    let store = db.parameters();
    let parameter_id = store.insert(&new)?;
    let total = store.count()?;

    logger.log(&LogEvent::ParameterInserted {
        parameter_id,
        engine: new.engine_name.clone(),
        use_case: new.use_case_name.clone(),
    });
    eprintln!("  {} {} stored", "•".dimmed(), total);

    Ok(())
}

pub fn handle_search(
    db: &Database,
    prompt: Option<String>,
    engine: Option<String>,
    use_case: Option<String>,
    json: bool,
) -> Result<()> {
    let filter = ParameterFilter::contains(
        prompt.as_deref(),
        engine.as_deref(),
        use_case.as_deref(),
    );
    let records = db.parameters().query(&filter)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else if records.is_empty() {
        println!("{}", "No prompts found.".dimmed());
    } else {
        print_records_table(&records);
    }

    Ok(())
}

pub fn handle_use_cases(db: &Database, json: bool) -> Result<()> {
    let names = db.parameters().list_use_cases()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&names)?);
    } else if names.is_empty() {
        println!("{}", "No use cases stored.".dimmed());
    } else {
        for name in names {
            println!("{}", name);
        }
    }

    Ok(())
}

fn print_records_table(records: &[ParameterRecord]) {
    println!(
        "{:<20} {:<20} {:<36} {:>6} {:>5} {}",
        "USE CASE".bold(),
        "ENGINE".bold(),
        "PROMPT".bold(),
        "TOKENS".bold(),
        "TEMP".bold(),
        "KEY".bold()
    );

    for record in records {
        println!(
            "{:<20} {:<20} {:<36} {:>6} {:>5} {}",
            Logger::truncate(&record.use_case_name, 20),
            Logger::truncate(&record.engine_name, 20),
            Logger::truncate(&one_line(&record.prompt_text), 36),
            record.max_tokens,
            record.temperature,
            mask_key(&record.api_key).dimmed()
        );
    }
}

fn one_line(s: &str) -> String {
    s.replace(['\n', '\r'], " ")
}

/// Show only the last four characters of a stored key.
fn mask_key(key: &str) -> String {
    if key.is_empty() {
        return "-".to_string();
    }
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gptoolkit_logging::LogFormat;

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key(""), "-");
        assert_eq!(mask_key("abc"), "****");
        assert_eq!(mask_key("sk-1234567890abcd"), "****abcd");
    }

    #[test]
    fn test_one_line() {
        assert_eq!(one_line("a\nb\r\nc"), "a b  c");
    }

    #[test]
    fn test_add_stores_row() {
        let db = Database::open_in_memory().unwrap();
        let logger = Logger::new(LogFormat::Compact);

        handle_add(
            &db,
            &logger,
            AddArgs {
                prompt: "Summarize: ".to_string(),
                engine: "text-davinci-003".to_string(),
                use_case: "summarization".to_string(),
                description: String::new(),
                api_key: None,
                max_tokens: 100,
                temperature: 0.3,
            },
        )
        .unwrap();

        let records = db.parameters().query(&ParameterFilter::default()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].api_key, "");
        assert_eq!(records[0].max_tokens, 100);
    }
}
