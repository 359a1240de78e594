use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Structured log events for prompt storage and completion dispatch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    CompletionStarted {
        use_case: String,
        input_preview: String,
    },
    CandidatesFound {
        use_case: String,
        count: usize,
    },
    CandidateScored {
        prompt_preview: String,
        engine: String,
        perplexity: f64,
    },
    PromptSelected {
        prompt_preview: String,
        engine: String,
        perplexity: f64,
        max_tokens: u32,
        temperature: f64,
    },
    CompletionReceived {
        engine: String,
        chars: usize,
        duration_secs: f64,
    },
    ParameterInserted {
        parameter_id: i64,
        engine: String,
        use_case: String,
    },
    ErrorEncountered {
        error: String,
    },
}

impl LogEvent {
    /// Add a timestamp to serialize with the event
    fn with_timestamp(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors
    #[default]
    Pretty,
    /// JSON lines format for machine consumption
    Json,
    /// Compact single-line format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// Logger for gptoolkit events - handles both console output and file logging
pub struct Logger {
    format: LogFormat,
    file_writer: Option<Mutex<File>>,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            file_writer: None,
        }
    }

    /// Create a logger with file output in addition to console
    pub fn with_file(format: LogFormat, log_path: &Path) -> std::io::Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            format,
            file_writer: Some(Mutex::new(file)),
        })
    }

    pub fn log(&self, event: &LogEvent) {
        // Log to file if configured (always JSON format for file)
        if let Some(ref writer) = self.file_writer {
            if let Ok(mut file) = writer.lock() {
                let json = event.with_timestamp();
                let _ = writeln!(file, "{}", json);
            }
        }

        let line = match self.format {
            LogFormat::Json => serde_json::to_string(event).ok(),
            LogFormat::Pretty => Self::render_pretty(event),
            LogFormat::Compact => Self::render_compact(event),
        };

        if let Some(line) = line {
            let _ = writeln!(std::io::stderr(), "{}", line);
        }
    }

    fn render_pretty(event: &LogEvent) -> Option<String> {
        let line = match event {
            LogEvent::CompletionStarted {
                use_case,
                input_preview,
            } => format!(
                "{} {} {}",
                "▶".bright_cyan(),
                use_case.bright_cyan().bold(),
                Self::truncate(input_preview, 60).dimmed()
            ),
            LogEvent::CandidatesFound { count, .. } => format!(
                "  {} {} {}",
                "•".dimmed(),
                count,
                if *count == 1 { "candidate" } else { "candidates" }
            ),
            // Per-candidate scores are debug detail
            LogEvent::CandidateScored { .. } => return None,
            LogEvent::PromptSelected {
                prompt_preview,
                engine,
                perplexity,
                max_tokens,
                temperature,
            } => format!(
                "  {} {} {} {}",
                "✓".bright_green(),
                Self::truncate(prompt_preview, 40).bold(),
                format!("[{}]", engine).bright_blue(),
                format!(
                    "ppl={:.2} max_tokens={} temp={}",
                    perplexity, max_tokens, temperature
                )
                .dimmed()
            ),
            LogEvent::CompletionReceived {
                engine,
                chars,
                duration_secs,
            } => format!(
                "  {} {} returned {} chars ({:.1}s)",
                "✓".bright_green(),
                engine,
                chars,
                duration_secs
            ),
            LogEvent::ParameterInserted {
                parameter_id,
                engine,
                use_case,
            } => format!(
                "{} Stored parameter set #{} ({} / {})",
                "✓".bright_green(),
                parameter_id,
                use_case.bright_cyan(),
                engine
            ),
            LogEvent::ErrorEncountered { error } => {
                format!("{} {}", "✗".bright_red(), error.bright_red())
            }
        };
        Some(line)
    }

    fn render_compact(event: &LogEvent) -> Option<String> {
        let timestamp = chrono::Utc::now().format("%H:%M:%S");
        let msg = match event {
            LogEvent::CompletionStarted { use_case, .. } => {
                format!("[{}] complete:start {}", timestamp, use_case)
            }
            LogEvent::CandidatesFound { count, .. } => {
                format!("[{}] store:candidates {}", timestamp, count)
            }
            LogEvent::CandidateScored { .. } => return None,
            LogEvent::PromptSelected {
                engine, perplexity, ..
            } => format!("[{}] select:{} ppl={:.2}", timestamp, engine, perplexity),
            LogEvent::CompletionReceived {
                engine,
                chars,
                duration_secs,
            } => format!(
                "[{}] complete:done:{} {}c {:.1}s",
                timestamp, engine, chars, duration_secs
            ),
            LogEvent::ParameterInserted { parameter_id, .. } => {
                format!("[{}] store:insert #{}", timestamp, parameter_id)
            }
            LogEvent::ErrorEncountered { error } => format!("[{}] error:{}", timestamp, error),
        };
        Some(msg)
    }

    /// Shorten to `max_len` characters, marking the cut with `...`
    pub fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            return s.to_string();
        }
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_str() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = LogEvent::CandidatesFound {
            use_case: "summarization".to_string(),
            count: 3,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "candidates_found");
        assert_eq!(json["count"], 3);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(Logger::truncate("short", 10), "short");
        assert_eq!(Logger::truncate("abcdefghijkl", 8), "abcde...");
        assert_eq!(Logger::truncate("ééééééé", 5), "éé...");
    }

    #[test]
    fn test_compact_skips_scores() {
        let scored = LogEvent::CandidateScored {
            prompt_preview: "p".to_string(),
            engine: "e".to_string(),
            perplexity: 1.0,
        };
        assert!(Logger::render_compact(&scored).is_none());

        let inserted = LogEvent::ParameterInserted {
            parameter_id: 7,
            engine: "e".to_string(),
            use_case: "u".to_string(),
        };
        assert!(Logger::render_compact(&inserted)
            .unwrap()
            .ends_with("store:insert #7"));
    }

    #[test]
    fn test_file_output_is_timestamped_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("gptoolkit.log");

        let logger = Logger::with_file(LogFormat::Compact, &path).unwrap();
        logger.log(&LogEvent::ErrorEncountered {
            error: "boom".to_string(),
        });
        logger.log(&LogEvent::CandidatesFound {
            use_case: "u".to_string(),
            count: 0,
        });

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], "error_encountered");
        assert_eq!(first["error"], "boom");
        assert!(first["timestamp"].is_string());
    }
}
