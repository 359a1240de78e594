//! Parameter store: prompts, engines and use cases linked by generation settings.

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::sync::MutexGuard;
use tracing::debug;

use crate::DbError;

/// Default completion length for new parameter sets.
pub const DEFAULT_MAX_TOKENS: u32 = 256;

/// Default sampling temperature for new parameter sets.
pub const DEFAULT_TEMPERATURE: f64 = 0.5;

/// Input for [`Parameters::insert`]: one prompt, engine and use case plus the
/// settings that bind them.
#[derive(Debug, Clone, PartialEq)]
pub struct NewParameter {
    pub prompt_text: String,
    pub engine_name: String,
    pub api_key: String,
    pub use_case_name: String,
    pub use_case_description: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl NewParameter {
    pub fn new(
        prompt_text: impl Into<String>,
        engine_name: impl Into<String>,
        api_key: impl Into<String>,
        use_case_name: impl Into<String>,
        use_case_description: impl Into<String>,
    ) -> Self {
        Self {
            prompt_text: prompt_text.into(),
            engine_name: engine_name.into(),
            api_key: api_key.into(),
            use_case_name: use_case_name.into(),
            use_case_description: use_case_description.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }
}

/// A flattened row of the prompt/parameter/engine/use-case join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterRecord {
    pub prompt_text: String,
    pub engine_name: String,
    #[serde(skip_serializing, default)]
    pub api_key: String,
    pub use_case_name: String,
    pub use_case_description: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

/// How a filter value is compared against a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextMatch {
    /// Case-insensitive substring match. `%`, `_` and `\` match literally.
    Contains(String),
    /// Case-sensitive equality.
    Exact(String),
}

impl TextMatch {
    fn push_condition(
        &self,
        column: &str,
        sql: &mut String,
        param_values: &mut Vec<Box<dyn rusqlite::ToSql>>,
    ) {
        match self {
            TextMatch::Contains(needle) => {
                sql.push_str(&format!(" AND lower({}) LIKE lower(?) ESCAPE '\\'", column));
                param_values.push(Box::new(format!("%{}%", escape_like(needle))));
            }
            TextMatch::Exact(value) => {
                sql.push_str(&format!(" AND {} = ?", column));
                param_values.push(Box::new(value.clone()));
            }
        }
    }
}

/// Filter options for querying parameter sets. `None` fields match everything.
#[derive(Debug, Default, Clone)]
pub struct ParameterFilter {
    pub prompt_text: Option<TextMatch>,
    pub engine_name: Option<TextMatch>,
    pub use_case_name: Option<TextMatch>,
}

impl ParameterFilter {
    /// Substring filter on every provided field.
    pub fn contains(
        prompt_text: Option<&str>,
        engine_name: Option<&str>,
        use_case_name: Option<&str>,
    ) -> Self {
        let contains = |s: Option<&str>| s.map(|s| TextMatch::Contains(s.to_string()));
        Self {
            prompt_text: contains(prompt_text),
            engine_name: contains(engine_name),
            use_case_name: contains(use_case_name),
        }
    }
}

/// Parameter store with a borrowed connection.
pub struct Parameters<'db> {
    conn: MutexGuard<'db, Connection>,
}

impl<'db> Parameters<'db> {
    pub(crate) fn new(conn: MutexGuard<'db, Connection>) -> Self {
        Self { conn }
    }

    /// Insert a prompt, engine, use case and the parameter row linking them.
    ///
    /// All four rows are committed in one transaction. Returns the id of the
    /// new parameter row.
    pub fn insert(&self, new: &NewParameter) -> Result<i64, DbError> {
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            "INSERT INTO prompts (text) VALUES (?1)",
            params![new.prompt_text],
        )?;
        let prompt_id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO engines (name, api_key) VALUES (?1, ?2)",
            params![new.engine_name, new.api_key],
        )?;
        let engine_id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO use_cases (name, description) VALUES (?1, ?2)",
            params![new.use_case_name, new.use_case_description],
        )?;
        let use_case_id = tx.last_insert_rowid();

        tx.execute(
            r#"
            INSERT INTO parameters (prompt_id, engine_id, use_case_id, max_tokens, temperature)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                prompt_id,
                engine_id,
                use_case_id,
                new.max_tokens,
                new.temperature
            ],
        )?;
        let parameter_id = tx.last_insert_rowid();

        tx.commit()?;

        debug!(
            parameter_id,
            engine = %new.engine_name,
            use_case = %new.use_case_name,
            "Inserted parameter set"
        );

        Ok(parameter_id)
    }

    /// Query parameter sets joined with their prompt, engine and use case.
    ///
    /// Rows come back in insertion order.
    pub fn query(&self, filter: &ParameterFilter) -> Result<Vec<ParameterRecord>, DbError> {
        let mut sql = String::from(
            r#"SELECT p.text, e.name, e.api_key, u.name, u.description, pa.max_tokens, pa.temperature
            FROM parameters pa
            JOIN prompts p ON p.id = pa.prompt_id
            JOIN engines e ON e.id = pa.engine_id
            JOIN use_cases u ON u.id = pa.use_case_id
            WHERE 1=1"#,
        );
        let mut param_values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref prompt_text) = filter.prompt_text {
            prompt_text.push_condition("p.text", &mut sql, &mut param_values);
        }

        if let Some(ref engine_name) = filter.engine_name {
            engine_name.push_condition("e.name", &mut sql, &mut param_values);
        }

        if let Some(ref use_case_name) = filter.use_case_name {
            use_case_name.push_condition("u.name", &mut sql, &mut param_values);
        }

        sql.push_str(" ORDER BY pa.id ASC");

        let params: Vec<&dyn rusqlite::ToSql> = param_values.iter().map(|p| p.as_ref()).collect();

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params.as_slice(), Self::row_to_record)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }

        debug!(matches = records.len(), "Queried parameter sets");
        Ok(records)
    }

    /// Get all unique use case names.
    pub fn list_use_cases(&self) -> Result<Vec<String>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT name FROM use_cases ORDER BY name")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut names = Vec::new();
        for row in rows {
            names.push(row?);
        }

        Ok(names)
    }

    /// Number of stored parameter sets.
    pub fn count(&self) -> Result<usize, DbError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM parameters", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn row_to_record(row: &rusqlite::Row) -> Result<ParameterRecord, DbError> {
        Ok(ParameterRecord {
            prompt_text: row.get(0)?,
            engine_name: row.get(1)?,
            api_key: row.get(2)?,
            use_case_name: row.get(3)?,
            use_case_description: row.get(4)?,
            max_tokens: row.get(5)?,
            temperature: row.get(6)?,
        })
    }
}

fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("plain"), "plain");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("snake_case"), "snake\\_case");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
    }

    #[test]
    fn test_contains_filter_builder() {
        let filter = ParameterFilter::contains(Some("french"), None, Some("translate"));
        assert_eq!(
            filter.prompt_text,
            Some(TextMatch::Contains("french".to_string()))
        );
        assert_eq!(filter.engine_name, None);
        assert_eq!(
            filter.use_case_name,
            Some(TextMatch::Contains("translate".to_string()))
        );
    }

    #[test]
    fn test_new_parameter_defaults() {
        let new = NewParameter::new("p", "e", "k", "u", "d");
        assert_eq!(new.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(new.temperature, DEFAULT_TEMPERATURE);
    }
}
