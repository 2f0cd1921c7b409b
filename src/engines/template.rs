//! Stored query templates
//!
//! Mapping rows store SQL text that is executed against external engines.
//! That text is treated as a template: named placeholders such as
//! `:application_group` are rewritten to the engine's positional bind
//! markers and their values are bound as parameters, never spliced into
//! the SQL.
//!
//! Recognised placeholders:
//!
//! | Placeholder          | Value                                   |
//! |----------------------|-----------------------------------------|
//! | `:application_group` | the application group being processed   |
//! | `:target_year`       | the year passed on the command line     |
//! | `:report_date`       | the run date                            |
//!
//! Text inside quoted literals, quoted identifiers and comments is copied
//! untouched, as are PostgreSQL `::type` casts.

use chrono::NaiveDate;

use super::EngineError;

/// Positional bind-marker syntax
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `$1`, `$2`, ... (PostgreSQL)
    Dollar,
    /// `:1`, `:2`, ... (Oracle)
    Colon,
}

impl PlaceholderStyle {
    fn marker(&self, index: usize) -> String {
        match self {
            PlaceholderStyle::Dollar => format!("${}", index),
            PlaceholderStyle::Colon => format!(":{}", index),
        }
    }
}

/// A value bound to a statement parameter
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Text(String),
    Int(i64),
    Date(NaiveDate),
}

/// Values available to query templates for one application group
#[derive(Debug, Clone)]
pub struct BindContext {
    pub application_group: String,
    pub target_year: Option<i32>,
    pub report_date: NaiveDate,
}

impl BindContext {
    pub fn new(application_group: impl Into<String>, target_year: Option<i32>, report_date: NaiveDate) -> Self {
        Self {
            application_group: application_group.into(),
            target_year,
            report_date,
        }
    }

    fn value(&self, name: &str) -> Result<BindValue, EngineError> {
        match name {
            "application_group" => Ok(BindValue::Text(self.application_group.clone())),
            "target_year" => self
                .target_year
                .map(|year| BindValue::Int(i64::from(year)))
                .ok_or_else(|| {
                    EngineError::Template("target_year is referenced but no valid year was given".to_string())
                }),
            "report_date" => Ok(BindValue::Date(self.report_date)),
            other => Err(EngineError::Template(format!("unknown placeholder :{}", other))),
        }
    }
}

/// SQL with engine-native bind markers and the values to bind, in order
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStatement {
    pub sql: String,
    pub params: Vec<BindValue>,
}

/// Stored query text awaiting binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTemplate {
    text: String,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Code,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment,
}

impl QueryTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Rewrite placeholders for `style` and collect their values from `ctx`.
    ///
    /// Every occurrence gets its own positional marker, so a placeholder used
    /// twice is bound twice.
    pub fn bind(&self, style: PlaceholderStyle, ctx: &BindContext) -> Result<BoundStatement, EngineError> {
        if self.text.trim().is_empty() {
            return Err(EngineError::Template("query text is empty".to_string()));
        }

        let mut params = Vec::new();
        let sql = self.rewrite(|name| {
            params.push(ctx.value(name)?);
            Ok(style.marker(params.len()))
        })?;

        Ok(BoundStatement { sql, params })
    }

    fn rewrite<F>(&self, mut on_placeholder: F) -> Result<String, EngineError>
    where
        F: FnMut(&str) -> Result<String, EngineError>,
    {
        let chars: Vec<char> = self.text.chars().collect();
        let mut out = String::with_capacity(self.text.len());
        let mut state = ScanState::Code;
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            let next = chars.get(i + 1).copied();

            match state {
                ScanState::Code => match c {
                    '\'' => state = ScanState::SingleQuoted,
                    '"' => state = ScanState::DoubleQuoted,
                    '-' if next == Some('-') => state = ScanState::LineComment,
                    '/' if next == Some('*') => state = ScanState::BlockComment,
                    ':' if next == Some(':') => {
                        // `::type` cast
                        out.push_str("::");
                        i += 2;
                        continue;
                    }
                    ':' if next.map_or(false, |n| n.is_ascii_alphabetic() || n == '_') => {
                        let start = i + 1;
                        let mut end = start;
                        while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '_') {
                            end += 1;
                        }
                        let name: String = chars[start..end].iter().collect();
                        out.push_str(&on_placeholder(&name.to_lowercase())?);
                        i = end;
                        continue;
                    }
                    _ => {}
                },
                ScanState::SingleQuoted => {
                    if c == '\'' {
                        state = ScanState::Code;
                    }
                }
                ScanState::DoubleQuoted => {
                    if c == '"' {
                        state = ScanState::Code;
                    }
                }
                ScanState::LineComment => {
                    if c == '\n' {
                        state = ScanState::Code;
                    }
                }
                ScanState::BlockComment => {
                    if c == '*' && next == Some('/') {
                        out.push_str("*/");
                        i += 2;
                        state = ScanState::Code;
                        continue;
                    }
                }
            }

            out.push(c);
            i += 1;
        }

        Ok(out)
    }
}
