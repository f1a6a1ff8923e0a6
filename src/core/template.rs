/// Reply templates: parsing `{field}` placeholders and rendering them
/// against a resolver.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unclosed brace in '{0}'")]
    Unclosed(String),
    #[error("unmatched closing brace in '{0}'")]
    UnmatchedClose(String),
    #[error("empty braces in '{0}'")]
    EmptyField(String),
    #[error("nested braces are not allowed in '{0}'")]
    Nested(String),
}

/// A segment of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Segment {
    /// Literal text, emitted as-is.
    Literal(String),
    /// Placeholder resolved at render time: `{name}`.
    Field(String),
}

/// A parsed template: a sequence of segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub segments: Vec<Segment>,
}

impl Template {
    /// Parse a template string.
    ///
    /// Syntax:
    /// - `{field}` → `Field`
    /// - `{{` / `}}` → literal `{` / `}`
    /// - Everything else → `Literal`
    pub fn parse(input: &str) -> Result<Template, TemplateError> {
        let mut segments = Vec::new();
        let mut literal_buf = String::new();
        let chars: Vec<char> = input.chars().collect();
        let len = chars.len();
        let mut i = 0;

        while i < len {
            match chars[i] {
                '{' if i + 1 < len && chars[i + 1] == '{' => {
                    literal_buf.push('{');
                    i += 2;
                }
                '{' => {
                    if !literal_buf.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal_buf)));
                    }

                    let start = i + 1;
                    let mut end = start;
                    while end < len && chars[end] != '}' {
                        if chars[end] == '{' {
                            return Err(TemplateError::Nested(input.to_string()));
                        }
                        end += 1;
                    }
                    if end == len {
                        return Err(TemplateError::Unclosed(input.to_string()));
                    }

                    let field: String = chars[start..end].iter().collect();
                    let field = field.trim();
                    if field.is_empty() {
                        return Err(TemplateError::EmptyField(input.to_string()));
                    }
                    segments.push(Segment::Field(field.to_string()));
                    i = end + 1;
                }
                '}' if i + 1 < len && chars[i + 1] == '}' => {
                    literal_buf.push('}');
                    i += 2;
                }
                '}' => return Err(TemplateError::UnmatchedClose(input.to_string())),
                c => {
                    literal_buf.push(c);
                    i += 1;
                }
            }
        }

        if !literal_buf.is_empty() {
            segments.push(Segment::Literal(literal_buf));
        }

        Ok(Template { segments })
    }

    /// Names of all placeholders, in order of appearance.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Field(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields().any(|f| f == name)
    }

    /// Render with `resolve` supplying placeholder values. Returns `None` if
    /// any placeholder cannot be resolved.
    pub fn render<F>(&self, resolve: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(name) => out.push_str(&resolve(name)?),
            }
        }
        Some(out)
    }
}
