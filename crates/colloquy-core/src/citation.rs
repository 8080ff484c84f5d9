//! Paper intake normalization and citation formatting.
//!
//! Upstream corpora disagree about shapes: authors arrive as lists of
//! objects, lists of strings, a single string, or a wrapper object;
//! sections arrive as maps, lists, or prose. Everything is normalized at
//! this boundary so the rest of the pipeline sees plain strings.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// A paper as it arrives from a corpus file. Every field tolerates being
/// absent or differently shaped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Paper {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub title: String,
    #[serde(default, rename = "abstract")]
    pub abstract_text: String,
    #[serde(default)]
    pub authors: Value,
    #[serde(default)]
    pub published_at: Value,
    #[serde(default)]
    pub journal: Value,
    #[serde(default)]
    pub doi: Option<String>,
    #[serde(default)]
    pub sections: Value,
}

impl Paper {
    /// Flatten the sections field into readable text, whatever its shape.
    pub fn sections_text(&self) -> String {
        match &self.sections {
            Value::Object(map) => map
                .iter()
                .map(|(key, value)| {
                    format!("### {}\n{}", key.to_uppercase(), value_text(value))
                })
                .collect::<Vec<_>>()
                .join("\n\n"),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::Object(section) => {
                        let heading = section
                            .get("header")
                            .or_else(|| section.get("title"))
                            .and_then(Value::as_str)
                            .unwrap_or("SECTION");
                        let body = section
                            .get("content")
                            .or_else(|| section.get("text"))
                            .map(value_text)
                            .unwrap_or_default();
                        format!("### {}\n{}", heading.to_uppercase(), body)
                    }
                    other => value_text(other),
                })
                .collect::<Vec<_>>()
                .join("\n\n"),
            Value::String(s) => s.clone(),
            _ => String::new(),
        }
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// An in-text citation like `Smith et al. (2024)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub authors: String,
    pub year: String,
}

impl fmt::Display for Citation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.authors, self.year)
    }
}

impl Citation {
    /// Build a citation from a paper, surviving any author/date shape.
    pub fn from_paper(paper: &Paper) -> Citation {
        let names = author_family_names(&paper.authors);
        let authors = match names.len() {
            0 => "Unknown".to_string(),
            1 => names[0].clone(),
            2 => format!("{} & {}", names[0], names[1]),
            _ => format!("{} et al.", names[0]),
        };
        Citation {
            authors,
            year: publication_year(&paper.published_at),
        }
    }
}

/// Full reference entry for the shared bibliography.
pub fn reference_entry(paper: &Paper) -> String {
    let citation = Citation::from_paper(paper);
    let authors = full_author_list(&paper.authors);
    let authors = if authors.is_empty() {
        citation.authors.clone()
    } else {
        authors
    };
    let journal = journal_name(&paper.journal);
    let doi = paper.doi.as_deref().unwrap_or("No DOI");
    format!(
        "{} ({}). {}. *{}*. DOI: {}",
        authors, citation.year, paper.title, journal, doi
    )
}

fn author_family_names(authors: &Value) -> Vec<String> {
    // Some corpora wrap the author list in {"list": [...]}.
    let authors = match authors {
        Value::Object(map) => map.get("list").unwrap_or(authors),
        _ => authors,
    };
    match authors {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::Object(author) => author
                    .get("family")
                    .or_else(|| author.get("full_name"))
                    .or_else(|| author.get("name"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
                Value::String(name) => Some(name.clone()),
                _ => None,
            })
            .filter(|name| !name.trim().is_empty())
            .collect(),
        Value::String(joined) if !joined.trim().is_empty() => {
            let first = joined.split(',').next().unwrap_or(joined).trim();
            if joined.contains(',') {
                vec![format!("{first} et al.")]
            } else {
                vec![first.to_string()]
            }
        }
        _ => Vec::new(),
    }
}

fn full_author_list(authors: &Value) -> String {
    let authors = match authors {
        Value::Object(map) => map.get("list").unwrap_or(authors),
        _ => authors,
    };
    let Value::Array(items) = authors else {
        return match authors {
            Value::String(s) => s.trim().to_string(),
            _ => String::new(),
        };
    };
    let names: Vec<String> = items
        .iter()
        .filter_map(|item| match item {
            Value::Object(author) => {
                let family = author.get("family").and_then(Value::as_str);
                let given = author.get("given").and_then(Value::as_str);
                match (family, given) {
                    (Some(f), Some(g)) => Some(format!("{f}, {g}")),
                    (Some(f), None) => Some(f.to_string()),
                    _ => author
                        .get("full_name")
                        .or_else(|| author.get("name"))
                        .and_then(Value::as_str)
                        .map(str::to_string),
                }
            }
            Value::String(name) => Some(name.clone()),
            _ => None,
        })
        .filter(|name| !name.trim().is_empty())
        .collect();
    if names.len() > 3 {
        format!("{}, et al.", names[..3].join("; "))
    } else {
        names.join("; ")
    }
}

fn publication_year(published_at: &Value) -> String {
    let text = match published_at {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Object(map) => map
            .get("year")
            .map(|v| v.to_string())
            .unwrap_or_default(),
        _ => String::new(),
    };
    let year_re = Regex::new(r"\d{4}").unwrap();
    year_re
        .find(&text)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "n.d.".to_string())
}

fn journal_name(journal: &Value) -> String {
    match journal {
        Value::Object(map) => map
            .get("title")
            .or_else(|| map.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("Unknown Journal")
            .to_string(),
        Value::String(s) if !s.trim().is_empty() => s.clone(),
        _ => "Unknown Journal".to_string(),
    }
}
