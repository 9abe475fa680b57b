// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Epic markdown parsing.
//!
//! The parser is total: absent sections yield empty lists, duplicate
//! sections concatenate in document order, and malformed checkbox lines are
//! skipped and reported as warnings rather than failing the parse.

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

// Allow expect here as the regexes are compile-time verified to be valid
#[allow(clippy::expect_used)]
static TITLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#\s+Epic\s+([^:]+):\s*(.*)$").expect("constant regex pattern is valid")
});

#[allow(clippy::expect_used)]
static CHECKBOX_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-\s*\[([ xX])\]\s*(.*)$").expect("constant regex pattern is valid")
});

#[allow(clippy::expect_used)]
static NOTE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)[.)]\s+(.*)$").expect("constant regex pattern is valid"));

/// Default criterion group when no `###` heading precedes a checkbox.
const DEFAULT_GROUP: &str = "General";

/// One acceptance criterion: a checkbox item grouped under the nearest
/// preceding `###` heading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criterion {
    pub text: String,
    pub section: String,
    pub met: bool,
}

/// Non-fatal problem found while parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseWarning {
    /// 1-based line number
    pub line: usize,
    pub message: String,
}

/// A parsed epic document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Epic {
    pub id: String,
    pub title: String,
    pub description: String,
    pub acceptance_criteria: Vec<Criterion>,
    pub implementation_notes: Vec<String>,
    pub technical_requirements: IndexMap<String, String>,
}

impl Epic {
    /// Render back to canonical markdown.
    ///
    /// Parsing the output yields a structure equal to `self` (round-trip
    /// law), modulo whitespace the parser ignores.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("# Epic {}: {}\n", self.id, self.title));
        if !self.description.is_empty() {
            out.push('\n');
            out.push_str(&self.description);
            out.push('\n');
        }
        if !self.technical_requirements.is_empty() {
            out.push_str("\n## Technical Requirements\n");
            for (section, body) in &self.technical_requirements {
                out.push_str(&format!("\n### {section}\n\n{body}\n"));
            }
        }
        if !self.implementation_notes.is_empty() {
            out.push_str("\n## Implementation Notes\n\n");
            for (i, note) in self.implementation_notes.iter().enumerate() {
                out.push_str(&format!("{}. {}\n", i + 1, note));
            }
        }
        if !self.acceptance_criteria.is_empty() {
            out.push_str("\n## Acceptance Criteria\n");
            let mut current_group: Option<&str> = None;
            for criterion in &self.acceptance_criteria {
                if current_group != Some(criterion.section.as_str()) {
                    out.push_str(&format!("\n### {}\n\n", criterion.section));
                    current_group = Some(criterion.section.as_str());
                }
                let mark = if criterion.met { "x" } else { " " };
                out.push_str(&format!("- [{mark}] {}\n", criterion.text));
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Section {
    Preamble,
    TechnicalRequirements,
    ImplementationNotes,
    AcceptanceCriteria,
    Other,
}

/// Parse an epic document. Total: always returns an epic plus warnings.
pub fn parse_epic(content: &str) -> (Epic, Vec<ParseWarning>) {
    let mut epic = Epic::default();
    let mut warnings = Vec::new();

    let mut section = Section::Preamble;
    let mut saw_title = false;
    let mut description_lines: Vec<String> = Vec::new();
    let mut criteria_group = DEFAULT_GROUP.to_string();
    let mut tech_subsection = DEFAULT_GROUP.to_string();

    for (idx, raw) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim_end();

        if let Some(rest) = line.strip_prefix("## ") {
            section = match rest.trim().to_ascii_lowercase().as_str() {
                "technical requirements" => Section::TechnicalRequirements,
                "implementation notes" => Section::ImplementationNotes,
                "acceptance criteria" => Section::AcceptanceCriteria,
                _ => Section::Other,
            };
            // Group state carries across duplicate sections intentionally:
            // duplicate sections concatenate in document order.
            continue;
        }

        if line.starts_with("# ") {
            if let Some(caps) = TITLE_PATTERN.captures(line) {
                epic.id = caps[1].trim().to_string();
                epic.title = caps[2].trim().to_string();
            } else if let Some(title) = line.strip_prefix("# ") {
                epic.title = title.trim().to_string();
                warnings.push(ParseWarning {
                    line: line_no,
                    message: "title does not match \"# Epic {id}: {title}\"".to_string(),
                });
            }
            if saw_title {
                warnings.push(ParseWarning {
                    line: line_no,
                    message: "multiple top-level headings".to_string(),
                });
            }
            saw_title = true;
            continue;
        }

        match section {
            Section::Preamble => {
                if saw_title && !line.trim().is_empty() {
                    description_lines.push(line.trim().to_string());
                }
            }
            Section::TechnicalRequirements => {
                if let Some(name) = line.strip_prefix("### ") {
                    tech_subsection = name.trim().to_string();
                    continue;
                }
                let entry = epic
                    .technical_requirements
                    .entry(tech_subsection.clone())
                    .or_default();
                if !entry.is_empty() || !line.trim().is_empty() {
                    if !entry.is_empty() {
                        entry.push('\n');
                    }
                    entry.push_str(line);
                }
            }
            Section::ImplementationNotes => {
                if let Some(caps) = NOTE_PATTERN.captures(line.trim_start()) {
                    epic.implementation_notes.push(caps[2].trim().to_string());
                } else if !line.trim().is_empty() && !line.starts_with("###") {
                    // Continuation of the previous numbered step
                    if let Some(last) = epic.implementation_notes.last_mut() {
                        last.push(' ');
                        last.push_str(line.trim());
                    }
                }
            }
            Section::AcceptanceCriteria => {
                if let Some(name) = line.strip_prefix("### ") {
                    criteria_group = name.trim().to_string();
                    continue;
                }
                let trimmed = line.trim_start();
                if let Some(caps) = CHECKBOX_PATTERN.captures(trimmed) {
                    epic.acceptance_criteria.push(Criterion {
                        text: caps[2].trim().to_string(),
                        section: criteria_group.clone(),
                        met: caps[1].eq_ignore_ascii_case("x"),
                    });
                } else if trimmed.starts_with("- [") {
                    warnings.push(ParseWarning {
                        line: line_no,
                        message: format!("malformed checkbox skipped: {trimmed:?}"),
                    });
                }
            }
            Section::Other => {}
        }
    }

    // Trim trailing blank lines captured inside technical requirement bodies
    for body in epic.technical_requirements.values_mut() {
        let trimmed = body.trim_end().to_string();
        *body = trimmed;
    }
    epic.technical_requirements.retain(|_, body| !body.is_empty());

    epic.description = description_lines.join("\n");
    (epic, warnings)
}

#[cfg(test)]
#[path = "parser_tests/mod.rs"]
mod tests;
