//! # Role Grammar: the Label Section of an Event-Type Record
//!
//! Event-type records carry a small embedded grammar. The only part this
//! workspace touches is the label section:
//!
//! ```text
//! [LABELS:]
//! [RL=00001][L=ENGLISH]Principal[L=FRENCH]Principal
//! [RL=00002][L=ENGLISH]Witness[L=FRENCH]Témoin
//! [:LABELS]
//! [L=ENGLISH][R=00001][P] was born <[D]> <[L]>
//! ```
//!
//! Everything outside `[LABELS:]` … `[:LABELS]` (phrase templates) is carried
//! through verbatim. Label text is kept raw, line breaks included, so that
//! `RoleGrammar::parse(s)?.serialize() == s` holds byte for byte.

use crate::canonical_key;
use std::collections::HashMap;
use std::fmt;

pub const SECTION_OPEN: &str = "[LABELS:]";
pub const SECTION_CLOSE: &str = "[:LABELS]";
const ENTRY_OPEN: &str = "[RL=";
const LABEL_OPEN: &str = "[L=";
const LINE_BREAK: &str = "\r\n";

/// Highest code that fits the 5-digit storage form.
pub const MAX_CODE: u32 = 99_999;

/// Errors from grammar parsing. Callers treat a malformed grammar as empty.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GrammarError {
    #[error("label section opened but never closed")]
    UnclosedSection,
    #[error("unterminated role code at byte {0}")]
    UnterminatedCode(usize),
    #[error("invalid role code `{0}`")]
    InvalidCode(String),
    #[error("unterminated language tag at byte {0}")]
    UnterminatedLanguage(usize),
    #[error("no role code left above {0}")]
    CodeSpaceExhausted(u32),
}

/// One label of a role entry. `language` is `None` for text that precedes any `[L=]` tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub language: Option<String>,
    /// Raw text up to the next tag, trailing line breaks included.
    pub text: String,
}

/// One `[RL=nnnnn]` entry of the label section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelEntry {
    code: u32,
    /// Code digits as written (`"00003"` and `"3"` are both valid).
    digits: String,
    labels: Vec<Label>,
}

impl LabelEntry {
    pub fn code(&self) -> u32 {
        self.code
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Trimmed label for a language tag (case-insensitive).
    pub fn label(&self, language: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|l| {
                l.language
                    .as_deref()
                    .is_some_and(|lang| lang.eq_ignore_ascii_case(language))
            })
            .map(|l| l.text.trim())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Section {
    /// Text between `[LABELS:]` and the first entry.
    lead: String,
    entries: Vec<LabelEntry>,
}

/// Parsed role grammar of one event-type record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoleGrammar {
    preamble: String,
    section: Option<Section>,
    trailer: String,
}

impl RoleGrammar {
    /// A grammar with no text at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses the full grammar text of an event-type record.
    ///
    /// Text without a label section parses successfully as a grammar with no entries.
    ///
    /// # Errors
    /// Returns a [`GrammarError`] when the label section is unclosed, a role code is
    /// not a decimal number, or a tag is missing its closing bracket.
    ///
    /// # Examples
    /// ```
    /// # use common::RoleGrammar;
    /// let text = "[LABELS:]\r\n[RL=00002][L=ENGLISH]Witness[L=FRENCH]Témoin\r\n[:LABELS]\r\n";
    /// let grammar = RoleGrammar::parse(text).unwrap();
    /// assert_eq!(grammar.code_for_label("temoin"), Some(2));
    /// assert_eq!(grammar.serialize(), text);
    /// ```
    pub fn parse(text: &str) -> Result<Self, GrammarError> {
        let Some(open) = text.find(SECTION_OPEN) else {
            return Ok(Self {
                preamble: text.to_string(),
                section: None,
                trailer: String::new(),
            });
        };
        let content_start = open + SECTION_OPEN.len();
        let close = text[content_start..]
            .find(SECTION_CLOSE)
            .map(|i| content_start + i)
            .ok_or(GrammarError::UnclosedSection)?;

        let section = parse_section(&text[content_start..close], content_start)?;

        Ok(Self {
            preamble: text[..open].to_string(),
            section: Some(section),
            trailer: text[close + SECTION_CLOSE.len()..].to_string(),
        })
    }

    /// Serializes the grammar back to record text.
    pub fn serialize(&self) -> String {
        let mut out = String::with_capacity(self.preamble.len() + self.trailer.len() + 64);
        out.push_str(&self.preamble);
        if let Some(section) = &self.section {
            out.push_str(SECTION_OPEN);
            out.push_str(&section.lead);
            for entry in &section.entries {
                out.push_str(ENTRY_OPEN);
                out.push_str(&entry.digits);
                out.push(']');
                for label in &entry.labels {
                    if let Some(lang) = &label.language {
                        out.push_str(LABEL_OPEN);
                        out.push_str(lang);
                        out.push(']');
                    }
                    out.push_str(&label.text);
                }
            }
            out.push_str(SECTION_CLOSE);
        }
        out.push_str(&self.trailer);
        out
    }

    pub fn entries(&self) -> &[LabelEntry] {
        self.section
            .as_ref()
            .map(|s| s.entries.as_slice())
            .unwrap_or(&[])
    }

    pub fn has_label_section(&self) -> bool {
        self.section.is_some()
    }

    /// Highest code in use, `0` when the section is empty.
    pub fn max_code(&self) -> u32 {
        self.entries().iter().map(|e| e.code).max().unwrap_or(0)
    }

    /// Canonical label (any language) → code. The first entry wins on collisions.
    pub fn label_index(&self) -> HashMap<String, u32> {
        let mut index = HashMap::new();
        for entry in self.entries() {
            for label in &entry.labels {
                let key = canonical_key(&label.text);
                if !key.is_empty() {
                    index.entry(key).or_insert(entry.code);
                }
            }
        }
        index
    }

    /// Code of the first entry carrying `label` in any language.
    pub fn code_for_label(&self, label: &str) -> Option<u32> {
        let wanted = canonical_key(label);
        if wanted.is_empty() {
            return None;
        }
        self.entries()
            .iter()
            .find(|e| e.labels.iter().any(|l| canonical_key(&l.text) == wanted))
            .map(|e| e.code)
    }

    /// Appends a new entry with code `max_code() + 1` and returns that code.
    ///
    /// `labels` are `(language, text)` pairs. A missing label section is created
    /// in front of the existing text.
    ///
    /// # Errors
    /// [`GrammarError::CodeSpaceExhausted`] when the next code would exceed
    /// [`MAX_CODE`]. The grammar is left unchanged.
    pub fn push_entry(&mut self, labels: &[(&str, &str)]) -> Result<u32, GrammarError> {
        let max = self.max_code();
        let code = max
            .checked_add(1)
            .filter(|&code| code <= MAX_CODE)
            .ok_or(GrammarError::CodeSpaceExhausted(max))?;

        if self.section.is_none() {
            let existing = std::mem::take(&mut self.preamble);
            if !existing.is_empty() {
                self.trailer = format!("{LINE_BREAK}{existing}");
            }
        }
        let section = self.section.get_or_insert_with(|| Section {
            lead: LINE_BREAK.to_string(),
            entries: Vec::new(),
        });

        // The previous line must end before the new entry starts.
        if let Some(last) = section.entries.last_mut() {
            if last.labels.is_empty() {
                last.labels.push(Label {
                    language: None,
                    text: String::new(),
                });
            }
        }
        let tail = match section.entries.last_mut().and_then(|e| e.labels.last_mut()) {
            Some(label) => &mut label.text,
            None => &mut section.lead,
        };
        if !tail.ends_with('\n') && !tail.ends_with('\r') {
            tail.push_str(LINE_BREAK);
        }

        let mut new_labels: Vec<Label> = labels
            .iter()
            .map(|(lang, text)| Label {
                language: Some((*lang).to_string()),
                text: (*text).to_string(),
            })
            .collect();
        match new_labels.last_mut() {
            Some(label) => label.text.push_str(LINE_BREAK),
            None => new_labels.push(Label {
                language: None,
                text: LINE_BREAK.to_string(),
            }),
        }

        section.entries.push(LabelEntry {
            code,
            digits: format!("{code:05}"),
            labels: new_labels,
        });
        Ok(code)
    }
}

impl fmt::Display for RoleGrammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

/// Parses the text between the section markers. `base` is its byte offset in the
/// full record text, used for error positions.
fn parse_section(content: &str, base: usize) -> Result<Section, GrammarError> {
    let first = content.find(ENTRY_OPEN).unwrap_or(content.len());
    let lead = content[..first].to_string();
    let mut entries = Vec::new();

    let mut pos = first;
    while pos < content.len() {
        let digits_start = pos + ENTRY_OPEN.len();
        let digits_end = content[digits_start..]
            .find(']')
            .map(|i| digits_start + i)
            .ok_or(GrammarError::UnterminatedCode(base + pos))?;
        let digits = &content[digits_start..digits_end];
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(GrammarError::InvalidCode(digits.to_string()));
        }
        let code: u32 = digits
            .parse()
            .map_err(|_| GrammarError::InvalidCode(digits.to_string()))?;

        let block_start = digits_end + 1;
        let block_end = content[block_start..]
            .find(ENTRY_OPEN)
            .map(|i| block_start + i)
            .unwrap_or(content.len());
        let labels = parse_labels(&content[block_start..block_end], base + block_start)?;

        entries.push(LabelEntry {
            code,
            digits: digits.to_string(),
            labels,
        });
        pos = block_end;
    }

    Ok(Section { lead, entries })
}

fn parse_labels(block: &str, base: usize) -> Result<Vec<Label>, GrammarError> {
    let mut labels = Vec::new();

    let first = block.find(LABEL_OPEN).unwrap_or(block.len());
    if first > 0 {
        labels.push(Label {
            language: None,
            text: block[..first].to_string(),
        });
    }

    let mut pos = first;
    while pos < block.len() {
        let lang_start = pos + LABEL_OPEN.len();
        let lang_end = block[lang_start..]
            .find(']')
            .map(|i| lang_start + i)
            .ok_or(GrammarError::UnterminatedLanguage(base + pos))?;
        let text_start = lang_end + 1;
        let text_end = block[text_start..]
            .find(LABEL_OPEN)
            .map(|i| text_start + i)
            .unwrap_or(block.len());
        labels.push(Label {
            language: Some(block[lang_start..lang_end].to_string()),
            text: block[text_start..text_end].to_string(),
        });
        pos = text_end;
    }

    Ok(labels)
}
