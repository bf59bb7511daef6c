use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A single formatting option value.
///
/// Serialized untagged so sections round-trip through JSON and YAML as plain
/// primitives (`font_size: 11`, `bold: true`, `font_family: Calibri`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl OptionValue {
    /// Parse a command-line literal.
    ///
    /// A value wrapped in single or double quotes is always text. Otherwise
    /// tries bool, then integer, then float; anything else is kept as text.
    pub fn parse_literal(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Some(quoted) = unquote(trimmed) {
            return Self::Text(quoted.to_string());
        }
        if let Ok(b) = trimmed.parse::<bool>() {
            return Self::Bool(b);
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Self::Integer(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            if f.is_finite() {
                return Self::Float(f);
            }
        }
        Self::Text(trimmed.to_string())
    }

    /// Parse a literal for a specific option. Options the format service
    /// declares as strings (colors, enums such as `line_spacing`, header and
    /// footer text) are never coerced to numbers.
    pub fn parse_for(kind: SectionKind, key: &str, raw: &str) -> Self {
        if kind.is_text_option(key) {
            let trimmed = raw.trim();
            return Self::Text(unquote(trimmed).unwrap_or(trimmed).to_string());
        }
        Self::parse_literal(raw)
    }
}

fn unquote(value: &str) -> Option<&str> {
    ['"', '\'']
        .into_iter()
        .find_map(|q| value.strip_prefix(q)?.strip_suffix(q))
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for OptionValue {
    fn from(value: i32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// One flat section of named options, kept in insertion order.
pub type Section = IndexMap<String, OptionValue>;

/// Build a section from literal entries.
pub fn section<const N: usize>(entries: [(&str, OptionValue); N]) -> Section {
    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

/// The five independent option sections of a [`ConfigModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    Text,
    Paragraph,
    Page,
    Structure,
    Cleanup,
}

impl SectionKind {
    pub const ALL: [SectionKind; 5] = [
        SectionKind::Text,
        SectionKind::Paragraph,
        SectionKind::Page,
        SectionKind::Structure,
        SectionKind::Cleanup,
    ];

    /// Options in this section whose values are strings on the wire.
    pub fn text_options(&self) -> &'static [&'static str] {
        match self {
            Self::Text => &["font_family", "font_color", "line_spacing", "text_alignment"],
            Self::Paragraph => &[],
            Self::Page => &[
                "page_size",
                "header_text",
                "footer_text",
                "page_number_position",
            ],
            Self::Structure => &["heading_font_family", "h1_color", "h2_color", "h3_color"],
            Self::Cleanup => &[],
        }
    }

    pub fn is_text_option(&self, key: &str) -> bool {
        self.text_options().contains(&key)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Paragraph => "paragraph",
            Self::Page => "page",
            Self::Structure => "structure",
            Self::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SectionKind {
    type Err = AssignmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AssignmentError::UnknownSection(s.to_string()))
    }
}

/// Errors from parsing `section.key=value` assignments
#[derive(Error, Debug, PartialEq)]
pub enum AssignmentError {
    #[error("Expected section.key=value, got '{0}'")]
    Malformed(String),

    #[error("Unknown option section '{0}' (expected text, paragraph, page, structure or cleanup)")]
    UnknownSection(String),
}

/// Hierarchical formatting options sent with every format request.
///
/// Every section is optional. A model with no keys at all is valid and asks the
/// service to leave the document's formatting untouched. Option values are not
/// validated here; the format service owns that.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigModel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<Section>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paragraph: Option<Section>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<Section>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure: Option<Section>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleanup: Option<Section>,
}

impl ConfigModel {
    /// An empty model ("preserve original formatting").
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builder-style setter for a whole section.
    pub fn with_section(mut self, kind: SectionKind, section: Section) -> Self {
        *self.slot_mut(kind) = Some(section);
        self
    }

    pub fn section(&self, kind: SectionKind) -> Option<&Section> {
        match kind {
            SectionKind::Text => self.text.as_ref(),
            SectionKind::Paragraph => self.paragraph.as_ref(),
            SectionKind::Page => self.page.as_ref(),
            SectionKind::Structure => self.structure.as_ref(),
            SectionKind::Cleanup => self.cleanup.as_ref(),
        }
    }

    fn slot_mut(&mut self, kind: SectionKind) -> &mut Option<Section> {
        match kind {
            SectionKind::Text => &mut self.text,
            SectionKind::Paragraph => &mut self.paragraph,
            SectionKind::Page => &mut self.page,
            SectionKind::Structure => &mut self.structure,
            SectionKind::Cleanup => &mut self.cleanup,
        }
    }

    pub fn get(&self, kind: SectionKind, key: &str) -> Option<&OptionValue> {
        self.section(kind).and_then(|s| s.get(key))
    }

    /// Set a single option, creating the section if needed.
    pub fn set(&mut self, kind: SectionKind, key: impl Into<String>, value: impl Into<OptionValue>) {
        self.slot_mut(kind)
            .get_or_insert_with(Section::new)
            .insert(key.into(), value.into());
    }

    /// Merge `patch` over `self`, returning a new model.
    ///
    /// Per section: keys in the patch overwrite keys in `self`, keys only in
    /// `self` are kept, and sections missing from the patch are copied as-is.
    /// Nothing is ever reset to a default.
    pub fn merge(&self, patch: &ConfigModel) -> ConfigModel {
        let mut merged = self.clone();
        for kind in SectionKind::ALL {
            let Some(patch_section) = patch.section(kind) else {
                continue;
            };
            let target = merged.slot_mut(kind).get_or_insert_with(Section::new);
            for (key, value) in patch_section {
                target.insert(key.clone(), value.clone());
            }
        }
        merged
    }

    /// True when no section holds any key.
    pub fn is_empty(&self) -> bool {
        SectionKind::ALL
            .into_iter()
            .all(|kind| self.section(kind).is_none_or(|s| s.is_empty()))
    }

    /// Total number of option keys across all sections.
    pub fn option_count(&self) -> usize {
        SectionKind::ALL
            .into_iter()
            .filter_map(|kind| self.section(kind))
            .map(|s| s.len())
            .sum()
    }

    /// Build a patch from `section.key=value` assignments.
    ///
    /// Later assignments to the same key win.
    pub fn from_assignments<I, S>(assignments: I) -> Result<Self, AssignmentError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut model = ConfigModel::empty();
        for raw in assignments {
            let raw = raw.as_ref();
            let (path, value) = raw
                .split_once('=')
                .ok_or_else(|| AssignmentError::Malformed(raw.to_string()))?;
            let (section_name, key) = path
                .split_once('.')
                .ok_or_else(|| AssignmentError::Malformed(raw.to_string()))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(AssignmentError::Malformed(raw.to_string()));
            }
            let kind: SectionKind = section_name.parse()?;
            model.set(kind, key, OptionValue::parse_for(kind, key, value));
        }
        Ok(model)
    }
}
