// Preset catalog
//
// Named, immutable formatting configurations. The built-in table is created in
// code at startup; user presets loaded from presets.yaml are appended after it.

use crate::models::{ConfigModel, SectionKind, section};
use serde::{Deserialize, Serialize};

/// A named formatting configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub options: ConfigModel,
}

impl Preset {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        options: ConfigModel,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            options,
        }
    }
}

/// Ordered, read-only table of presets.
///
/// Selecting a preset *replaces* the caller's working configuration; use
/// [`resolve`](Self::resolve) to get that replacement and merge manual
/// overrides on top of it afterwards.
#[derive(Debug, Clone)]
pub struct PresetCatalog {
    presets: Vec<Preset>,
}

impl PresetCatalog {
    /// The built-in presets, in declaration order.
    pub fn builtin() -> Self {
        Self {
            presets: builtin_presets(),
        }
    }

    /// Built-ins followed by `custom`. Custom presets reusing an existing id are skipped.
    pub fn with_custom(custom: Vec<Preset>) -> Self {
        let mut catalog = Self::builtin();
        for preset in custom {
            if catalog.get(&preset.id).is_some() {
                tracing::warn!(
                    "Skipping custom preset '{}': id already in use",
                    preset.id
                );
                continue;
            }
            tracing::debug!("Loaded custom preset '{}'", preset.id);
            catalog.presets.push(preset);
        }
        catalog
    }

    pub fn list(&self) -> &[Preset] {
        &self.presets
    }

    pub fn get(&self, id: &str) -> Option<&Preset> {
        self.presets.iter().find(|p| p.id == id)
    }

    /// Options of preset `id`, or an empty configuration when it does not exist.
    pub fn resolve(&self, id: &str) -> ConfigModel {
        match self.get(id) {
            Some(preset) => preset.options.clone(),
            None => {
                tracing::warn!("Unknown preset '{}', using an empty configuration", id);
                ConfigModel::empty()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}

impl Default for PresetCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn margins(top: f64, bottom: f64, left: f64, right: f64) -> crate::models::Section {
    section([
        ("margin_top", top.into()),
        ("margin_bottom", bottom.into()),
        ("margin_left", left.into()),
        ("margin_right", right.into()),
    ])
}

fn builtin_presets() -> Vec<Preset> {
    vec![
        Preset::new(
            "professional",
            "Professional",
            "Clean business documents",
            ConfigModel::empty()
                .with_section(
                    SectionKind::Text,
                    section([
                        ("font_family", "Calibri".into()),
                        ("font_size", 11.into()),
                        ("line_spacing", "1.15".into()),
                        ("text_alignment", "justify".into()),
                    ]),
                )
                .with_section(
                    SectionKind::Paragraph,
                    section([("spacing_before", 0.into()), ("spacing_after", 8.into())]),
                )
                .with_section(SectionKind::Page, margins(1.0, 1.0, 1.0, 1.0))
                .with_section(
                    SectionKind::Structure,
                    section([
                        ("normalize_headings", true.into()),
                        ("h1_size", 16.into()),
                        ("h1_bold", true.into()),
                        ("h2_size", 14.into()),
                        ("h2_bold", true.into()),
                        ("h3_size", 12.into()),
                        ("h3_bold", true.into()),
                    ]),
                ),
        ),
        Preset::new(
            "academic",
            "Academic",
            "APA/MLA style papers",
            ConfigModel::empty()
                .with_section(
                    SectionKind::Text,
                    section([
                        ("font_family", "Times New Roman".into()),
                        ("font_size", 12.into()),
                        ("line_spacing", "2.0".into()),
                        ("text_alignment", "left".into()),
                    ]),
                )
                .with_section(
                    SectionKind::Paragraph,
                    section([
                        ("spacing_before", 0.into()),
                        ("spacing_after", 0.into()),
                        ("first_line_indent", 0.5.into()),
                    ]),
                )
                .with_section(SectionKind::Page, margins(1.0, 1.0, 1.0, 1.0))
                .with_section(
                    SectionKind::Structure,
                    section([
                        ("normalize_headings", true.into()),
                        ("h1_size", 14.into()),
                        ("h1_bold", true.into()),
                        ("h2_size", 12.into()),
                        ("h2_bold", true.into()),
                    ]),
                ),
        ),
        Preset::new(
            "report",
            "Report",
            "Formal reports & proposals",
            ConfigModel::empty()
                .with_section(
                    SectionKind::Text,
                    section([
                        ("font_family", "Arial".into()),
                        ("font_size", 11.into()),
                        ("line_spacing", "1.5".into()),
                        ("text_alignment", "justify".into()),
                    ]),
                )
                .with_section(
                    SectionKind::Paragraph,
                    section([("spacing_before", 6.into()), ("spacing_after", 6.into())]),
                )
                .with_section(SectionKind::Page, {
                    let mut page = margins(1.0, 1.0, 1.25, 1.0);
                    page.insert("page_numbers".to_string(), true.into());
                    page.insert("page_number_position".to_string(), "bottom_center".into());
                    page
                })
                .with_section(
                    SectionKind::Structure,
                    section([
                        ("normalize_headings", true.into()),
                        ("create_toc", true.into()),
                        ("h1_size", 18.into()),
                        ("h1_bold", true.into()),
                        ("h2_size", 14.into()),
                        ("h2_bold", true.into()),
                        ("h3_size", 12.into()),
                        ("h3_bold", true.into()),
                    ]),
                ),
        ),
        Preset::new(
            "book",
            "Book/Novel",
            "Book manuscript format",
            ConfigModel::empty()
                .with_section(
                    SectionKind::Text,
                    section([
                        ("font_family", "Garamond".into()),
                        ("font_size", 12.into()),
                        ("line_spacing", "1.5".into()),
                        ("text_alignment", "justify".into()),
                    ]),
                )
                .with_section(
                    SectionKind::Paragraph,
                    section([
                        ("spacing_before", 0.into()),
                        ("spacing_after", 0.into()),
                        ("first_line_indent", 0.3.into()),
                    ]),
                )
                .with_section(
                    SectionKind::Page,
                    section([
                        ("page_size", "A5".into()),
                        ("margin_top", 0.75.into()),
                        ("margin_bottom", 0.75.into()),
                        ("margin_left", 0.75.into()),
                        ("margin_right", 0.75.into()),
                        ("page_numbers", true.into()),
                        ("page_number_position", "bottom_center".into()),
                    ]),
                ),
        ),
        Preset::new(
            "newsletter",
            "Newsletter",
            "Multi-column layouts",
            ConfigModel::empty()
                .with_section(
                    SectionKind::Text,
                    section([
                        ("font_family", "Verdana".into()),
                        ("font_size", 10.into()),
                        ("line_spacing", "1.15".into()),
                        ("text_alignment", "justify".into()),
                    ]),
                )
                .with_section(
                    SectionKind::Paragraph,
                    section([("spacing_before", 0.into()), ("spacing_after", 6.into())]),
                )
                .with_section(
                    SectionKind::Page,
                    section([
                        ("columns", 2.into()),
                        ("column_spacing", 0.5.into()),
                        ("margin_top", 0.75.into()),
                        ("margin_bottom", 0.75.into()),
                        ("margin_left", 0.75.into()),
                        ("margin_right", 0.75.into()),
                    ]),
                )
                .with_section(
                    SectionKind::Structure,
                    section([
                        ("normalize_headings", true.into()),
                        ("h1_size", 16.into()),
                        ("h1_bold", true.into()),
                        ("h2_size", 12.into()),
                        ("h2_bold", true.into()),
                    ]),
                ),
        ),
        Preset::new(
            "minimal",
            "Minimal Clean",
            "Simple & elegant",
            ConfigModel::empty()
                .with_section(
                    SectionKind::Text,
                    section([
                        ("font_family", "Calibri".into()),
                        ("font_size", 11.into()),
                        ("line_spacing", "1.15".into()),
                        ("text_alignment", "left".into()),
                    ]),
                )
                .with_section(
                    SectionKind::Paragraph,
                    section([
                        ("spacing_before", 0.into()),
                        ("spacing_after", 10.into()),
                        ("remove_extra_spaces", true.into()),
                        ("remove_blank_lines", true.into()),
                    ]),
                )
                .with_section(SectionKind::Page, margins(1.0, 1.0, 1.0, 1.0))
                .with_section(
                    SectionKind::Cleanup,
                    section([
                        ("remove_inconsistent_fonts", true.into()),
                        ("normalize_formatting", true.into()),
                        ("fix_alignment_issues", true.into()),
                    ]),
                ),
        ),
    ]
}
