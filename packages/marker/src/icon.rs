//! Category to icon resolution.
//!
//! Icons are SVG files in `packages/marker/icons/`, embedded at compile time.
//! Lookup normalizes the category (trim + uppercase), applies the
//! [`CORRECTIONS`] table for known source spellings, then consults the
//! [`VOCABULARY`]. Anything else resolves to [`DEFAULT_CATEGORY`].

use std::collections::BTreeMap;

use include_dir::{Dir, include_dir};

/// Embedded icon files.
static ICONS_DIR: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/icons");

/// Category used when nothing else matches.
pub const DEFAULT_CATEGORY: &str = "INFORMATION TECHNOLOGY";

/// Canonical categories and their icon files.
pub const VOCABULARY: &[(&str, &str)] = &[
    ("FIRE & EMERGENCY SERVICES", "fire-emergency-services.svg"),
    ("LAW ENFORCEMENT", "law-enforcement.svg"),
    ("HOSPITALS & MEDICAL", "hospitals-medical.svg"),
    ("EMERGENCY MEDICAL SERVICES", "emergency-medical-services.svg"),
    (
        "EMERGENCY OPERATIONS CENTERS",
        "emergency-operations-centers.svg",
    ),
    ("SCHOOLS", "schools.svg"),
    ("SHELTERS", "shelters.svg"),
    ("PUBLIC WORKS", "public-works.svg"),
    ("UTILITIES", "utilities.svg"),
    ("COMMUNICATIONS", "communications.svg"),
    ("GOVERNMENT", "government.svg"),
    ("TRANSPORTATION", "transportation.svg"),
    (DEFAULT_CATEGORY, "information-technology.svg"),
];

/// Source spellings remapped onto the vocabulary before lookup.
pub const CORRECTIONS: &[(&str, &str)] = &[
    ("FIRE STATION", "FIRE & EMERGENCY SERVICES"),
    ("FIRE STATIONS", "FIRE & EMERGENCY SERVICES"),
    ("FIRE DEPARTMENT", "FIRE & EMERGENCY SERVICES"),
    ("FIRE PROTECTION", "FIRE & EMERGENCY SERVICES"),
    ("POLICE", "LAW ENFORCEMENT"),
    ("POLICE STATION", "LAW ENFORCEMENT"),
    ("POLICE DEPARTMENT", "LAW ENFORCEMENT"),
    ("SHERIFF", "LAW ENFORCEMENT"),
    ("SHERIFF OFFICE", "LAW ENFORCEMENT"),
    ("POLICE PROTECTION", "LAW ENFORCEMENT"),
    ("HOSPITAL", "HOSPITALS & MEDICAL"),
    ("HOSPITALS", "HOSPITALS & MEDICAL"),
    ("GENERAL ACUTE CARE", "HOSPITALS & MEDICAL"),
    ("GENERAL MEDICAL AND SURGICAL HOSPITALS", "HOSPITALS & MEDICAL"),
    ("AMBULANCE SERVICES", "EMERGENCY MEDICAL SERVICES"),
    ("EMS", "EMERGENCY MEDICAL SERVICES"),
    ("EMS STATION", "EMERGENCY MEDICAL SERVICES"),
    ("EOC", "EMERGENCY OPERATIONS CENTERS"),
    ("EMERGENCY OPERATIONS CENTER", "EMERGENCY OPERATIONS CENTERS"),
    ("SCHOOL", "SCHOOLS"),
    ("SHELTER", "SHELTERS"),
];

/// Errors that can occur while loading icons.
#[derive(Debug, thiserror::Error)]
pub enum IconError {
    /// A vocabulary entry has no embedded file.
    #[error("No icon file {file_name} for category {category}")]
    MissingAsset {
        /// Vocabulary category.
        category: String,
        /// Expected file name.
        file_name: String,
    },
}

/// An embedded icon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconAsset {
    /// Canonical category.
    pub category: &'static str,
    /// File name under `icons/`.
    pub file_name: &'static str,
    /// Raw image payload.
    pub bytes: &'static [u8],
}

/// How a category was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum MatchKind {
    /// The normalized category is in the vocabulary.
    Exact,
    /// The category matched after applying a correction.
    Corrected,
    /// Nothing matched; the default icon was used.
    Fallback,
}

/// A resolved icon and how it was found.
#[derive(Debug, Clone, Copy)]
pub struct IconMatch<'a> {
    /// The icon.
    pub asset: &'a IconAsset,
    /// How the lookup went.
    pub kind: MatchKind,
}

/// Resolves categories to embedded icons.
#[derive(Debug, Clone)]
pub struct IconResolver {
    assets: BTreeMap<&'static str, IconAsset>,
    corrections: BTreeMap<&'static str, &'static str>,
    fallback: IconAsset,
}

impl IconResolver {
    /// Loads every vocabulary icon from the embedded directory.
    ///
    /// # Errors
    ///
    /// Returns [`IconError::MissingAsset`] if a vocabulary entry has no
    /// embedded file.
    pub fn embedded() -> Result<Self, IconError> {
        let mut assets = BTreeMap::new();
        for &(category, file_name) in VOCABULARY {
            let file = ICONS_DIR
                .get_file(file_name)
                .ok_or_else(|| IconError::MissingAsset {
                    category: category.to_string(),
                    file_name: file_name.to_string(),
                })?;
            assets.insert(
                category,
                IconAsset {
                    category,
                    file_name,
                    bytes: file.contents(),
                },
            );
        }

        let fallback = assets
            .get(DEFAULT_CATEGORY)
            .cloned()
            .ok_or_else(|| IconError::MissingAsset {
                category: DEFAULT_CATEGORY.to_string(),
                file_name: String::new(),
            })?;

        log::debug!("Loaded {} icons", assets.len());

        Ok(Self {
            assets,
            corrections: CORRECTIONS.iter().copied().collect(),
            fallback,
        })
    }

    /// Resolves `category` to an icon. Never fails.
    #[must_use]
    pub fn resolve(&self, category: &str) -> &IconAsset {
        self.resolve_match(category).asset
    }

    /// Resolves `category` and reports how the icon was found.
    ///
    /// Logs a warning on fallback.
    #[must_use]
    pub fn resolve_match(&self, category: &str) -> IconMatch<'_> {
        let normalized = category.trim().to_uppercase();

        if let Some(asset) = self.assets.get(normalized.as_str()) {
            return IconMatch {
                asset,
                kind: MatchKind::Exact,
            };
        }

        if let Some(asset) = self
            .corrections
            .get(normalized.as_str())
            .and_then(|corrected| self.assets.get(corrected))
        {
            return IconMatch {
                asset,
                kind: MatchKind::Corrected,
            };
        }

        log::warn!("No icon for category {category:?}, using {DEFAULT_CATEGORY}");
        IconMatch {
            asset: &self.fallback,
            kind: MatchKind::Fallback,
        }
    }

    /// All loaded icons, by category.
    pub fn assets(&self) -> impl Iterator<Item = &IconAsset> {
        self.assets.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> IconResolver {
        IconResolver::embedded().unwrap()
    }

    #[test]
    fn every_vocabulary_entry_has_an_embedded_icon() {
        let resolver = resolver();
        assert_eq!(resolver.assets().count(), VOCABULARY.len());
        for asset in resolver.assets() {
            assert!(!asset.bytes.is_empty(), "{} is empty", asset.file_name);
            assert!(
                std::str::from_utf8(asset.bytes).unwrap().contains("<svg"),
                "{} is not an SVG",
                asset.file_name
            );
        }
    }

    #[test]
    fn corrections_point_into_vocabulary() {
        for (from, to) in CORRECTIONS {
            assert!(
                VOCABULARY.iter().any(|(category, _)| category == to),
                "{from} -> {to} is not a vocabulary category"
            );
        }
    }

    #[test]
    fn exact_match_ignores_case_and_whitespace() {
        let resolver = resolver();
        let found = resolver.resolve_match("  law enforcement ");
        assert_eq!(found.kind, MatchKind::Exact);
        assert_eq!(found.asset.category, "LAW ENFORCEMENT");
    }

    #[test]
    fn fire_station_is_corrected() {
        let binding = resolver();
        let found = binding.resolve_match("FIRE STATION");
        assert_eq!(found.kind, MatchKind::Corrected);
        assert_eq!(found.asset.category, "FIRE & EMERGENCY SERVICES");
        assert_eq!(found.asset.file_name, "fire-emergency-services.svg");
    }

    #[test]
    fn unknown_and_empty_categories_fall_back() {
        let resolver = resolver();
        for category in ["", "   ", "BOWLING ALLEY", "🚒"] {
            let found = resolver.resolve_match(category);
            assert_eq!(found.kind, MatchKind::Fallback, "{category:?}");
            assert_eq!(found.asset.category, DEFAULT_CATEGORY);
        }
        assert_eq!(resolver.resolve("").category, DEFAULT_CATEGORY);
    }

    #[test]
    fn default_category_resolves_exactly() {
        assert_eq!(
            resolver().resolve_match(DEFAULT_CATEGORY).kind,
            MatchKind::Exact
        );
    }
}
