/*!
 * Visible labels of the surface's controls, per interface locale.
 *
 * The surface renders its interface in the target language, so the labels of
 * the "translate" and "download translation" buttons change with it. All
 * knowledge of those strings lives in this table.
 */

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// The controls the session needs to find by label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    /// Starts the translation
    Trigger,
    /// Downloads the finished translation
    Download,
}

/// A label a control may carry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlLabel {
    pub text: String,
    /// Whole-label match when true, substring match otherwise
    pub exact: bool,
}

impl ControlLabel {
    pub fn exact(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            exact: true,
        }
    }

    pub fn contains(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            exact: false,
        }
    }

    /// Whether a control's visible name matches this label
    pub fn matches(&self, visible_name: &str) -> bool {
        let visible_name = visible_name.trim();
        if self.exact {
            visible_name == self.text
        } else {
            visible_name.contains(&self.text)
        }
    }
}

static BUILTIN_LABELS: Lazy<Vec<(&'static str, &'static str, &'static str)>> = Lazy::new(|| {
    // (locale, trigger, download)
    vec![
        ("es", "Traducir", "Descargar traducción"),
        ("en", "Translate", "Download translation"),
        ("fr", "Traduire", "Télécharger la traduction"),
        ("de", "Übersetzen", "Übersetzung herunterladen"),
    ]
});

/// Lookup table from interface locale to acceptable control labels
#[derive(Debug, Clone)]
pub struct LabelTable {
    labels: HashMap<(String, ControlKind), Vec<ControlLabel>>,
    /// Locales in the order their labels are tried as fallbacks
    locales: Vec<String>,
}

impl Default for LabelTable {
    fn default() -> Self {
        let mut table = Self::empty();
        for (locale, trigger, download) in BUILTIN_LABELS.iter() {
            table.insert(locale, ControlKind::Trigger, ControlLabel::exact(*trigger));
            table.insert(locale, ControlKind::Download, ControlLabel::contains(*download));
        }
        table
    }
}

impl LabelTable {
    /// A table without any labels
    pub fn empty() -> Self {
        Self {
            labels: HashMap::new(),
            locales: Vec::new(),
        }
    }

    /// Register an additional label for a locale
    pub fn insert(&mut self, locale: &str, kind: ControlKind, label: ControlLabel) {
        let locale = normalize_locale(locale);
        if !self.locales.contains(&locale) {
            self.locales.push(locale.clone());
        }
        let entry = self.labels.entry((locale, kind)).or_default();
        if !entry.contains(&label) {
            entry.push(label);
        }
    }

    /// Labels to try for a control, most likely first.
    ///
    /// The labels of `locale` come first, followed by every other known
    /// label, since the surface does not always honor the requested locale.
    pub fn labels_for(&self, kind: ControlKind, locale: &str) -> Vec<ControlLabel> {
        let locale = normalize_locale(locale);
        let mut result: Vec<ControlLabel> = self
            .labels
            .get(&(locale.clone(), kind))
            .cloned()
            .unwrap_or_default();

        for other in self.locales.iter().filter(|l| **l != locale) {
            if let Some(labels) = self.labels.get(&(other.clone(), kind)) {
                for label in labels {
                    if !result.contains(label) {
                        result.push(label.clone());
                    }
                }
            }
        }

        result
    }
}

/// Reduce a locale such as `es-ES` or `ES` to its language part
fn normalize_locale(locale: &str) -> String {
    locale
        .split(['-', '_'])
        .next()
        .unwrap_or(locale)
        .trim()
        .to_lowercase()
}
