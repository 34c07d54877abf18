//! The language-extension table.
//!
//! An embedded YAML document maps language names to the filename fragments
//! (extensions, mostly) they use. It is parsed exactly once into process-wide
//! read-only state; formatters consult it to build their dispatch tables.

use std::collections::HashMap;
use std::sync::LazyLock;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct LanguageEntry {
    #[serde(default)]
    extensions: Vec<String>,
}

static LANGUAGES: LazyLock<HashMap<String, LanguageEntry>> = LazyLock::new(|| {
    serde_saphyr::from_str(include_str!("../data/languages.yaml"))
        .expect("embedded language table parses")
});

/// The filename fragments registered for `language`.
///
/// Unknown languages yield an empty slice.
pub fn extensions_for(language: &str) -> &'static [String] {
    LANGUAGES
        .get(language)
        .map_or(&[], |entry| entry.extensions.as_slice())
}
