//! File classification by extension

use std::path::Path;

use crate::models::Language;

/// Maps a file path to a language tag from its extension
pub fn classify(path: &Path) -> Language {
    let Some(extension) = path.extension().and_then(|e| e.to_str()) else {
        return Language::Unsupported;
    };

    match extension.to_ascii_lowercase().as_str() {
        "go" => Language::Go,
        "js" | "jsx" | "mjs" | "cjs" => Language::JavaScript,
        "ts" | "tsx" | "mts" | "cts" => Language::TypeScript,
        "py" => Language::Python,
        _ => Language::Unsupported,
    }
}
