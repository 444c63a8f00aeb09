//! Internationalization (i18n) module
//!
//! Picks the message catalog from the system locale. Report text uses the
//! catalogs in `locales/`; log messages remain in English for consistency.

use std::sync::OnceLock;

/// Supported languages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    English,
    ChineseSimplified,
}

impl Language {
    /// Locale name of the matching catalog in `locales/`
    pub fn locale(self) -> &'static str {
        match self {
            Language::English => "en",
            Language::ChineseSimplified => "zh-CN",
        }
    }
}

/// Global language instance
static LANGUAGE: OnceLock<Language> = OnceLock::new();

/// Initialize and get the current language based on system locale
pub fn get_language() -> Language {
    *LANGUAGE.get_or_init(detect_language)
}

/// Select the message catalog for the rest of the process
pub fn init_locale() {
    rust_i18n::set_locale(get_language().locale());
}

/// Detect system language from environment variables, then the OS setting
fn detect_language() -> Language {
    let locale = std::env::var("LC_ALL")
        .or_else(|_| std::env::var("LC_MESSAGES"))
        .or_else(|_| std::env::var("LANG"))
        .ok()
        .filter(|l| !l.is_empty())
        .or_else(sys_locale::get_locale)
        .unwrap_or_default();

    language_for(&locale)
}

fn language_for(locale: &str) -> Language {
    let locale = locale.to_lowercase();
    if locale.starts_with("zh") || locale.contains("hans") {
        Language::ChineseSimplified
    } else {
        Language::English
    }
}
