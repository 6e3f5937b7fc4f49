use std::fmt;

use serde::{Deserialize, Serialize};

/// Which tier of the resolver produced a language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LanguageSource {
    UserSetting,
    BrowserLocale,
    BrowserLocaleBase,
    Default,
}

impl fmt::Display for LanguageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LanguageSource::UserSetting => write!(f, "user setting"),
            LanguageSource::BrowserLocale => write!(f, "browser locale"),
            LanguageSource::BrowserLocaleBase => write!(f, "browser locale base tag"),
            LanguageSource::Default => write!(f, "default"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserLanguage {
    pub code: String,
    pub source: LanguageSource,
}

impl UserLanguage {
    pub fn new(code: impl Into<String>, source: LanguageSource) -> Self {
        Self {
            code: code.into(),
            source,
        }
    }
}

/// Browser UI locales (BCP 47 style) mapped to tesseract language codes.
const LOCALE_LANGUAGES: &[(&str, &str)] = &[
    ("en", "eng"),
    ("fr", "fra"),
    ("de", "deu"),
    ("es", "spa"),
    ("it", "ita"),
    ("pt", "por"),
    ("pt-BR", "por"),
    ("nl", "nld"),
    ("sv", "swe"),
    ("da", "dan"),
    ("nb", "nor"),
    ("no", "nor"),
    ("fi", "fin"),
    ("pl", "pol"),
    ("cs", "ces"),
    ("hu", "hun"),
    ("ro", "ron"),
    ("tr", "tur"),
    ("el", "ell"),
    ("ru", "rus"),
    ("uk", "ukr"),
    ("ar", "ara"),
    ("he", "heb"),
    ("hi", "hin"),
    ("th", "tha"),
    ("vi", "vie"),
    ("id", "ind"),
    ("ja", "jpn"),
    ("ko", "kor"),
    ("zh", "chi_sim"),
    ("zh-CN", "chi_sim"),
    ("zh-TW", "chi_tra"),
    ("zh-HK", "chi_tra"),
];

pub fn is_supported_language(code: &str) -> bool {
    LOCALE_LANGUAGES.iter().any(|(_, language)| *language == code)
}

pub fn supported_languages() -> Vec<&'static str> {
    let mut languages: Vec<&'static str> = Vec::new();
    for (_, language) in LOCALE_LANGUAGES {
        if !languages.contains(language) {
            languages.push(language);
        }
    }
    languages
}

/// Exact lookup of a full locale tag. `_` and `-` are treated alike and the
/// comparison ignores case, as hosts disagree on both.
pub fn language_for_locale(locale: &str) -> Option<&'static str> {
    let normalized = locale.trim().replace('_', "-");
    LOCALE_LANGUAGES
        .iter()
        .find(|(tag, _)| tag.eq_ignore_ascii_case(&normalized))
        .map(|(_, language)| *language)
}

pub fn base_subtag(locale: &str) -> &str {
    locale
        .trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_for_locale_exact_region_entry() {
        assert_eq!(language_for_locale("zh-TW"), Some("chi_tra"));
        assert_eq!(language_for_locale("zh_tw"), Some("chi_tra"));
    }

    #[test]
    fn test_language_for_locale_without_entry_is_none() {
        assert_eq!(language_for_locale("fr-CA"), None);
        assert_eq!(language_for_locale(""), None);
    }

    #[test]
    fn test_base_subtag_strips_region() {
        assert_eq!(base_subtag("fr-CA"), "fr");
        assert_eq!(base_subtag("pt_PT"), "pt");
        assert_eq!(base_subtag("en"), "en");
    }

    #[test]
    fn test_supported_languages_are_unique() {
        let languages = supported_languages();
        let mut deduplicated = languages.clone();
        deduplicated.sort_unstable();
        deduplicated.dedup();

        assert_eq!(languages.len(), deduplicated.len());
        assert!(languages.contains(&"eng"));
        assert!(is_supported_language("chi_sim"));
        assert!(!is_supported_language("klingon"));
    }
}
