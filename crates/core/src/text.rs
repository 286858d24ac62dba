use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Case-folds and strips diacritics so "Menú" and "menu" compare equal.
pub fn normalize(text: &str) -> String {
    text.nfd().filter(|ch| !is_combining_mark(*ch)).collect::<String>().to_lowercase()
}

/// Whitespace tokenization over normalized text.
///
/// Leading and trailing punctuation is trimmed from each token and tokens of
/// two characters or fewer are discarded.
pub fn query_tokens(text: &str) -> Vec<String> {
    normalize(text)
        .split_whitespace()
        .map(|token| {
            token.trim_matches(|ch: char| ch.is_ascii_punctuation() || ch == '¿' || ch == '¡')
        })
        .filter(|token| token.chars().count() > 2)
        .map(str::to_owned)
        .collect()
}

/// True when `haystack` (already normalized) starts with `phrase` as a whole word.
pub fn starts_with_word(haystack: &str, phrase: &str) -> bool {
    let Some(rest) = haystack.strip_prefix(phrase) else {
        return false;
    };
    rest.chars().next().map_or(true, |next| !next.is_alphanumeric())
}
