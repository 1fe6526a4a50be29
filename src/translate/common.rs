/// ISO 639-1 codes and the English names used in translation prompts.
const LANGUAGES: &[(&str, &str)] = &[
    ("af", "Afrikaans"), ("am", "Amharic"), ("ar", "Arabic"), ("as", "Assamese"),
    ("az", "Azerbaijani"), ("be", "Belarusian"), ("bg", "Bulgarian"), ("bn", "Bengali"),
    ("ca", "Catalan"), ("cs", "Czech"), ("cy", "Welsh"), ("da", "Danish"),
    ("de", "German"), ("el", "Greek"), ("en", "English"), ("es", "Spanish"),
    ("et", "Estonian"), ("eu", "Basque"), ("fa", "Persian"), ("fi", "Finnish"),
    ("fr", "French"), ("ga", "Irish"), ("gl", "Galician"), ("gu", "Gujarati"),
    ("he", "Hebrew"), ("hi", "Hindi"), ("hr", "Croatian"), ("hu", "Hungarian"),
    ("hy", "Armenian"), ("id", "Indonesian"), ("is", "Icelandic"), ("it", "Italian"),
    ("ja", "Japanese"), ("ka", "Georgian"), ("kk", "Kazakh"), ("km", "Khmer"),
    ("kn", "Kannada"), ("ko", "Korean"), ("ky", "Kyrgyz"), ("lo", "Lao"),
    ("lt", "Lithuanian"), ("lv", "Latvian"), ("mk", "Macedonian"), ("ml", "Malayalam"),
    ("mr", "Marathi"), ("ms", "Malay"), ("mt", "Maltese"), ("my", "Burmese"),
    ("ne", "Nepali"), ("nl", "Dutch"), ("no", "Norwegian"), ("or", "Odia"),
    ("pa", "Punjabi"), ("pl", "Polish"), ("pt", "Portuguese"), ("ro", "Romanian"),
    ("ru", "Russian"), ("si", "Sinhala"), ("sk", "Slovak"), ("sl", "Slovenian"),
    ("sq", "Albanian"), ("sr", "Serbian"), ("sv", "Swedish"), ("sw", "Swahili"),
    ("ta", "Tamil"), ("te", "Telugu"), ("tg", "Tajik"), ("th", "Thai"),
    ("tl", "Tagalog"), ("tr", "Turkish"), ("uk", "Ukrainian"), ("ur", "Urdu"),
    ("uz", "Uzbek"), ("vi", "Vietnamese"), ("zh", "Chinese"),
];

/// Convert language code to full language name for clearer prompts.
///
/// Unknown codes (and values that already are names) pass through unchanged.
pub fn language_code_to_name(code: &str) -> String {
    let code = code.trim();
    LANGUAGES
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(code))
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| code.to_string())
}

/// Whether two language identifiers name the same language.
///
/// Backends report either codes ("en") or lowercase names ("english"),
/// so both sides are reduced to a code before comparing.
pub fn same_language(a: &str, b: &str) -> bool {
    match (language_code(a), language_code(b)) {
        (Some(a), Some(b)) => a == b,
        _ => a.trim().eq_ignore_ascii_case(b.trim()),
    }
}

fn language_code(value: &str) -> Option<&'static str> {
    let value = value.trim();
    // "pt-BR", "zh_TW" -> primary subtag
    let primary = value.split(['-', '_']).next().unwrap_or(value);
    LANGUAGES
        .iter()
        .find(|(code, name)| code.eq_ignore_ascii_case(primary) || name.eq_ignore_ascii_case(value))
        .map(|(code, _)| *code)
}

/// Strip wrappers models like to add around a bare translation.
pub fn clean_translation_response(response: &str) -> String {
    let trimmed = response.trim();

    for prefix in ["Translation:", "Translated text:"] {
        if let Some(rest) = trimmed.strip_prefix(prefix) {
            return clean_translation_response(rest);
        }
    }

    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed);
    unquoted.trim().to_string()
}
