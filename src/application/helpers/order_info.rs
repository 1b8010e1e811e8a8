use unicode_normalization::UnicodeNormalization;

/// Unicode block "Combining Diacritical Marks".
const COMBINING_MARKS: std::ops::RangeInclusive<char> = '\u{0300}'..='\u{036F}';

/// Turn free text into a gateway-safe order description.
///
/// Accents are stripped after canonical decomposition, every remaining
/// character outside `[A-Za-z0-9]` becomes `-`, runs of `-` collapse to one and
/// leading/trailing `-` are dropped. Letters with no decomposition (e.g. `đ`)
/// are not transliterated and become `-` as well.
pub fn normalize_order_info(input: Option<&str>) -> String {
    let Some(text) = input else {
        return String::new();
    };

    let mut out = String::with_capacity(text.len());
    for ch in text.nfd().filter(|c| !COMBINING_MARKS.contains(c)) {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }

    out.trim_matches('-').to_string()
}
