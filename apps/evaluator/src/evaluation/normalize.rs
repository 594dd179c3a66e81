use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Normalizes a skill name for catalog lookup: compatibility-decomposes,
/// strips combining marks (accents), folds the Latin letters that carry no
/// decomposition, lowercases and trims.
///
/// "  Comunicación Efectiva " and "comunicacion efectiva" map to the same key.
pub fn normalize_skill_name(name: &str) -> String {
    let mut folded = String::with_capacity(name.len());
    for c in name.nfkd().filter(|c| !is_combining_mark(*c)) {
        match fold_letter(c) {
            Some(ascii) => folded.push_str(ascii),
            None => folded.push(c),
        }
    }
    folded.trim().to_lowercase()
}

/// Letters NFKD leaves intact (stroked, ligated or special forms).
fn fold_letter(c: char) -> Option<&'static str> {
    let ascii = match c {
        'ß' | 'ẞ' => "ss",
        'æ' => "ae",
        'Æ' => "AE",
        'œ' => "oe",
        'Œ' => "OE",
        'ø' => "o",
        'Ø' => "O",
        'ł' => "l",
        'Ł' => "L",
        'đ' => "d",
        'Đ' | 'Ð' => "D",
        'ð' => "d",
        'þ' => "th",
        'Þ' => "TH",
        'ħ' => "h",
        'Ħ' => "H",
        'ı' => "i",
        _ => return None,
    };
    Some(ascii)
}
