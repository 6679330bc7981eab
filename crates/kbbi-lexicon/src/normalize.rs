use unicode_normalization::UnicodeNormalization;
use unicode_properties::{GeneralCategory, UnicodeGeneralCategory};

/// Fold `text` for diacritic-insensitive matching.
///
/// Applies NFKD, then drops the non-spacing marks (category Mn) the
/// decomposition left behind (`café` becomes `cafe`). Spacing and enclosing
/// marks are kept. With `strip_punctuation` set, only ASCII
/// letters, ASCII digits and spaces survive, which also removes non-Latin
/// scripts entirely. Case is preserved.
pub fn normalize(text: &str, strip_punctuation: bool) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut out = String::with_capacity(text.len());
    for c in text.nfkd() {
        if c.general_category() == GeneralCategory::NonspacingMark {
            continue;
        }
        if strip_punctuation && !(c.is_ascii_alphanumeric() || c == ' ') {
            continue;
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_diacritics_and_punctuation() {
        let cases = [
            ("", ""),
            ("hello", "hello"),
            ("HELLO", "HELLO"),
            ("hello world", "hello world"),
            ("hello123", "hello123"),
            ("hello-world", "helloworld"),
            ("hello_world", "helloworld"),
            ("hello!@#$%^&*()world", "helloworld"),
            ("café", "cafe"),
            ("naïve", "naive"),
            ("façade", "facade"),
            ("Apél", "Apel"),
            ("  multiple   spaces  ", "  multiple   spaces  "),
            ("hello...world", "helloworld"),
            ("test@123#abc", "test123abc"),
            ("ñoño", "nono"),
            ("中文", ""),
        ];
        for (input, expected) in cases {
            assert_eq!(normalize(input, true), expected, "input {input:?}");
        }
    }

    #[test]
    fn keeps_punctuation_when_asked() {
        let cases = [
            ("", ""),
            ("hello", "hello"),
            ("hello-world", "hello-world"),
            ("hello_world", "hello_world"),
            ("hello!@#$%^&*()world", "hello!@#$%^&*()world"),
            ("café", "cafe"),
            ("naïve", "naive"),
            ("façade", "facade"),
            ("Apél", "Apel"),
            ("hello...world", "hello...world"),
            ("test@123#abc", "test@123#abc"),
            ("ñoño", "nono"),
            ("中文", "中文"),
        ];
        for (input, expected) in cases {
            assert_eq!(normalize(input, false), expected, "input {input:?}");
        }
    }

    #[test]
    fn decomposes_compatibility_forms() {
        // U+FB01 LATIN SMALL LIGATURE FI
        assert_eq!(normalize("\u{fb01}le", true), "file");
        // precomposed and combining sequences fold to the same key
        assert_eq!(normalize("e\u{301}", false), normalize("é", false));
    }

    #[test]
    fn keeps_spacing_and_enclosing_marks() {
        // U+093E DEVANAGARI VOWEL SIGN AA is Mc
        assert_eq!(normalize("\u{915}\u{93e}", false), "\u{915}\u{93e}");
        // U+20DD COMBINING ENCLOSING CIRCLE is Me
        assert_eq!(normalize("a\u{20dd}", false), "a\u{20dd}");
        // U+094D DEVANAGARI SIGN VIRAMA is Mn
        assert_eq!(normalize("\u{915}\u{94d}", false), "\u{915}");
        assert_eq!(normalize("a\u{20dd}", true), "a");
    }
}
