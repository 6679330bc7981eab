/// Shortest input that can carry a suffix: a character, a space, `(`, a
/// digit and `)`.
const MIN_SENSE_KEY_LEN: usize = 5;

/// Split a trailing ` (N)` sense suffix off `text`.
///
/// `apel (2)` yields `Some(("apel", 2))`. The suffix must be exactly one
/// space, an opening parenthesis, one or more ASCII digits and a closing
/// parenthesis that ends the input. The key before the space may be empty
/// (` (12)` parses). Returns `None` when the suffix is absent or malformed,
/// or when the number does not fit a `u32`.
pub fn parse_sense_key(text: &str) -> Option<(&str, u32)> {
    let bytes = text.as_bytes();
    if bytes.len() < MIN_SENSE_KEY_LEN || bytes[bytes.len() - 1] != b')' {
        return None;
    }

    let digits_end = bytes.len() - 1;
    let mut open_paren = None;
    for i in (0..digits_end).rev() {
        match bytes[i] {
            b'0'..=b'9' => {}
            b'(' => {
                open_paren = Some(i);
                break;
            }
            _ => return None,
        }
    }

    let open_paren = open_paren?;
    if open_paren + 1 == digits_end {
        return None;
    }
    if open_paren == 0 || bytes[open_paren - 1] != b' ' {
        return None;
    }

    let number = text[open_paren + 1..digits_end].parse::<u32>().ok()?;
    Some((&text[..open_paren - 1], number))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_suffixes() {
        for input in [
            "",
            "apel (",
            "apel )",
            "apel ()",
            "apel (a)",
            "apel 1)",
            "111111)",
            "(111111)",
            "apel(1)",
            "apel (1a)",
            " (1)x",
        ] {
            assert_eq!(parse_sense_key(input), None, "input {input:?}");
        }
    }

    #[test]
    fn parses_trailing_sense_numbers() {
        assert_eq!(parse_sense_key("apel (1)"), Some(("apel", 1)));
        assert_eq!(parse_sense_key("some lemma (1696969)"), Some(("some lemma", 1696969)));
        assert_eq!(parse_sense_key("another-one  (1123123)"), Some(("another-one ", 1123123)));
        assert_eq!(parse_sense_key(" (111111)"), Some(("", 111111)));
    }

    #[test]
    fn rejects_overflowing_numbers() {
        assert_eq!(parse_sense_key("apel (99999999999)"), None);
    }

    #[test]
    fn keeps_multibyte_prefix_intact() {
        assert_eq!(parse_sense_key("apél (3)"), Some(("apél", 3)));
    }
}
