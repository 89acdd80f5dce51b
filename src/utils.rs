/// Parse a bit-string such as `"0110"` into a vector of booleans.
///
/// Returns `None` if the string contains anything but `0` and `1`.
pub fn parse_bits(s: &str) -> Option<Vec<bool>> {
    s.chars()
        .map(|c| match c {
            '0' => Some(false),
            '1' => Some(true),
            _ => None,
        })
        .collect()
}

/// Format booleans as a bit-string, `true` as `1`.
pub fn format_bits(bits: &[bool]) -> String {
    bits.iter().map(|&b| if b { '1' } else { '0' }).collect()
}

/// Split `NAME[bits]` into the name and the bit-string.
///
/// ```text
/// "REQ[0110]" -> ("REQ", "0110")
/// "[01]"      -> ("", "01")
/// ```
pub fn split_event_bits(s: &str) -> Option<(&str, &str)> {
    let open = s.find('[')?;
    let rest = s[open + 1..].strip_suffix(']')?;
    Some((s[..open].trim(), rest.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bits() {
        assert_eq!(parse_bits(""), Some(vec![]));
        assert_eq!(parse_bits("0"), Some(vec![false]));
        assert_eq!(parse_bits("101"), Some(vec![true, false, true]));
        assert_eq!(parse_bits("10x"), None);
        assert_eq!(parse_bits(" 1"), None);
    }

    #[test]
    fn test_format_bits() {
        assert_eq!(format_bits(&[]), "");
        assert_eq!(format_bits(&[true, true, false]), "110");
        let bits = parse_bits("0011010").unwrap();
        assert_eq!(format_bits(&bits), "0011010");
    }

    #[test]
    fn test_split_event_bits() {
        // input         name   bits
        // ----------------------------
        // REQ[0110]     REQ    0110
        // [01]          ""     01
        // CNF[]         CNF    ""
        // REQ0110       -
        // REQ[01       -
        assert_eq!(split_event_bits("REQ[0110]"), Some(("REQ", "0110")));
        assert_eq!(split_event_bits("[01]"), Some(("", "01")));
        assert_eq!(split_event_bits("CNF[]"), Some(("CNF", "")));
        assert_eq!(split_event_bits("REQ0110"), None);
        assert_eq!(split_event_bits("REQ[01"), None);
    }
}
