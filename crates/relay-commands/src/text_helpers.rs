pub fn split_at_char_index(text: &str, index: usize) -> (String, String) {
    let mut iter = text.chars();
    let mut left = String::new();
    for _ in 0..index {
        if let Some(ch) = iter.next() {
            left.push(ch);
        } else {
            break;
        }
    }
    let right: String = iter.collect();
    (left, right)
}

/// Keeps at most `max_chars` characters, marking a cut with a trailing ellipsis.
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let (head, _) = split_at_char_index(text, max_chars.saturating_sub(1));
    format!("{head}…")
}

pub fn collapse_newlines(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\n', '\r'], " ")
}

#[cfg(test)]
mod tests {
    use super::{collapse_newlines, split_at_char_index, truncate_with_ellipsis};

    #[test]
    fn unit_split_at_char_index_respects_multibyte_chars() {
        let (left, right) = split_at_char_index("héllo", 2);
        assert_eq!(left, "hé");
        assert_eq!(right, "llo");
        let (left, right) = split_at_char_index("hi", 10);
        assert_eq!(left, "hi");
        assert!(right.is_empty());
    }

    #[test]
    fn functional_truncate_with_ellipsis_bounds_length() {
        assert_eq!(truncate_with_ellipsis("short", 10), "short");
        let truncated = truncate_with_ellipsis("abcdefghij", 5);
        assert_eq!(truncated, "abcd…");
        assert_eq!(truncated.chars().count(), 5);
    }

    #[test]
    fn regression_collapse_newlines_handles_crlf_without_double_spaces() {
        assert_eq!(collapse_newlines("a\r\nb\nc\rd"), "a b c d");
    }
}
