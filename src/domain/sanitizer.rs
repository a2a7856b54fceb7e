//! Strips markdown fencing and trailing prose from raw model output.

const FENCE: &str = "```";

/// Lowercase substrings that mark the start of explanatory prose.
pub const PROSE_MARKERS: [&str; 4] = ["this code", "the above", "explanation:", "note:"];

/// Clean a completion into runnable script text.
///
/// A leading fence marker and a trailing fence are dropped. Code sharing the
/// opening fence's line is kept; a bare language tag there is not. Lines are then kept verbatim up to, not including, the first bare
/// fence or prose-marker line. The result is trimmed. Syntax is not checked.
pub fn sanitize(raw: &str) -> String {
    let mut text = raw.trim();

    if let Some(rest) = text
        .strip_prefix("```python")
        .or_else(|| text.strip_prefix(FENCE))
    {
        text = drop_language_tag(rest);
    }
    if let Some(stripped) = text.trim_end().strip_suffix(FENCE) {
        text = stripped;
    }

    let kept: Vec<&str> = text
        .lines()
        .take_while(|line| !is_fence(line) && !is_prose(line))
        .collect();

    kept.join("\n").trim().to_string()
}

/// Remainder of the opening fence's line, unless it is only a language tag.
fn drop_language_tag(rest: &str) -> &str {
    let (first, tail) = match rest.find('\n') {
        Some(newline) => (&rest[..newline], &rest[newline + 1..]),
        None => (rest, ""),
    };
    let tag = first.trim();
    if tag.is_empty() || tag.chars().all(|c| c.is_ascii_alphanumeric() || "+#-._".contains(c)) {
        tail
    } else {
        rest
    }
}

fn is_fence(line: &str) -> bool {
    line.trim().starts_with(FENCE)
}

fn is_prose(line: &str) -> bool {
    let lower = line.to_lowercase();
    PROSE_MARKERS.iter().any(|marker| lower.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fence_and_trailing_prose() {
        let raw = "```python\nentries = x\n```\nThis code buys low.";
        assert_eq!(sanitize(raw), "entries = x");
    }

    #[test]
    fn strips_bare_fences() {
        let raw = "```\nclose = raw.xs('Close', axis=1, level=1)\n```";
        assert_eq!(sanitize(raw), "close = raw.xs('Close', axis=1, level=1)");
    }

    #[test]
    fn drops_other_language_tags() {
        assert_eq!(sanitize("```py\nentries = x\n```"), "entries = x");
        assert_eq!(sanitize("```python3\nentries = x\n```"), "entries = x");
    }

    #[test]
    fn keeps_code_on_the_opening_fence_line() {
        let raw = "```close = raw.xs('Close', axis=1, level=1)\nentries = close > 1\n```";
        assert_eq!(
            sanitize(raw),
            "close = raw.xs('Close', axis=1, level=1)\nentries = close > 1"
        );
        assert_eq!(sanitize("```python entries = x\nexits = y\n```"), "entries = x\nexits = y");
    }

    #[test]
    fn stops_at_first_marker_case_insensitive() {
        let raw = "a = 1\nb = 2\nEXPLANATION: a is one\nc = 3";
        assert_eq!(sanitize(raw), "a = 1\nb = 2");
    }

    #[test]
    fn marker_inside_comment_truncates() {
        let raw = "a = 1\n# Note: tweak later\nb = 2";
        assert_eq!(sanitize(raw), "a = 1");
    }

    #[test]
    fn keeps_inner_indentation() {
        let raw = "x = (a +\n     b)\n";
        assert_eq!(sanitize(raw), "x = (a +\n     b)");
    }

    #[test]
    fn clean_code_is_unchanged() {
        let code = "close = raw.xs('Close', axis=1, level=1)\nentries = close > 1\nexits = close < 1";
        assert_eq!(sanitize(code), code);
        assert_eq!(sanitize(&sanitize(code)), code);
    }

    #[test]
    fn fence_only_yields_empty() {
        assert_eq!(sanitize("```"), "");
        assert_eq!(sanitize("```python\n```"), "");
        assert_eq!(sanitize("   "), "");
    }

    #[test]
    fn leading_prose_yields_empty() {
        assert_eq!(sanitize("The above strategy is simple.\nentries = x"), "");
    }
}
