//! Telegram MarkdownV2 text helpers.

const MARKDOWN_V2_SPECIAL: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!', '\\',
];

pub fn escape_markdown_v2(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if MARKDOWN_V2_SPECIAL.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Wraps `text` in a code span. Only backtick and backslash need escaping inside.
pub fn code_span(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('`');
    for ch in text.chars() {
        if ch == '`' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('`');
    out
}

pub fn code_block(text: &str) -> String {
    let mut out = String::from("```\n");
    for ch in text.chars() {
        if ch == '`' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push_str("\n```");
    out
}

#[cfg(test)]
mod tests {
    use super::{code_block, code_span, escape_markdown_v2};

    #[test]
    fn escapes_every_reserved_character() {
        assert_eq!(
            escape_markdown_v2("price: 1.5 (approx) - ok!"),
            "price: 1\\.5 \\(approx\\) \\- ok\\!"
        );
        assert_eq!(escape_markdown_v2("a_b*c"), "a\\_b\\*c");
        assert_eq!(escape_markdown_v2("plain text"), "plain text");
    }

    #[test]
    fn code_span_only_escapes_backtick_and_backslash() {
        assert_eq!(code_span("k_euler.v2"), "`k_euler.v2`");
        assert_eq!(code_span("a`b\\c"), "`a\\`b\\\\c`");
        assert_eq!(code_block("{\"a\": 1}"), "```\n{\"a\": 1}\n```");
    }
}
