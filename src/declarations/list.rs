//! Line-oriented package list parser.
//!
//! One package identifier per line. `#` starts a comment, either for the
//! whole line or inline (truncating the rest). Blank lines and comment-only
//! lines are ignored; surrounding whitespace is trimmed.

/// Parse a line-oriented package list into identifiers, in file order.
#[must_use]
pub fn parse(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| {
            line.split('#')
                .next()
                .unwrap_or_default()
                .trim()
        })
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}
