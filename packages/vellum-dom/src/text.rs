//! Text normalization helpers used by the rule engine and by history
//! coalescing.

fn collapsible(ch: char) -> bool {
    // Non-breaking spaces are intentionally significant and never collapse.
    matches!(ch, ' ' | '\t' | '\n' | '\r')
}

/// Result of collapsing the whitespace of one text node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CollapseOutcome {
    Keep(String),
    /// The node held nothing but whitespace in a position where none is
    /// rendered. `had_newline` distinguishes source-layout whitespace.
    Drop { had_newline: bool },
}

/// Collapse whitespace runs in `content` following the rendering model:
/// runs become a single space, and spaces that touch a block boundary (or
/// duplicate a space already ending the previous text node) are dropped.
pub(crate) fn collapse_whitespace(
    content: &str,
    at_block_start: bool,
    at_block_end: bool,
    prev_ends_with_space: bool,
) -> CollapseOutcome {
    let leading = content.chars().next().is_some_and(collapsible);
    let trailing = content.chars().next_back().is_some_and(collapsible);

    let mut core = String::with_capacity(content.len());
    let mut pending = false;
    for ch in content.chars() {
        if collapsible(ch) {
            pending = true;
        } else {
            if pending && !core.is_empty() {
                core.push(' ');
            }
            pending = false;
            core.push(ch);
        }
    }

    if core.is_empty() {
        if !at_block_start && !at_block_end && !prev_ends_with_space && !content.is_empty() {
            return CollapseOutcome::Keep(" ".to_string());
        }
        return CollapseOutcome::Drop {
            had_newline: content.contains('\n'),
        };
    }

    let mut result = String::with_capacity(core.len() + 2);
    if leading && !at_block_start && !prev_ends_with_space {
        result.push(' ');
    }
    result.push_str(&core);
    if trailing && !at_block_end {
        result.push(' ');
    }
    CollapseOutcome::Keep(result)
}

/// Number of typing tokens in a string: one more than the number of
/// maximal runs of non-word characters, where a word character is
/// alphanumeric or an underscore. Appending a word character to a word
/// keeps the count stable; starting a separator (space, punctuation)
/// raises it.
pub(crate) fn word_token_count(s: &str) -> usize {
    let mut count = 1;
    let mut in_separator = false;
    for ch in s.chars() {
        let word = ch.is_alphanumeric() || ch == '_';
        if word {
            in_separator = false;
        } else if !in_separator {
            count += 1;
            in_separator = true;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_runs_to_single_spaces() {
        let outcome = collapse_whitespace("  a \t\n  b  ", true, true, false);
        assert_eq!(outcome, CollapseOutcome::Keep("a b".to_string()));
    }

    #[test]
    fn keeps_boundary_spaces_next_to_inline_content() {
        let outcome = collapse_whitespace(" x ", false, false, false);
        assert_eq!(outcome, CollapseOutcome::Keep(" x ".to_string()));
        let outcome = collapse_whitespace(" x ", false, true, true);
        assert_eq!(outcome, CollapseOutcome::Keep("x".to_string()));
    }

    #[test]
    fn pure_whitespace_between_inline_siblings_survives() {
        let outcome = collapse_whitespace(" ", false, false, false);
        assert_eq!(outcome, CollapseOutcome::Keep(" ".to_string()));
    }

    #[test]
    fn pure_whitespace_at_block_boundary_is_dropped() {
        assert_eq!(
            collapse_whitespace("\n    ", true, false, false),
            CollapseOutcome::Drop { had_newline: true }
        );
        assert_eq!(
            collapse_whitespace("  ", false, true, false),
            CollapseOutcome::Drop { had_newline: false }
        );
    }

    #[test]
    fn non_breaking_space_is_preserved() {
        let outcome = collapse_whitespace("a\u{a0}\u{a0}b", true, true, false);
        assert_eq!(outcome, CollapseOutcome::Keep("a\u{a0}\u{a0}b".to_string()));
    }

    #[test]
    fn token_counts_follow_word_boundaries() {
        assert_eq!(word_token_count(""), 1);
        assert_eq!(word_token_count("hello"), 1);
        assert_eq!(word_token_count("hello "), 2);
        assert_eq!(word_token_count("hello world"), 2);
        assert_eq!(word_token_count("hello, world"), 2);
        assert_eq!(word_token_count(" lead"), 2);
    }
}
