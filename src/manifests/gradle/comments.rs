//! Comment stripping for Gradle build scripts.
//!
//! Comments are blanked out with spaces rather than removed, and every
//! newline is kept, so line numbers in the stripped text match the source.

use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Outside,
    InSingleQuoteString,
    InDoubleQuoteString,
    InLineComment,
    InBlockComment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentKind {
    Line,
    Block,
}

/// A comment that was blanked out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrippedSpan {
    pub kind: CommentKind,
    pub start_line: usize,
    pub end_line: usize,
}

/// Construct still open at end of input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unterminated {
    BlockComment { line: usize },
    String { line: usize },
}

impl Unterminated {
    pub fn line(&self) -> usize {
        match self {
            Unterminated::BlockComment { line } | Unterminated::String { line } => *line,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Unterminated::BlockComment { .. } => "unterminated block comment",
            Unterminated::String { .. } => "unterminated string literal",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Stripped {
    pub text: String,
    pub spans: Vec<StrippedSpan>,
    pub unterminated: Option<Unterminated>,
}

/// Blank out `//` and `/* */` comments, leaving string literals untouched.
///
/// On an unterminated construct the text is still returned, stripped as far
/// as the state machine got.
pub fn strip_comments(source: &str) -> Stripped {
    let mut text = String::with_capacity(source.len());
    let mut spans = Vec::new();
    let mut state = State::Outside;
    let mut line = 1;
    let mut opened_at = 1;
    // Inside a `'''` or `"""` string
    let mut triple = false;
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Outside => match c {
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    text.push_str("  ");
                    state = State::InLineComment;
                    opened_at = line;
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    text.push_str("  ");
                    state = State::InBlockComment;
                    opened_at = line;
                }
                '\'' | '"' => {
                    text.push(c);
                    triple = take_pair(&mut chars, c, &mut text);
                    state = if c == '\'' {
                        State::InSingleQuoteString
                    } else {
                        State::InDoubleQuoteString
                    };
                    opened_at = line;
                }
                _ => text.push(c),
            },
            State::InSingleQuoteString | State::InDoubleQuoteString => {
                text.push(c);
                let quote = if state == State::InSingleQuoteString { '\'' } else { '"' };
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        text.push(escaped);
                        if escaped == '\n' {
                            line += 1;
                        }
                    }
                } else if c == quote && (!triple || take_pair(&mut chars, c, &mut text)) {
                    state = State::Outside;
                    triple = false;
                }
            }
            State::InLineComment => {
                if c == '\n' {
                    text.push('\n');
                    spans.push(StrippedSpan {
                        kind: CommentKind::Line,
                        start_line: opened_at,
                        end_line: line,
                    });
                    state = State::Outside;
                } else {
                    text.push(' ');
                }
            }
            State::InBlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    text.push_str("  ");
                    spans.push(StrippedSpan {
                        kind: CommentKind::Block,
                        start_line: opened_at,
                        end_line: line,
                    });
                    state = State::Outside;
                } else if c == '\n' {
                    text.push('\n');
                } else {
                    text.push(' ');
                }
            }
        }

        if c == '\n' {
            line += 1;
        }
    }

    let unterminated = match state {
        State::Outside => None,
        State::InLineComment => {
            spans.push(StrippedSpan {
                kind: CommentKind::Line,
                start_line: opened_at,
                end_line: line,
            });
            None
        }
        State::InBlockComment => Some(Unterminated::BlockComment { line: opened_at }),
        State::InSingleQuoteString | State::InDoubleQuoteString => {
            Some(Unterminated::String { line: opened_at })
        }
    };

    Stripped {
        text,
        spans,
        unterminated,
    }
}

/// Consume two more `quote` characters if they come next, copying them to
/// `text`. Lone or doubled quotes are left in place.
fn take_pair(chars: &mut Peekable<Chars<'_>>, quote: char, text: &mut String) -> bool {
    let mut ahead = chars.clone();
    if ahead.next() != Some(quote) || ahead.next() != Some(quote) {
        return false;
    }
    chars.next();
    chars.next();
    text.push(quote);
    text.push(quote);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_comment_blanked() {
        let s = strip_comments("implementation 'a:b:1' // pinned\napi 'c:d:2'\n");
        assert_eq!(s.text, "implementation 'a:b:1'          \napi 'c:d:2'\n");
        assert_eq!(s.spans.len(), 1);
        assert_eq!(s.spans[0].kind, CommentKind::Line);
        assert!(s.unterminated.is_none());
    }

    #[test]
    fn test_block_comment_keeps_lines() {
        let source = "// comment\n/*\ncomment on severals lines\n*/\n\nto_ignore 'ns:c:1.0.0'\n";
        let s = strip_comments(source);
        assert_eq!(s.text.lines().count(), source.lines().count());
        assert_eq!(s.text.lines().nth(5).unwrap(), "to_ignore 'ns:c:1.0.0'");
        assert_eq!(
            s.spans[1],
            StrippedSpan {
                kind: CommentKind::Block,
                start_line: 2,
                end_line: 4
            }
        );
    }

    #[test]
    fn test_markers_inside_strings_are_inert() {
        let source = "maven { url 'https://repo.example.com/*' }\ndef s = \"a // b /* c\"\n";
        let s = strip_comments(source);
        assert_eq!(s.text, source);
        assert!(s.spans.is_empty());
    }

    #[test]
    fn test_escaped_quote_in_string() {
        let source = "def s = 'it\\'s // not a comment'\n";
        let s = strip_comments(source);
        assert_eq!(s.text, source);
    }

    #[test]
    fn test_idempotent() {
        let source = "/* header */\ndependencies {\n  // x\n  implementation \"a:b:$v\" /* y */\n}\n";
        let once = strip_comments(source).text;
        let twice = strip_comments(&once).text;
        assert_eq!(once, twice);
    }

    #[test]
    fn test_unterminated_block_comment() {
        let s = strip_comments("api 'a:b:1'\n/* never\nclosed\n");
        assert_eq!(s.unterminated, Some(Unterminated::BlockComment { line: 2 }));
        assert_eq!(s.text.lines().next().unwrap(), "api 'a:b:1'");
    }

    #[test]
    fn test_unterminated_string() {
        let s = strip_comments("api 'a:b:1\n");
        assert_eq!(s.unterminated, Some(Unterminated::String { line: 1 }));
    }

    #[test]
    fn test_triple_quoted_strings() {
        let source = "description = '''it's a lib'''\ndef doc = \"\"\"say \"hi\" // here\n/* still text */\"\"\"\napi 'a:b:1' // pinned\n";
        let s = strip_comments(source);

        assert!(s.unterminated.is_none());
        assert_eq!(s.spans.len(), 1);
        assert_eq!(s.spans[0].start_line, 4);
        assert_eq!(s.text.lines().nth(2).unwrap(), "/* still text */\"\"\"");
    }

    #[test]
    fn test_empty_string_is_not_triple() {
        let source = "def empty = ''\napi 'a:b:1' // x\n";
        let s = strip_comments(source);

        assert!(s.unterminated.is_none());
        assert_eq!(s.text.lines().nth(1).unwrap(), "api 'a:b:1'     ");
    }

    #[test]
    fn test_unterminated_triple_string() {
        let s = strip_comments("api 'a:b:1'\ndef doc = '''open\n");
        assert_eq!(s.unterminated, Some(Unterminated::String { line: 2 }));
    }

    #[test]
    fn test_line_comment_at_eof() {
        let s = strip_comments("api 'a:b:1' // end");
        assert!(s.unterminated.is_none());
        assert_eq!(s.spans.len(), 1);
    }
}
