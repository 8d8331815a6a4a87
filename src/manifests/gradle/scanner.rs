//! Statement scanner: comment-free build-script text to a forest of [`CallNode`]s.
//!
//! A statement ends at a line break (outside parentheses and brackets), at `;`,
//! or at the closing brace of the enclosing block. A `{ ... }` opened on the
//! statement's line becomes the call's nested block; further blocks on the same
//! statement (`} else {`, `} catch (e) {`, `}.configure {`) become sibling
//! nodes named after the words that introduce them.

use super::ast::{Argument, CallForm, CallNode};

/// Modifiers that introduce a local binding.
const DECLARATION_KEYWORDS: &[&str] = &["def", "val", "var", "final"];

/// Name given to a block with no introducing identifier.
const CLOSURE_LABEL: &str = "{ .. }";

const OPERATOR_CHARS: &[char] = &[
    '=', '+', '-', '*', '/', '!', '?', '<', '>', '&', '|', '%', '~', '^', '.', '@',
];

/// Unbalanced structure found while scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Imbalance {
    UnclosedBrace { line: usize },
    StrayClosingBrace { line: usize },
    UnclosedParen { line: usize },
    UnterminatedString { line: usize },
}

impl Imbalance {
    pub fn line(&self) -> usize {
        match self {
            Imbalance::UnclosedBrace { line }
            | Imbalance::StrayClosingBrace { line }
            | Imbalance::UnclosedParen { line }
            | Imbalance::UnterminatedString { line } => *line,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Imbalance::UnclosedBrace { .. } => "block opened here is never closed",
            Imbalance::StrayClosingBrace { .. } => "closing brace without a matching opening brace",
            Imbalance::UnclosedParen { .. } => "parenthesis or bracket opened here is never closed",
            Imbalance::UnterminatedString { .. } => "unterminated string literal",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tok {
    Ident(String),
    Str { text: String, interpolated: bool },
    Literal(String),
    Op(String),
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Assign,
    Newline,
    Semi,
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    line: usize,
}

/// Scan cleaned text into top-level call nodes.
pub fn scan(text: &str) -> Result<Vec<CallNode>, Imbalance> {
    let tokens = lex(text)?;
    let mut parser = Parser { tokens, pos: 0 };
    parser.parse_block(None)
}

/// Value of a backslash escape inside a string literal.
pub fn unescape_char(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        other => other,
    }
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(unescape_char(escaped));
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn has_unescaped_dollar(raw: &str) -> bool {
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '$' => return true,
            _ => {}
        }
    }
    false
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn lex(text: &str) -> Result<Vec<Token>, Imbalance> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let single = match c {
            '(' => Some(Tok::LParen),
            ')' => Some(Tok::RParen),
            '{' => Some(Tok::LBrace),
            '}' => Some(Tok::RBrace),
            '[' => Some(Tok::LBracket),
            ']' => Some(Tok::RBracket),
            ',' => Some(Tok::Comma),
            ';' => Some(Tok::Semi),
            _ => None,
        };
        if let Some(tok) = single {
            tokens.push(Token { tok, line });
            i += 1;
            continue;
        }

        match c {
            '\n' => {
                tokens.push(Token {
                    tok: Tok::Newline,
                    line,
                });
                line += 1;
                i += 1;
            }
            ' ' | '\t' | '\r' => i += 1,
            '\\' if chars.get(i + 1) == Some(&'\n') => {
                // Line continuation
                line += 1;
                i += 2;
            }
            '\'' | '"' => {
                let start_line = line;
                let (tok, next, newlines) = lex_string(&chars, i, start_line)?;
                tokens.push(Token {
                    tok,
                    line: start_line,
                });
                line += newlines;
                i = next;
            }
            ':' if chars.get(i + 1) == Some(&':') => {
                tokens.push(Token {
                    tok: Tok::Op("::".to_string()),
                    line,
                });
                i += 2;
            }
            ':' => {
                tokens.push(Token {
                    tok: Tok::Colon,
                    line,
                });
                i += 1;
            }
            c if is_ident_start(c) => {
                let start = i;
                while i < chars.len()
                    && (is_ident_char(chars[i])
                        || (chars[i] == '.'
                            && chars.get(i + 1).is_some_and(|&n| is_ident_start(n))))
                {
                    i += 1;
                }
                tokens.push(Token {
                    tok: Tok::Ident(chars[start..i].iter().collect()),
                    line,
                });
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '.' || chars[i] == '_')
                {
                    i += 1;
                }
                tokens.push(Token {
                    tok: Tok::Literal(chars[start..i].iter().collect()),
                    line,
                });
            }
            c if OPERATOR_CHARS.contains(&c) => {
                let start = i;
                while i < chars.len() && OPERATOR_CHARS.contains(&chars[i]) {
                    i += 1;
                }
                let op: String = chars[start..i].iter().collect();
                let tok = if op == "=" { Tok::Assign } else { Tok::Op(op) };
                tokens.push(Token { tok, line });
            }
            other => {
                tokens.push(Token {
                    tok: Tok::Op(other.to_string()),
                    line,
                });
                i += 1;
            }
        }
    }

    Ok(tokens)
}

/// Lex a string starting at `start`. Returns the token, the index after the
/// closing quote and the number of newlines inside the literal.
fn lex_string(chars: &[char], start: usize, line: usize) -> Result<(Tok, usize, usize), Imbalance> {
    let quote = chars[start];
    let triple = chars.get(start + 1) == Some(&quote) && chars.get(start + 2) == Some(&quote);
    let mut i = start + if triple { 3 } else { 1 };
    let mut raw = String::new();
    let mut newlines = 0;

    loop {
        let Some(&c) = chars.get(i) else {
            return Err(Imbalance::UnterminatedString { line });
        };

        if c == '\\' {
            raw.push(c);
            if let Some(&escaped) = chars.get(i + 1) {
                raw.push(escaped);
                if escaped == '\n' {
                    newlines += 1;
                }
            }
            i += 2;
            continue;
        }

        if c == quote {
            if !triple {
                i += 1;
                break;
            }
            if chars.get(i + 1) == Some(&quote) && chars.get(i + 2) == Some(&quote) {
                i += 3;
                break;
            }
        }

        if c == '\n' {
            newlines += 1;
        }
        raw.push(c);
        i += 1;
    }

    let interpolated = quote == '"' && has_unescaped_dollar(&raw);
    let text = if interpolated { raw } else { unescape(&raw) };

    Ok((Tok::Str { text, interpolated }, i, newlines))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|t| &t.tok)
    }

    fn peek_at(&self, offset: usize) -> Option<&Tok> {
        self.tokens.get(self.pos + offset).map(|t| &t.tok)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.line)
            .unwrap_or(1)
    }

    fn skip_newlines(&mut self) {
        while self.peek() == Some(&Tok::Newline) {
            self.pos += 1;
        }
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek(), Some(Tok::Newline | Tok::Semi)) {
            self.pos += 1;
        }
    }

    /// First token after any newlines, without consuming.
    fn next_significant(&self) -> Option<&Tok> {
        self.tokens[self.pos..]
            .iter()
            .map(|t| &t.tok)
            .find(|t| **t != Tok::Newline)
    }

    /// Parse statements up to the brace closing the block opened at `opened_at`,
    /// or to end of input for the top level.
    fn parse_block(&mut self, opened_at: Option<usize>) -> Result<Vec<CallNode>, Imbalance> {
        let mut nodes = Vec::new();

        loop {
            self.skip_separators();
            match self.peek() {
                None => {
                    return match opened_at {
                        Some(line) => Err(Imbalance::UnclosedBrace { line }),
                        None => Ok(nodes),
                    };
                }
                Some(Tok::RBrace) => {
                    let line = self.line();
                    self.pos += 1;
                    return match opened_at {
                        Some(_) => Ok(nodes),
                        None => Err(Imbalance::StrayClosingBrace { line }),
                    };
                }
                Some(_) => nodes.extend(self.parse_statement()?),
            }
        }
    }

    /// Parse one statement: the call itself followed by any continuation blocks.
    fn parse_statement(&mut self) -> Result<Vec<CallNode>, Imbalance> {
        let line = self.line();
        let Some(Tok::Ident(first)) = self.peek().cloned() else {
            // Expression statement such as `['a', 'b'].each { .. }`
            let mut sink = CallNode::new("", CallForm::Command, line);
            let continuations = self.finish_statement(&mut sink)?;
            let mut nodes = Vec::with_capacity(continuations.len() + 1);
            if sink.nested_block.is_some() {
                nodes.push(sink);
            }
            nodes.extend(continuations);
            return Ok(nodes);
        };
        self.pos += 1;

        let mut name = first;
        if let Some(Tok::Ident(second)) = self.peek().cloned() {
            let declares = DECLARATION_KEYWORDS.contains(&name.as_str());
            // `def x = ..` / `val x = ..` / `String x = ..`
            if declares || self.peek_at(1) == Some(&Tok::Assign) {
                self.pos += 1;
                name = second;
                if declares && self.peek() == Some(&Tok::Colon) {
                    // Kotlin type annotation: `val x: String = ..`
                    while !matches!(
                        self.peek(),
                        None | Some(Tok::Assign | Tok::Newline | Tok::Semi | Tok::RBrace)
                    ) {
                        self.pos += 1;
                    }
                }
            }
        }

        match self.peek() {
            Some(Tok::Assign) => {
                self.pos += 1;
                self.skip_newlines();
                let mut node = CallNode::new(name, CallForm::Assignment, line);
                if let Some(value) = self.parse_expression()? {
                    node.arguments.push(value);
                }
                let continuations = self.finish_statement(&mut node)?;
                Ok(with_continuations(node, continuations))
            }
            Some(Tok::LParen) => {
                self.pos += 1;
                let mut node = CallNode::new(name, CallForm::Parenthesized, line);
                node.arguments = self.parse_arguments(&Tok::RParen, line)?;
                let continuations = self.finish_statement(&mut node)?;
                Ok(with_continuations(node, continuations))
            }
            _ => {
                let mut node = CallNode::new(name, CallForm::Command, line);
                node.arguments = self.parse_command_arguments()?;
                // A bare name may open its block on the following line
                if node.arguments.is_empty()
                    && self.peek() == Some(&Tok::Newline)
                    && self.next_significant() == Some(&Tok::LBrace)
                {
                    self.skip_newlines();
                }
                let continuations = self.finish_statement(&mut node)?;
                Ok(with_continuations(node, continuations))
            }
        }
    }

    /// Consume the rest of a statement, attaching the first `{ ... }` as the
    /// nested block. Later blocks are returned as continuation nodes.
    fn finish_statement(&mut self, node: &mut CallNode) -> Result<Vec<CallNode>, Imbalance> {
        let mut continuations = Vec::new();
        // Identifiers seen since the last block, with the line of the first
        let mut words: Vec<String> = Vec::new();
        let mut words_line = None;

        loop {
            match self.peek() {
                None | Some(Tok::RBrace) => return Ok(continuations),
                Some(Tok::Newline | Tok::Semi) => {
                    self.pos += 1;
                    return Ok(continuations);
                }
                Some(Tok::LBrace) => {
                    let line = self.line();
                    self.pos += 1;
                    let block = self.parse_block(Some(line))?;
                    let label = if words.is_empty() {
                        CLOSURE_LABEL.to_string()
                    } else {
                        words.join(" ")
                    };
                    if node.nested_block.is_none() {
                        if node.name.is_empty() {
                            node.name = label;
                        }
                        node.nested_block = Some(block);
                    } else {
                        let mut continuation =
                            CallNode::new(label, CallForm::Command, words_line.unwrap_or(line));
                        continuation.nested_block = Some(block);
                        continuations.push(continuation);
                    }
                    words.clear();
                    words_line = None;
                }
                Some(Tok::Ident(word)) => {
                    words.push(word.clone());
                    words_line.get_or_insert(self.line());
                    self.pos += 1;
                }
                Some(Tok::LParen) => {
                    let line = self.line();
                    self.pos += 1;
                    self.parse_arguments(&Tok::RParen, line)?;
                }
                Some(Tok::LBracket) => {
                    let line = self.line();
                    self.pos += 1;
                    self.parse_arguments(&Tok::RBracket, line)?;
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    /// Arguments of a Groovy command call: comma-separated, ending at the line
    /// break (a trailing comma continues onto the next line).
    fn parse_command_arguments(&mut self) -> Result<Vec<Argument>, Imbalance> {
        let mut args = Vec::new();

        loop {
            if matches!(
                self.peek(),
                None | Some(Tok::Newline | Tok::Semi | Tok::RBrace | Tok::LBrace)
            ) {
                break;
            }
            let Some(arg) = self.parse_expression()? else {
                break;
            };
            args.push(arg);

            if self.peek() == Some(&Tok::Comma) {
                self.pos += 1;
                self.skip_newlines();
            } else {
                break;
            }
        }

        Ok(args)
    }

    /// Arguments up to `close`, which is consumed. Newlines are insignificant.
    fn parse_arguments(&mut self, close: &Tok, opened_at: usize) -> Result<Vec<Argument>, Imbalance> {
        let mut args = Vec::new();

        loop {
            self.skip_newlines();
            match self.peek() {
                None | Some(Tok::RBrace) => return Err(Imbalance::UnclosedParen { line: opened_at }),
                Some(tok) if tok == close => {
                    self.pos += 1;
                    return Ok(args);
                }
                Some(Tok::Comma) => {
                    self.pos += 1;
                    continue;
                }
                _ => {}
            }

            match self.parse_expression()? {
                Some(arg) => args.push(arg),
                // Mismatched closer or stray token
                None => self.pos += 1,
            }
        }
    }

    fn parse_expression(&mut self) -> Result<Option<Argument>, Imbalance> {
        let Some(mut expr) = self.parse_primary()? else {
            return Ok(None);
        };

        while let Some(Tok::Op(op)) = self.peek().cloned() {
            self.pos += 1;
            if op == "+" {
                self.skip_newlines();
            }
            let Some(rhs) = self.parse_primary()? else {
                expr = Argument::Literal(format!("{}{}", expr, op));
                break;
            };
            expr = match op.as_str() {
                "+" => concat(expr, rhs),
                "." | "?." => Argument::Literal(format!("{}{}{}", expr, op, rhs)),
                _ => Argument::Literal(format!("{} {} {}", expr, op, rhs)),
            };
        }

        Ok(Some(expr))
    }

    fn parse_primary(&mut self) -> Result<Option<Argument>, Imbalance> {
        let line = self.line();
        let Some(tok) = self.peek().cloned() else {
            return Ok(None);
        };

        let arg = match tok {
            Tok::Str { text, interpolated } => {
                self.pos += 1;
                if self.peek() == Some(&Tok::Colon) {
                    // Quoted map key: `'group': 'x'`
                    self.pos += 1;
                    self.skip_newlines();
                    let value = self
                        .parse_expression()?
                        .unwrap_or_else(|| Argument::Literal(String::new()));
                    Argument::NamedArgument {
                        key: text,
                        value: Box::new(value),
                    }
                } else {
                    Argument::StringLiteral {
                        text,
                        has_interpolation: interpolated,
                    }
                }
            }
            Tok::Ident(name) => {
                self.pos += 1;
                match self.peek() {
                    Some(Tok::Colon | Tok::Assign) => {
                        self.pos += 1;
                        self.skip_newlines();
                        let value = self
                            .parse_expression()?
                            .unwrap_or_else(|| Argument::Literal(String::new()));
                        Argument::NamedArgument {
                            key: name,
                            value: Box::new(value),
                        }
                    }
                    Some(Tok::LParen) => {
                        self.pos += 1;
                        let mut node = CallNode::new(name, CallForm::Parenthesized, line);
                        node.arguments = self.parse_arguments(&Tok::RParen, line)?;
                        Argument::Call(node)
                    }
                    _ => Argument::Reference(name),
                }
            }
            Tok::Literal(text) => {
                self.pos += 1;
                Argument::Literal(text)
            }
            Tok::LBracket => {
                self.pos += 1;
                Argument::List(self.parse_arguments(&Tok::RBracket, line)?)
            }
            Tok::LParen => {
                self.pos += 1;
                let mut inner = self.parse_arguments(&Tok::RParen, line)?;
                if inner.len() == 1 {
                    inner.remove(0)
                } else {
                    Argument::List(inner)
                }
            }
            Tok::LBrace => {
                // Closure literal
                self.pos += 1;
                self.parse_block(Some(line))?;
                Argument::Literal(CLOSURE_LABEL.to_string())
            }
            Tok::Op(op) if op == "-" || op == "!" => {
                self.pos += 1;
                match self.parse_primary()? {
                    Some(inner) => Argument::Literal(format!("{}{}", op, inner)),
                    None => Argument::Literal(op),
                }
            }
            _ => return Ok(None),
        };

        Ok(Some(arg))
    }
}

fn with_continuations(node: CallNode, continuations: Vec<CallNode>) -> Vec<CallNode> {
    let mut nodes = Vec::with_capacity(continuations.len() + 1);
    nodes.push(node);
    nodes.extend(continuations);
    nodes
}

/// Text of a string-ish argument as an interpolation template, where literal
/// `$` and `\` are escaped and references become `${name}`.
fn as_template(arg: &Argument) -> Option<String> {
    match arg {
        Argument::StringLiteral {
            text,
            has_interpolation: true,
        } => Some(text.clone()),
        Argument::StringLiteral { text, .. } => {
            Some(text.replace('\\', "\\\\").replace('$', "\\$"))
        }
        Argument::Reference(name) => Some(format!("${{{}}}", name)),
        _ => None,
    }
}

/// `'g:a:' + version` becomes the interpolated literal `"g:a:${version}"`.
fn concat(lhs: Argument, rhs: Argument) -> Argument {
    if let (
        Argument::StringLiteral {
            text: a,
            has_interpolation: false,
        },
        Argument::StringLiteral {
            text: b,
            has_interpolation: false,
        },
    ) = (&lhs, &rhs)
    {
        return Argument::StringLiteral {
            text: format!("{}{}", a, b),
            has_interpolation: false,
        };
    }

    match (as_template(&lhs), as_template(&rhs)) {
        (Some(a), Some(b)) => Argument::StringLiteral {
            text: a + &b,
            has_interpolation: true,
        },
        _ => Argument::Literal(format!("{} + {}", lhs, rhs)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string(text: &str) -> Argument {
        Argument::StringLiteral {
            text: text.to_string(),
            has_interpolation: false,
        }
    }

    #[test]
    fn test_command_and_block() {
        let nodes = scan(
            "\n\nto_ignore 'ns:c:1.0.0'\n\ndependencies {\n    implementation 'ns_a:c_a:1.0.0'\n}\n",
        )
        .unwrap();

        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].name, "to_ignore");
        assert_eq!(nodes[0].source_line, 3);
        assert_eq!(nodes[0].arguments, vec![string("ns:c:1.0.0")]);

        let deps = nodes[1].nested_block.as_ref().unwrap();
        assert_eq!(nodes[1].name, "dependencies");
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].name, "implementation");
        assert_eq!(deps[0].form, CallForm::Command);
        assert_eq!(deps[0].source_line, 6);
    }

    #[test]
    fn test_parenthesized_with_exclusion_block() {
        let nodes = scan(
            "to_ignore('ns:c:0.0.0') {\n    exclude group: 'ns', module: 'c'\n    exclude group: 'ns', module: 'c'\n}\n",
        )
        .unwrap();

        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].form, CallForm::Parenthesized);
        let block = nodes[0].nested_block.as_ref().unwrap();
        assert_eq!(block.len(), 2);
        assert_eq!(block[0].name, "exclude");
        assert_eq!(block[0].named("group"), Some(&string("ns")));
        assert_eq!(block[0].named("module"), Some(&string("c")));
    }

    #[test]
    fn test_kotlin_dsl() {
        let nodes = scan(
            "dependencies {\n    implementation(\"g:a:1.0\") {\n        exclude(group = \"x\", module = \"y\")\n    }\n    testImplementation(kotlin(\"test\"))\n}\n",
        )
        .unwrap();

        let deps = nodes[0].nested_block.as_ref().unwrap();
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].arguments, vec![string("g:a:1.0")]);
        let exclude = &deps[0].nested_block.as_ref().unwrap()[0];
        assert_eq!(exclude.named("group"), Some(&string("x")));
        assert!(matches!(&deps[1].arguments[0], Argument::Call(call) if call.name == "kotlin"));
    }

    #[test]
    fn test_nested_helper_calls() {
        let nodes = scan(
            "to_ignore instruction(include: ['*.jar'], dir: 'libs')\nto_ignore project(path: ':Lib')\n",
        )
        .unwrap();

        let Argument::Call(call) = &nodes[0].arguments[0] else {
            panic!("expected helper call");
        };
        assert_eq!(call.name, "instruction");
        assert_eq!(
            call.named("include"),
            Some(&Argument::List(vec![string("*.jar")]))
        );
        assert_eq!(call.named("dir"), Some(&string("libs")));
        assert_eq!(nodes[1].arguments[0].to_string(), "project(path: ':Lib')");
    }

    #[test]
    fn test_assignments() {
        let nodes = scan(
            "def version = '4.8.0'\nval okhttp: String = \"4.12.0\"\nString guava = '33.0'\next.kotlin_version = '1.9.22'\ngroup = 'com.example'\n",
        )
        .unwrap();

        let names: Vec<_> = nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["version", "okhttp", "guava", "ext.kotlin_version", "group"]
        );
        assert!(nodes.iter().all(|n| n.form == CallForm::Assignment));
        assert_eq!(nodes[1].arguments, vec![string("4.12.0")]);
    }

    #[test]
    fn test_interpolation_flag() {
        let nodes = scan("api \"ns_d:c_d:$version\"\napi 'ns:c:$literal'\napi \"a:b:\\$x\"\n").unwrap();

        assert_eq!(
            nodes[0].arguments[0],
            Argument::StringLiteral {
                text: "ns_d:c_d:$version".into(),
                has_interpolation: true
            }
        );
        // Single quotes never interpolate
        assert_eq!(nodes[1].arguments[0], string("ns:c:$literal"));
        // Escaped dollar is literal
        assert_eq!(nodes[2].arguments[0], string("a:b:$x"));
    }

    #[test]
    fn test_map_notation_across_lines() {
        let nodes =
            scan("implementation group: 'g',\n    name: 'a',\n    version: '1.0'\napi 'x:y:2'\n").unwrap();

        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].arguments.len(), 3);
        assert_eq!(nodes[0].named("version"), Some(&string("1.0")));
    }

    #[test]
    fn test_multiline_parenthesized() {
        let nodes = scan("implementation(\n    'g:a:1.0'\n)\napi('x:y:2')\n").unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].source_line, 1);
        assert_eq!(nodes[1].source_line, 4);
    }

    #[test]
    fn test_concatenation() {
        let nodes = scan("implementation 'g:a:' + okhttpVersion\n").unwrap();
        assert_eq!(
            nodes[0].arguments[0],
            Argument::StringLiteral {
                text: "g:a:${okhttpVersion}".into(),
                has_interpolation: true
            }
        );
    }

    #[test]
    fn test_braces_inside_strings_not_counted() {
        let nodes = scan("dependencies {\n    implementation 'a:b:{1}'\n    api \"}\"\n}\n").unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].nested_block.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn test_block_on_next_line() {
        let nodes = scan("dependencies\n{\n    api 'a:b:1'\n}\n").unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].nested_block.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_unclosed_brace() {
        let err = scan("android {\n    defaultConfig {\n    }\n").unwrap_err();
        assert_eq!(err, Imbalance::UnclosedBrace { line: 1 });
    }

    #[test]
    fn test_stray_closing_brace() {
        let err = scan("api 'a:b:1'\n}\n").unwrap_err();
        assert_eq!(err, Imbalance::StrayClosingBrace { line: 2 });
    }

    #[test]
    fn test_unclosed_paren() {
        let err = scan("dependencies {\n    implementation('a:b:1'\n}\n").unwrap_err();
        assert_eq!(err, Imbalance::UnclosedParen { line: 2 });
    }

    #[test]
    fn test_unrelated_syntax_survives() {
        let nodes = scan(
            "plugins {\n    id 'java'\n    id(\"org.jetbrains.kotlin.jvm\") version \"1.9.22\"\n}\nif (x == 1) {\n    api 'a:b:1'\n} else {\n}\ntasks.withType(JavaCompile).configureEach { options.encoding = 'UTF-8' }\n",
        )
        .unwrap();

        let names: Vec<_> = nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["plugins", "if", "else", "tasks.withType"]);
        assert_eq!(nodes[1].nested_block.as_ref().unwrap()[0].name, "api");
    }

    #[test]
    fn test_continuation_blocks_become_siblings() {
        let nodes = scan(
            "if (useNew) {\n    api 'a:b:1'\n} else if (legacy) {\n    api 'c:d:2'\n} else {\n    api 'e:f:3'\n}\ntry { api 'g:h:4' } catch (Exception e) { api 'i:j:5' } finally { api 'k:l:6' }\n",
        )
        .unwrap();

        let names: Vec<_> = nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["if", "else if", "else", "try", "catch", "finally"]);
        assert_eq!(nodes[1].source_line, 3);
        assert_eq!(nodes[2].source_line, 5);
        for node in &nodes {
            assert_eq!(node.nested_block.as_ref().unwrap().len(), 1);
        }
    }

    #[test]
    fn test_expression_statement_block_kept() {
        let nodes = scan("['a', 'b'].each {\n    api \"g:$it:1\"\n}\n").unwrap();

        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].name, "each");
        assert_eq!(nodes[0].nested_block.as_ref().unwrap()[0].name, "api");
    }
}
