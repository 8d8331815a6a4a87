//! Call tree produced by the statement scanner.

use std::fmt;

/// How a statement was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallForm {
    /// `name arg, key: value`
    Command,
    /// `name(arg, key = value)`
    Parenthesized,
    /// `def name = value`, `val name = value`, `name = value`
    Assignment,
}

/// One argument of a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    /// Quoted string. `text` is unescaped unless `has_interpolation` is set, in
    /// which case it keeps the source escapes for the resolver.
    StringLiteral { text: String, has_interpolation: bool },
    /// `key: value` (Groovy) or `key = value` (Kotlin).
    NamedArgument { key: String, value: Box<Argument> },
    /// Bare (possibly dotted) identifier.
    Reference(String),
    /// Helper call used as an argument: `project(':lib')`, `platform('g:a:v')`.
    Call(CallNode),
    /// `[a, b]`
    List(Vec<Argument>),
    /// Numbers, closures and expressions we do not interpret.
    Literal(String),
}

impl Argument {
    pub fn is_named(&self) -> bool {
        matches!(self, Argument::NamedArgument { .. })
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::StringLiteral {
                text,
                has_interpolation: false,
            } => write!(f, "'{}'", text),
            Argument::StringLiteral { text, .. } => write!(f, "\"{}\"", text),
            Argument::NamedArgument { key, value } => write!(f, "{}: {}", key, value),
            Argument::Reference(name) => write!(f, "{}", name),
            Argument::Call(node) => write!(f, "{}", node),
            Argument::List(items) => write!(f, "[{}]", join(items)),
            Argument::Literal(text) => write!(f, "{}", text),
        }
    }
}

/// One statement: a call, with an optional trailing `{ ... }` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallNode {
    pub name: String,
    pub form: CallForm,
    pub arguments: Vec<Argument>,
    pub nested_block: Option<Vec<CallNode>>,
    pub source_line: usize,
}

impl CallNode {
    pub fn new(name: impl Into<String>, form: CallForm, source_line: usize) -> Self {
        Self {
            name: name.into(),
            form,
            arguments: Vec::new(),
            nested_block: None,
            source_line,
        }
    }

    /// Value of the named argument `key`, if present.
    pub fn named(&self, key: &str) -> Option<&Argument> {
        self.arguments.iter().find_map(|arg| match arg {
            Argument::NamedArgument { key: k, value } if k == key => Some(value.as_ref()),
            _ => None,
        })
    }

    /// Arguments that are not `key: value` pairs.
    pub fn positional(&self) -> impl Iterator<Item = &Argument> {
        self.arguments.iter().filter(|arg| !arg.is_named())
    }

    /// Arguments rendered back to source-like text.
    pub fn arguments_text(&self) -> String {
        join(&self.arguments)
    }
}

impl fmt::Display for CallNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.form {
            CallForm::Command if self.arguments.is_empty() => write!(f, "{}", self.name),
            CallForm::Command => write!(f, "{} {}", self.name, self.arguments_text()),
            CallForm::Parenthesized => write!(f, "{}({})", self.name, self.arguments_text()),
            CallForm::Assignment => write!(f, "{} = {}", self.name, self.arguments_text()),
        }
    }
}

fn join(args: &[Argument]) -> String {
    args.iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
