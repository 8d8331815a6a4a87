//! Variable resolution for `$name` and `${name}` references.
//!
//! Lookup order for each candidate name:
//! - local bindings visible at the current point of the walk (innermost first)
//! - external substitutions from the run config
//! - `gradle.properties`
//!
//! A local binding whose value is unknown still stops the search, so a
//! manifest-local name never silently picks up an unrelated external value.

use std::collections::BTreeMap;

use super::ast::Argument;
use super::scanner::unescape_char;

/// Leading segments that qualify a property without changing its name.
const QUALIFIERS: &[&str] = &["project", "rootProject", "ext", "extra"];

/// Prefixes that bind into the project-wide `ext` namespace.
const EXT_PREFIXES: &[&str] = &["project.ext.", "rootProject.ext.", "ext.", "extra."];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableBinding {
    pub name: String,
    /// `None` when the right-hand side is not a resolvable literal.
    pub value: Option<String>,
    pub defining_scope_id: usize,
}

#[derive(Debug)]
struct Scope {
    id: usize,
    bindings: BTreeMap<String, VariableBinding>,
}

impl Scope {
    fn new(id: usize) -> Self {
        Self {
            id,
            bindings: BTreeMap::new(),
        }
    }
}

/// Result of interpolating a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpolated {
    /// Text with resolved references substituted; unresolved ones are kept verbatim.
    pub text: String,
    pub unresolved: Vec<String>,
}

impl Interpolated {
    pub fn is_resolved(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Scoped variable table for one manifest walk.
#[derive(Debug)]
pub struct Resolver<'a> {
    scopes: Vec<Scope>,
    next_scope_id: usize,
    external: &'a BTreeMap<String, String>,
    properties: &'a BTreeMap<String, String>,
}

impl<'a> Resolver<'a> {
    pub fn new(
        external: &'a BTreeMap<String, String>,
        properties: &'a BTreeMap<String, String>,
    ) -> Self {
        Self {
            scopes: vec![Scope::new(0)],
            next_scope_id: 1,
            external,
            properties,
        }
    }

    /// Open a block scope. Returns its id.
    pub fn enter_scope(&mut self) -> usize {
        let id = self.next_scope_id;
        self.next_scope_id += 1;
        self.scopes.push(Scope::new(id));
        id
    }

    /// Close the innermost block scope, dropping its bindings. The file scope
    /// is never closed.
    pub fn exit_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Bind `name` in the innermost scope.
    pub fn bind(&mut self, name: &str, value: Option<String>) {
        if let Some(scope) = self.scopes.last_mut() {
            insert(scope, name, value);
        }
    }

    /// Bind `name` in the file scope (`ext` properties).
    pub fn bind_root(&mut self, name: &str, value: Option<String>) {
        insert(&mut self.scopes[0], name, value);
    }

    /// Whether a local binding named exactly `name` is visible.
    pub fn is_bound(&self, name: &str) -> bool {
        self.binding(name).is_some()
    }

    /// The innermost visible binding named `name`.
    pub fn binding(&self, name: &str) -> Option<&VariableBinding> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.bindings.get(name))
    }

    /// Value of `name`, or `None` if unknown.
    pub fn lookup(&self, name: &str) -> Option<String> {
        for candidate in candidates(name) {
            if let Some(binding) = self.binding(candidate) {
                return binding.value.clone();
            }
            if let Some(value) = self.external.get(candidate) {
                return Some(value.clone());
            }
            if let Some(value) = self.properties.get(candidate) {
                return Some(value.clone());
            }
        }
        None
    }

    /// Substitute `$name` and `${name}` in a template that still carries its
    /// source escapes.
    pub fn interpolate(&self, template: &str) -> Interpolated {
        let chars: Vec<char> = template.chars().collect();
        let mut text = String::with_capacity(template.len());
        let mut unresolved = Vec::new();
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            match c {
                '\\' => {
                    if let Some(&escaped) = chars.get(i + 1) {
                        text.push(unescape_char(escaped));
                    }
                    i += 2;
                }
                '$' if chars.get(i + 1) == Some(&'{') => {
                    let Some(close) = chars[i + 2..].iter().position(|&c| c == '}') else {
                        text.extend(&chars[i..]);
                        break;
                    };
                    let end = i + 2 + close;
                    let expr: String = chars[i + 2..end].iter().collect();
                    let raw: String = chars[i..=end].iter().collect();
                    self.substitute(expr.trim(), &raw, &mut text, &mut unresolved);
                    i = end + 1;
                }
                '$' if chars.get(i + 1).is_some_and(|&n| n.is_alphabetic() || n == '_') => {
                    let mut end = i + 1;
                    while end < chars.len()
                        && (chars[end].is_alphanumeric()
                            || chars[end] == '_'
                            || (chars[end] == '.'
                                && chars
                                    .get(end + 1)
                                    .is_some_and(|&n| n.is_alphabetic() || n == '_')))
                    {
                        end += 1;
                    }
                    let name: String = chars[i + 1..end].iter().collect();
                    let raw: String = chars[i..end].iter().collect();
                    self.substitute(&name, &raw, &mut text, &mut unresolved);
                    i = end;
                }
                _ => {
                    text.push(c);
                    i += 1;
                }
            }
        }

        Interpolated { text, unresolved }
    }

    /// Value of an argument used as the right-hand side of a binding.
    pub fn evaluate(&self, arg: &Argument) -> Option<String> {
        match arg {
            Argument::StringLiteral {
                text,
                has_interpolation: false,
            } => Some(text.clone()),
            Argument::StringLiteral { text, .. } => {
                let interpolated = self.interpolate(text);
                interpolated.is_resolved().then_some(interpolated.text)
            }
            Argument::Reference(name) => self.lookup(name),
            Argument::Literal(text) if text.starts_with(|c: char| c.is_ascii_digit()) => {
                Some(text.clone())
            }
            _ => None,
        }
    }

    fn substitute(&self, name: &str, raw: &str, text: &mut String, unresolved: &mut Vec<String>) {
        match self.lookup(name) {
            Some(value) => text.push_str(&value),
            None => {
                text.push_str(raw);
                unresolved.push(name.to_string());
            }
        }
    }
}

fn insert(scope: &mut Scope, name: &str, value: Option<String>) {
    scope.bindings.insert(
        name.to_string(),
        VariableBinding {
            name: name.to_string(),
            value,
            defining_scope_id: scope.id,
        },
    );
}

/// `name` as written, then with each leading qualifier segment removed:
/// `project.ext.okhttp` → `ext.okhttp` → `okhttp`.
fn candidates(name: &str) -> Vec<&str> {
    let mut out = vec![name];
    let mut rest = name;
    while let Some((head, tail)) = rest.split_once('.') {
        if !QUALIFIERS.contains(&head) {
            break;
        }
        out.push(tail);
        rest = tail;
    }
    out
}

/// Property name bound by an `ext.name = ..` style assignment.
pub fn ext_binding_name(name: &str) -> Option<&str> {
    EXT_PREFIXES
        .iter()
        .find_map(|prefix| name.strip_prefix(prefix))
        .filter(|rest| !rest.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_binding_visible_only_in_scope() {
        let empty = BTreeMap::new();
        let mut resolver = Resolver::new(&empty, &empty);

        resolver.bind("a", Some("1".into()));
        let inner = resolver.enter_scope();
        resolver.bind("b", Some("2".into()));
        assert_eq!(resolver.binding("b").unwrap().defining_scope_id, inner);
        assert_eq!(resolver.lookup("a").as_deref(), Some("1"));
        assert_eq!(resolver.lookup("b").as_deref(), Some("2"));

        resolver.exit_scope();
        assert!(resolver.is_bound("a"));
        assert!(!resolver.is_bound("b"));
        assert_eq!(resolver.lookup("b"), None);
    }

    #[test]
    fn test_inner_binding_shadows_outer() {
        let empty = BTreeMap::new();
        let mut resolver = Resolver::new(&empty, &empty);

        resolver.bind("v", Some("outer".into()));
        resolver.enter_scope();
        resolver.bind("v", Some("inner".into()));
        assert_eq!(resolver.lookup("v").as_deref(), Some("inner"));
        resolver.exit_scope();
        assert_eq!(resolver.lookup("v").as_deref(), Some("outer"));
    }

    #[test]
    fn test_local_before_external_before_properties() {
        let external = map(&[("version", "ext"), ("okhttp", "ext")]);
        let properties = map(&[("version", "prop"), ("okhttp", "prop"), ("kotlin", "prop")]);
        let mut resolver = Resolver::new(&external, &properties);
        resolver.bind("version", Some("local".into()));

        assert_eq!(resolver.lookup("version").as_deref(), Some("local"));
        assert_eq!(resolver.lookup("okhttp").as_deref(), Some("ext"));
        assert_eq!(resolver.lookup("kotlin").as_deref(), Some("prop"));
    }

    #[test]
    fn test_unknown_local_value_stops_lookup() {
        let external = map(&[("version", "4.8.0")]);
        let empty = BTreeMap::new();
        let mut resolver = Resolver::new(&external, &empty);
        resolver.bind("version", None);

        assert_eq!(resolver.lookup("version"), None);
    }

    #[test]
    fn test_qualified_names() {
        let empty = BTreeMap::new();
        let mut resolver = Resolver::new(&empty, &empty);
        resolver.bind_root("kotlin_version", Some("1.9.22".into()));

        assert_eq!(
            resolver.lookup("rootProject.ext.kotlin_version").as_deref(),
            Some("1.9.22")
        );
        assert_eq!(resolver.lookup("project.kotlin_version").as_deref(), Some("1.9.22"));
        assert_eq!(resolver.lookup("libs.kotlin_version"), None);
    }

    #[test]
    fn test_bind_root_from_nested_scope() {
        let empty = BTreeMap::new();
        let mut resolver = Resolver::new(&empty, &empty);
        resolver.enter_scope();
        resolver.bind_root("okhttp", Some("4.12.0".into()));
        resolver.exit_scope();

        assert_eq!(resolver.lookup("okhttp").as_deref(), Some("4.12.0"));
    }

    #[test]
    fn test_interpolate() {
        let external = map(&[("version", "4.8.0")]);
        let empty = BTreeMap::new();
        let resolver = Resolver::new(&external, &empty);

        let full = resolver.interpolate("ns_d:c_d:$version");
        assert_eq!(full.text, "ns_d:c_d:4.8.0");
        assert!(full.is_resolved());

        let braced = resolver.interpolate("ns_d:c_d:${version}");
        assert_eq!(braced.text, "ns_d:c_d:4.8.0");

        let missing = resolver.interpolate("g:a:${other}");
        assert_eq!(missing.text, "g:a:${other}");
        assert_eq!(missing.unresolved, vec!["other".to_string()]);
    }

    #[test]
    fn test_interpolate_escapes() {
        let empty = BTreeMap::new();
        let resolver = Resolver::new(&empty, &empty);

        let result = resolver.interpolate("cost: \\$5 \\\"x\\\"");
        assert_eq!(result.text, "cost: $5 \"x\"");
        assert!(result.is_resolved());
    }

    #[test]
    fn test_evaluate() {
        let empty = BTreeMap::new();
        let mut resolver = Resolver::new(&empty, &empty);
        resolver.bind("base", Some("1.2".into()));

        let plain = Argument::StringLiteral {
            text: "4.8.0".into(),
            has_interpolation: false,
        };
        let templated = Argument::StringLiteral {
            text: "$base.3".into(),
            has_interpolation: true,
        };
        assert_eq!(resolver.evaluate(&plain).as_deref(), Some("4.8.0"));
        assert_eq!(resolver.evaluate(&Argument::Reference("base".into())).as_deref(), Some("1.2"));
        assert_eq!(resolver.evaluate(&Argument::Literal("42".into())).as_deref(), Some("42"));
        // A dot followed by a digit ends the reference
        assert_eq!(resolver.evaluate(&templated).as_deref(), Some("1.2.3"));
        assert_eq!(resolver.evaluate(&Argument::Literal("{ .. }".into())), None);
    }

    #[test]
    fn test_ext_binding_name() {
        assert_eq!(ext_binding_name("ext.okhttp"), Some("okhttp"));
        assert_eq!(ext_binding_name("project.ext.okhttp"), Some("okhttp"));
        assert_eq!(ext_binding_name("version"), None);
        assert_eq!(ext_binding_name("ext."), None);
    }
}
