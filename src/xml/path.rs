use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use super::document::Element;

/// Errors produced when a path expression cannot be compiled.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("empty path expression")]
    Empty,

    #[error("empty step in path `{0}`")]
    EmptyStep(String),

    #[error("unterminated predicate in path `{0}`")]
    Unterminated(String),

    #[error("unsupported predicate `[{0}]`")]
    UnsupportedPredicate(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NameTest {
    Any,
    Named(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Predicate {
    HasAttr(String),
    LacksAttr(String),
    AttrEquals(String, String),
    /// 1-based position among the siblings matched so far
    Position(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    name: NameTest,
    predicates: Vec<Predicate>,
}

/// A compiled path expression.
///
/// Supports the subset of XPath that feed schemas need: child steps separated
/// by `/`, the `*` wildcard, `[@attr]`, `[not(@attr)]`, `[@attr='value']` and
/// `[n]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    expr: String,
    absolute: bool,
    steps: Vec<Step>,
}

impl Path {
    /// Compiles `expr`.
    ///
    /// # Errors
    ///
    /// Returns [`PathError`] for empty expressions or steps, unterminated
    /// brackets and predicate forms outside the supported subset.
    pub fn parse(expr: &str) -> Result<Self, PathError> {
        let trimmed = expr.trim();
        let (absolute, body) = match trimmed.strip_prefix('/') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        if body.is_empty() {
            return Err(PathError::Empty);
        }

        let steps = split_steps(body, expr)?
            .into_iter()
            .map(|raw| parse_step(raw, expr))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Path {
            expr: trimmed.to_owned(),
            absolute,
            steps,
        })
    }

    /// Whether the expression started with `/`.
    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    pub fn as_str(&self) -> &str {
        &self.expr
    }

    /// Matches the first step against `root` itself, then descends.
    pub(crate) fn select_from_document<'a>(&self, root: &'a Element) -> Vec<&'a Element> {
        let mut steps = self.steps.iter();
        let Some(first) = steps.next() else {
            return Vec::new();
        };
        let mut current = first.apply(std::iter::once(root));
        for step in steps {
            current = current
                .into_iter()
                .flat_map(|element| step.apply(element.children()))
                .collect();
        }
        current
    }

    /// Relative paths descend from `context`'s children. Absolute paths treat
    /// `context` as the top of the tree.
    pub(crate) fn select_from<'a>(&self, context: &'a Element) -> Vec<&'a Element> {
        if self.absolute {
            return self.select_from_document(context);
        }
        let mut current = vec![context];
        for step in &self.steps {
            current = current
                .into_iter()
                .flat_map(|element| step.apply(element.children()))
                .collect();
        }
        current
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Path::parse(s)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expr)
    }
}

impl Step {
    fn apply<'a>(&self, siblings: impl Iterator<Item = &'a Element>) -> Vec<&'a Element> {
        let mut matched: Vec<&Element> = siblings
            .filter(|element| match &self.name {
                NameTest::Any => true,
                NameTest::Named(name) => element.name() == name,
            })
            .collect();

        for predicate in &self.predicates {
            matched = match predicate {
                Predicate::HasAttr(key) => matched
                    .into_iter()
                    .filter(|element| element.attr(key).is_some())
                    .collect(),
                Predicate::LacksAttr(key) => matched
                    .into_iter()
                    .filter(|element| element.attr(key).is_none())
                    .collect(),
                Predicate::AttrEquals(key, value) => matched
                    .into_iter()
                    .filter(|element| element.attr(key) == Some(value.as_str()))
                    .collect(),
                Predicate::Position(n) => matched.get(n - 1).copied().into_iter().collect(),
            };
        }
        matched
    }
}

/// Splits on `/` outside of brackets and quotes.
fn split_steps<'a>(body: &'a str, expr: &str) -> Result<Vec<&'a str>, PathError> {
    let mut steps = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (idx, c) in body.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, '/') if depth == 0 => {
                steps.push(&body[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    if depth != 0 || quote.is_some() {
        return Err(PathError::Unterminated(expr.to_owned()));
    }
    steps.push(&body[start..]);

    if steps.iter().any(|step| step.trim().is_empty()) {
        return Err(PathError::EmptyStep(expr.to_owned()));
    }
    Ok(steps)
}

fn parse_step(raw: &str, expr: &str) -> Result<Step, PathError> {
    let raw = raw.trim();
    let name_end = raw.find('[').unwrap_or(raw.len());
    let name = match raw[..name_end].trim() {
        "" => return Err(PathError::EmptyStep(expr.to_owned())),
        "*" => NameTest::Any,
        name => NameTest::Named(name.to_owned()),
    };

    let mut predicates = Vec::new();
    let mut rest = &raw[name_end..];
    while !rest.is_empty() {
        let inner_start = rest
            .strip_prefix('[')
            .ok_or_else(|| PathError::UnsupportedPredicate(rest.to_owned()))?;
        let close = find_closing_bracket(inner_start)
            .ok_or_else(|| PathError::Unterminated(expr.to_owned()))?;
        predicates.push(parse_predicate(&inner_start[..close])?);
        rest = inner_start[close + 1..].trim_start();
    }

    Ok(Step { name, predicates })
}

fn find_closing_bracket(s: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (idx, c) in s.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, ']') => return Some(idx),
            _ => {}
        }
    }
    None
}

fn parse_predicate(inner: &str) -> Result<Predicate, PathError> {
    let inner = inner.trim();
    let unsupported = || PathError::UnsupportedPredicate(inner.to_owned());

    if let Ok(position) = inner.parse::<usize>() {
        return match position {
            0 => Err(unsupported()),
            n => Ok(Predicate::Position(n)),
        };
    }

    if let Some(negated) = inner
        .strip_prefix("not(")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        return match parse_predicate(negated) {
            Ok(Predicate::HasAttr(key)) => Ok(Predicate::LacksAttr(key)),
            _ => Err(unsupported()),
        };
    }

    let attr = inner.strip_prefix('@').ok_or_else(unsupported)?;
    match attr.split_once('=') {
        None => {
            let key = attr.trim();
            if key.is_empty() {
                return Err(unsupported());
            }
            Ok(Predicate::HasAttr(key.to_owned()))
        }
        Some((key, value)) => {
            let key = key.trim();
            let value = value.trim();
            let unquoted = value
                .strip_prefix('\'')
                .and_then(|v| v.strip_suffix('\''))
                .or_else(|| value.strip_prefix('"').and_then(|v| v.strip_suffix('"')))
                .ok_or_else(unsupported)?;
            if key.is_empty() {
                return Err(unsupported());
            }
            Ok(Predicate::AttrEquals(key.to_owned(), unquoted.to_owned()))
        }
    }
}
