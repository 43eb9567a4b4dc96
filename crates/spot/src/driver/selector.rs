//! Locator evaluation for the in-memory DOM.
//!
//! Covers the CSS and XPath 1.0 subset page objects use in practice:
//! compound CSS selectors with descendant/child combinators, and XPath
//! location paths with the common axes, positional and string predicates.

use crate::locator::By;
use crate::result::{SpotError, SpotResult};

/// Read access to a node tree, implemented by the mock DOM.
///
/// Document roots carry a tag starting with `#`; they never match element
/// tests and are never returned from a search.
pub(crate) trait DomTree {
    fn tag(&self, node: usize) -> &str;
    fn attribute(&self, node: usize, name: &str) -> Option<&str>;
    fn children(&self, node: usize) -> &[usize];
    fn parent(&self, node: usize) -> Option<usize>;
    fn own_text(&self, node: usize) -> &str;

    fn is_element(&self, node: usize) -> bool {
        !self.tag(node).starts_with('#')
    }
}

/// Find every element matching `by` from `context` (an element or a document root)
pub(crate) fn select<D: DomTree>(dom: &D, context: usize, by: &By) -> SpotResult<Vec<usize>> {
    let found = match by {
        By::XPath(expr) => XPath::parse(expr)?.evaluate(dom, context)?,
        By::LinkText(text) => descendants(dom, context)
            .into_iter()
            .filter(|&n| dom.tag(n) == "a" && normalize_space(&string_value(dom, n)) == *text)
            .collect(),
        By::PartialLinkText(text) => descendants(dom, context)
            .into_iter()
            .filter(|&n| dom.tag(n) == "a" && string_value(dom, n).contains(text.as_str()))
            .collect(),
        other => {
            let Some(css) = other.to_css() else {
                return Err(SpotError::driver(format!("unsupported locator {other}")));
            };
            CssSelector::parse(&css)?.select(dom, context)
        }
    };
    Ok(found.into_iter().filter(|&n| dom.is_element(n)).collect())
}

fn descendants<D: DomTree>(dom: &D, node: usize) -> Vec<usize> {
    let mut out = Vec::new();
    collect_descendants(dom, node, &mut out);
    out
}

fn collect_descendants<D: DomTree>(dom: &D, node: usize, out: &mut Vec<usize>) {
    for &child in dom.children(node) {
        out.push(child);
        collect_descendants(dom, child, out);
    }
}

/// XPath string-value: all descendant text, in document order
pub(crate) fn string_value<D: DomTree>(dom: &D, node: usize) -> String {
    let mut value = dom.own_text(node).to_string();
    for &child in dom.children(node) {
        value.push_str(&string_value(dom, child));
    }
    value
}

pub(crate) fn normalize_space(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn invalid(kind: &str, expr: &str, message: impl Into<String>) -> SpotError {
    SpotError::driver(format!(
        "invalid {kind} '{expr}': {}",
        message.into()
    ))
}

// =============================================================================
// CSS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrOp {
    Exists,
    Equals,
    Contains,
    Prefix,
    Suffix,
    Word,
}

#[derive(Debug, Clone)]
struct AttrMatcher {
    name: String,
    op: AttrOp,
    value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Pseudo {
    FirstChild,
    LastChild,
    NthChild(usize),
}

#[derive(Debug, Clone, Default)]
struct Compound {
    universal: bool,
    tag: Option<String>,
    ids: Vec<String>,
    classes: Vec<String>,
    attrs: Vec<AttrMatcher>,
    pseudos: Vec<Pseudo>,
}

impl Compound {
    fn is_empty(&self) -> bool {
        !self.universal
            && self.tag.is_none()
            && self.ids.is_empty()
            && self.classes.is_empty()
            && self.attrs.is_empty()
            && self.pseudos.is_empty()
    }

    fn matches<D: DomTree>(&self, dom: &D, node: usize) -> bool {
        if !dom.is_element(node) {
            return false;
        }
        if let Some(tag) = &self.tag {
            if !dom.tag(node).eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if self
            .ids
            .iter()
            .any(|id| dom.attribute(node, "id") != Some(id.as_str()))
        {
            return false;
        }
        let classes = dom.attribute(node, "class").unwrap_or_default();
        if self
            .classes
            .iter()
            .any(|class| !classes.split_whitespace().any(|c| c == class))
        {
            return false;
        }
        self.attrs.iter().all(|m| m.matches(dom, node))
            && self.pseudos.iter().all(|p| p.matches(dom, node))
    }
}

impl AttrMatcher {
    fn matches<D: DomTree>(&self, dom: &D, node: usize) -> bool {
        let Some(actual) = dom.attribute(node, &self.name) else {
            return false;
        };
        match self.op {
            AttrOp::Exists => true,
            AttrOp::Equals => actual == self.value,
            AttrOp::Contains => actual.contains(self.value.as_str()),
            AttrOp::Prefix => actual.starts_with(self.value.as_str()),
            AttrOp::Suffix => actual.ends_with(self.value.as_str()),
            AttrOp::Word => actual.split_whitespace().any(|w| w == self.value),
        }
    }
}

impl Pseudo {
    fn matches<D: DomTree>(&self, dom: &D, node: usize) -> bool {
        let Some(parent) = dom.parent(node) else {
            return false;
        };
        let siblings: Vec<usize> = dom
            .children(parent)
            .iter()
            .copied()
            .filter(|&n| dom.is_element(n))
            .collect();
        let position = siblings.iter().position(|&n| n == node);
        match self {
            Self::FirstChild => position == Some(0),
            Self::LastChild => position.is_some_and(|p| p + 1 == siblings.len()),
            Self::NthChild(n) => position.is_some_and(|p| p + 1 == *n),
        }
    }
}

#[derive(Debug, Clone)]
struct ComplexSelector {
    parts: Vec<(Combinator, Compound)>,
}

impl ComplexSelector {
    fn matches_at<D: DomTree>(&self, dom: &D, index: usize, node: usize) -> bool {
        let (combinator, compound) = &self.parts[index];
        if !compound.matches(dom, node) {
            return false;
        }
        if index == 0 {
            return true;
        }
        match combinator {
            Combinator::Child => dom
                .parent(node)
                .is_some_and(|p| self.matches_at(dom, index - 1, p)),
            Combinator::Descendant => {
                let mut current = dom.parent(node);
                while let Some(ancestor) = current {
                    if self.matches_at(dom, index - 1, ancestor) {
                        return true;
                    }
                    current = dom.parent(ancestor);
                }
                false
            }
        }
    }
}

#[derive(Debug, Clone)]
struct CssSelector {
    groups: Vec<ComplexSelector>,
}

impl CssSelector {
    fn parse(css: &str) -> SpotResult<Self> {
        let groups = split_top_level(css, ',')
            .into_iter()
            .map(|group| parse_complex(css, group.trim()))
            .collect::<SpotResult<Vec<_>>>()?;
        if groups.is_empty() {
            return Err(invalid("css selector", css, "empty selector"));
        }
        Ok(Self { groups })
    }

    fn select<D: DomTree>(&self, dom: &D, context: usize) -> Vec<usize> {
        descendants(dom, context)
            .into_iter()
            .filter(|&n| {
                self.groups
                    .iter()
                    .any(|g| g.matches_at(dom, g.parts.len() - 1, n))
            })
            .collect()
    }
}

fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0_i32;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match (quote, c) {
            (Some(q), _) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '[' | '(') => depth += 1,
            (None, ']' | ')') => depth -= 1,
            (None, _) if c == separator && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

fn read_ident(chars: &[char], mut i: usize) -> (String, usize) {
    let start = i;
    while i < chars.len() && is_ident_char(chars[i]) {
        i += 1;
    }
    (chars[start..i].iter().collect(), i)
}

fn parse_complex(css: &str, group: &str) -> SpotResult<ComplexSelector> {
    let chars: Vec<char> = group.chars().collect();
    let mut parts = Vec::new();
    let mut i = 0;
    loop {
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        if i >= chars.len() {
            break;
        }
        let mut combinator = Combinator::Descendant;
        if chars[i] == '>' {
            if parts.is_empty() {
                return Err(invalid("css selector", css, "leading '>'"));
            }
            combinator = Combinator::Child;
            i += 1;
            while i < chars.len() && chars[i].is_whitespace() {
                i += 1;
            }
        }
        let (compound, next) = parse_compound(css, &chars, i)?;
        if compound.is_empty() {
            return Err(invalid(
                "css selector",
                css,
                format!("unexpected character at {next}"),
            ));
        }
        parts.push((combinator, compound));
        i = next;
    }
    if parts.is_empty() {
        return Err(invalid("css selector", css, "empty selector group"));
    }
    Ok(ComplexSelector { parts })
}

fn parse_compound(css: &str, chars: &[char], mut i: usize) -> SpotResult<(Compound, usize)> {
    let mut compound = Compound::default();
    if i < chars.len() && chars[i] == '*' {
        i += 1;
        compound.universal = true;
    } else if i < chars.len() && is_ident_char(chars[i]) {
        let (tag, next) = read_ident(chars, i);
        compound.tag = Some(tag);
        i = next;
    }
    while i < chars.len() {
        match chars[i] {
            '#' => {
                let (id, next) = read_ident(chars, i + 1);
                compound.ids.push(id);
                i = next;
            }
            '.' => {
                let (class, next) = read_ident(chars, i + 1);
                compound.classes.push(class);
                i = next;
            }
            '[' => {
                let end = attribute_end(chars, i)
                    .ok_or_else(|| invalid("css selector", css, "unclosed '['"))?;
                let body: String = chars[i + 1..end].iter().collect();
                compound.attrs.push(parse_attr(css, &body)?);
                i = end + 1;
            }
            ':' => {
                let (name, next) = read_ident(chars, i + 1);
                i = next;
                let pseudo = match name.as_str() {
                    "first-child" => Pseudo::FirstChild,
                    "last-child" => Pseudo::LastChild,
                    "nth-child" => {
                        let end = chars[i..]
                            .iter()
                            .position(|&c| c == ')')
                            .map(|p| p + i)
                            .ok_or_else(|| invalid("css selector", css, "unclosed '('"))?;
                        let arg: String = chars[i + 1..end].iter().collect();
                        i = end + 1;
                        Pseudo::NthChild(arg.trim().parse().map_err(|_| {
                            invalid("css selector", css, format!("bad nth-child '{arg}'"))
                        })?)
                    }
                    other => {
                        return Err(invalid(
                            "css selector",
                            css,
                            format!("unsupported pseudo-class ':{other}'"),
                        ))
                    }
                };
                compound.pseudos.push(pseudo);
            }
            _ => break,
        }
    }
    Ok((compound, i))
}

/// Index of the `]` closing the bracket at `open`; quoted values are skipped
fn attribute_end(chars: &[char], open: usize) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (at, &c) in chars.iter().enumerate().skip(open + 1) {
        match (quote, c) {
            (Some(q), _) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, ']') => return Some(at),
            _ => {}
        }
    }
    None
}

fn parse_attr(css: &str, body: &str) -> SpotResult<AttrMatcher> {
    const OPS: [(&str, AttrOp); 5] = [
        ("*=", AttrOp::Contains),
        ("^=", AttrOp::Prefix),
        ("$=", AttrOp::Suffix),
        ("~=", AttrOp::Word),
        ("=", AttrOp::Equals),
    ];
    let head = &body[..body.find(['"', '\'']).unwrap_or(body.len())];
    for (token, op) in OPS {
        if let Some(at) = head.find(token) {
            let name = &body[..at];
            let value = body[at + token.len()..].trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                .unwrap_or(value);
            let name = name.trim();
            if name.is_empty() {
                return Err(invalid("css selector", css, "attribute without name"));
            }
            return Ok(AttrMatcher {
                name: name.to_string(),
                op,
                value: value.to_string(),
            });
        }
    }
    Ok(AttrMatcher {
        name: body.trim().to_string(),
        op: AttrOp::Exists,
        value: String::new(),
    })
}

// =============================================================================
// XPath
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Slash,
    DoubleSlash,
    LBracket,
    RBracket,
    LParen,
    RParen,
    At,
    Comma,
    Pipe,
    Eq,
    NotEq,
    Dot,
    DotDot,
    Star,
    DoubleColon,
    Name(String),
    Literal(String),
    Number(f64),
}

fn tokenize(expr: &str) -> SpotResult<Vec<Token>> {
    let chars: Vec<char> = expr.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            c if c.is_whitespace() => i += 1,
            '/' if next == Some('/') => {
                tokens.push(Token::DoubleSlash);
                i += 2;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '@' => {
                tokens.push(Token::At);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '|' => {
                tokens.push(Token::Pipe);
                i += 1;
            }
            '=' => {
                tokens.push(Token::Eq);
                i += 1;
            }
            '!' if next == Some('=') => {
                tokens.push(Token::NotEq);
                i += 2;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            ':' if next == Some(':') => {
                tokens.push(Token::DoubleColon);
                i += 2;
            }
            '.' if next == Some('.') => {
                tokens.push(Token::DotDot);
                i += 2;
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '\'' | '"' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|&q| q == c)
                    .map(|p| p + i + 1)
                    .ok_or_else(|| invalid("xpath", expr, "unterminated string literal"))?;
                tokens.push(Token::Literal(chars[i + 1..end].iter().collect()));
                i = end + 1;
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let raw: String = chars[start..i].iter().collect();
                let number = raw
                    .parse()
                    .map_err(|_| invalid("xpath", expr, format!("bad number '{raw}'")))?;
                tokens.push(Token::Number(number));
            }
            c if c.is_alphabetic() || c == '_' => {
                let (name, end) = read_ident(&chars, i);
                tokens.push(Token::Name(name));
                i = end;
            }
            other => {
                return Err(invalid(
                    "xpath",
                    expr,
                    format!("unexpected character '{other}'"),
                ))
            }
        }
    }
    Ok(tokens)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    Parent,
    Ancestor,
    AncestorOrSelf,
    FollowingSibling,
    PrecedingSibling,
    SelfAxis,
}

impl Axis {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "child" => Self::Child,
            "descendant" => Self::Descendant,
            "descendant-or-self" => Self::DescendantOrSelf,
            "parent" => Self::Parent,
            "ancestor" => Self::Ancestor,
            "ancestor-or-self" => Self::AncestorOrSelf,
            "following-sibling" => Self::FollowingSibling,
            "preceding-sibling" => Self::PrecedingSibling,
            "self" => Self::SelfAxis,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeTest {
    AnyElement,
    Named(String),
    AnyNode,
}

#[derive(Debug, Clone)]
struct Step {
    descend: bool,
    axis: Axis,
    test: NodeTest,
    predicates: Vec<Expr>,
}

#[derive(Debug, Clone)]
struct LocationPath {
    absolute: bool,
    steps: Vec<Step>,
}

#[derive(Debug, Clone)]
enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Compare {
        left: Box<Expr>,
        right: Box<Expr>,
        negated: bool,
    },
    Literal(String),
    Number(f64),
    Attribute(String),
    Function(String, Vec<Expr>),
    Path(LocationPath),
}

struct Parser<'a> {
    expr: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: &Token) -> SpotResult<()> {
        match self.advance() {
            Some(ref t) if t == expected => Ok(()),
            other => Err(self.error(format!("expected {expected:?}, found {other:?}"))),
        }
    }

    fn error(&self, message: impl Into<String>) -> SpotError {
        invalid("xpath", self.expr, message)
    }

    fn at_step_start(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::Dot | Token::DotDot | Token::Star | Token::Name(_))
        )
    }

    fn parse_union(&mut self) -> SpotResult<Vec<LocationPath>> {
        let mut paths = vec![self.parse_path()?];
        while self.peek() == Some(&Token::Pipe) {
            self.pos += 1;
            paths.push(self.parse_path()?);
        }
        Ok(paths)
    }

    fn parse_path(&mut self) -> SpotResult<LocationPath> {
        let mut absolute = false;
        let mut descend = false;
        match self.peek() {
            Some(Token::Slash) => {
                self.pos += 1;
                absolute = true;
                if !self.at_step_start() {
                    return Ok(LocationPath {
                        absolute,
                        steps: Vec::new(),
                    });
                }
            }
            Some(Token::DoubleSlash) => {
                self.pos += 1;
                absolute = true;
                descend = true;
            }
            _ => {}
        }
        let mut steps = Vec::new();
        loop {
            steps.push(self.parse_step(descend)?);
            match self.peek() {
                Some(Token::Slash) => {
                    self.pos += 1;
                    descend = false;
                }
                Some(Token::DoubleSlash) => {
                    self.pos += 1;
                    descend = true;
                }
                _ => break,
            }
        }
        Ok(LocationPath { absolute, steps })
    }

    fn parse_step(&mut self, descend: bool) -> SpotResult<Step> {
        let (axis, test) = match self.advance() {
            Some(Token::Dot) => (Axis::SelfAxis, NodeTest::AnyNode),
            Some(Token::DotDot) => (Axis::Parent, NodeTest::AnyNode),
            Some(Token::Star) => (Axis::Child, NodeTest::AnyElement),
            Some(Token::Name(name)) => {
                if self.peek() == Some(&Token::DoubleColon) {
                    self.pos += 1;
                    let axis = Axis::from_name(&name)
                        .ok_or_else(|| self.error(format!("unsupported axis '{name}'")))?;
                    (axis, self.parse_node_test()?)
                } else if name == "node" && self.peek() == Some(&Token::LParen) {
                    self.expect(&Token::LParen)?;
                    self.expect(&Token::RParen)?;
                    (Axis::Child, NodeTest::AnyNode)
                } else {
                    (Axis::Child, NodeTest::Named(name))
                }
            }
            other => return Err(self.error(format!("expected a step, found {other:?}"))),
        };
        let mut predicates = Vec::new();
        while self.peek() == Some(&Token::LBracket) {
            self.pos += 1;
            predicates.push(self.parse_or()?);
            self.expect(&Token::RBracket)?;
        }
        Ok(Step {
            descend,
            axis,
            test,
            predicates,
        })
    }

    fn parse_node_test(&mut self) -> SpotResult<NodeTest> {
        match self.advance() {
            Some(Token::Star) => Ok(NodeTest::AnyElement),
            Some(Token::Name(name)) if name == "node" => {
                self.expect(&Token::LParen)?;
                self.expect(&Token::RParen)?;
                Ok(NodeTest::AnyNode)
            }
            Some(Token::Name(name)) => Ok(NodeTest::Named(name)),
            other => Err(self.error(format!("expected a node test, found {other:?}"))),
        }
    }

    fn parse_or(&mut self) -> SpotResult<Expr> {
        let mut left = self.parse_and()?;
        while matches!(self.peek(), Some(Token::Name(n)) if n == "or") {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> SpotResult<Expr> {
        let mut left = self.parse_compare()?;
        while matches!(self.peek(), Some(Token::Name(n)) if n == "and") {
            self.pos += 1;
            let right = self.parse_compare()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_compare(&mut self) -> SpotResult<Expr> {
        let left = self.parse_primary()?;
        let negated = match self.peek() {
            Some(Token::Eq) => false,
            Some(Token::NotEq) => true,
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.parse_primary()?;
        Ok(Expr::Compare {
            left: Box::new(left),
            right: Box::new(right),
            negated,
        })
    }

    fn parse_primary(&mut self) -> SpotResult<Expr> {
        match self.peek().cloned() {
            Some(Token::Literal(text)) => {
                self.pos += 1;
                Ok(Expr::Literal(text))
            }
            Some(Token::Number(n)) => {
                self.pos += 1;
                Ok(Expr::Number(n))
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.parse_or()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(Token::At) => {
                self.pos += 1;
                match self.advance() {
                    Some(Token::Name(name)) => Ok(Expr::Attribute(name)),
                    other => Err(self.error(format!("expected attribute name, found {other:?}"))),
                }
            }
            Some(Token::Name(name))
                if name != "node" && self.peek_at(1) == Some(&Token::LParen) =>
            {
                self.pos += 2;
                let mut args = Vec::new();
                if self.peek() != Some(&Token::RParen) {
                    args.push(self.parse_or()?);
                    while self.peek() == Some(&Token::Comma) {
                        self.pos += 1;
                        args.push(self.parse_or()?);
                    }
                }
                self.expect(&Token::RParen)?;
                Ok(Expr::Function(name, args))
            }
            Some(Token::Dot | Token::DotDot | Token::Star | Token::Name(_))
            | Some(Token::Slash | Token::DoubleSlash) => Ok(Expr::Path(self.parse_path()?)),
            other => Err(self.error(format!("unexpected token {other:?}"))),
        }
    }
}

#[derive(Debug, Clone)]
struct XPath {
    paths: Vec<LocationPath>,
}

#[derive(Debug, Clone)]
enum Value {
    Nodes(Vec<usize>),
    Strings(Vec<String>),
    Str(String),
    Num(f64),
    Bool(bool),
}

#[derive(Debug, Clone, Copy)]
struct EvalContext {
    node: usize,
    position: usize,
    size: usize,
}

impl XPath {
    fn parse(expr: &str) -> SpotResult<Self> {
        let mut parser = Parser {
            expr,
            tokens: tokenize(expr)?,
            pos: 0,
        };
        if parser.tokens.is_empty() {
            return Err(invalid("xpath", expr, "empty expression"));
        }
        let paths = parser.parse_union()?;
        if parser.pos < parser.tokens.len() {
            return Err(parser.error(format!(
                "trailing tokens starting at {:?}",
                parser.tokens[parser.pos]
            )));
        }
        Ok(Self { paths })
    }

    fn evaluate<D: DomTree>(&self, dom: &D, context: usize) -> SpotResult<Vec<usize>> {
        let mut found = Vec::new();
        for path in &self.paths {
            found.extend(eval_path(dom, path, context)?);
        }
        Ok(document_order(dom, found))
    }
}

fn root_of<D: DomTree>(dom: &D, mut node: usize) -> usize {
    while let Some(parent) = dom.parent(node) {
        node = parent;
    }
    node
}

fn order_key<D: DomTree>(dom: &D, mut node: usize) -> Vec<usize> {
    let mut key = Vec::new();
    while let Some(parent) = dom.parent(node) {
        let index = dom
            .children(parent)
            .iter()
            .position(|&c| c == node)
            .unwrap_or_default();
        key.push(index);
        node = parent;
    }
    key.reverse();
    key
}

fn document_order<D: DomTree>(dom: &D, mut nodes: Vec<usize>) -> Vec<usize> {
    nodes.sort_unstable();
    nodes.dedup();
    let mut keyed: Vec<(Vec<usize>, usize)> =
        nodes.into_iter().map(|n| (order_key(dom, n), n)).collect();
    keyed.sort();
    keyed.into_iter().map(|(_, n)| n).collect()
}

fn axis_nodes<D: DomTree>(dom: &D, node: usize, axis: Axis) -> Vec<usize> {
    match axis {
        Axis::Child => dom.children(node).to_vec(),
        Axis::Descendant => descendants(dom, node),
        Axis::DescendantOrSelf => {
            let mut nodes = vec![node];
            nodes.extend(descendants(dom, node));
            nodes
        }
        Axis::Parent => dom.parent(node).into_iter().collect(),
        Axis::Ancestor | Axis::AncestorOrSelf => {
            let mut nodes = Vec::new();
            if axis == Axis::AncestorOrSelf {
                nodes.push(node);
            }
            let mut current = dom.parent(node);
            while let Some(ancestor) = current {
                nodes.push(ancestor);
                current = dom.parent(ancestor);
            }
            nodes
        }
        Axis::FollowingSibling | Axis::PrecedingSibling => {
            let Some(parent) = dom.parent(node) else {
                return Vec::new();
            };
            let siblings = dom.children(parent);
            let index = siblings.iter().position(|&c| c == node).unwrap_or_default();
            if axis == Axis::FollowingSibling {
                siblings[index + 1..].to_vec()
            } else {
                siblings[..index].iter().rev().copied().collect()
            }
        }
        Axis::SelfAxis => vec![node],
    }
}

fn node_test<D: DomTree>(dom: &D, node: usize, test: &NodeTest) -> bool {
    match test {
        NodeTest::AnyNode => true,
        NodeTest::AnyElement => dom.is_element(node),
        NodeTest::Named(name) => dom.is_element(node) && dom.tag(node).eq_ignore_ascii_case(name),
    }
}

fn eval_path<D: DomTree>(dom: &D, path: &LocationPath, context: usize) -> SpotResult<Vec<usize>> {
    let mut current = vec![if path.absolute {
        root_of(dom, context)
    } else {
        context
    }];
    for step in &path.steps {
        let bases = if step.descend {
            let mut all = Vec::new();
            for &node in &current {
                all.extend(axis_nodes(dom, node, Axis::DescendantOrSelf));
            }
            document_order(dom, all)
        } else {
            current
        };
        let mut next = Vec::new();
        for base in bases {
            let mut candidates: Vec<usize> = axis_nodes(dom, base, step.axis)
                .into_iter()
                .filter(|&n| node_test(dom, n, &step.test))
                .collect();
            for predicate in &step.predicates {
                candidates = apply_predicate(dom, candidates, predicate)?;
            }
            next.extend(candidates);
        }
        current = document_order(dom, next);
    }
    Ok(current)
}

fn apply_predicate<D: DomTree>(
    dom: &D,
    candidates: Vec<usize>,
    predicate: &Expr,
) -> SpotResult<Vec<usize>> {
    let size = candidates.len();
    let mut kept = Vec::new();
    for (index, node) in candidates.into_iter().enumerate() {
        let ctx = EvalContext {
            node,
            position: index + 1,
            size,
        };
        let keep = match eval_expr(dom, predicate, ctx)? {
            Value::Num(n) => (n - ctx.position as f64).abs() < f64::EPSILON,
            other => truthy(&other),
        };
        if keep {
            kept.push(node);
        }
    }
    Ok(kept)
}

fn eval_expr<D: DomTree>(dom: &D, expr: &Expr, ctx: EvalContext) -> SpotResult<Value> {
    Ok(match expr {
        Expr::Literal(text) => Value::Str(text.clone()),
        Expr::Number(n) => Value::Num(*n),
        Expr::Attribute(name) => Value::Strings(
            dom.attribute(ctx.node, name)
                .map(str::to_string)
                .into_iter()
                .collect(),
        ),
        Expr::Path(path) => Value::Nodes(eval_path(dom, path, ctx.node)?),
        Expr::Or(left, right) => Value::Bool(
            truthy(&eval_expr(dom, left, ctx)?) || truthy(&eval_expr(dom, right, ctx)?),
        ),
        Expr::And(left, right) => Value::Bool(
            truthy(&eval_expr(dom, left, ctx)?) && truthy(&eval_expr(dom, right, ctx)?),
        ),
        Expr::Compare {
            left,
            right,
            negated,
        } => {
            let left = eval_expr(dom, left, ctx)?;
            let right = eval_expr(dom, right, ctx)?;
            Value::Bool(compare(dom, &left, &right, *negated))
        }
        Expr::Function(name, args) => eval_function(dom, name, args, ctx)?,
    })
}

fn eval_function<D: DomTree>(
    dom: &D,
    name: &str,
    args: &[Expr],
    ctx: EvalContext,
) -> SpotResult<Value> {
    let arg = |i: usize| -> SpotResult<Value> {
        args.get(i).map_or_else(
            || Err(SpotError::driver(format!("xpath function {name}() needs argument {}", i + 1))),
            |a| eval_expr(dom, a, ctx),
        )
    };
    Ok(match name {
        "text" => {
            let own = dom.own_text(ctx.node);
            Value::Strings(if own.is_empty() {
                Vec::new()
            } else {
                vec![own.to_string()]
            })
        }
        "last" => Value::Num(ctx.size as f64),
        "position" => Value::Num(ctx.position as f64),
        "count" => match arg(0)? {
            Value::Nodes(nodes) => Value::Num(nodes.len() as f64),
            Value::Strings(strings) => Value::Num(strings.len() as f64),
            _ => return Err(SpotError::driver("xpath count() needs a node-set")),
        },
        "string" => Value::Str(if args.is_empty() {
            string_value(dom, ctx.node)
        } else {
            first_string(dom, &arg(0)?)
        }),
        "normalize-space" => {
            let raw = if args.is_empty() {
                string_value(dom, ctx.node)
            } else {
                first_string(dom, &arg(0)?)
            };
            Value::Str(normalize_space(&raw))
        }
        "contains" => {
            let haystack = first_string(dom, &arg(0)?);
            let needle = first_string(dom, &arg(1)?);
            Value::Bool(haystack.contains(&needle))
        }
        "concat" => {
            let mut joined = String::new();
            for a in args {
                joined.push_str(&first_string(dom, &eval_expr(dom, a, ctx)?));
            }
            Value::Str(joined)
        }
        "starts-with" => {
            let haystack = first_string(dom, &arg(0)?);
            let prefix = first_string(dom, &arg(1)?);
            Value::Bool(haystack.starts_with(&prefix))
        }
        "not" => Value::Bool(!truthy(&arg(0)?)),
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        other => return Err(SpotError::driver(format!("unsupported xpath function {other}()"))),
    })
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Nodes(nodes) => !nodes.is_empty(),
        Value::Strings(strings) => !strings.is_empty(),
        Value::Str(s) => !s.is_empty(),
        Value::Num(n) => *n != 0.0 && !n.is_nan(),
        Value::Bool(b) => *b,
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn strings_of<D: DomTree>(dom: &D, value: &Value) -> Vec<String> {
    match value {
        Value::Nodes(nodes) => nodes.iter().map(|&n| string_value(dom, n)).collect(),
        Value::Strings(strings) => strings.clone(),
        Value::Str(s) => vec![s.clone()],
        Value::Num(n) => vec![format_number(*n)],
        Value::Bool(b) => vec![b.to_string()],
    }
}

fn first_string<D: DomTree>(dom: &D, value: &Value) -> String {
    strings_of(dom, value).into_iter().next().unwrap_or_default()
}

fn compare<D: DomTree>(dom: &D, left: &Value, right: &Value, negated: bool) -> bool {
    match (left, right) {
        (Value::Bool(b), other) | (other, Value::Bool(b)) => (truthy(other) == *b) != negated,
        (Value::Num(n), other) | (other, Value::Num(n)) => strings_of(dom, other)
            .iter()
            .filter_map(|s| s.trim().parse::<f64>().ok())
            .any(|v| ((v - n).abs() < f64::EPSILON) != negated),
        _ => {
            let right = strings_of(dom, right);
            strings_of(dom, left)
                .iter()
                .any(|l| right.iter().any(|r| (l == r) != negated))
        }
    }
}
