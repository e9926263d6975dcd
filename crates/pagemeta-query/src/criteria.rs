//! Criteria compiler.
//!
//! Turns predicate strings of the form `<identifier> <op> <literal>` or
//! `<identifier> IN (<literal>, ...)` into typed [`Criterion`] values that are
//! evaluated in memory against [`MetadataEntry`] records. Literals never reach
//! a native query language, so malformed or injection-shaped input is
//! rejected at compile time.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

use pagemeta_core::{defaults, EntryField, Error, MetadataEntry, PropertyValue, Result, ValueType};

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_:.\-]*").expect("identifier pattern is valid")
});

static NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?[0-9]+(?:\.[0-9]+)?").expect("number pattern is valid"));

static OPERATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:!=|<>|<=|>=|=|<|>)").expect("operator pattern is valid"));

/// Words that can never name a field or property.
const RESERVED: &[&str] = &[
    "AND", "OR", "NOT", "IN", "LIKE", "NULL", "IS", "BETWEEN", "SELECT", "FROM", "WHERE", "UNION",
    "INSERT", "UPDATE", "DELETE", "DROP",
];

pub(crate) fn is_reserved(word: &str) -> bool {
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(word))
}

/// Match a complete identifier.
pub(crate) fn is_identifier(word: &str) -> bool {
    IDENTIFIER
        .find(word)
        .is_some_and(|m| m.end() == word.len())
        && !is_reserved(word)
}

/// Resolve an identifier to a built-in field or a named property.
pub(crate) fn resolve_target(ident: &str) -> Target {
    match EntryField::from_identifier(ident) {
        Some(field) => Target::Field(field),
        None => Target::Property(ident.to_string()),
    }
}

/// Parse a literal against the accepted date patterns (UTC).
pub fn parse_date_literal(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    for pattern in defaults::DATE_PATTERNS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, pattern) {
            return Some(dt.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, defaults::DATE_ONLY_PATTERN)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

// =============================================================================
// AST
// =============================================================================

/// What a criterion or order clause reads from an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Field(EntryField),
    Property(String),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Field(field) => f.write_str(field.as_str()),
            Target::Property(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    In,
}

impl CompareOp {
    fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "=" => Some(CompareOp::Eq),
            "!=" | "<>" => Some(CompareOp::Ne),
            "<" => Some(CompareOp::Lt),
            "<=" => Some(CompareOp::Le),
            ">" => Some(CompareOp::Gt),
            ">=" => Some(CompareOp::Ge),
            _ => None,
        }
    }

    fn holds(&self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq | CompareOp::In => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
            CompareOp::Like => false,
        }
    }
}

/// A literal with every typed reading it supports.
#[derive(Debug, Clone)]
pub struct Operand {
    pub text: String,
    pub number: Option<f64>,
    pub date: Option<DateTime<Utc>>,
}

impl Operand {
    fn new(text: String) -> Self {
        Self {
            number: text.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            date: parse_date_literal(&text),
            text,
        }
    }
}

/// One compiled predicate.
#[derive(Debug, Clone)]
pub struct Criterion {
    /// Source text, kept for diagnostics.
    pub clause: String,
    pub target: Target,
    pub op: CompareOp,
    pub operands: Vec<Operand>,
    like: Option<Regex>,
}

impl Criterion {
    /// True when the entry satisfies this predicate.
    ///
    /// Properties match when any same-named value matches; an entry without
    /// the property never matches, even for `!=`.
    pub fn matches(&self, entry: &MetadataEntry) -> bool {
        match &self.target {
            Target::Field(field) => self.matches_text(entry.field(*field)),
            Target::Property(name) => entry
                .property_values(name)
                .any(|value| self.matches_value(value)),
        }
    }

    fn matches_text(&self, value: &str) -> bool {
        if let Some(re) = &self.like {
            return re.is_match(value);
        }
        self.operands
            .iter()
            .any(|operand| self.op.holds(value.cmp(operand.text.as_str())))
    }

    fn matches_value(&self, value: &PropertyValue) -> bool {
        match value {
            PropertyValue::String(s) | PropertyValue::Text(s) => self.matches_text(s),
            _ if self.like.is_some() => self.matches_text(&value.as_text()),
            PropertyValue::Number(n) => self.operands.iter().any(|operand| {
                operand
                    .number
                    .is_some_and(|literal| self.op.holds(n.total_cmp(&literal)))
            }),
            PropertyValue::Date(d) => self.operands.iter().any(|operand| {
                operand
                    .date
                    .is_some_and(|literal| self.op.holds(d.cmp(&literal)))
            }),
        }
    }
}

/// Conjunction of compiled criteria. Empty matches everything.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub criteria: Vec<Criterion>,
}

impl Filter {
    pub fn matches(&self, entry: &MetadataEntry) -> bool {
        self.criteria.iter().all(|c| c.matches(entry))
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }
}

// =============================================================================
// LEXER
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(String),
    Op(String),
    LParen,
    RParen,
    Comma,
}

fn tokenize(clause: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut rest = clause.trim_start();

    while !rest.is_empty() {
        let first = rest.chars().next().unwrap_or_default();
        let consumed = match first {
            '(' => {
                tokens.push(Token::LParen);
                1
            }
            ')' => {
                tokens.push(Token::RParen);
                1
            }
            ',' => {
                tokens.push(Token::Comma);
                1
            }
            '\'' => {
                let (literal, len) = scan_string(clause, rest)?;
                tokens.push(Token::Str(literal));
                len
            }
            _ => {
                if let Some(m) = NUMBER.find(rest) {
                    tokens.push(Token::Num(m.as_str().to_string()));
                    m.end()
                } else if let Some(m) = IDENTIFIER.find(rest) {
                    tokens.push(Token::Ident(m.as_str().to_string()));
                    m.end()
                } else if let Some(m) = OPERATOR.find(rest) {
                    tokens.push(Token::Op(m.as_str().to_string()));
                    m.end()
                } else {
                    return Err(Error::malformed(
                        clause,
                        format!("unexpected character '{}'", first),
                    ));
                }
            }
        };
        rest = rest[consumed..].trim_start();
    }
    Ok(tokens)
}

/// Scan a single-quoted literal at the start of `rest`. `''` escapes a quote.
fn scan_string(clause: &str, rest: &str) -> Result<(String, usize)> {
    let mut literal = String::new();
    let mut chars = rest.char_indices().skip(1).peekable();
    while let Some((i, c)) = chars.next() {
        if c == '\'' {
            if matches!(chars.peek(), Some((_, '\''))) {
                literal.push('\'');
                chars.next();
            } else {
                return Ok((literal, i + 1));
            }
        } else {
            literal.push(c);
        }
    }
    Err(Error::malformed(clause, "unterminated string literal"))
}

// =============================================================================
// COMPILER
// =============================================================================

/// Compiles criteria strings, honoring optionally declared property types.
#[derive(Debug, Clone, Default)]
pub struct CriteriaCompiler {
    declared: HashMap<String, ValueType>,
}

impl CriteriaCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the value type of a property so literals are checked against
    /// it at compile time.
    pub fn declare(mut self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.declared.insert(name.into(), value_type);
        self
    }

    pub fn declared_type(&self, name: &str) -> Option<ValueType> {
        self.declared.get(name).copied()
    }

    /// Compile every clause into one conjunctive filter.
    pub fn compile_all<S: AsRef<str>>(&self, criteria: &[S]) -> Result<Filter> {
        let criteria = criteria
            .iter()
            .map(|c| self.compile(c.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Filter { criteria })
    }

    /// Compile one clause.
    pub fn compile(&self, clause: &str) -> Result<Criterion> {
        let tokens = tokenize(clause)?;
        let mut tokens = tokens.into_iter();

        let ident = match tokens.next() {
            Some(Token::Ident(ident)) => ident,
            Some(_) => return Err(Error::malformed(clause, "expected an identifier")),
            None => return Err(Error::malformed(clause, "empty clause")),
        };
        if is_reserved(&ident) {
            return Err(Error::malformed(
                clause,
                format!("reserved word '{}' used as identifier", ident),
            ));
        }
        let target = resolve_target(&ident);

        let op = match tokens.next() {
            Some(Token::Op(symbol)) => CompareOp::from_symbol(&symbol)
                .ok_or_else(|| Error::malformed(clause, format!("unsupported operator '{}'", symbol)))?,
            Some(Token::Ident(word)) if word.eq_ignore_ascii_case("LIKE") => CompareOp::Like,
            Some(Token::Ident(word)) if word.eq_ignore_ascii_case("IN") => CompareOp::In,
            Some(Token::Ident(word)) => {
                return Err(Error::malformed(
                    clause,
                    format!("unsupported operator '{}'", word),
                ))
            }
            Some(_) => return Err(Error::malformed(clause, "expected an operator")),
            None => return Err(Error::malformed(clause, "missing operator")),
        };

        let operands = if op == CompareOp::In {
            parse_list(clause, &mut tokens)?
        } else {
            vec![parse_literal(clause, tokens.next())?]
        };

        if tokens.next().is_some() {
            return Err(Error::malformed(clause, "unexpected trailing tokens"));
        }

        self.check_declared(clause, &target, op, &operands)?;

        let like = match op {
            CompareOp::Like => Some(like_regex(clause, &operands[0].text)?),
            _ => None,
        };

        trace!(clause, target = %target, op = ?op, operand_count = operands.len(), "Compiled criterion");

        Ok(Criterion {
            clause: clause.to_string(),
            target,
            op,
            operands,
            like,
        })
    }

    fn check_declared(
        &self,
        clause: &str,
        target: &Target,
        op: CompareOp,
        operands: &[Operand],
    ) -> Result<()> {
        let Target::Property(name) = target else {
            return Ok(());
        };
        if op == CompareOp::Like {
            return Ok(());
        }
        match self.declared_type(name) {
            Some(ValueType::Date) => {
                if let Some(bad) = operands.iter().find(|o| o.date.is_none()) {
                    return Err(Error::malformed(
                        clause,
                        format!("'{}' is not a date literal for DATE property {}", bad.text, name),
                    ));
                }
            }
            Some(ValueType::Number) => {
                if let Some(bad) = operands.iter().find(|o| o.number.is_none()) {
                    return Err(Error::malformed(
                        clause,
                        format!("'{}' is not a number for NUMBER property {}", bad.text, name),
                    ));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

fn parse_literal(clause: &str, token: Option<Token>) -> Result<Operand> {
    match token {
        Some(Token::Str(text)) | Some(Token::Num(text)) => Ok(Operand::new(text)),
        Some(_) => Err(Error::malformed(clause, "expected a literal")),
        None => Err(Error::malformed(clause, "missing literal")),
    }
}

fn parse_list(clause: &str, tokens: &mut impl Iterator<Item = Token>) -> Result<Vec<Operand>> {
    if tokens.next() != Some(Token::LParen) {
        return Err(Error::malformed(clause, "expected '(' after IN"));
    }
    let mut operands = Vec::new();
    loop {
        match tokens.next() {
            Some(Token::RParen) if operands.is_empty() => {
                return Err(Error::malformed(clause, "empty IN list"))
            }
            token => operands.push(parse_literal(clause, token)?),
        }
        match tokens.next() {
            Some(Token::Comma) => continue,
            Some(Token::RParen) => return Ok(operands),
            _ => return Err(Error::malformed(clause, "unterminated IN list")),
        }
    }
}

/// Translate a LIKE pattern (`%` any run, `_` one char) to an anchored regex.
fn like_regex(clause: &str, pattern: &str) -> Result<Regex> {
    let mut source = String::with_capacity(pattern.len() + 8);
    source.push_str("(?s)^");
    let mut buf = [0u8; 4];
    for c in pattern.chars() {
        match c {
            '%' => source.push_str(".*"),
            '_' => source.push('.'),
            _ => source.push_str(&regex::escape(c.encode_utf8(&mut buf))),
        }
    }
    source.push('$');
    Regex::new(&source).map_err(|e| Error::malformed(clause, format!("invalid LIKE pattern: {}", e)))
}
