//! PocketBase filter expressions.
//!
//! Supports the subset of the store's filter syntax the application emits:
//! comparisons (`=`, `!=`, `>`, `>=`, `<`, `<=`, `~`, `!~`) between fields and
//! literals, combined with `&&`, `||` and parentheses. Parsed expressions render
//! back to canonical text, so a caller-supplied filter can be checked for
//! well-formedness before it is embedded in a larger query.
//!
//! String literals follow the store's scanner: a literal ends at the first
//! matching quote not preceded by a backslash, and `\"` (or `\'`) is the only
//! escape. Any other backslash is rejected, so a parsed literal always renders
//! back to text the store reads the same way.

use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;
use thiserror::Error;

/// Maximum parenthesis nesting accepted by the parser.
pub const MAX_DEPTH: usize = 32;

/// Maximum number of comparisons in one expression.
pub const MAX_TERMS: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("filter is empty")]
    Empty,

    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("unterminated string starting at position {0}")]
    UnterminatedString(usize),

    #[error("unexpected {found} at position {pos}")]
    UnexpectedToken { found: String, pos: usize },

    #[error("unexpected end of filter")]
    UnexpectedEnd,

    #[error("filter nesting exceeds {0} levels")]
    TooDeep(usize),

    #[error("filter has more than {0} comparisons")]
    TooManyTerms(usize),

    #[error("unsupported escape in string at position {0}")]
    UnsupportedEscape(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Like,
    NotLike,
}

impl CmpOp {
    pub fn as_str(self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "!=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Like => "~",
            CmpOp::NotLike => "!~",
        }
    }

    fn apply(self, left: &Value, right: &Value) -> bool {
        match self {
            CmpOp::Eq => compare_values(left, right) == Some(Ordering::Equal),
            CmpOp::Ne => compare_values(left, right) != Some(Ordering::Equal),
            CmpOp::Gt => compare_values(left, right) == Some(Ordering::Greater),
            CmpOp::Ge => matches!(
                compare_values(left, right),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            CmpOp::Lt => compare_values(left, right) == Some(Ordering::Less),
            CmpOp::Le => matches!(
                compare_values(left, right),
                Some(Ordering::Less | Ordering::Equal)
            ),
            CmpOp::Like => contains(left, right),
            CmpOp::NotLike => !contains(left, right),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Num(f64),
    Bool(bool),
    Null,
}

impl Literal {
    fn to_value(&self) -> Value {
        match self {
            Literal::Str(s) => Value::String(s.clone()),
            Literal::Num(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Null => Value::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Field(String),
    Literal(Literal),
}

impl Operand {
    fn resolve(&self, record: &Value) -> Value {
        match self {
            Operand::Field(path) => lookup(record, path).cloned().unwrap_or(Value::Null),
            Operand::Literal(literal) => literal.to_value(),
        }
    }
}

/// Parsed filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare {
        left: Operand,
        op: CmpOp,
        right: Operand,
    },
}

impl Expr {
    /// Evaluate against a flattened JSON record.
    pub fn matches(&self, record: &Value) -> bool {
        match self {
            Expr::And(left, right) => left.matches(record) && right.matches(record),
            Expr::Or(left, right) => left.matches(record) || right.matches(record),
            Expr::Compare { left, op, right } => {
                op.apply(&left.resolve(record), &right.resolve(record))
            }
        }
    }

    /// Field names referenced anywhere in the expression.
    pub fn fields(&self) -> Vec<&str> {
        let mut fields = Vec::new();
        self.collect_fields(&mut fields);
        fields
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::And(left, right) | Expr::Or(left, right) => {
                left.collect_fields(out);
                right.collect_fields(out);
            }
            Expr::Compare { left, right, .. } => {
                for operand in [left, right] {
                    if let Operand::Field(name) = operand {
                        out.push(name);
                    }
                }
            }
        }
    }
}

/// Parse a filter expression of at most [`MAX_TERMS`] comparisons.
pub fn parse(input: &str) -> Result<Expr, FilterError> {
    parse_bounded(input, MAX_TERMS)
}

/// Parse a filter expression of at most `max_terms` comparisons.
///
/// The term bound also bounds the depth of `&&`/`||` chains, which evaluation,
/// rendering and drop all walk recursively.
pub fn parse_bounded(input: &str, max_terms: usize) -> Result<Expr, FilterError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(FilterError::Empty);
    }

    let mut parser = Parser {
        tokens,
        cursor: 0,
        depth: 0,
        terms: 0,
        max_terms,
    };
    let expr = parser.parse_or()?;

    if let Some((pos, token)) = parser.tokens.get(parser.cursor) {
        return Err(FilterError::UnexpectedToken {
            found: token.describe(),
            pos: *pos,
        });
    }
    Ok(expr)
}

/// Render a string as a double-quoted filter literal.
///
/// Only `"` is escaped. The store has no escape for a backslash, so `value`
/// must not contain one; parsed literals and validated identifiers never do.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        if ch == '"' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

/// Order two values the way the store compares them: numerically when either
/// side is a number, otherwise as text. `None` when a number meets a
/// non-numeric value.
pub fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    if left.is_number() || right.is_number() {
        let (a, b) = (as_number(left)?, as_number(right)?);
        return a.partial_cmp(&b);
    }
    Some(as_text(left).cmp(&as_text(right)))
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn contains(left: &Value, right: &Value) -> bool {
    let needle = as_text(right);
    let needle = needle.trim_matches('%').to_lowercase();
    as_text(left).to_lowercase().contains(&needle)
}

fn lookup<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(record, |value, segment| value.get(segment))
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(f64),
    Cmp(CmpOp),
    And,
    Or,
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(name) => format!("identifier '{}'", name),
            Token::Str(_) => "string literal".to_string(),
            Token::Num(n) => format!("number {}", n),
            Token::Cmp(op) => format!("operator '{}'", op.as_str()),
            Token::And => "'&&'".to_string(),
            Token::Or => "'||'".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<(usize, Token)>, FilterError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(pos, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push((pos, Token::LParen));
            }
            ')' => {
                chars.next();
                tokens.push((pos, Token::RParen));
            }
            '&' | '|' => {
                chars.next();
                if chars.next_if(|&(_, next)| next == ch).is_none() {
                    return Err(FilterError::UnexpectedChar { ch, pos });
                }
                tokens.push((pos, if ch == '&' { Token::And } else { Token::Or }));
            }
            '=' => {
                chars.next();
                tokens.push((pos, Token::Cmp(CmpOp::Eq)));
            }
            '~' => {
                chars.next();
                tokens.push((pos, Token::Cmp(CmpOp::Like)));
            }
            '!' => {
                chars.next();
                let op = match chars.next() {
                    Some((_, '=')) => CmpOp::Ne,
                    Some((_, '~')) => CmpOp::NotLike,
                    _ => return Err(FilterError::UnexpectedChar { ch, pos }),
                };
                tokens.push((pos, Token::Cmp(op)));
            }
            '>' | '<' => {
                chars.next();
                let inclusive = chars.next_if(|&(_, next)| next == '=').is_some();
                let op = match (ch, inclusive) {
                    ('>', false) => CmpOp::Gt,
                    ('>', true) => CmpOp::Ge,
                    ('<', false) => CmpOp::Lt,
                    _ => CmpOp::Le,
                };
                tokens.push((pos, Token::Cmp(op)));
            }
            '"' | '\'' => {
                chars.next();
                let value = read_string(&mut chars, ch, pos)?;
                tokens.push((pos, Token::Str(value)));
            }
            c if c.is_ascii_digit() || c == '-' => {
                chars.next();
                let mut raw = String::from(c);
                while let Some((_, next)) =
                    chars.next_if(|&(_, n)| n.is_ascii_digit() || n == '.')
                {
                    raw.push(next);
                }
                let value: f64 = raw
                    .parse()
                    .map_err(|_| FilterError::UnexpectedChar { ch, pos })?;
                tokens.push((pos, Token::Num(value)));
            }
            c if c.is_alphabetic() || c == '_' || c == '@' => {
                let mut name = String::new();
                while let Some((_, next)) = chars
                    .next_if(|&(_, n)| n.is_alphanumeric() || n == '_' || n == '.' || n == '@')
                {
                    name.push(next);
                }
                tokens.push((pos, Token::Ident(name)));
            }
            other => return Err(FilterError::UnexpectedChar { ch: other, pos }),
        }
    }

    Ok(tokens)
}

fn read_string(
    chars: &mut Peekable<CharIndices<'_>>,
    quote_char: char,
    start: usize,
) -> Result<String, FilterError> {
    let mut value = String::new();
    loop {
        match chars.next() {
            None => return Err(FilterError::UnterminatedString(start)),
            Some((pos, '\\')) => match chars.next() {
                Some((_, escaped)) if escaped == quote_char => value.push(escaped),
                Some(_) => return Err(FilterError::UnsupportedEscape(pos)),
                None => return Err(FilterError::UnterminatedString(start)),
            },
            Some((_, c)) if c == quote_char => return Ok(value),
            Some((_, c)) => value.push(c),
        }
    }
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    cursor: usize,
    depth: usize,
    terms: usize,
    max_terms: usize,
}

impl Parser {
    fn next(&mut self) -> Option<(usize, Token)> {
        let token = self.tokens.get(self.cursor).cloned();
        if token.is_some() {
            self.cursor += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        match self.tokens.get(self.cursor) {
            Some((_, token)) if token == expected => {
                self.cursor += 1;
                true
            }
            _ => false,
        }
    }

    fn parse_or(&mut self) -> Result<Expr, FilterError> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::Or) {
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, FilterError> {
        let mut left = self.parse_primary()?;
        while self.eat(&Token::And) {
            let right = self.parse_primary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_primary(&mut self) -> Result<Expr, FilterError> {
        match self.next() {
            Some((_, Token::LParen)) => {
                self.depth += 1;
                if self.depth > MAX_DEPTH {
                    return Err(FilterError::TooDeep(MAX_DEPTH));
                }
                let expr = self.parse_or()?;
                match self.next() {
                    Some((_, Token::RParen)) => {}
                    Some((pos, token)) => {
                        return Err(FilterError::UnexpectedToken {
                            found: token.describe(),
                            pos,
                        })
                    }
                    None => return Err(FilterError::UnexpectedEnd),
                }
                self.depth -= 1;
                Ok(expr)
            }
            Some((pos, token)) => {
                self.terms += 1;
                if self.terms > self.max_terms {
                    return Err(FilterError::TooManyTerms(self.max_terms));
                }
                let left = operand(pos, token)?;
                let op = match self.next() {
                    Some((_, Token::Cmp(op))) => op,
                    Some((pos, token)) => {
                        return Err(FilterError::UnexpectedToken {
                            found: token.describe(),
                            pos,
                        })
                    }
                    None => return Err(FilterError::UnexpectedEnd),
                };
                let right = match self.next() {
                    Some((pos, token)) => operand(pos, token)?,
                    None => return Err(FilterError::UnexpectedEnd),
                };
                Ok(Expr::Compare { left, op, right })
            }
            None => Err(FilterError::UnexpectedEnd),
        }
    }
}

fn operand(pos: usize, token: Token) -> Result<Operand, FilterError> {
    match token {
        Token::Ident(name) => Ok(match name.as_str() {
            "true" => Operand::Literal(Literal::Bool(true)),
            "false" => Operand::Literal(Literal::Bool(false)),
            "null" => Operand::Literal(Literal::Null),
            _ => Operand::Field(name),
        }),
        Token::Str(value) => Ok(Operand::Literal(Literal::Str(value))),
        Token::Num(value) => Ok(Operand::Literal(Literal::Num(value))),
        other => Err(FilterError::UnexpectedToken {
            found: other.describe(),
            pos,
        }),
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Field(name) => f.write_str(name),
            Operand::Literal(Literal::Str(value)) => f.write_str(&quote(value)),
            Operand::Literal(Literal::Num(value)) => write!(f, "{}", value),
            Operand::Literal(Literal::Bool(value)) => write!(f, "{}", value),
            Operand::Literal(Literal::Null) => f.write_str("null"),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Compare { left, op, right } => write!(f, "{} {} {}", left, op.as_str(), right),
            Expr::Or(left, right) => write!(f, "{} || {}", left, right),
            Expr::And(left, right) => {
                write_and_side(f, left)?;
                f.write_str(" && ")?;
                write_and_side(f, right)
            }
        }
    }
}

fn write_and_side(f: &mut fmt::Formatter<'_>, expr: &Expr) -> fmt::Result {
    match expr {
        Expr::Or(..) => write!(f, "({})", expr),
        _ => write!(f, "{}", expr),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_simple_comparison() {
        let expr = parse(r#"user = "abc""#).unwrap();
        assert_eq!(
            expr,
            Expr::Compare {
                left: Operand::Field("user".into()),
                op: CmpOp::Eq,
                right: Operand::Literal(Literal::Str("abc".into())),
            }
        );
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let expr = parse("a = 1 || b = 2 && c = 3").unwrap();
        match expr {
            Expr::Or(_, right) => assert!(matches!(*right, Expr::And(..))),
            other => panic!("expected Or at the root, got {:?}", other),
        }
    }

    #[test]
    fn test_render_round_trips_structure() {
        let source = r#"(type = "Paid" || type = "expense") && amount >= 10.5"#;
        let expr = parse(source).unwrap();
        let rendered = expr.to_string();
        assert_eq!(rendered, r#"(type = "Paid" || type = "expense") && amount >= 10.5"#);
        assert_eq!(parse(&rendered).unwrap(), expr);
    }

    #[test]
    fn test_operators() {
        let record = json!({"amount": 25, "note": "Coffee Beans", "date": "2024-02-29 00:00:00.000Z"});
        assert!(parse("amount > 10").unwrap().matches(&record));
        assert!(parse("amount >= 25").unwrap().matches(&record));
        assert!(parse("amount < 30").unwrap().matches(&record));
        assert!(parse("amount <= 25").unwrap().matches(&record));
        assert!(parse("amount != 24").unwrap().matches(&record));
        assert!(parse(r#"note ~ "coffee""#).unwrap().matches(&record));
        assert!(parse(r#"note !~ "tea""#).unwrap().matches(&record));
        assert!(!parse("amount = 26").unwrap().matches(&record));
    }

    #[test]
    fn test_date_upper_bound_past_month_end_still_includes_leap_day() {
        let record = json!({"date": "2024-02-29 00:00:00.000Z"});
        let expr = parse(r#"date >= "2024-02-01" && date <= "2024-02-31 23:59:59.999Z""#).unwrap();
        assert!(expr.matches(&record));

        let march = json!({"date": "2024-03-01 00:00:00.000Z"});
        assert!(!expr.matches(&march));
    }

    #[test]
    fn test_numeric_strings_compare_numerically() {
        let record = json!({"amount": "100"});
        assert!(parse("amount > 20").unwrap().matches(&record));
    }

    #[test]
    fn test_missing_field_equals_empty_string() {
        let record = json!({"amount": 1});
        assert!(parse(r#"category = """#).unwrap().matches(&record));
        assert!(parse("category = null").unwrap().matches(&record));
    }

    #[test]
    fn test_nested_field_lookup() {
        let record = json!({"expand": {"user": {"name": "ana"}}});
        assert!(parse(r#"expand.user.name = "ana""#).unwrap().matches(&record));
    }

    #[test]
    fn test_quote_escapes_only_quotes() {
        assert_eq!(quote(r#"a"b"#), r#""a\"b""#);
        let expr = parse(&format!("name = {}", quote(r#"x" || user != "y"#))).unwrap();
        assert!(matches!(expr, Expr::Compare { .. }));
    }

    #[test]
    fn test_escaped_quote_round_trips() {
        let expr = parse(r#"note = 'it\'s' || note = "say \"hi\"""#).unwrap();
        assert!(expr.matches(&json!({"note": "it's"})));
        assert!(expr.matches(&json!({"note": "say \"hi\""})));
        assert_eq!(parse(&expr.to_string()).unwrap(), expr);
    }

    #[test]
    fn test_backslashes_are_rejected() {
        assert_eq!(parse(r#"note = "a\b""#), Err(FilterError::UnsupportedEscape(9)));
        assert_eq!(parse(r"note = 'C:\\tmp'"), Err(FilterError::UnsupportedEscape(10)));
        // A trailing backslash escapes the closing quote, so the literal runs on
        // into the rest of the filter.
        assert_eq!(
            parse(r#"note = "x\") && user = "y""#),
            Err(FilterError::UnterminatedString(25))
        );
    }

    #[test]
    fn test_single_quoted_strings() {
        let expr = parse("mode = 'Cash'").unwrap();
        assert!(expr.matches(&json!({"mode": "Cash"})));
    }

    #[test]
    fn test_negative_numbers() {
        let expr = parse("amount > -5").unwrap();
        assert!(expr.matches(&json!({"amount": 0})));
    }

    #[test]
    fn test_rejects_unbalanced_parentheses() {
        assert!(matches!(
            parse(r#"1 = 1) || (user != """#),
            Err(FilterError::UnexpectedToken { .. })
        ));
        assert_eq!(parse("(a = 1"), Err(FilterError::UnexpectedEnd));
    }

    #[test]
    fn test_rejects_malformed_input() {
        assert_eq!(parse("   "), Err(FilterError::Empty));
        assert!(matches!(parse("a = 1 &"), Err(FilterError::UnexpectedChar { .. })));
        assert!(matches!(parse(r#"a = "open"#), Err(FilterError::UnterminatedString(_))));
        assert!(matches!(parse("a = 1 b = 2"), Err(FilterError::UnexpectedToken { .. })));
        assert!(matches!(parse("a ?= 1"), Err(FilterError::UnexpectedChar { .. })));
        assert_eq!(parse("a ="), Err(FilterError::UnexpectedEnd));
    }

    #[test]
    fn test_rejects_excessive_nesting() {
        let source = format!("{}a = 1{}", "(".repeat(40), ")".repeat(40));
        assert_eq!(parse(&source), Err(FilterError::TooDeep(MAX_DEPTH)));
    }

    #[test]
    fn test_long_flat_chain_is_rejected() {
        let source = vec!["amount = 1"; 10_000].join(" || ");
        assert_eq!(parse(&source), Err(FilterError::TooManyTerms(MAX_TERMS)));

        let source = vec!["amount = 1"; 10_000].join(" && ");
        assert_eq!(parse(&source), Err(FilterError::TooManyTerms(MAX_TERMS)));

        let at_limit = vec!["amount = 1"; MAX_TERMS].join(" || ");
        let expr = parse(&at_limit).unwrap();
        assert!(expr.matches(&json!({"amount": 1})));
        assert_eq!(parse(&expr.to_string()).unwrap(), expr);
    }

    #[test]
    fn test_term_bound_is_configurable() {
        assert!(parse_bounded("a = 1 && b = 2", 2).is_ok());
        assert_eq!(
            parse_bounded("a = 1 && b = 2 && c = 3", 2),
            Err(FilterError::TooManyTerms(2))
        );
    }

    #[test]
    fn test_compare_values_mixed_types() {
        assert_eq!(compare_values(&json!(2), &json!("10")), Some(Ordering::Less));
        assert_eq!(compare_values(&json!("b"), &json!("a")), Some(Ordering::Greater));
        assert_eq!(compare_values(&json!(1), &json!("abc")), None);
    }

    #[test]
    fn test_fields_lists_every_reference() {
        let expr = parse(r#"(amount > 5 || category = "Food") && "x" = @request.auth.id"#).unwrap();
        assert_eq!(expr.fields(), vec!["amount", "category", "@request.auth.id"]);
    }
}
