//! Parsing of declared conditions into predicate trees.
//!
//! Two declaration forms are accepted:
//! - Lookup keys: `is_active`, `age__gte`, `status__in`, `deleted_at__isnull`
//! - Text expressions:
//!   - Field comparisons: `age >= 18`, `status <> 'banned'`
//!   - Null checks: `email IS NOT NULL`, `deleted_at IS NULL`
//!   - IN lists: `status IN ('active', 'pending')`, `status NOT IN ('spam')`
//!   - Boolean operators: `AND`, `OR`, `NOT`
//!   - Parentheses for grouping

use crate::catalog::LookupValue;

use super::{Operator, Predicate, Value};

/// Why a condition could not be parsed.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ParseError {
    /// Lookup operator or relation span is not supported.
    UnsupportedLookup(String),
    /// Malformed condition.
    Invalid(String),
}

/// Convert a lookup key and operand into a predicate leaf.
pub(crate) fn parse_lookup(key: &str, value: &LookupValue) -> Result<Predicate, ParseError> {
    let mut parts = key.split("__");
    let field = parts.next().unwrap_or_default();
    let op = parts.next().unwrap_or("exact");
    if parts.next().is_some() || !is_identifier(field) {
        return Err(ParseError::UnsupportedLookup(key.to_string()));
    }

    let scalar = || match value {
        LookupValue::Scalar(v) => Ok(v.clone()),
        LookupValue::List(_) => Err(ParseError::Invalid(format!(
            "lookup '{}' expects a single value",
            key
        ))),
    };
    let not_null = |v: Value| {
        if v.is_null() {
            Err(ParseError::Invalid(format!(
                "lookup '{}' cannot compare against null",
                key
            )))
        } else {
            Ok(v)
        }
    };

    let op = match op {
        "exact" => match scalar()? {
            Value::Null => Operator::IsNull(true),
            v => Operator::Eq(v),
        },
        "gt" => Operator::Gt(not_null(scalar()?)?),
        "gte" => Operator::Ge(not_null(scalar()?)?),
        "lt" => Operator::Lt(not_null(scalar()?)?),
        "lte" => Operator::Le(not_null(scalar()?)?),
        "isnull" => match scalar()? {
            Value::Bool(b) => Operator::IsNull(b),
            _ => {
                return Err(ParseError::Invalid(format!(
                    "lookup '{}' expects a boolean",
                    key
                )))
            }
        },
        "in" => match value {
            LookupValue::List(values) => Operator::In(values.clone()),
            LookupValue::Scalar(_) => {
                return Err(ParseError::Invalid(format!(
                    "lookup '{}' expects a list",
                    key
                )))
            }
        },
        _ => return Err(ParseError::UnsupportedLookup(key.to_string())),
    };

    Ok(Predicate::leaf(field, op))
}

/// Parse a text expression into a predicate tree.
pub(crate) fn parse_expression(expression: &str) -> Result<Predicate, ParseError> {
    let expr = expression.trim();
    if expr.is_empty() {
        return Err(ParseError::Invalid("empty expression".to_string()));
    }
    parse_expr(expr, 0)
}

/// Deepest nesting of parentheses, `NOT` and boolean operators accepted.
const MAX_DEPTH: usize = 64;

fn parse_expr(expr: &str, depth: usize) -> Result<Predicate, ParseError> {
    if depth > MAX_DEPTH {
        return Err(ParseError::Invalid(format!(
            "expression nested deeper than {} levels",
            MAX_DEPTH
        )));
    }
    let expr = expr.trim();
    let next = depth + 1;

    // Handle parentheses wrapping the whole expression
    if expr.starts_with('(') && expr.ends_with(')') && parens_balanced(&expr[1..expr.len() - 1]) {
        return parse_expr(&expr[1..expr.len() - 1], next);
    }

    // OR has the lowest precedence
    let or_parts = split_all(expr, " OR ");
    if or_parts.len() > 1 {
        return or_parts
            .into_iter()
            .map(|part| parse_expr(part, next))
            .collect::<Result<Vec<_>, _>>()
            .map(Predicate::Or);
    }

    let and_parts = split_all(expr, " AND ");
    if and_parts.len() > 1 {
        return and_parts
            .into_iter()
            .map(|part| parse_expr(part, next))
            .collect::<Result<Vec<_>, _>>()
            .map(Predicate::And);
    }

    if let Some(rest) = strip_keyword(expr, "NOT ") {
        return Ok(parse_expr(rest, next)?.not());
    }

    if let Some(field) = strip_suffix_keyword(expr, " IS NOT NULL") {
        return Ok(Predicate::is_not_null(identifier(field)?));
    }

    if let Some(field) = strip_suffix_keyword(expr, " IS NULL") {
        return Ok(Predicate::is_null(identifier(field)?));
    }

    if let Some((field, values)) = split_in(expr, " NOT IN ")? {
        return Ok(Predicate::is_in(identifier(field)?, values).not());
    }

    if let Some((field, values)) = split_in(expr, " IN ")? {
        return Ok(Predicate::is_in(identifier(field)?, values));
    }

    parse_comparison(expr)
}

/// Check if parentheses are balanced.
fn parens_balanced(s: &str) -> bool {
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    for c in s.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

/// Byte offsets of every top-level occurrence of `op`, outside quotes and parentheses.
fn top_level_matches(expr: &str, op: &str) -> Vec<usize> {
    let mut matches = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;

    for (i, c) in expr.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => {
                quote = None;
                continue;
            }
            (Some(_), _) => continue,
            (None, '\'' | '"') => {
                quote = Some(c);
                continue;
            }
            (None, '(') => depth += 1,
            (None, ')') => depth -= 1,
            _ => {}
        }

        if depth == 0 {
            let rest = &expr[i..];
            if rest.len() >= op.len()
                && rest.is_char_boundary(op.len())
                && rest[..op.len()].eq_ignore_ascii_case(op)
            {
                matches.push(i);
            }
        }
    }
    matches
}

/// Split at every top-level occurrence of `op`.
fn split_all<'a>(expr: &'a str, op: &str) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut start = 0;
    for pos in top_level_matches(expr, op) {
        if pos < start {
            continue;
        }
        parts.push(expr[start..pos].trim());
        start = pos + op.len();
    }
    parts.push(expr[start..].trim());
    parts
}

/// Split at the first top-level occurrence of `op`.
fn split_once<'a>(expr: &'a str, op: &str) -> Option<(&'a str, &'a str)> {
    top_level_matches(expr, op)
        .first()
        .map(|&pos| (expr[..pos].trim(), expr[pos + op.len()..].trim()))
}

fn strip_keyword<'a>(expr: &'a str, keyword: &str) -> Option<&'a str> {
    let head = expr.get(..keyword.len())?;
    head.eq_ignore_ascii_case(keyword)
        .then(|| expr[keyword.len()..].trim())
}

fn strip_suffix_keyword<'a>(expr: &'a str, keyword: &str) -> Option<&'a str> {
    let split = expr.len().checked_sub(keyword.len())?;
    let tail = expr.get(split..)?;
    tail.eq_ignore_ascii_case(keyword).then(|| expr[..split].trim())
}

/// Extract field and values from a `field IN ('a', 'b')` pattern.
fn split_in<'a>(expr: &'a str, op: &str) -> Result<Option<(&'a str, Vec<Value>)>, ParseError> {
    let Some((field, rest)) = split_once(expr, op) else {
        return Ok(None);
    };
    if !(rest.starts_with('(') && rest.ends_with(')')) {
        return Err(ParseError::Invalid(format!(
            "expected parenthesized list in '{}'",
            expr
        )));
    }
    let values = split_list(&rest[1..rest.len() - 1])
        .into_iter()
        .map(|item| {
            parse_literal(item)
                .ok_or_else(|| ParseError::Invalid(format!("invalid list item '{}'", item)))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some((field, values)))
}

/// Split comma-separated list items, respecting quotes.
fn split_list(s: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in s.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, ',') => {
                items.push(s[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(s[start..].trim());
    items.retain(|item| !item.is_empty());
    items
}

fn parse_comparison(expr: &str) -> Result<Predicate, ParseError> {
    // Longer operators must come first to avoid partial matches
    const OPERATORS: [&str; 7] = [">=", "<=", "!=", "<>", "=", ">", "<"];

    for op in OPERATORS {
        let Some((left, right)) = split_once(expr, op) else {
            continue;
        };

        let (field, literal, flipped) = match (parse_literal(left), parse_literal(right)) {
            (None, Some(lit)) => (left, lit, false),
            (Some(lit), None) => (right, lit, true),
            _ => {
                return Err(ParseError::Invalid(format!(
                    "comparison '{}' must be between a field and a literal",
                    expr
                )))
            }
        };
        let field = identifier(field)?;

        let op = match (op, flipped) {
            ("=", _) => Operator::Eq(literal),
            ("!=" | "<>", _) => Operator::Ne(literal),
            (">=", false) | ("<=", true) => Operator::Ge(literal),
            ("<=", false) | (">=", true) => Operator::Le(literal),
            (">", false) | ("<", true) => Operator::Gt(literal),
            _ => Operator::Lt(literal),
        };
        return Ok(Predicate::leaf(field, op));
    }

    Err(ParseError::Invalid(format!(
        "cannot parse expression: {}",
        expr
    )))
}

/// Parse a literal; `None` means the token is not a literal.
fn parse_literal(s: &str) -> Option<Value> {
    let s = s.trim();

    if s.len() >= 2
        && ((s.starts_with('\'') && s.ends_with('\'')) || (s.starts_with('"') && s.ends_with('"')))
    {
        return Some(Value::String(s[1..s.len() - 1].to_string()));
    }

    if s.eq_ignore_ascii_case("NULL") {
        return Some(Value::Null);
    }
    if s.eq_ignore_ascii_case("TRUE") {
        return Some(Value::Bool(true));
    }
    if s.eq_ignore_ascii_case("FALSE") {
        return Some(Value::Bool(false));
    }

    if let Ok(i) = s.parse::<i64>() {
        return Some(Value::Int(i));
    }
    if let Ok(f) = s.parse::<f64>() {
        if f.is_finite() {
            return Some(Value::Float(f));
        }
    }

    None
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn identifier(s: &str) -> Result<&str, ParseError> {
    let s = s.trim();
    if is_identifier(s) {
        Ok(s)
    } else {
        Err(ParseError::Invalid(format!("invalid field reference '{}'", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(expr: &str) -> Predicate {
        parse_expression(expr).unwrap()
    }

    #[test]
    fn test_simple_comparison() {
        assert_eq!(parse("age >= 18"), Predicate::ge("age", 18));
        assert_eq!(parse("age > 20"), Predicate::gt("age", 20));
        assert_eq!(parse("age < 30"), Predicate::lt("age", 30));
        assert_eq!(parse("age = 25"), Predicate::eq("age", 25));
        assert_eq!(parse("status <> 'x'"), Predicate::ne("status", "x"));
        assert_eq!(parse("status != 'x'"), Predicate::ne("status", "x"));
    }

    #[test]
    fn test_flipped_comparison() {
        assert_eq!(parse("18 <= age"), Predicate::ge("age", 18));
        assert_eq!(parse("0 > balance"), Predicate::lt("balance", 0));
    }

    #[test]
    fn test_literals() {
        assert_eq!(parse("is_active = TRUE"), Predicate::eq("is_active", true));
        assert_eq!(parse("price <= 9.5"), Predicate::le("price", 9.5));
        assert_eq!(parse("name = \"O'Brien\""), Predicate::eq("name", "O'Brien"));
    }

    #[test]
    fn test_is_null() {
        assert_eq!(parse("deleted_at IS NULL"), Predicate::is_null("deleted_at"));
        assert_eq!(parse("email is not null"), Predicate::is_not_null("email"));
    }

    #[test]
    fn test_in_clause() {
        assert_eq!(
            parse("status IN ('active', 'pending', 3)"),
            Predicate::leaf(
                "status",
                Operator::In(vec![Value::from("active"), Value::from("pending"), Value::Int(3)])
            )
        );
        assert_eq!(
            parse("status NOT IN ('a, b')"),
            Predicate::is_in("status", ["a, b"]).not()
        );
    }

    #[test]
    fn test_and_or_precedence() {
        let p = parse("a = 1 OR b = 2 AND c = 4");
        assert_eq!(
            p,
            Predicate::Or(vec![
                Predicate::eq("a", 1),
                Predicate::And(vec![Predicate::eq("b", 2), Predicate::eq("c", 4)]),
            ])
        );
    }

    #[test]
    fn test_parentheses_and_not() {
        let p = parse("(a = 1 OR b = 2) AND NOT c = 4");
        assert_eq!(
            p,
            Predicate::And(vec![
                Predicate::Or(vec![Predicate::eq("a", 1), Predicate::eq("b", 2)]),
                Predicate::eq("c", 4).not(),
            ])
        );
    }

    #[test]
    fn test_operator_inside_string() {
        assert_eq!(
            parse("note = 'x AND y OR z'"),
            Predicate::eq("note", "x AND y OR z")
        );
    }

    #[test]
    fn test_invalid_expressions() {
        assert!(matches!(parse_expression(""), Err(ParseError::Invalid(_))));
        assert!(matches!(parse_expression("a = b"), Err(ParseError::Invalid(_))));
        assert!(matches!(parse_expression("1 = 1"), Err(ParseError::Invalid(_))));
        assert!(matches!(parse_expression("lower(a) = 'x'"), Err(ParseError::Invalid(_))));
        assert!(matches!(parse_expression("status IN 'a'"), Err(ParseError::Invalid(_))));
    }

    #[test]
    fn test_nesting_depth_limit() {
        let shallow = format!("{}a = 1{}", "(".repeat(32), ")".repeat(32));
        assert_eq!(parse(&shallow), Predicate::eq("a", 1));

        let deep = format!("{}a = 1{}", "(".repeat(10_000), ")".repeat(10_000));
        assert!(matches!(parse_expression(&deep), Err(ParseError::Invalid(_))));

        let negations = format!("{}a = 1", "NOT ".repeat(10_000));
        assert!(matches!(parse_expression(&negations), Err(ParseError::Invalid(_))));
    }

    #[test]
    fn test_lookups() {
        let lit = |v: Value| LookupValue::Scalar(v);

        assert_eq!(
            parse_lookup("is_active", &lit(Value::Bool(true))).unwrap(),
            Predicate::eq("is_active", true)
        );
        assert_eq!(
            parse_lookup("age__gte", &lit(Value::Int(18))).unwrap(),
            Predicate::ge("age", 18)
        );
        assert_eq!(
            parse_lookup("deleted_at", &lit(Value::Null)).unwrap(),
            Predicate::is_null("deleted_at")
        );
        assert_eq!(
            parse_lookup("deleted_at__isnull", &lit(Value::Bool(false))).unwrap(),
            Predicate::is_not_null("deleted_at")
        );
        assert_eq!(
            parse_lookup(
                "status__in",
                &LookupValue::List(vec![Value::from("a"), Value::from("b")])
            )
            .unwrap(),
            Predicate::is_in("status", ["a", "b"])
        );
    }

    #[test]
    fn test_unsupported_lookups() {
        let v = LookupValue::Scalar(Value::from("x"));

        assert_eq!(
            parse_lookup("name__icontains", &v),
            Err(ParseError::UnsupportedLookup("name__icontains".into()))
        );
        assert_eq!(
            parse_lookup("author__name__exact", &v),
            Err(ParseError::UnsupportedLookup("author__name__exact".into()))
        );
        assert!(matches!(parse_lookup("status__in", &v), Err(ParseError::Invalid(_))));
        assert!(matches!(
            parse_lookup("age__gt", &LookupValue::Scalar(Value::Null)),
            Err(ParseError::Invalid(_))
        ));
    }
}
