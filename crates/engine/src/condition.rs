//! Condition expressions for `condition` nodes.
//!
//! The grammar is small. An expression is either the literal
//! `true`/`false` (any case) or exactly one comparison
//!
//! ```text
//! <path> <op> <literal>      op ∈ { ===, ==, !==, !=, >, <, >=, <= }
//! ```
//!
//! where `<path>` is a dot-separated walk into the execution context, e.g.
//! `trigger_data.amount` or `node-1.status`. A segment is any run of
//! characters other than whitespace, dots, parentheses and operator
//! characters, so free-text node ids can be addressed. Anything else evaluates to `false`; there is no
//! general-purpose interpreter behind this.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

/// Comparison operators, with JavaScript-style strict/loose equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    StrictEq,
    LooseEq,
    StrictNe,
    LooseNe,
    Gt,
    Lt,
    Ge,
    Le,
}

impl Operator {
    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "===" => Self::StrictEq,
            "==" => Self::LooseEq,
            "!==" => Self::StrictNe,
            "!=" => Self::LooseNe,
            ">" => Self::Gt,
            "<" => Self::Lt,
            ">=" => Self::Ge,
            "<=" => Self::Le,
            _ => return None,
        })
    }
}

/// A value on either side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// An unresolved path, or the literal `undefined`.
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    /// Arrays and objects reached through a path.
    Composite(Value),
}

impl Operand {
    fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => n.as_f64().map(Self::Number).unwrap_or(Self::Undefined),
            Value::String(s) => Self::String(s.clone()),
            other => Self::Composite(other.clone()),
        }
    }

    /// Parse the right-hand literal: boolean, `null`, `undefined`, a quoted
    /// string, a number, or else the raw text.
    fn parse_literal(raw: &str) -> Self {
        match raw {
            "true" => return Self::Bool(true),
            "false" => return Self::Bool(false),
            "null" => return Self::Null,
            "undefined" => return Self::Undefined,
            _ => {}
        }

        let bytes = raw.as_bytes();
        if bytes.len() >= 2 {
            let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
            if first == last && (first == b'\'' || first == b'"') {
                return Self::String(raw[1..raw.len() - 1].to_owned());
            }
        }

        match string_to_number(raw) {
            n if n.is_nan() => Self::String(raw.to_owned()),
            n => Self::Number(n),
        }
    }

    /// Numeric conversion in the JavaScript `Number(x)` sense.
    fn to_number(&self) -> f64 {
        match self {
            Self::Undefined | Self::Composite(_) => f64::NAN,
            Self::Null => 0.0,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Number(n) => *n,
            Self::String(s) => string_to_number(s),
        }
    }
}

fn string_to_number(s: &str) -> f64 {
    let s = s.trim();
    if s.is_empty() {
        return 0.0;
    }
    match s {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).map(|n| n as f64).unwrap_or(f64::NAN);
    }
    // Rust accepts "inf"/"nan" spellings that JavaScript does not.
    if !s.bytes().all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-')) {
        return f64::NAN;
    }
    s.parse().unwrap_or(f64::NAN)
}

fn strict_equals(left: &Operand, right: &Operand) -> bool {
    match (left, right) {
        (Operand::Undefined, Operand::Undefined) | (Operand::Null, Operand::Null) => true,
        (Operand::Bool(a), Operand::Bool(b)) => a == b,
        (Operand::Number(a), Operand::Number(b)) => a == b,
        (Operand::String(a), Operand::String(b)) => a == b,
        _ => false,
    }
}

/// Loose equality. Unlike JavaScript, `undefined` only equals `undefined`.
fn loose_equals(left: &Operand, right: &Operand) -> bool {
    match (left, right) {
        (Operand::Undefined, other) | (other, Operand::Undefined) => {
            matches!(other, Operand::Undefined)
        }
        (Operand::Null, other) | (other, Operand::Null) => matches!(other, Operand::Null),
        (Operand::Number(a), Operand::String(_)) => *a == right.to_number(),
        (Operand::String(_), Operand::Number(b)) => left.to_number() == *b,
        (Operand::Bool(_), _) => loose_equals(&Operand::Number(left.to_number()), right),
        (_, Operand::Bool(_)) => loose_equals(left, &Operand::Number(right.to_number())),
        _ => strict_equals(left, right),
    }
}

/// A single `<path> <op> <literal>` comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub path: Vec<String>,
    pub op: Operator,
    pub right: Operand,
}

impl Comparison {
    fn resolve(&self, context: &Map<String, Value>) -> Operand {
        let Some((head, rest)) = self.path.split_first() else {
            return Operand::Undefined;
        };
        let mut current = match context.get(head) {
            Some(v) => v,
            None => return Operand::Undefined,
        };
        for segment in rest {
            let next = match current {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            };
            match next {
                Some(v) => current = v,
                None => return Operand::Undefined,
            }
        }
        Operand::from_json(current)
    }

    pub fn evaluate(&self, context: &Map<String, Value>) -> bool {
        let left = self.resolve(context);
        let right = &self.right;
        match self.op {
            Operator::StrictEq => strict_equals(&left, right),
            Operator::StrictNe => !strict_equals(&left, right),
            Operator::LooseEq => loose_equals(&left, right),
            Operator::LooseNe => !loose_equals(&left, right),
            // NaN on either side makes every ordering false.
            Operator::Gt => left.to_number() > right.to_number(),
            Operator::Lt => left.to_number() < right.to_number(),
            Operator::Ge => left.to_number() >= right.to_number(),
            Operator::Le => left.to_number() <= right.to_number(),
        }
    }
}

/// A parsed condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(bool),
    Compare(Comparison),
}

fn comparison_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^\s*([^\s=!<>.()]+(?:\.[^\s=!<>.()]+)*)\s*(===|!==|==|!=|>=|<=|>|<)\s*(.+?)\s*$",
        )
        .expect("comparison pattern is valid")
    })
}

impl Expression {
    /// `None` when `expr` is outside the grammar.
    pub fn parse(expr: &str) -> Option<Self> {
        let trimmed = expr.trim();
        if trimmed.eq_ignore_ascii_case("true") {
            return Some(Self::Literal(true));
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return Some(Self::Literal(false));
        }

        let caps = comparison_pattern().captures(trimmed)?;
        Some(Self::Compare(Comparison {
            path: caps[1].split('.').map(str::to_owned).collect(),
            op: Operator::parse(&caps[2])?,
            right: Operand::parse_literal(&caps[3]),
        }))
    }

    pub fn evaluate(&self, context: &Map<String, Value>) -> bool {
        match self {
            Self::Literal(b) => *b,
            Self::Compare(cmp) => cmp.evaluate(context),
        }
    }
}

/// Evaluate `expression` against `context`. Unparseable input is `false`.
pub fn evaluate(expression: &str, context: &Map<String, Value>) -> bool {
    Expression::parse(expression)
        .map(|expr| expr.evaluate(context))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn numeric_comparison_against_trigger_data() {
        let big = ctx(json!({ "trigger_data": { "amount": 150 } }));
        let small = ctx(json!({ "trigger_data": { "amount": 50 } }));
        assert!(evaluate("trigger_data.amount > 100", &big));
        assert!(!evaluate("trigger_data.amount > 100", &small));
        assert!(evaluate("trigger_data.amount <= 50", &small));
        assert!(evaluate("trigger_data.amount >= 50", &small));
        assert!(evaluate("trigger_data.amount < 50.5", &small));
    }

    #[test]
    fn quoted_string_equality() {
        let c = ctx(json!({ "x": "foo" }));
        assert!(evaluate("x === 'foo'", &c));
        assert!(evaluate("x == \"foo\"", &c));
        assert!(!evaluate("x === 'bar'", &c));
        assert!(evaluate("x !== 'bar'", &c));
    }

    #[test]
    fn literals_are_case_insensitive() {
        let c = Map::new();
        assert!(evaluate("true", &c));
        assert!(evaluate("  TRUE ", &c));
        assert!(!evaluate("False", &c));
    }

    #[test]
    fn anything_outside_the_grammar_is_false() {
        let c = ctx(json!({ "x": 1 }));
        for expr in [
            "1; DROP TABLE x",
            "",
            "x",
            "x > 1 && x < 3",
            "process.exit(1)",
            "x => 1",
            "(x > 0)",
        ] {
            assert!(!evaluate(expr, &c), "{expr:?} should be false");
        }
        assert!(Expression::parse("1; DROP TABLE x").is_none());
    }

    #[test]
    fn undefined_paths() {
        let c = ctx(json!({ "a": { "b": 1 } }));
        assert!(evaluate("a.missing !== 1", &c));
        assert!(evaluate("a.missing != null", &c));
        assert!(!evaluate("a.missing === null", &c));
        assert!(!evaluate("a.missing == null", &c));
        assert!(evaluate("a.missing === undefined", &c));
        assert!(evaluate("nothing.at.all == undefined", &c));
        assert!(!evaluate("a.missing > 0", &c));
        assert!(!evaluate("a.missing < 0", &c));
    }

    #[test]
    fn strict_vs_loose_equality() {
        let c = ctx(json!({ "n": 5, "s": "5", "flag": true }));
        assert!(evaluate("n == '5'", &c));
        assert!(!evaluate("n === '5'", &c));
        assert!(evaluate("s == 5", &c));
        assert!(!evaluate("s === 5", &c));
        assert!(evaluate("flag == 1", &c));
        assert!(evaluate("flag === true", &c));
        assert!(!evaluate("flag === 1", &c));
    }

    #[test]
    fn numeric_operators_coerce_strings() {
        let c = ctx(json!({ "amount": "250", "word": "lots" }));
        assert!(evaluate("amount > 100", &c));
        assert!(evaluate("amount >= '250'", &c));
        assert!(!evaluate("word > 1", &c));
        assert!(!evaluate("word < 1", &c));
    }

    #[test]
    fn null_and_booleans_in_context() {
        let c = ctx(json!({ "v": null, "ok": false }));
        assert!(evaluate("v === null", &c));
        assert!(evaluate("v == null", &c));
        assert!(evaluate("v < 1", &c));
        assert!(evaluate("ok === false", &c));
        assert!(evaluate("ok == 0", &c));
    }

    #[test]
    fn array_indices_in_paths() {
        let c = ctx(json!({ "items": [ { "qty": 3 }, { "qty": 7 } ] }));
        assert!(evaluate("items.1.qty === 7", &c));
        assert!(evaluate("items.5.qty === undefined", &c));
    }

    #[test]
    fn condition_result_of_a_previous_node_is_addressable() {
        let c = ctx(json!({ "check": { "condition_result": true }, "condition_result": true }));
        assert!(evaluate("condition_result === true", &c));
        assert!(evaluate("check.condition_result == true", &c));
    }

    #[test]
    fn outputs_under_free_text_node_ids_are_addressable() {
        let id = "9b2f6c1e-4d3a-4e8b-a1c2-7f5e3d2b1a09";
        let c = ctx(json!({
            "node-1": { "status": 200 },
            id: { "webhook_called": true },
        }));
        assert!(evaluate("node-1.status === 200", &c));
        assert!(evaluate("node-1.status >= 200", &c));
        assert!(evaluate(&format!("{id}.webhook_called === true"), &c));
        assert!(!evaluate(&format!("{id}.webhook_called === false"), &c));

        let Some(Expression::Compare(cmp)) = Expression::parse("node-1.status!==500") else {
            panic!("expected a comparison");
        };
        assert_eq!(cmp.path, vec!["node-1", "status"]);
        assert_eq!(cmp.op, Operator::StrictNe);
    }

    #[test]
    fn unquoted_words_stay_raw_strings() {
        let c = ctx(json!({ "tier": "gold" }));
        assert!(evaluate("tier === gold", &c));
        assert!(!evaluate("tier === 'gold' || true", &c));
    }

    #[test]
    fn parse_reports_the_operator_and_literal() {
        let Some(Expression::Compare(cmp)) = Expression::parse("a.b >= -2.5") else {
            panic!("expected a comparison");
        };
        assert_eq!(cmp.path, vec!["a", "b"]);
        assert_eq!(cmp.op, Operator::Ge);
        assert_eq!(cmp.right, Operand::Number(-2.5));
    }
}
