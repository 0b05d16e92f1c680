//! CertLogic: the JSON expression language used for national validation rules.
//!
//! Rules are server-delivered data, so this is a small interpreter over the
//! untyped expression tree, not generated code. Only the operators the
//! published rule sets actually use are implemented: `var`, `if`, `===`, `in`,
//! `+`, `and`, the comparisons, `!`, `plusTime` and `reduce`.
//!
//! Every type or arity violation surfaces as an [Error]; the national rules
//! verifier downgrades those to an "unknown rule failed" outcome so that one
//! malformed rule cannot take down a whole verification.

mod datetime;

pub use datetime::{JsonDateTime, TimeUnit};

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("unrecognised expression object encountered")]
    UnrecognisedExpression,
    #[error("not of the form {{ \"var\": \"<path>\" }}")]
    MalformedVar,
    #[error("operation not of the form {{ \"<operator>\": [ <args...> ] }}")]
    MalformedOperation,
    #[error("unrecognised operator: {0:?}")]
    UnknownOperator(String),
    #[error("an \"and\" operation must have at least 2 operands")]
    AndArity,
    #[error("an operation with operator {0:?} must have 2 or 3 operands")]
    ComparisonArity(String),
    #[error("an operation with operator {0:?} must have 2 operands")]
    BinaryArity(String),
    #[error("an operation with operator {0:?} must have 3 operands")]
    TernaryArity(String),
    #[error("if-guard evaluates to something neither truthy, nor falsy")]
    IfGuardNotBoolish,
    #[error("operand of ! evaluates to something neither truthy, nor falsy")]
    NotOperandNotBoolish,
    #[error("right-hand side of an \"in\" operation must be an array")]
    InOperandNotArray,
    #[error("operands of a \"+\" operator must both be integers")]
    PlusOperandsNotInt,
    #[error("integer addition overflowed")]
    IntegerOverflow,
    #[error("all operands of a comparison must have the same type")]
    MixedComparison,
    #[error("can't compare operands of the type given to a {0:?} operation")]
    UnsupportedComparisonType(String),
    #[error("\"amount\" argument (#2) of \"plusTime\" must be an integer")]
    PlusTimeAmountNotNumber,
    #[error("\"unit\" argument (#3) of \"plusTime\" must be the string \"day\" or \"hour\"")]
    PlusTimeBadUnit,
    #[error("date argument of \"plusTime\" must be a string")]
    PlusTimeDateNotString,
    #[error("could not parse {0:?} as an ISO-8601 date or date-time")]
    InvalidDateTime(String),
    #[error("date-time arithmetic out of range")]
    DateOutOfRange,
    #[error("operand of reduce evaluated to a non-null non-array")]
    ReduceOperandNotArray,
    #[error("reduce lambda context must consist of plain JSON values")]
    ReduceContextNotJson,
    #[error("invalid CertLogic expression")]
    InvalidExpression,
}

/// The result of evaluating an expression: either a plain JSON value, a
/// date-time produced by `plusTime`, or an array whose elements were
/// themselves evaluated.
#[derive(Debug, Clone)]
pub enum Evaluated {
    Json(Value),
    DateTime(JsonDateTime),
    Array(Vec<Evaluated>),
}

impl Evaluated {
    fn eq_json(&self, value: &Value) -> bool {
        match self {
            Evaluated::Json(json) => json == value,
            Evaluated::DateTime(_) => false,
            Evaluated::Array(items) => match value {
                Value::Array(values) => {
                    items.len() == values.len()
                        && items.iter().zip(values).all(|(a, b)| a.eq_json(b))
                }
                _ => false,
            },
        }
    }
}

impl PartialEq for Evaluated {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Evaluated::Json(a), Evaluated::Json(b)) => a == b,
            (Evaluated::DateTime(a), Evaluated::DateTime(b)) => a == b,
            (Evaluated::Array(a), Evaluated::Array(b)) => a == b,
            (Evaluated::Array(_), Evaluated::Json(v)) => self.eq_json(v),
            (Evaluated::Json(v), Evaluated::Array(_)) => other.eq_json(v),
            _ => false,
        }
    }
}

pub fn is_falsy(value: &Evaluated) -> bool {
    matches!(
        value,
        Evaluated::Json(Value::Bool(false)) | Evaluated::Json(Value::Null)
    )
}

pub fn is_truthy(value: &Evaluated) -> bool {
    match value {
        Evaluated::Json(Value::Bool(b)) => *b,
        Evaluated::Json(Value::Array(items)) => !items.is_empty(),
        Evaluated::Array(items) => !items.is_empty(),
        Evaluated::Json(Value::Object(_)) => true,
        Evaluated::Json(Value::String(_)) => true,
        _ => false,
    }
}

pub fn evaluate(expr: &Value, data: &Value) -> Result<Evaluated, Error> {
    match expr {
        Value::String(_) | Value::Bool(_) | Value::Null => Ok(Evaluated::Json(expr.clone())),
        Value::Number(n) if n.is_i64() => Ok(Evaluated::Json(expr.clone())),
        Value::Number(_) => Err(Error::InvalidExpression),
        Value::Array(items) => items
            .iter()
            .map(|item| evaluate(item, data))
            .collect::<Result<Vec<_>, _>>()
            .map(Evaluated::Array),
        Value::Object(map) => {
            if map.len() != 1 {
                return Err(Error::UnrecognisedExpression);
            }
            let (operator, args) = map.iter().next().ok_or(Error::UnrecognisedExpression)?;
            if operator == "var" {
                return evaluate_var(args, data);
            }
            let Value::Array(args) = args else {
                return Err(Error::MalformedOperation);
            };
            if args.is_empty() {
                return Err(Error::MalformedOperation);
            }
            match operator.as_str() {
                "if" => {
                    if args.len() < 3 {
                        return Err(Error::TernaryArity(operator.clone()));
                    }
                    evaluate_if(&args[0], &args[1], &args[2], data)
                }
                "===" => {
                    if args.len() != 2 {
                        return Err(Error::BinaryArity(operator.clone()));
                    }
                    let left = evaluate(&args[0], data)?;
                    let right = evaluate(&args[1], data)?;
                    Ok(Evaluated::Json(Value::Bool(left == right)))
                }
                "in" => {
                    if args.len() != 2 {
                        return Err(Error::BinaryArity(operator.clone()));
                    }
                    let needle = evaluate(&args[0], data)?;
                    let haystack = evaluate(&args[1], data)?;
                    let items = as_items(&haystack).ok_or(Error::InOperandNotArray)?;
                    Ok(Evaluated::Json(Value::Bool(items.contains(&needle))))
                }
                "+" => {
                    if args.len() != 2 {
                        return Err(Error::BinaryArity(operator.clone()));
                    }
                    let left = evaluate(&args[0], data)?;
                    let right = evaluate(&args[1], data)?;
                    let (Some(l), Some(r)) = (as_int(&left), as_int(&right)) else {
                        return Err(Error::PlusOperandsNotInt);
                    };
                    let sum = l.checked_add(r).ok_or(Error::IntegerOverflow)?;
                    Ok(Evaluated::Json(Value::from(sum)))
                }
                "and" => {
                    if args.len() < 2 {
                        return Err(Error::AndArity);
                    }
                    // Left to right, stopping at the first falsy operand.
                    let mut result = Evaluated::Json(Value::Bool(true));
                    for arg in args {
                        if is_falsy(&result) {
                            break;
                        }
                        result = evaluate(arg, data)?;
                    }
                    Ok(result)
                }
                "<" | ">" | "<=" | ">=" => {
                    if !(2..=3).contains(&args.len()) {
                        return Err(Error::ComparisonArity(operator.clone()));
                    }
                    evaluate_comparison(operator, args, data)
                }
                "!" => evaluate_not(&args[0], data),
                "plusTime" => {
                    if args.len() < 3 {
                        return Err(Error::TernaryArity(operator.clone()));
                    }
                    evaluate_plus_time(&args[0], &args[1], &args[2], data)
                }
                "reduce" => {
                    if args.len() < 3 {
                        return Err(Error::TernaryArity(operator.clone()));
                    }
                    evaluate_reduce(&args[0], &args[1], &args[2], data)
                }
                _ => Err(Error::UnknownOperator(operator.clone())),
            }
        }
    }
}

/// Navigate the data context by dotted path. The empty path is the whole
/// context; numeric fragments index arrays; any miss short-circuits to null.
fn evaluate_var(args: &Value, data: &Value) -> Result<Evaluated, Error> {
    if data.is_null() {
        return Ok(Evaluated::Json(Value::Null));
    }
    let Value::String(path) = args else {
        return Err(Error::MalformedVar);
    };
    if path.is_empty() {
        return Ok(Evaluated::Json(data.clone()));
    }
    let mut current = data;
    for fragment in path.split('.') {
        if current.is_null() {
            break;
        }
        current = match fragment.parse::<usize>() {
            Ok(index) => current.as_array().and_then(|items| items.get(index)),
            Err(_) => current.as_object().and_then(|object| object.get(fragment)),
        }
        .unwrap_or(&Value::Null);
    }
    Ok(Evaluated::Json(current.clone()))
}

fn evaluate_if(guard: &Value, then: &Value, else_: &Value, data: &Value) -> Result<Evaluated, Error> {
    let guard = evaluate(guard, data)?;
    if is_truthy(&guard) {
        evaluate(then, data)
    } else if is_falsy(&guard) {
        evaluate(else_, data)
    } else {
        Err(Error::IfGuardNotBoolish)
    }
}

fn evaluate_not(operand: &Value, data: &Value) -> Result<Evaluated, Error> {
    let operand = evaluate(operand, data)?;
    if is_falsy(&operand) {
        Ok(Evaluated::Json(Value::Bool(true)))
    } else if is_truthy(&operand) {
        Ok(Evaluated::Json(Value::Bool(false)))
    } else {
        Err(Error::NotOperandNotBoolish)
    }
}

fn evaluate_comparison(operator: &str, args: &[Value], data: &Value) -> Result<Evaluated, Error> {
    let evaluated = args
        .iter()
        .map(|arg| evaluate(arg, data))
        .collect::<Result<Vec<_>, _>>()?;

    let holds = match &evaluated[0] {
        Evaluated::Json(Value::Number(_)) => {
            let ints: Vec<i64> = evaluated
                .iter()
                .map(as_int)
                .collect::<Option<_>>()
                .ok_or(Error::MixedComparison)?;
            chained(operator, &ints)
        }
        Evaluated::DateTime(_) => {
            let dates: Vec<JsonDateTime> = evaluated
                .iter()
                .map(|value| match value {
                    Evaluated::DateTime(date) => Some(*date),
                    _ => None,
                })
                .collect::<Option<_>>()
                .ok_or(Error::MixedComparison)?;
            chained(operator, &dates)
        }
        _ => return Err(Error::UnsupportedComparisonType(operator.to_string())),
    };
    Ok(Evaluated::Json(Value::Bool(holds)))
}

/// With three operands both pairwise comparisons must hold.
fn chained<T: PartialOrd>(operator: &str, items: &[T]) -> bool {
    items.windows(2).all(|pair| match operator {
        "<" => pair[0] < pair[1],
        ">" => pair[0] > pair[1],
        "<=" => pair[0] <= pair[1],
        ">=" => pair[0] >= pair[1],
        _ => false,
    })
}

fn evaluate_plus_time(
    date: &Value,
    amount: &Value,
    unit: &Value,
    data: &Value,
) -> Result<Evaluated, Error> {
    let amount = if amount.is_object() {
        match evaluate(amount, data)? {
            Evaluated::Json(value) => value,
            _ => Value::Null,
        }
    } else {
        amount.clone()
    };
    let amount = amount.as_i64().ok_or(Error::PlusTimeAmountNotNumber)?;

    let unit: TimeUnit = unit
        .as_str()
        .ok_or(Error::PlusTimeBadUnit)?
        .parse()?;

    let date = match evaluate(date, data)? {
        Evaluated::Json(Value::String(s)) => JsonDateTime::parse(&s)?,
        _ => return Err(Error::PlusTimeDateNotString),
    };
    Ok(Evaluated::DateTime(date.plus(amount, unit)?))
}

/// Left fold. A null array operand yields the initial value; each step
/// evaluates the lambda against a synthetic `{accumulator, current}` context.
fn evaluate_reduce(
    operand: &Value,
    lambda: &Value,
    initial: &Value,
    data: &Value,
) -> Result<Evaluated, Error> {
    let operand = evaluate(operand, data)?;
    if matches!(operand, Evaluated::Json(Value::Null)) {
        return evaluate(initial, data);
    }
    let items = as_items(&operand).ok_or(Error::ReduceOperandNotArray)?;

    let mut accumulator = evaluate(initial, data)?;
    for current in items {
        let context = serde_json::json!({
            "accumulator": to_json(&accumulator).ok_or(Error::ReduceContextNotJson)?,
            "current": to_json(&current).ok_or(Error::ReduceContextNotJson)?,
        });
        accumulator = evaluate(lambda, &context)?;
    }
    Ok(accumulator)
}

fn as_int(value: &Evaluated) -> Option<i64> {
    match value {
        Evaluated::Json(Value::Number(n)) => n.as_i64(),
        _ => None,
    }
}

fn as_items(value: &Evaluated) -> Option<Vec<Evaluated>> {
    match value {
        Evaluated::Array(items) => Some(items.clone()),
        Evaluated::Json(Value::Array(values)) => {
            Some(values.iter().cloned().map(Evaluated::Json).collect())
        }
        _ => None,
    }
}

fn to_json(value: &Evaluated) -> Option<Value> {
    match value {
        Evaluated::Json(json) => Some(json.clone()),
        Evaluated::Array(items) => items
            .iter()
            .map(to_json)
            .collect::<Option<Vec<_>>>()
            .map(Value::Array),
        Evaluated::DateTime(_) => None,
    }
}
