//! Filter evaluation
//!
//! Predicates are opaque strings to the rest of the crate. They are handed to
//! a [`FilterEvaluator`], which the engine receives at open time, so a
//! different predicate language can be plugged in without touching the
//! dispatcher or the query façade.
//!
//! [`PredicateEvaluator`] is the built-in implementation. It understands
//! comparisons (`==`, `!=`, `<`, `<=`, `>`, `>=`, `CONTAINS`, `BEGINSWITH`,
//! `ENDSWITH`, optionally `[c]` for case-insensitive string matching), the
//! combinators `AND`/`OR`/`NOT` (or `&&`/`||`/`!`), parentheses, and
//! `TRUEPREDICATE`/`FALSEPREDICATE`.

mod parser;

use std::cmp::Ordering;

use rayon::prelude::*;
use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::types::Object;

pub use parser::{parse, CompareOp, Expr};

/// Threshold for evaluating a predicate in parallel (objects count)
const PARALLEL_FILTER_THRESHOLD: usize = 1000;

/// Evaluates a predicate against a collection, returning the indices of the
/// matching objects in collection order
pub trait FilterEvaluator: Send + Sync {
    fn evaluate(&self, predicate: &str, objects: &[Object]) -> StoreResult<Vec<usize>>;
}

/// Default evaluator for the built-in predicate language
#[derive(Debug, Default, Clone, Copy)]
pub struct PredicateEvaluator;

impl PredicateEvaluator {
    pub fn new() -> Self {
        Self
    }
}

impl FilterEvaluator for PredicateEvaluator {
    fn evaluate(&self, predicate: &str, objects: &[Object]) -> StoreResult<Vec<usize>> {
        let expr = parse(predicate)
            .map_err(|e| StoreError::invalid(format!("invalid filter '{}': {}", predicate, e)))?;

        let matches = if objects.len() > PARALLEL_FILTER_THRESHOLD {
            objects
                .par_iter()
                .enumerate()
                .filter(|(_, object)| matches(&expr, object))
                .map(|(i, _)| i)
                .collect()
        } else {
            objects
                .iter()
                .enumerate()
                .filter(|(_, object)| matches(&expr, object))
                .map(|(i, _)| i)
                .collect()
        };

        Ok(matches)
    }
}

/// Run `evaluator` and reject positions outside `objects`
pub fn select(
    evaluator: &dyn FilterEvaluator,
    predicate: &str,
    objects: &[Object],
) -> StoreResult<Vec<usize>> {
    let positions = evaluator.evaluate(predicate, objects)?;
    if let Some(bad) = positions.iter().find(|&&i| i >= objects.len()) {
        return Err(StoreError::invalid(format!(
            "filter '{}' selected position {} of {} objects",
            predicate,
            bad,
            objects.len()
        )));
    }
    Ok(positions)
}

/// Evaluate an expression against one object
pub fn matches(expr: &Expr, object: &Object) -> bool {
    match expr {
        Expr::True => true,
        Expr::False => false,
        Expr::Not(inner) => !matches(inner, object),
        Expr::And(left, right) => matches(left, object) && matches(right, object),
        Expr::Or(left, right) => matches(left, object) || matches(right, object),
        Expr::Compare {
            field,
            op,
            value,
            case_insensitive,
        } => {
            let actual = lookup(object, field).unwrap_or(&Value::Null);
            compare(actual, *op, value, *case_insensitive)
        }
    }
}

/// Resolve a dotted field path
fn lookup<'a>(object: &'a Object, field: &str) -> Option<&'a Value> {
    let mut parts = field.split('.');
    let mut current = object.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn fold(text: &str, case_insensitive: bool) -> String {
    if case_insensitive {
        text.to_lowercase()
    } else {
        text.to_string()
    }
}

fn ordering(actual: &Value, expected: &Value, case_insensitive: bool) -> Option<Ordering> {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => {
            Some(fold(a, case_insensitive).cmp(&fold(b, case_insensitive)))
        }
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

fn compare(actual: &Value, op: CompareOp, expected: &Value, case_insensitive: bool) -> bool {
    match op {
        CompareOp::Eq => ordering(actual, expected, case_insensitive) == Some(Ordering::Equal),
        CompareOp::Ne => ordering(actual, expected, case_insensitive) != Some(Ordering::Equal),
        CompareOp::Lt => ordering(actual, expected, case_insensitive) == Some(Ordering::Less),
        CompareOp::Le => matches!(
            ordering(actual, expected, case_insensitive),
            Some(Ordering::Less | Ordering::Equal)
        ),
        CompareOp::Gt => ordering(actual, expected, case_insensitive) == Some(Ordering::Greater),
        CompareOp::Ge => matches!(
            ordering(actual, expected, case_insensitive),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        CompareOp::Contains | CompareOp::BeginsWith | CompareOp::EndsWith => {
            let (Some(a), Some(b)) = (actual.as_str(), expected.as_str()) else {
                return false;
            };
            let (a, b) = (fold(a, case_insensitive), fold(b, case_insensitive));
            match op {
                CompareOp::Contains => a.contains(&b),
                CompareOp::BeginsWith => a.starts_with(&b),
                _ => a.ends_with(&b),
            }
        }
    }
}
