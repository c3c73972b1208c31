use std::cmp::Ordering;

use serde_json::Value;

use super::error::FilterError;
use super::types::{FilterOp, FilterWhereInfo};

/// Parsed WHERE tree. The top level of a where object is an implicit `$and`.
#[derive(Debug, Clone)]
pub enum WhereNode {
    Field(FilterWhereInfo),
    And(Vec<WhereNode>),
    Or(Vec<WhereNode>),
    Not(Box<WhereNode>),
}

pub struct FilterWhere;

impl FilterWhere {
    pub fn validate(where_data: &Value) -> Result<(), FilterError> {
        if where_data.is_null() { return Ok(()); }
        match where_data {
            Value::Object(_) => Self::parse(where_data).map(|_| ()),
            Value::String(_) => Err(FilterError::InvalidWhereClause(
                "Raw predicates are not supported by the REST store".to_string(),
            )),
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    pub fn parse(where_data: &Value) -> Result<WhereNode, FilterError> {
        match where_data {
            Value::Null => Ok(WhereNode::And(vec![])),
            Value::Object(obj) => {
                let mut nodes = Vec::new();
                for (key, value) in obj {
                    if key.starts_with('$') {
                        nodes.push(Self::parse_logical_operator(key, value)?);
                    } else {
                        Self::validate_column(key)?;
                        nodes.extend(Self::parse_field_condition(key, value)?);
                    }
                }
                Ok(WhereNode::And(nodes))
            }
            _ => Err(FilterError::InvalidWhereClause("Unsupported WHERE format".to_string())),
        }
    }

    fn parse_logical_operator(op: &str, value: &Value) -> Result<WhereNode, FilterError> {
        match op {
            "$and" | "$or" => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", op)))?;
                let children = arr.iter().map(Self::parse).collect::<Result<Vec<_>, _>>()?;
                Ok(if op == "$and" { WhereNode::And(children) } else { WhereNode::Or(children) })
            }
            "$not" => Ok(WhereNode::Not(Box::new(Self::parse(value)?))),
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    fn parse_field_condition(field: &str, value: &Value) -> Result<Vec<WhereNode>, FilterError> {
        match value {
            Value::Object(obj) if obj.keys().all(|k| k.starts_with('$')) && !obj.is_empty() => {
                let mut nodes = Vec::new();
                for (op_key, op_val) in obj {
                    let operator = FilterOp::from_key(op_key)
                        .ok_or_else(|| FilterError::UnsupportedOperator(op_key.to_string()))?;
                    if operator == FilterOp::Between {
                        match op_val.as_array() {
                            Some(values) if values.len() == 2 => {}
                            _ => return Err(FilterError::InvalidOperatorData(
                                "$between requires array with 2 values".to_string(),
                            )),
                        }
                    }
                    nodes.push(WhereNode::Field(FilterWhereInfo {
                        column: field.to_string(),
                        operator,
                        data: op_val.clone(),
                    }));
                }
                Ok(nodes)
            }
            // Implicit equality: { field: value }
            _ => Ok(vec![WhereNode::Field(FilterWhereInfo {
                column: field.to_string(),
                operator: FilterOp::Eq,
                data: value.clone(),
            })]),
        }
    }

    fn validate_column(column: &str) -> Result<(), FilterError> {
        let mut chars = column.chars();
        let valid_start = matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_');
        if !valid_start || !column.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(FilterError::InvalidColumn(format!("Invalid column name format: {}", column)));
        }
        Ok(())
    }

    // ========================================
    // REST parameter generation
    // ========================================

    /// Top-level query parameters for a parsed tree
    pub fn generate(node: &WhereNode) -> Vec<(String, String)> {
        match node {
            WhereNode::And(children) => children.iter().flat_map(Self::generate).collect(),
            WhereNode::Field(info) => Self::operator_exprs(info, false)
                .into_iter()
                .map(|expr| (info.column.clone(), expr))
                .collect(),
            WhereNode::Or(children) => vec![("or".to_string(), Self::group(children))],
            WhereNode::Not(inner) => match inner.as_ref() {
                WhereNode::Field(info) => {
                    let exprs = Self::operator_exprs(info, false);
                    if exprs.len() == 1 {
                        vec![(info.column.clone(), format!("not.{}", exprs[0]))]
                    } else {
                        vec![("not.and".to_string(), Self::group(&[WhereNode::Field(info.clone())]))]
                    }
                }
                WhereNode::And(children) => vec![("not.and".to_string(), Self::group(children))],
                WhereNode::Or(children) => vec![("not.or".to_string(), Self::group(children))],
                WhereNode::Not(twice) => Self::generate(twice),
            },
        }
    }

    fn group(children: &[WhereNode]) -> String {
        let parts: Vec<String> = children.iter().filter_map(Self::nested_expr).collect();
        format!("({})", parts.join(","))
    }

    fn nested_expr(node: &WhereNode) -> Option<String> {
        match node {
            WhereNode::Field(info) => {
                let exprs = Self::operator_exprs(info, true);
                if exprs.len() == 1 {
                    Some(format!("{}.{}", info.column, exprs[0]))
                } else {
                    let parts: Vec<String> = exprs.iter().map(|e| format!("{}.{}", info.column, e)).collect();
                    Some(format!("and({})", parts.join(",")))
                }
            }
            WhereNode::And(children) if children.is_empty() => None,
            WhereNode::Or(children) if children.is_empty() => None,
            WhereNode::And(children) => Some(format!("and{}", Self::group(children))),
            WhereNode::Or(children) => Some(format!("or{}", Self::group(children))),
            WhereNode::Not(inner) => match inner.as_ref() {
                WhereNode::Field(info) => {
                    let exprs = Self::operator_exprs(info, true);
                    if exprs.len() == 1 {
                        Some(format!("{}.not.{}", info.column, exprs[0]))
                    } else {
                        Some(format!("not.and{}", Self::group(&[WhereNode::Field(info.clone())])))
                    }
                }
                WhereNode::And(children) => Some(format!("not.and{}", Self::group(children))),
                WhereNode::Or(children) => Some(format!("not.or{}", Self::group(children))),
                WhereNode::Not(twice) => Self::nested_expr(twice),
            },
        }
    }

    /// `op.value` fragments for one condition; `$between` yields two
    fn operator_exprs(info: &FilterWhereInfo, nested: bool) -> Vec<String> {
        let data = &info.data;
        match info.operator {
            FilterOp::Eq => {
                if data.is_null() { vec!["is.null".to_string()] }
                else { vec![format!("eq.{}", Self::scalar(data, nested))] }
            }
            FilterOp::Neq => {
                if data.is_null() { vec!["not.is.null".to_string()] }
                else { vec![format!("neq.{}", Self::scalar(data, nested))] }
            }
            FilterOp::Gt => vec![format!("gt.{}", Self::scalar(data, nested))],
            FilterOp::Gte => vec![format!("gte.{}", Self::scalar(data, nested))],
            FilterOp::Lt => vec![format!("lt.{}", Self::scalar(data, nested))],
            FilterOp::Lte => vec![format!("lte.{}", Self::scalar(data, nested))],
            FilterOp::Like => vec![format!("like.{}", Self::pattern(data, nested))],
            FilterOp::ILike => vec![format!("ilike.{}", Self::pattern(data, nested))],
            FilterOp::In => match data {
                Value::Array(values) => vec![format!("in.({})", Self::list(values))],
                other => vec![format!("eq.{}", Self::scalar(other, nested))],
            },
            FilterOp::NIn => match data {
                Value::Array(values) => vec![format!("not.in.({})", Self::list(values))],
                other => vec![format!("neq.{}", Self::scalar(other, nested))],
            },
            FilterOp::Any => vec![format!("ov.{{{}}}", Self::list(&Self::as_vec(data)))],
            FilterOp::All => vec![format!("cs.{{{}}}", Self::list(&Self::as_vec(data)))],
            FilterOp::Between => {
                let values = Self::as_vec(data);
                match values.as_slice() {
                    [low, high] => vec![
                        format!("gte.{}", Self::scalar(low, nested)),
                        format!("lte.{}", Self::scalar(high, nested)),
                    ],
                    _ => vec![],
                }
            }
            FilterOp::Null => {
                if data.as_bool().unwrap_or(true) { vec!["is.null".to_string()] }
                else { vec!["not.is.null".to_string()] }
            }
        }
    }

    fn as_vec(data: &Value) -> Vec<Value> {
        match data {
            Value::Array(values) => values.clone(),
            other => vec![other.clone()],
        }
    }

    fn list(values: &[Value]) -> String {
        values.iter().map(|v| Self::scalar(v, true)).collect::<Vec<_>>().join(",")
    }

    fn pattern(data: &Value, nested: bool) -> String {
        Self::scalar(&Value::String(data.as_str().unwrap_or_default().replace('%', "*")), nested)
    }

    fn scalar(value: &Value, quote_reserved: bool) -> String {
        match value {
            Value::String(s) => {
                if quote_reserved && s.chars().any(|c| matches!(c, ',' | '(' | ')' | '"' | '.' | ':' | ' ')) {
                    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
                } else {
                    s.clone()
                }
            }
            Value::Null => "null".to_string(),
            other => other.to_string(),
        }
    }

    // ========================================
    // In-memory evaluation
    // ========================================

    pub fn matches(node: &WhereNode, row: &serde_json::Map<String, Value>) -> bool {
        match node {
            WhereNode::And(children) => children.iter().all(|c| Self::matches(c, row)),
            WhereNode::Or(children) => children.iter().any(|c| Self::matches(c, row)),
            WhereNode::Not(inner) => !Self::matches(inner, row),
            WhereNode::Field(info) => {
                let value = row.get(&info.column).unwrap_or(&Value::Null);
                Self::matches_condition(info, value)
            }
        }
    }

    fn matches_condition(info: &FilterWhereInfo, value: &Value) -> bool {
        let data = &info.data;
        match info.operator {
            FilterOp::Eq => {
                if data.is_null() { value.is_null() } else { values_equal(value, data) }
            }
            FilterOp::Neq => {
                if data.is_null() { !value.is_null() } else { !value.is_null() && !values_equal(value, data) }
            }
            FilterOp::Gt => compare_values(value, data) == Some(Ordering::Greater),
            FilterOp::Gte => matches!(compare_values(value, data), Some(Ordering::Greater | Ordering::Equal)),
            FilterOp::Lt => compare_values(value, data) == Some(Ordering::Less),
            FilterOp::Lte => matches!(compare_values(value, data), Some(Ordering::Less | Ordering::Equal)),
            FilterOp::Like | FilterOp::ILike => match (value.as_str(), data.as_str()) {
                (Some(text), Some(pattern)) => {
                    if info.operator == FilterOp::ILike {
                        wildcard_match(&text.to_lowercase(), &pattern.to_lowercase())
                    } else {
                        wildcard_match(text, pattern)
                    }
                }
                _ => false,
            },
            FilterOp::In => {
                !value.is_null() && Self::as_vec(data).iter().any(|candidate| values_equal(value, candidate))
            }
            FilterOp::NIn => {
                !value.is_null() && !Self::as_vec(data).iter().any(|candidate| values_equal(value, candidate))
            }
            FilterOp::Any => match value.as_array() {
                Some(items) => Self::as_vec(data).iter().any(|d| items.iter().any(|i| values_equal(i, d))),
                None => false,
            },
            FilterOp::All => match value.as_array() {
                Some(items) => Self::as_vec(data).iter().all(|d| items.iter().any(|i| values_equal(i, d))),
                None => false,
            },
            FilterOp::Between => match Self::as_vec(data).as_slice() {
                [low, high] => {
                    matches!(compare_values(value, low), Some(Ordering::Greater | Ordering::Equal))
                        && matches!(compare_values(value, high), Some(Ordering::Less | Ordering::Equal))
                }
                _ => false,
            },
            FilterOp::Null => {
                if data.as_bool().unwrap_or(true) { value.is_null() } else { !value.is_null() }
            }
        }
    }
}

/// Equality with numeric coercion (`1` == `1.0`)
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Ordering between two non-null values of the same kind
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// SQL-style LIKE: `%` or `*` match any run, `_` matches one character
fn wildcard_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    let mut matched = vec![vec![false; pattern.len() + 1]; text.len() + 1];
    matched[0][0] = true;
    for j in 1..=pattern.len() {
        if matches!(pattern[j - 1], '%' | '*') {
            matched[0][j] = matched[0][j - 1];
        }
    }
    for i in 1..=text.len() {
        for j in 1..=pattern.len() {
            matched[i][j] = match pattern[j - 1] {
                '%' | '*' => matched[i][j - 1] || matched[i - 1][j],
                '_' => matched[i - 1][j - 1],
                c => matched[i - 1][j - 1] && c == text[i - 1],
            };
        }
    }
    matched[text.len()][pattern.len()]
}
