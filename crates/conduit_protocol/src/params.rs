//! Typed parameter model.
//!
//! Query parameters arrive as a JSON object with one section per declared
//! type (`INTEGER`, `STRING`, ...), each section mapping parameter names to
//! leaf values. SQL templates reference parameters as `:name` placeholders.
//! This module parses the sections into a [`ParameterList`], validates it
//! against a template, and rewrites the template into the engine's
//! positional marker convention with a matching ordered parameter array.
//!
//! Validation is strictly ordered: type mismatches are reported before
//! missing parameters, and both before conversion. Unused parameters are an
//! advisory only and never fail a query.

use crate::types::EngineType;
use serde_json::Value;
use thiserror::Error;

/// Errors produced by parameter validation and conversion.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParamError {
    /// A leaf value's JSON kind does not match its section's declared type.
    #[error("Parameter type mismatch: {detail}")]
    TypeMismatch { detail: String },

    /// The template references parameters that were not provided.
    #[error("Missing parameters: {detail}")]
    MissingParameters { detail: String },

    /// A placeholder had no matching parameter at conversion time.
    ///
    /// The missing-parameter check runs first, so reaching this means a
    /// caller skipped validation.
    #[error("No parameter bound for placeholder :{name}")]
    UnboundPlaceholder { name: String },
}

/// Declared parameter type, one per section key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterType {
    Integer,
    String,
    Boolean,
    Float,
    Text,
    Date,
    Time,
    DateTime,
    Timestamp,
}

impl ParameterType {
    pub const ALL: [ParameterType; 9] = [
        ParameterType::Integer,
        ParameterType::String,
        ParameterType::Boolean,
        ParameterType::Float,
        ParameterType::Text,
        ParameterType::Date,
        ParameterType::Time,
        ParameterType::DateTime,
        ParameterType::Timestamp,
    ];

    /// The section key used in parameter JSON.
    pub fn section_key(self) -> &'static str {
        match self {
            ParameterType::Integer => "INTEGER",
            ParameterType::String => "STRING",
            ParameterType::Boolean => "BOOLEAN",
            ParameterType::Float => "FLOAT",
            ParameterType::Text => "TEXT",
            ParameterType::Date => "DATE",
            ParameterType::Time => "TIME",
            ParameterType::DateTime => "DATETIME",
            ParameterType::Timestamp => "TIMESTAMP",
        }
    }

    /// Whether a JSON leaf value has the right kind for this type.
    ///
    /// FLOAT accepts integers as well as reals; every other type requires
    /// the exact JSON kind.
    fn accepts(self, value: &Value) -> bool {
        match self {
            ParameterType::Integer => value.is_i64() || value.is_u64(),
            ParameterType::String => value.is_string(),
            ParameterType::Boolean => value.is_boolean(),
            ParameterType::Float => value.is_number(),
            ParameterType::Text
            | ParameterType::Date
            | ParameterType::Time
            | ParameterType::DateTime
            | ParameterType::Timestamp => value.is_string(),
        }
    }
}

/// A parameter value, carrying the representation its type implies.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    Integer(i64),
    String(String),
    Boolean(bool),
    Float(f64),
    Text(String),
    Date(String),
    Time(String),
    DateTime(String),
    Timestamp(String),
}

impl ParameterValue {
    fn from_json(ty: ParameterType, value: &Value) -> Option<Self> {
        match ty {
            ParameterType::Integer => value.as_i64().map(ParameterValue::Integer),
            ParameterType::String => value.as_str().map(|s| ParameterValue::String(s.to_string())),
            ParameterType::Boolean => value.as_bool().map(ParameterValue::Boolean),
            ParameterType::Float => value.as_f64().map(ParameterValue::Float),
            ParameterType::Text => value.as_str().map(|s| ParameterValue::Text(s.to_string())),
            ParameterType::Date => value.as_str().map(|s| ParameterValue::Date(s.to_string())),
            ParameterType::Time => value.as_str().map(|s| ParameterValue::Time(s.to_string())),
            ParameterType::DateTime => {
                value.as_str().map(|s| ParameterValue::DateTime(s.to_string()))
            }
            ParameterType::Timestamp => {
                value.as_str().map(|s| ParameterValue::Timestamp(s.to_string()))
            }
        }
    }

    /// JSON representation, used when rebuilding the wire parameter object.
    pub fn to_json(&self) -> Value {
        match self {
            ParameterValue::Integer(v) => Value::from(*v),
            ParameterValue::String(v)
            | ParameterValue::Text(v)
            | ParameterValue::Date(v)
            | ParameterValue::Time(v)
            | ParameterValue::DateTime(v)
            | ParameterValue::Timestamp(v) => Value::from(v.clone()),
            ParameterValue::Boolean(v) => Value::from(*v),
            ParameterValue::Float(v) => Value::from(*v),
        }
    }
}

/// One named, typed parameter. Immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedParameter {
    pub name: String,
    pub ty: ParameterType,
    pub value: ParameterValue,
}

/// An ordered list of typed parameters, built once per execution attempt.
#[derive(Debug, Clone, Default)]
pub struct ParameterList {
    params: Vec<TypedParameter>,
}

impl ParameterList {
    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypedParameter> {
        self.params.iter()
    }

    pub fn find(&self, name: &str) -> Option<&TypedParameter> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Distinct parameter names, in first-seen order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for param in &self.params {
            if !names.contains(&param.name.as_str()) {
                names.push(&param.name);
            }
        }
        names
    }
}

/// A template rewritten to positional markers plus its ordered parameters.
///
/// `ordered` has one entry per placeholder occurrence; a placeholder that
/// repeats in the template binds the same parameter at each occurrence.
#[derive(Debug, Clone)]
pub struct BoundStatement {
    pub sql: String,
    pub ordered: Vec<TypedParameter>,
}

impl BoundStatement {
    pub fn param_count(&self) -> usize {
        self.ordered.len()
    }
}

/// Parse a request's `params` object into a [`ParameterList`].
///
/// Unknown sections are ignored; a missing params object yields an empty
/// list. A leaf whose kind does not match its section is a type mismatch
/// (the same condition [`validate_parameter_types`] reports first).
pub fn parse_typed_parameters(params: Option<&Value>) -> Result<ParameterList, ParamError> {
    let mut list = ParameterList::default();

    let Some(obj) = params.and_then(Value::as_object) else {
        return Ok(list);
    };

    for ty in ParameterType::ALL {
        let Some(section) = obj.get(ty.section_key()).and_then(Value::as_object) else {
            continue;
        };
        for (name, value) in section {
            let Some(parsed) = ParameterValue::from_json(ty, value) else {
                return Err(ParamError::TypeMismatch {
                    detail: mismatch_message(name, value, ty),
                });
            };
            list.params.push(TypedParameter {
                name: name.clone(),
                ty,
                value: parsed,
            });
        }
    }

    Ok(list)
}

/// Scan a template for `:name` placeholders.
///
/// Names match `[A-Za-z_][A-Za-z0-9_]*`. Returned in first-occurrence
/// order with duplicates removed.
pub fn extract_placeholders(sql: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for (name, _, _) in placeholder_occurrences(sql) {
        if !names.iter().any(|n| n == &name) {
            names.push(name);
        }
    }
    names
}

/// Every placeholder occurrence as (name, byte start of `:`, byte end).
fn placeholder_occurrences(sql: &str) -> Vec<(String, usize, usize)> {
    let bytes = sql.as_bytes();
    let mut found = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b':' {
            let start = i + 1;
            let mut end = start;
            while end < bytes.len()
                && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_')
            {
                end += 1;
            }
            let leading_ok = end > start && (bytes[start].is_ascii_alphabetic() || bytes[start] == b'_');
            if leading_ok {
                found.push((sql[start..end].to_string(), i, end));
                i = end;
                continue;
            }
        }
        i += 1;
    }
    found
}

/// Check every leaf value against its section's declared type.
///
/// All mismatches are collected into one message, formatted as
/// `name(actual) is not name(SECTION)` joined by `, `.
pub fn validate_parameter_types(params: Option<&Value>) -> Result<(), ParamError> {
    let Some(obj) = params.and_then(Value::as_object) else {
        return Ok(());
    };

    let mut mismatches: Vec<String> = Vec::new();
    for ty in ParameterType::ALL {
        let Some(section) = obj.get(ty.section_key()).and_then(Value::as_object) else {
            continue;
        };
        for (name, value) in section {
            if !ty.accepts(value) {
                mismatches.push(mismatch_message(name, value, ty));
            }
        }
    }

    if mismatches.is_empty() {
        Ok(())
    } else {
        Err(ParamError::TypeMismatch {
            detail: mismatches.join(", "),
        })
    }
}

fn mismatch_message(name: &str, value: &Value, expected: ParameterType) -> String {
    let actual = match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    format!("{}({}) is not {}({})", name, actual, name, expected.section_key())
}

/// Required-minus-provided set difference over the template's placeholders.
pub fn check_missing_parameters(sql: &str, params: &ParameterList) -> Result<(), ParamError> {
    let missing: Vec<String> = extract_placeholders(sql)
        .into_iter()
        .filter(|name| params.find(name).is_none())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ParamError::MissingParameters {
            detail: missing.join(", "),
        })
    }
}

/// Provided-minus-required set difference; advisory only, never an error.
pub fn check_unused_parameters(sql: &str, params: &ParameterList) -> Option<String> {
    let required = extract_placeholders(sql);
    let unused: Vec<&str> = params
        .names()
        .into_iter()
        .filter(|name| !required.iter().any(|r| r == name))
        .collect();

    if unused.is_empty() {
        None
    } else {
        Some(format!("Parameters unused: {}", unused.join(", ")))
    }
}

/// Rewrite `:name` placeholders into the engine's positional markers and
/// collect the matching ordered parameter array.
///
/// Postgres gets `$1..$n` numbered per occurrence; every other engine gets
/// `?`. Repeated placeholders bind the same parameter once per occurrence.
pub fn convert_named_to_positional(
    sql_template: &str,
    params: &ParameterList,
    engine: EngineType,
) -> Result<BoundStatement, ParamError> {
    let occurrences = placeholder_occurrences(sql_template);
    let mut ordered = Vec::with_capacity(occurrences.len());
    let mut sql = String::with_capacity(sql_template.len());
    let mut cursor = 0;

    for (index, (name, start, end)) in occurrences.iter().enumerate() {
        let param = params
            .find(name)
            .ok_or_else(|| ParamError::UnboundPlaceholder { name: name.clone() })?;

        sql.push_str(&sql_template[cursor..*start]);
        match engine {
            EngineType::Postgres => {
                sql.push('$');
                sql.push_str(&(index + 1).to_string());
            }
            EngineType::Sqlite | EngineType::Mysql | EngineType::Db2 => sql.push('?'),
        }
        cursor = *end;
        ordered.push(param.clone());
    }
    sql.push_str(&sql_template[cursor..]);

    Ok(BoundStatement { sql, ordered })
}

/// Rebuild the type-sectioned parameter JSON from an ordered array.
///
/// This is the wire shape the database engines consume. Sections with no
/// parameters are omitted; an empty array yields `None`.
pub fn group_parameters(ordered: &[TypedParameter]) -> Option<Value> {
    if ordered.is_empty() {
        return None;
    }

    let mut root = serde_json::Map::new();
    for ty in ParameterType::ALL {
        let mut section = serde_json::Map::new();
        for param in ordered.iter().filter(|p| p.ty == ty) {
            section.insert(param.name.clone(), param.value.to_json());
        }
        if !section.is_empty() {
            root.insert(ty.section_key().to_string(), Value::Object(section));
        }
    }
    Some(Value::Object(root))
}
