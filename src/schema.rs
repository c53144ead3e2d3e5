//! Structured validation schemas.
//!
//! A schema is a struct deriving [`Schema`](derive@crate::Schema),
//! [`Serialize`](serde::Serialize) and [`Validate`]. Declaring a handler
//! parameter of a schema type makes the request body be parsed as JSON,
//! decoded field by field, and checked against the struct's `validator`
//! constraints. Every field that decodes is checked, so type errors and
//! constraint errors are reported together, one entry per field. Returning a
//! schema from a handler serializes it as JSON.
//!
//! `Option` fields may be absent. Every other field is required unless it
//! carries `#[schema(default)]`. The derive expects the `validator` crate as
//! a direct dependency.
//!
//! ```ignore
//! use quill::Schema;
//! use serde::Serialize;
//! use validator::Validate;
//!
//! #[derive(Schema, Serialize, Validate)]
//! struct PredictionRequest {
//!     #[validate(length(min = 1))]
//!     features: Vec<f64>,
//!     #[schema(default = "default_model")]
//!     model_name: String,
//! }
//!
//! fn default_model() -> String {
//!     "default".to_owned()
//! }
//! ```

use std::borrow::Cow;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// A JSON object.
pub type Object = Map<String, Value>;

/// A structured validation schema.
///
/// This trait is implemented through its derive macro.
pub trait Schema: Serialize + Sized + Send + 'static {
    /// Decode and validate the schema from a JSON object.
    fn from_object(object: Object) -> Result<Self, FieldErrors>;

    /// Decode and validate the schema from any JSON value.
    ///
    /// Values other than objects are rejected with a single `__root__`
    /// error.
    fn from_value(value: Value) -> Result<Self, FieldErrors> {
        match value {
            Value::Object(object) => Self::from_object(object),
            other => {
                let mut errors = FieldErrors::new();
                errors.push(FieldError::new(
                    ROOT,
                    "invalid_type",
                    format!("expected an object, found {}", kind(&other)),
                ));
                Err(errors)
            }
        }
    }
}

const ROOT: &str = "__root__";

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// A single failing field.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldError {
    /// The name of the field.
    pub field: Cow<'static, str>,
    /// A machine readable error code.
    pub code: Cow<'static, str>,
    /// A human readable description.
    pub message: String,
}

impl FieldError {
    pub fn new(
        field: impl Into<Cow<'static, str>>,
        code: impl Into<Cow<'static, str>>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Every field that failed to decode or validate.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: FieldError) {
        self.0.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    /// The names of the failing fields, in report order.
    pub fn fields(&self) -> Vec<&str> {
        self.0.iter().map(|e| e.field.as_ref()).collect()
    }
}

impl From<ValidationErrors> for FieldErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.into_errors().into_iter().collect();
        fields.sort_by(|(a, _), (b, _)| a.cmp(b));

        FieldErrors(
            fields
                .into_iter()
                .map(|(field, kind)| {
                    let (code, message) = describe(kind);
                    FieldError::new(field, code, message)
                })
                .collect(),
        )
    }
}

// One entry per field: the first failing constraint names the code and every
// failing constraint contributes to the message.
fn describe(kind: ValidationErrorsKind) -> (Cow<'static, str>, String) {
    match kind {
        ValidationErrorsKind::Field(errors) => {
            let code = errors
                .first()
                .map(|e| e.code.clone())
                .unwrap_or(Cow::Borrowed("invalid"));
            let message = errors
                .iter()
                .map(|e| match &e.message {
                    Some(message) => message.to_string(),
                    None => format!("failed `{}` constraint", e.code),
                })
                .collect::<Vec<_>>()
                .join("; ");
            (code, message)
        }
        ValidationErrorsKind::Struct(_) | ValidationErrorsKind::List(_) => {
            (Cow::Borrowed("nested"), "nested value failed validation".to_owned())
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "`{}`: {}", error.field, error.message)?;
        }
        Ok(())
    }
}

/// Decode a required field.
///
/// Used by the derive macro.
#[doc(hidden)]
pub fn field<T>(object: &mut Object, name: &'static str, errors: &mut FieldErrors) -> Option<T>
where
    T: DeserializeOwned,
{
    match object.remove(name) {
        Some(value) => decode(value, name, errors),
        None => {
            errors.push(FieldError::new(name, "missing", "field required"));
            None
        }
    }
}

/// Decode an `Option` field. A missing key or `null` is `None`.
///
/// Used by the derive macro.
#[doc(hidden)]
pub fn field_opt<T>(
    object: &mut Object,
    name: &'static str,
    errors: &mut FieldErrors,
) -> Option<Option<T>>
where
    T: DeserializeOwned,
{
    match object.remove(name) {
        Some(value) => decode(value, name, errors),
        None => Some(None),
    }
}

/// Decode a field that falls back to `default` when absent.
///
/// Used by the derive macro.
#[doc(hidden)]
pub fn field_or_else<T, F>(
    object: &mut Object,
    name: &'static str,
    default: F,
    errors: &mut FieldErrors,
) -> Option<T>
where
    T: DeserializeOwned,
    F: FnOnce() -> T,
{
    match object.remove(name) {
        Some(value) => decode(value, name, errors),
        None => Some(default()),
    }
}

fn decode<T>(value: Value, name: &'static str, errors: &mut FieldErrors) -> Option<T>
where
    T: DeserializeOwned,
{
    serde_json::from_value(value)
        .map_err(|err| errors.push(FieldError::new(name, "invalid_type", err.to_string())))
        .ok()
}

/// Run the `validator` constraints of every field that decoded, and merge
/// the failures into `errors`.
///
/// Fields that failed to decode are `None` and skip their constraints. The
/// merged list is ordered like `fields`.
///
/// Used by the derive macro.
#[doc(hidden)]
pub fn check<T>(decoded: &T, fields: &[&str], errors: &mut FieldErrors)
where
    T: Validate,
{
    if let Err(failed) = decoded.validate() {
        errors.0.extend(FieldErrors::from(failed).0);
    }

    errors
        .0
        .sort_by_key(|e| fields.iter().position(|f| *f == e.field).unwrap_or(fields.len()));
}

/// Run the `validator` constraints of a fully decoded schema.
///
/// Used by the derive macro.
#[doc(hidden)]
pub fn validate<T>(value: T) -> Result<T, FieldErrors>
where
    T: Validate,
{
    value.validate().map_err(FieldErrors::from)?;
    Ok(value)
}
