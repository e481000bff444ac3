/// Write payload parsing
///
/// Bodies are read as raw JSON first so that fields outside the allow-list
/// can be dropped before anything else happens, and so that a wrong JSON type
/// is reported against the field it was found in instead of failing the
/// whole body.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::Path;
use axum::Json;
use recipebox_shared::auth::authorization::retain_mutable_fields;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{ApiError, ApiResult, ValidationErrorDetail};

pub const REQUIRED: &str = "This field is required.";
pub const NOT_NULL: &str = "This field may not be null.";
pub const NULL_CHARACTER: &str = "Null characters are not allowed.";

/// Maximum length of a tag or ingredient name
pub const MAX_NAME_LENGTH: usize = 255;

/// Reads typed fields out of an allow-listed JSON object
#[derive(Debug)]
pub struct FieldReader {
    fields: Map<String, Value>,
    errors: Vec<ValidationErrorDetail>,
}

impl FieldReader {
    /// Unwraps the body and drops every key not in `allowed`
    ///
    /// # Errors
    ///
    /// `ApiError::BadRequest` for malformed JSON or a body that isn't an
    /// object.
    pub fn new(body: Result<Json<Value>, JsonRejection>, allowed: &[&str]) -> ApiResult<Self> {
        let Json(value) = body.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

        let mut fields = match value {
            Value::Object(fields) => fields,
            _ => return Err(ApiError::BadRequest("Expected a JSON object".to_string())),
        };
        retain_mutable_fields(&mut fields, allowed);

        Ok(Self {
            fields,
            errors: Vec::new(),
        })
    }

    /// Reads a field that may be absent
    ///
    /// `null` and values of the wrong type are recorded as errors.
    pub fn optional<T: DeserializeOwned>(&mut self, field: &str) -> Option<T> {
        match self.fields.remove(field) {
            None => None,
            Some(Value::Null) => {
                self.error(field, NOT_NULL);
                None
            }
            Some(value) => match serde_json::from_value(value) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    self.error(field, type_error_message(&e));
                    None
                }
            },
        }
    }

    /// Reads a field that must be present
    pub fn required<T: DeserializeOwned>(&mut self, field: &str) -> Option<T> {
        if !self.fields.contains_key(field) {
            self.error(field, REQUIRED);
            return None;
        }
        self.optional(field)
    }

    /// Records an error if `value` contains a NUL character
    ///
    /// PostgreSQL text columns can't store `\0`.
    pub fn reject_null_characters(&mut self, field: &str, value: Option<&str>) {
        if value.is_some_and(|value| value.contains('\0')) {
            self.error(field, NULL_CHARACTER);
        }
    }

    /// Records an error against `field`
    pub fn error(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(ValidationErrorDetail::new(field, message));
    }

    /// Adds errors produced by `validator`
    pub fn extend(&mut self, errors: Vec<ValidationErrorDetail>) {
        self.errors.extend(errors);
    }

    /// Fails with every recorded error, if any
    pub fn finish(self) -> ApiResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::ValidationError(self.errors))
        }
    }
}

fn type_error_message(err: &serde_json::Error) -> String {
    let message = err.to_string();
    // serde_json appends " at line 1 column N", which means nothing here
    match message.find(" at line ") {
        Some(index) => message[..index].to_string(),
        None => message,
    }
}

/// Unwraps an `:id` path segment
///
/// An ID that isn't an `i64` can't name anything the requester owns, so it
/// is reported like any other missing entity.
pub fn path_id(path: Result<Path<i64>, PathRejection>) -> ApiResult<i64> {
    path.map(|Path(id)| id)
        .map_err(|_| ApiError::NotFound("Not found.".to_string()))
}

/// Trims a tag or ingredient name and checks its length
///
/// # Errors
///
/// A message suitable for a field error.
pub fn clean_name(name: &str) -> Result<String, String> {
    let name = name.trim();
    if name.is_empty() {
        return Err("This field may not be blank.".to_string());
    }
    if name.contains('\0') {
        return Err(NULL_CHARACTER.to_string());
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(format!(
            "Ensure this field has no more than {} characters.",
            MAX_NAME_LENGTH
        ));
    }
    Ok(name.to_string())
}
