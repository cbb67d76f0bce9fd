use axum::{http::StatusCode, Json};
use validator::{ValidationErrors, ValidationErrorsKind};

use crate::ApiResponse;

/// Flattens validator output into `field: message` lines, nested fields
/// joined with dots and list entries indexed.
pub fn validation_messages(errors: &ValidationErrors) -> Vec<String> {
    let mut out = Vec::new();
    collect_messages("", errors, &mut out);
    out.sort();
    out
}

fn collect_messages(prefix: &str, errors: &ValidationErrors, out: &mut Vec<String>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                for e in field_errors {
                    let message = e.message.as_deref().unwrap_or(e.code.as_ref());
                    out.push(format!("{}: {}", path, message));
                }
            }
            ValidationErrorsKind::Struct(inner) => collect_messages(&path, inner, out),
            ValidationErrorsKind::List(entries) => {
                for (index, inner) in entries {
                    collect_messages(&format!("{}[{}]", path, index), inner, out);
                }
            }
        }
    }
}

/// 400 response carrying every validation message.
pub fn validation_failed<T>(errors: &ValidationErrors) -> (StatusCode, Json<ApiResponse<T>>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::validation_errors(validation_messages(errors))),
    )
}
