//! Tests for the core error taxonomy.

use super::*;

#[test]
fn constructors_set_matching_codes() {
    let cases = [
        (
            CoreError::constraint_violation("dup"),
            ErrorCode::ConstraintViolation,
        ),
        (CoreError::stale_state("not open"), ErrorCode::StaleState),
        (
            CoreError::external_unavailable("gateway down"),
            ErrorCode::ExternalUnavailable,
        ),
        (CoreError::not_found("no such task"), ErrorCode::NotFound),
        (
            CoreError::permission_denied("banned"),
            ErrorCode::PermissionDenied,
        ),
    ];

    for (error, code) in cases {
        assert_eq!(error.code(), code);
    }
}

#[test]
fn display_uses_the_message() {
    let error = CoreError::stale_state("task is not open");
    assert_eq!(error.to_string(), "task is not open");
    assert_eq!(error.message(), "task is not open");
}

#[test]
fn error_code_serializes_snake_case() {
    let json = serde_json::to_string(&ErrorCode::StaleState).expect("serializes");
    assert_eq!(json, "\"stale_state\"");
}
