use super::*;

#[test]
fn status_table_covers_known_families() {
    assert_eq!(message_for_status(400), INVALID_REQUEST_MESSAGE);
    assert_eq!(message_for_status(401), AUTH_REQUIRED_MESSAGE);
    assert_eq!(message_for_status(403), PERMISSION_DENIED_MESSAGE);
    assert_eq!(message_for_status(404), NOT_FOUND_MESSAGE);
    assert_eq!(message_for_status(429), RATE_LIMITED_MESSAGE);
    assert_eq!(message_for_status(500), SERVER_ERROR_MESSAGE);
    assert_eq!(message_for_status(503), SERVER_ERROR_MESSAGE);
    assert_eq!(message_for_status(418), "Request failed with status 418");
}

#[test]
fn server_error_field_is_used_verbatim() {
    let body = br#"{"success":false,"error":"Fork not ready","details":["retry later"]}"#;
    let api_error = ApiError::from_body(409, body);

    assert_eq!(api_error.user_message, "Fork not ready");
    assert_eq!(api_error.raw_message.as_deref(), Some("Fork not ready"));
    assert_eq!(api_error.details, vec!["retry later".to_string()]);
    assert_eq!(api_error.http_status, 409);
    assert_eq!(api_error.code, ErrorCode::Unknown);
}

#[test]
fn empty_error_field_falls_back_to_status_table() {
    let api_error = ApiError::from_body(401, br#"{"success":false,"error":""}"#);
    assert_eq!(api_error.user_message, AUTH_REQUIRED_MESSAGE);
    assert!(api_error.raw_message.is_none());
    assert!(api_error.requires_reauth());

    let missing = ApiError::from_body(401, br#"{"success":false}"#);
    assert_eq!(missing.user_message, AUTH_REQUIRED_MESSAGE);
}

#[test]
fn whitespace_error_field_counts_as_present() {
    let api_error = ApiError::from_body(400, br#"{"success":false,"error":" "}"#);
    assert_eq!(api_error.user_message, " ");
    assert_eq!(api_error.raw_message.as_deref(), Some(" "));
}

#[test]
fn unparseable_or_missing_body_uses_status_only() {
    let html = ApiError::from_body(502, b"<html>bad gateway</html>");
    assert_eq!(html.user_message, SERVER_ERROR_MESSAGE);

    let empty = ApiError::from_body(403, b"");
    assert_eq!(empty.user_message, PERMISSION_DENIED_MESSAGE);
    assert_eq!(empty.code, ErrorCode::Forbidden);
    assert_eq!(empty.to_string(), PERMISSION_DENIED_MESSAGE);
}
