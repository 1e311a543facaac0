use super::*;

#[test]
fn accepts_well_formed_workflow() {
    assert_eq!(validate_workflow_file("deploy_prod-2.json", br#"{"steps":[]}"#), Ok(()));
    assert_eq!(validate_workflow_file("wf.json", b"{}"), Ok(()));
}

#[test]
fn rejects_wrong_extension_first() {
    let err = validate_workflow_file("workflow.yaml", b"not even json").unwrap_err();
    assert_eq!(err, ValidationError::InvalidName(EXTENSION_MESSAGE.to_string()));
}

#[test]
fn rejects_path_separators() {
    for name in ["../etc/passwd.json", "dir/wf.json", "dir\\wf.json"] {
        let err = validate_name(name).unwrap_err();
        assert_eq!(err.reason(), PATH_SEPARATOR_MESSAGE, "{name}");
    }
}

#[test]
fn rejects_names_outside_allowed_character_set() {
    for name in ["a b.json", ".json", "wf.v2.json", "naïve.json", "wf!.json"] {
        let err = validate_workflow_file(name, b"{}").unwrap_err();
        assert!(
            err.reason()
                .contains("letters, numbers, hyphens, and underscores"),
            "{name}: {err}"
        );
    }
}

#[test]
fn rejects_oversized_payload_even_with_valid_name() {
    let mut bytes = vec![b' '; MAX_WORKFLOW_FILE_BYTES as usize + 1];
    bytes[0] = b'{';
    bytes[MAX_WORKFLOW_FILE_BYTES as usize] = b'}';

    let err = validate_workflow_file("wf.json", &bytes).unwrap_err();
    assert!(matches!(err, ValidationError::InvalidSize(_)));
    assert!(err.reason().contains("1048576"));
}

#[test]
fn payload_at_limit_is_checked_for_syntax_only() {
    let mut bytes = vec![b' '; MAX_WORKFLOW_FILE_BYTES as usize];
    bytes[0] = b'{';
    bytes[MAX_WORKFLOW_FILE_BYTES as usize - 1] = b'}';
    assert_eq!(validate_workflow_file("wf.json", &bytes), Ok(()));
}

#[test]
fn rejects_invalid_json() {
    let contents: [&[u8]; 4] = [b"{bad}", b"", b"{\"a\":1", &[0xff, 0xfe]];
    for content in contents {
        let err = validate_workflow_file("wf.json", content).unwrap_err();
        assert!(err.reason().contains("Invalid JSON"));
    }
}

#[test]
fn leading_byte_order_mark_is_ignored() {
    assert_eq!(
        validate_workflow_file("wf.json", b"\xEF\xBB\xBF{\"jobs\":{}}"),
        Ok(())
    );
    assert_eq!(validate_content(b"\xEF\xBB\xBF{}"), Ok(()));

    let bom_only = validate_content(b"\xEF\xBB\xBF").unwrap_err();
    assert_eq!(bom_only.reason(), INVALID_JSON_MESSAGE);
    let utf16_bom = validate_content(&[0xff, 0xfe, b'{', b'}']).unwrap_err();
    assert_eq!(utf16_bom.reason(), INVALID_JSON_MESSAGE);
}

#[test]
fn read_failure_has_distinct_message() {
    let err = read_failure();
    assert_eq!(err.reason(), READ_FAILURE_MESSAGE);
    assert_ne!(err.reason(), INVALID_JSON_MESSAGE);
}

#[test]
fn validation_is_idempotent() {
    let cases: [(&str, &[u8]); 4] = [
        ("wf.json", b"{}"),
        ("wf.json", b"{bad}"),
        ("a b.json", b"{}"),
        ("wf.txt", b"{}"),
    ];
    for (name, bytes) in cases {
        assert_eq!(
            validate_workflow_file(name, bytes),
            validate_workflow_file(name, bytes)
        );
    }
}
