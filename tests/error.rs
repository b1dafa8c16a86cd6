use serde_json::Value;
use chorehub::error::{exit_codes, Error, ErrorKind, JsonError};

#[test]
fn validation_maps_to_bad_request_and_user_error() {
    let err = Error::Validation("content cannot be empty".to_string());
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.status_code(), 400);
    assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
}

#[test]
fn not_found_variants_share_a_kind() {
    for err in [
        Error::MemberNotFound("m1".to_string()),
        Error::TaskNotFound("t1".to_string()),
        Error::SubtaskNotFound("s1".to_string()),
    ] {
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
    }
}

#[test]
fn rule_violations_are_blocked() {
    let forbidden = Error::Forbidden {
        actor: "m2".to_string(),
        task: "t1".to_string(),
        action: "confirm".to_string(),
    };
    assert_eq!(forbidden.status_code(), 403);
    assert_eq!(forbidden.exit_code(), exit_codes::BLOCKED);

    let no_effect = Error::NoEffect {
        task: "t1".to_string(),
        action: "accept".to_string(),
    };
    assert_eq!(no_effect.status_code(), 409);
    assert_eq!(Error::TaskDeleted("t1".to_string()).status_code(), 409);
}

#[test]
fn exit_code_operation_failed() {
    let err = Error::OperationFailed("boom".to_string());
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert_eq!(err.status_code(), 500);
    assert_eq!(err.exit_code(), exit_codes::OPERATION_FAILED);
}

#[test]
fn details_include_forbidden_fields() {
    let err = Error::Forbidden {
        actor: "m2".to_string(),
        task: "t1".to_string(),
        action: "confirm".to_string(),
    };
    let details = err.details().expect("details");
    assert_eq!(details["actor"], Value::String("m2".to_string()));
    assert_eq!(details["task"], Value::String("t1".to_string()));
    assert_eq!(details["action"], Value::String("confirm".to_string()));
}

#[test]
fn json_error_serializes_kind_in_snake_case() {
    let err = Error::InvalidConfig("bad config".to_string());
    let json = serde_json::to_value(JsonError::from(&err)).unwrap();
    assert_eq!(json["kind"], "validation");
    assert_eq!(json["code"], exit_codes::USER_ERROR);
    assert_eq!(json["details"]["message"], "bad config");
}
