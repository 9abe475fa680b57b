// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn request_parses_with_and_without_params() {
    let req: Request =
        serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#).unwrap();
    assert_eq!(req.method, "ping");
    assert!(req.params.is_null());
    assert!(!req.is_notification());
    req.validate().unwrap();

    let notification: Request =
        serde_json::from_str(r#"{"jsonrpc":"2.0","method":"tools/list","params":{}}"#).unwrap();
    assert!(notification.is_notification());
}

#[test]
fn request_rejects_wrong_version() {
    let req: Request =
        serde_json::from_str(r#"{"jsonrpc":"1.0","id":1,"method":"ping"}"#).unwrap();
    let err = req.validate().unwrap_err();
    assert_eq!(err.code, INVALID_REQUEST);
}

#[test]
fn result_response_serializes_without_error_field() {
    let resp = Response::result(Some(serde_json::json!(7)), serde_json::json!({"ok": true}));
    let line = resp.to_line();
    assert!(line.contains("\"id\":7"));
    assert!(line.contains("\"result\""));
    assert!(!line.contains("\"error\""));
    assert!(!line.contains('\n'));
}

#[test]
fn error_response_defaults_id_to_null() {
    let resp = Response::error(None, RpcError::parse_error("bad json"));
    let value: serde_json::Value = serde_json::from_str(&resp.to_line()).unwrap();
    assert!(value["id"].is_null());
    assert_eq!(value["error"]["code"], PARSE_ERROR);
}

#[parameterized(
    validation = { ErrorKind::Validation, INVALID_PARAMS },
    quota = { ErrorKind::QuotaExhausted, -32000 },
    not_found = { ErrorKind::NotFound, -32000 },
    timeout = { ErrorKind::Timeout, -32000 },
)]
fn kinds_map_to_codes_with_data(kind: ErrorKind, code: i64) {
    let err = RpcError::from_kind(kind, "boom");
    assert_eq!(err.code, code);
    assert_eq!(err.data.unwrap()["kind"], kind.as_str());
}

#[test]
fn response_round_trips() {
    let resp = Response::error(
        Some(serde_json::json!("abc")),
        RpcError::from_kind(ErrorKind::NoProjectContext, "no cwd"),
    );
    let back: Response = serde_json::from_str(&resp.to_line()).unwrap();
    assert_eq!(back, resp);
    assert!(!back.is_success());
}
