mod common;

use common::*;
use mwdb::api::{RetryPolicy, DEFAULT_RETRY_AFTER};
use mwdb::http_utils::Method;
use mwdb::MwdbError;
use serde_json::json;
use std::time::Duration;

fn downtime_policy(retries: u32) -> RetryPolicy {
    RetryPolicy {
        retry_on_downtime: true,
        max_downtime_retries: retries,
        downtime_timeout: 3,
        ..Default::default()
    }
}

#[test]
fn test_rate_limit_honors_retry_after() {
    let backend = MockBackend::default();
    let sleeper = RecordingSleeper::default();
    backend
        .rate_limit(Method::Get, "object/abc", Some(5))
        .reply(Method::Get, "object/abc", 200, json!({"id": "abc"}));

    let api = api_key_client(&backend, &sleeper);
    let response = api.get("object/abc").send().unwrap();

    assert_eq!(response["id"], "abc");
    assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(5)]);
    assert_eq!(backend.requests().len(), 2);
}

#[test]
fn test_rate_limit_without_header_waits_default() {
    let backend = MockBackend::default();
    let sleeper = RecordingSleeper::default();
    backend
        .rate_limit(Method::Get, "object/abc", None)
        .reply(Method::Get, "object/abc", 200, json!({}));

    let api = api_key_client(&backend, &sleeper);
    api.get("object/abc").send().unwrap();

    assert_eq!(
        sleeper.sleeps(),
        vec![Duration::from_secs(DEFAULT_RETRY_AFTER)]
    );
    assert_eq!(DEFAULT_RETRY_AFTER, 60);
}

#[test]
fn test_rate_limit_is_reported_when_not_obeyed() {
    let backend = MockBackend::default();
    let sleeper = RecordingSleeper::default();
    backend.rate_limit(Method::Get, "object/abc", Some(5));

    let api = client_with_policy(
        &backend,
        &sleeper,
        RetryPolicy {
            obey_rate_limit: false,
            ..Default::default()
        },
    );
    api.authenticate_with_token(&token("analyst")).unwrap();

    match api.get("object/abc").send() {
        Err(MwdbError::LimitExceeded { retry_after, .. }) => assert_eq!(retry_after, Some(5)),
        other => panic!("unexpected result {:?}", other),
    }
    assert!(sleeper.sleeps().is_empty());
}

#[test]
fn test_downtime_retries_are_bounded() {
    let backend = MockBackend::default();
    let sleeper = RecordingSleeper::default();
    backend
        .fail(Method::Get, "file", 502, "Bad Gateway")
        .connection_error(Method::Get, "file")
        .fail(Method::Get, "file", 504, "Gateway Timeout");

    let api = client_with_policy(&backend, &sleeper, downtime_policy(2));
    api.authenticate_with_token(&token("analyst")).unwrap();

    let result = api.get("file").send();
    assert!(matches!(result, Err(MwdbError::Gateway { status: 504, .. })));
    assert_eq!(backend.requests().len(), 3);
    assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(3); 2]);
}

#[test]
fn test_downtime_is_not_retried_by_default() {
    let backend = MockBackend::default();
    let sleeper = RecordingSleeper::default();
    backend.connection_error(Method::Get, "file");

    let api = api_key_client(&backend, &sleeper);
    assert!(matches!(api.get("file").send(), Err(MwdbError::Connection(_))));
    assert!(sleeper.sleeps().is_empty());
}

#[test]
fn test_post_is_not_retried_when_only_idempotent_requests_may_be() {
    let backend = MockBackend::default();
    let sleeper = RecordingSleeper::default();
    backend
        .fail(Method::Post, "object/abc/comment", 504, "Gateway Timeout")
        .fail(Method::Put, "object/abc/tag", 502, "Bad Gateway")
        .reply(Method::Put, "object/abc/tag", 200, json!({}));

    let api = client_with_policy(
        &backend,
        &sleeper,
        RetryPolicy {
            retry_idempotent: false,
            ..downtime_policy(3)
        },
    );
    api.authenticate_with_token(&token("analyst")).unwrap();

    let comment = api
        .post("object/abc/comment")
        .json(json!({"comment": "hello"}))
        .send();
    assert!(matches!(comment, Err(MwdbError::Gateway { status: 504, .. })));

    api.put("object/abc/tag").json(json!({"tag": "x"})).send().unwrap();
    assert_eq!(backend.requests().len(), 3);
    assert_eq!(sleeper.sleeps().len(), 1);
}

#[test]
fn test_rejected_session_logs_in_once_and_retries() {
    let backend = MockBackend::default();
    let sleeper = RecordingSleeper::default();
    let first = token("analyst");
    let second = token_expiring("analyst", 4102444801);
    backend
        .reply(Method::Post, "auth/login", 200, json!({"login": "analyst", "token": first}))
        .fail(Method::Get, "object/abc", 401, "Not authenticated.")
        .reply(Method::Post, "auth/login", 200, json!({"login": "analyst", "token": second}))
        .reply(Method::Get, "object/abc", 200, json!({"id": "abc"}));

    let api = client_with_policy(&backend, &sleeper, RetryPolicy::default());
    api.authenticate_with_credentials("analyst", "secret").unwrap();
    api.get("object/abc").send().unwrap();

    assert_eq!(
        backend.calls(),
        vec!["POST auth/login", "GET object/abc", "POST auth/login", "GET object/abc"]
    );
    let requests = backend.requests();
    assert_eq!(requests[1].bearer_token.as_deref(), Some(first.as_str()));
    assert_eq!(requests[3].bearer_token.as_deref(), Some(second.as_str()));
    assert_eq!(requests[2].body, requests[0].body);
}

#[test]
fn test_expired_session_logs_in_before_sending() {
    let backend = MockBackend::default();
    let sleeper = RecordingSleeper::default();
    let fresh = token("analyst");
    backend
        .reply(
            Method::Post,
            "auth/login",
            200,
            json!({"token": token_expiring("analyst", 1000)}),
        )
        .reply(Method::Post, "auth/login", 200, json!({"token": fresh}))
        .reply(Method::Get, "object/abc", 200, json!({"id": "abc"}));

    let api = client_with_policy(&backend, &sleeper, RetryPolicy::default());
    api.authenticate_with_credentials("analyst", "secret").unwrap();
    api.get("object/abc").send().unwrap();

    assert_eq!(
        backend.calls(),
        vec!["POST auth/login", "POST auth/login", "GET object/abc"]
    );
    assert_eq!(
        backend.requests()[2].bearer_token.as_deref(),
        Some(fresh.as_str())
    );
}

#[test]
fn test_expired_api_key_fails_without_request() {
    let backend = MockBackend::default();
    let sleeper = RecordingSleeper::default();

    let api = client_with_policy(&backend, &sleeper, RetryPolicy::default());
    api.authenticate_with_token(&token_expiring("bot", 1000)).unwrap();

    assert!(matches!(
        api.get("object/abc").send(),
        Err(MwdbError::NotAuthenticated { .. })
    ));
    assert!(backend.requests().is_empty());
}

#[test]
fn test_rejected_api_key_is_not_replaced() {
    let backend = MockBackend::default();
    let sleeper = RecordingSleeper::default();
    backend.fail(Method::Get, "object/abc", 401, "Not authenticated.");

    let api = api_key_client(&backend, &sleeper);
    assert!(matches!(
        api.get("object/abc").send(),
        Err(MwdbError::NotAuthenticated { .. })
    ));
    assert_eq!(backend.requests().len(), 1);
    assert!(api.is_authenticated());
}

#[test]
fn test_anonymous_client_cannot_send_authenticated_requests() {
    let backend = MockBackend::default();
    let sleeper = RecordingSleeper::default();
    backend.server_version("2.9.0");

    let api = client_with_policy(&backend, &sleeper, RetryPolicy::default());
    assert!(matches!(
        api.get("object/abc").send(),
        Err(MwdbError::NotAuthenticated { .. })
    ));
    // the server endpoint does not need a session
    assert_eq!(api.server_version().unwrap().to_string(), "2.9.0");
    assert_eq!(backend.requests()[0].bearer_token, None);
}

#[test]
fn test_invalid_credentials_are_reported() {
    let backend = MockBackend::default();
    let sleeper = RecordingSleeper::default();
    backend.fail(Method::Post, "auth/login", 403, "Invalid login or password.");

    let api = client_with_policy(&backend, &sleeper, RetryPolicy::default());
    assert!(matches!(
        api.authenticate_with_credentials("analyst", "wrong"),
        Err(MwdbError::InvalidCredentials { .. })
    ));
    assert!(!api.is_authenticated());
}

#[test]
fn test_server_metadata_is_fetched_once() {
    let backend = MockBackend::default();
    let sleeper = RecordingSleeper::default();
    backend.server_version("2.10.1");

    let api = client_with_policy(&backend, &sleeper, RetryPolicy::default());
    api.server_metadata().unwrap();
    let metadata = api.server_metadata().unwrap();

    assert_eq!(metadata.server_version, "2.10.1");
    assert_eq!(metadata.extra["is_authenticated"], true);
    assert_eq!(backend.requests().len(), 1);
}

#[test]
fn test_html_response_is_bad_response() {
    let backend = MockBackend::default();
    let sleeper = RecordingSleeper::default();
    backend.reply_raw(Method::Get, "object/abc", 200, b"<!doctype html><html></html>");

    let api = api_key_client(&backend, &sleeper);
    assert!(matches!(api.get("object/abc").send(), Err(MwdbError::BadResponse(_))));
}

#[test]
fn test_not_found_flavours() {
    let backend = MockBackend::default();
    let sleeper = RecordingSleeper::default();
    backend
        .fail(Method::Get, "object/abc", 404, "Object not found")
        .fail(
            Method::Get,
            "object/abc/attribute",
            404,
            "The requested URL was not found on the server. If you entered the URL manually please check your spelling and try again.",
        );

    let api = api_key_client(&backend, &sleeper);
    assert!(matches!(
        api.get("object/abc").send(),
        Err(MwdbError::ObjectNotFound { .. })
    ));
    assert!(matches!(
        api.get("object/abc/attribute").send(),
        Err(MwdbError::EndpointNotFound { .. })
    ));
}

#[test]
fn test_query_parameters_are_forwarded() {
    let backend = MockBackend::default();
    let sleeper = RecordingSleeper::default();
    backend.reply(Method::Get, "file", 200, json!({"files": []}));

    let api = api_key_client(&backend, &sleeper);
    api.get("file")
        .query("query", "tag:emotet")
        .query_opt("older_than", None::<&str>)
        .send()
        .unwrap();

    assert_eq!(
        backend.requests()[0].query,
        vec![("query".to_string(), "tag:emotet".to_string())]
    );
}
