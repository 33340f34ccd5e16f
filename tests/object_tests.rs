mod common;

use common::*;
use mwdb::config::ConfigValue;
use mwdb::http_utils::{Method, MultipartField, RequestBody};
use mwdb::{Mwdb, MwdbConfig, MwdbError, MwdbFile, MwdbObject, Object, ShareMode, UploadOptions};
use serde_json::{json, Value};
use std::time::Duration;

const ENDPOINT_MISSING: &str = "The requested URL was not found on the server.";

fn setup() -> (MockBackend, RecordingSleeper, Mwdb) {
    let backend = MockBackend::default();
    let sleeper = RecordingSleeper::default();
    let mwdb = Mwdb::from_shared(api_key_client(&backend, &sleeper));
    (backend, sleeper, mwdb)
}

#[test]
fn test_query_by_sha256_uses_the_object_endpoint() {
    let (backend, _, mwdb) = setup();
    let id = sha256('a');
    backend.reply(
        Method::Get,
        &format!("object/{}", id),
        200,
        file_payload(&id, "2024-03-01T10:00:00+00:00"),
    );

    let object = mwdb.query(&id).unwrap();
    assert!(matches!(object, MwdbObject::File(_)));
    assert_eq!(object.id(), id);
}

#[test]
fn test_query_by_md5_uses_the_file_endpoint() {
    let (backend, _, mwdb) = setup();
    let id = sha256('b');
    let md5 = "0123456789abcdef0123456789abcdef";
    let mut payload = file_payload(&id, "2024-03-01T10:00:00+00:00");
    payload.as_object_mut().unwrap().remove("type");
    backend.reply(Method::Get, &format!("file/{}", md5), 200, payload);

    let mut object = mwdb.query(md5).unwrap();
    assert_eq!(object.id(), id);
    assert_eq!(object.as_file().unwrap().file_size().unwrap(), 1024);
    assert_eq!(backend.requests().len(), 1);
}

#[test]
fn test_typed_query_rejects_other_kinds() {
    let (backend, _, mwdb) = setup();
    let id = sha256('c');
    backend.reply(
        Method::Get,
        &format!("config/{}", id),
        200,
        json!({"id": id, "type": "file"}),
    );

    assert!(matches!(
        mwdb.query_config(&id),
        Err(MwdbError::TypeConflict { .. })
    ));
}

#[test]
fn test_unknown_type_is_unsupported() {
    let (backend, _, mwdb) = setup();
    let id = sha256('d');
    backend.reply(
        Method::Get,
        &format!("object/{}", id),
        200,
        json!({"id": id, "type": "karton_task"}),
    );

    assert!(matches!(mwdb.query(&id), Err(MwdbError::UnsupportedType(_))));
}

#[test]
fn test_fields_are_loaded_once() {
    let (backend, _, mwdb) = setup();
    let id = sha256('e');
    backend.reply(
        Method::Get,
        &format!("file/{}", id),
        200,
        json!({"id": id, "file_name": "dropper.exe", "file_size": 12, "md5": "x"}),
    );

    let mut file = MwdbFile::from_id(mwdb.api().clone(), &id);
    assert_eq!(file.file_name().unwrap(), "dropper.exe");
    assert_eq!(file.file_size().unwrap(), 12);
    assert_eq!(file.md5().unwrap(), "x");
    assert_eq!(backend.requests().len(), 1);
}

#[test]
fn test_missing_field_after_load() {
    let (backend, _, mwdb) = setup();
    let id = sha256('e');
    backend.reply(Method::Get, &format!("file/{}", id), 200, json!({"id": id}));

    let mut file = MwdbFile::from_id(mwdb.api().clone(), &id);
    assert!(matches!(file.ssdeep(), Err(MwdbError::MissingField { .. })));
}

#[test]
fn test_absent_field_is_not_requested_again() {
    let (backend, _, mwdb) = setup();
    let id = sha256('e');
    backend.reply(
        Method::Get,
        &format!("file/{}", id),
        200,
        json!({"id": id, "md5": "x"}),
    );

    let mut file = MwdbFile::from_id(mwdb.api().clone(), &id);
    assert!(matches!(file.ssdeep(), Err(MwdbError::MissingField { .. })));
    assert!(matches!(file.ssdeep(), Err(MwdbError::MissingField { .. })));
    assert_eq!(file.md5().unwrap(), "x");
    assert_eq!(backend.requests().len(), 1);
}

#[test]
fn test_detail_load_keeps_cached_subresources() {
    let (backend, _, mwdb) = setup();
    let id = sha256('f');
    backend
        .reply(Method::Get, &format!("object/{}/tag", id), 200, json!([{"tag": "fresh"}]))
        .reply(
            Method::Get,
            &format!("file/{}", id),
            200,
            json!({"id": id, "md5": "abc", "tags": [{"tag": "stale"}]}),
        );

    let mut file = MwdbFile::from_id(mwdb.api().clone(), &id);
    assert_eq!(file.tags().unwrap(), vec!["fresh"]);
    assert_eq!(file.md5().unwrap(), "abc");
    assert_eq!(file.tags().unwrap(), vec!["fresh"]);
    assert_eq!(backend.requests().len(), 2);
}

#[test]
fn test_mutations_evict_cached_lists() {
    let (backend, _, mwdb) = setup();
    let id = sha256('1');
    let tags = format!("object/{}/tag", id);
    backend
        .reply(Method::Get, &tags, 200, json!([{"tag": "a"}]))
        .reply(Method::Put, &tags, 200, json!({"tag": "b"}))
        .reply(Method::Get, &tags, 200, json!([{"tag": "a"}, {"tag": "b"}]))
        .reply(Method::Delete, &tags, 200, json!({}))
        .reply(Method::Get, &tags, 200, json!([{"tag": "b"}]));

    let mut file = MwdbFile::from_id(mwdb.api().clone(), &id);
    assert_eq!(file.tags().unwrap(), vec!["a"]);
    file.add_tag("b").unwrap();
    assert_eq!(file.tags().unwrap(), vec!["a", "b"]);
    file.remove_tag("a").unwrap();
    assert_eq!(file.tags().unwrap(), vec!["b"]);

    let requests = backend.requests();
    assert_eq!(requests[1].body, RequestBody::Json(json!({"tag": "b"})));
    assert_eq!(requests[3].query, vec![("tag".to_string(), "a".to_string())]);
}

/// File with its details and tags cached, all scripted replies consumed
fn file_with_cached_tags(backend: &MockBackend, mwdb: &Mwdb, id: &str) -> MwdbFile {
    backend
        .reply(
            Method::Get,
            &format!("file/{}", id),
            200,
            json!({"id": id, "md5": "m", "children": []}),
        )
        .reply(Method::Get, &format!("object/{}/tag", id), 200, json!([{"tag": "keep"}]));

    let mut file = MwdbFile::from_id(mwdb.api().clone(), id);
    assert_eq!(file.md5().unwrap(), "m");
    assert_eq!(file.tags().unwrap(), vec!["keep"]);
    file
}

/// Reads the fields the mutation must leave cached, without any request
fn assert_untouched(backend: &MockBackend, file: &mut MwdbFile) {
    let before = backend.requests().len();
    assert_eq!(file.md5().unwrap(), "m");
    assert_eq!(file.tags().unwrap(), vec!["keep"]);
    assert_eq!(backend.requests().len(), before);
}

fn comment_payload(id: u64, text: &str) -> Value {
    json!({"id": id, "author": "analyst", "timestamp": "2024-03-01T10:00:00", "comment": text})
}

fn share_payload(group: &str) -> Value {
    json!({
        "group_name": group,
        "access_time": "2024-03-01T10:00:00",
        "reason_type": "added",
        "related_object_dhash": sha256('0'),
        "related_object_type": "file",
        "related_user_login": "analyst",
    })
}

#[test]
fn test_add_comment_evicts_comments_only() {
    let (backend, _, mwdb) = setup();
    let id = sha256('5');
    let endpoint = format!("object/{}/comment", id);
    let mut file = file_with_cached_tags(&backend, &mwdb, &id);
    backend
        .reply(Method::Get, &endpoint, 200, json!([comment_payload(1, "old")]))
        .reply(Method::Post, &endpoint, 200, comment_payload(2, "new"))
        .reply(
            Method::Get,
            &endpoint,
            200,
            json!([comment_payload(1, "old"), comment_payload(2, "new")]),
        );

    assert_eq!(file.comments().unwrap().len(), 1);
    file.add_comment("new").unwrap();
    assert_untouched(&backend, &mut file);
    assert_eq!(file.comments().unwrap().len(), 2);
    assert_eq!(file.comments().unwrap().len(), 2);
    assert_eq!(backend.pending(), 0);
    assert_eq!(
        backend.calls()[2..],
        [
            format!("GET {}", endpoint),
            format!("POST {}", endpoint),
            format!("GET {}", endpoint),
        ]
    );
}

#[test]
fn test_remove_comment_evicts_comments_only() {
    let (backend, _, mwdb) = setup();
    let id = sha256('6');
    let endpoint = format!("object/{}/comment", id);
    let mut file = file_with_cached_tags(&backend, &mwdb, &id);
    backend
        .reply(Method::Get, &endpoint, 200, json!([comment_payload(7, "packed")]))
        .reply(Method::Delete, &format!("{}/7", endpoint), 200, json!({}))
        .reply(Method::Get, &endpoint, 200, json!([]));

    assert_eq!(file.comments().unwrap()[0].id, 7);
    file.remove_comment(7).unwrap();
    assert_untouched(&backend, &mut file);
    assert!(file.comments().unwrap().is_empty());
    assert!(file.comments().unwrap().is_empty());
    assert_eq!(backend.pending(), 0);
    assert_eq!(backend.requests().len(), 5);
}

#[test]
fn test_share_with_evicts_shares_only() {
    let (backend, _, mwdb) = setup();
    let id = sha256('7');
    let endpoint = format!("object/{}/share", id);
    let mut file = file_with_cached_tags(&backend, &mwdb, &id);
    backend
        .reply(Method::Get, &endpoint, 200, json!({"shares": [share_payload("public")]}))
        .reply(Method::Put, &endpoint, 200, json!({}))
        .reply(
            Method::Get,
            &endpoint,
            200,
            json!({"shares": [share_payload("public"), share_payload("cert")]}),
        );

    assert_eq!(file.shares().unwrap().len(), 1);
    file.share_with("cert").unwrap();
    assert_untouched(&backend, &mut file);
    assert_eq!(file.shares().unwrap().len(), 2);
    assert_eq!(file.shares().unwrap().len(), 2);
    assert_eq!(backend.pending(), 0);
    assert_eq!(
        backend.requests()[3].body,
        RequestBody::Json(json!({"group": "cert"}))
    );
}

#[test]
fn test_add_child_evicts_children_only() {
    let (backend, _, mwdb) = setup();
    let id = sha256('8');
    let child = sha256('9');
    let mut file = file_with_cached_tags(&backend, &mwdb, &id);
    backend
        .reply(Method::Put, &format!("object/{}/child/{}", id, child), 200, json!({}))
        .reply(
            Method::Get,
            &format!("file/{}", id),
            200,
            json!({"id": id, "md5": "m", "children": [{"id": child, "type": "file"}]}),
        );

    assert!(file.children().unwrap().is_empty());
    file.add_child(&child).unwrap();
    assert_untouched(&backend, &mut file);
    assert_eq!(file.children().unwrap().len(), 1);
    assert_eq!(file.children().unwrap()[0].id(), child);
    assert_eq!(backend.pending(), 0);
    assert_eq!(backend.requests().len(), 4);
}

#[test]
fn test_remove_child_evicts_children_only() {
    let (backend, _, mwdb) = setup();
    let id = sha256('a');
    let child = sha256('b');
    backend
        .reply(
            Method::Get,
            &format!("file/{}", id),
            200,
            json!({"id": id, "md5": "m", "children": [{"id": child, "type": "file"}]}),
        )
        .reply(Method::Get, &format!("object/{}/tag", id), 200, json!([{"tag": "keep"}]))
        .reply(Method::Delete, &format!("object/{}/child/{}", id, child), 200, json!({}))
        .reply(
            Method::Get,
            &format!("file/{}", id),
            200,
            json!({"id": id, "md5": "m", "children": []}),
        );

    let mut file = MwdbFile::from_id(mwdb.api().clone(), &id);
    assert_eq!(file.children().unwrap().len(), 1);
    assert_eq!(file.tags().unwrap(), vec!["keep"]);
    file.remove_child(&child).unwrap();
    assert_untouched(&backend, &mut file);
    assert!(file.children().unwrap().is_empty());
    assert!(file.children().unwrap().is_empty());
    assert_eq!(backend.pending(), 0);
    assert_eq!(backend.requests().len(), 4);
}

#[test]
fn test_reanalyze_evicts_analyses_only() {
    let (backend, _, mwdb) = setup();
    let id = sha256('c');
    let endpoint = format!("object/{}/karton", id);
    let mut file = file_with_cached_tags(&backend, &mwdb, &id);
    backend
        .reply(
            Method::Get,
            &endpoint,
            200,
            json!({"analyses": [{"id": "first", "status": "finished"}]}),
        )
        .reply(Method::Post, &endpoint, 200, json!({"id": "second", "status": "running"}))
        .reply(
            Method::Get,
            &endpoint,
            200,
            json!({"analyses": [
                {"id": "first", "status": "finished"},
                {"id": "second", "status": "running"},
            ]}),
        );

    assert_eq!(file.analyses().unwrap().len(), 1);
    file.reanalyze(None).unwrap();
    assert_untouched(&backend, &mut file);
    let analyses = file.analyses().unwrap();
    assert_eq!(analyses.len(), 2);
    assert!(!analyses[0].is_running());
    assert!(analyses[1].is_running());
    assert_eq!(file.analyses().unwrap().len(), 2);
    assert_eq!(backend.pending(), 0);
    assert_eq!(backend.requests().len(), 5);
}

#[test]
fn test_flush_forgets_everything_but_identity() {
    let (backend, _, mwdb) = setup();
    let id = sha256('2');
    let detail = format!("file/{}", id);
    backend
        .reply(Method::Get, &detail, 200, json!({"id": id, "file_name": "a"}))
        .reply(Method::Get, &detail, 200, json!({"id": id, "file_name": "b"}));

    let mut file = MwdbFile::from_id(mwdb.api().clone(), &id);
    assert_eq!(file.file_name().unwrap(), "a");
    file.flush();
    assert_eq!(file.state().fields().len(), 2);
    assert_eq!(file.file_name().unwrap(), "b");
}

#[test]
fn test_relations_and_comments() {
    let (backend, _, mwdb) = setup();
    let id = sha256('3');
    let child = sha256('4');
    backend
        .reply(
            Method::Get,
            &format!("object/{}", id),
            200,
            json!({
                "id": id,
                "type": "file",
                "parents": [],
                "children": [{"id": child, "type": "config", "family": "emotet"}],
            }),
        )
        .reply(
            Method::Get,
            &format!("object/{}/comment", id),
            200,
            json!([{"id": 7, "author": "analyst", "timestamp": "2024-03-01T10:00:00", "comment": "packed"}]),
        );

    let mut object = mwdb.query(&id).unwrap();
    assert!(object.parents().unwrap().is_empty());
    let mut children = object.children().unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].as_config().unwrap().family().unwrap(), "emotet");

    let comments = object.comments().unwrap();
    assert_eq!(comments[0].id, 7);
    assert_eq!(comments[0].comment, "packed");
    assert_eq!(comments[0].parent().id(), id);
    assert_eq!(backend.requests().len(), 2);
}

#[test]
fn test_attributes_fall_back_to_metakeys_on_old_servers() {
    let (backend, _, mwdb) = setup();
    let id = sha256('5');
    backend
        .fail(Method::Get, &format!("object/{}/attribute", id), 404, ENDPOINT_MISSING)
        .server_version("2.5.1")
        .reply(
            Method::Get,
            &format!("object/{}/meta", id),
            200,
            json!({"metakeys": [
                {"key": "url", "value": "http://a"},
                {"key": "url", "value": "http://b"},
            ]}),
        )
        .reply(Method::Post, &format!("object/{}/meta", id), 200, json!({}));

    let mut file = MwdbFile::from_id(mwdb.api().clone(), &id);
    let attributes = file.attributes().unwrap();
    assert_eq!(attributes["url"], vec![json!("http://a"), json!("http://b")]);

    // the version is known now, so the legacy endpoint is used directly
    file.add_attribute("port", json!(8080)).unwrap();
    let requests = backend.requests();
    assert_eq!(
        requests.last().unwrap().body,
        RequestBody::Json(json!({"key": "port", "value": "8080"}))
    );
    assert_eq!(backend.pending(), 0);
}

#[test]
fn test_missing_endpoint_on_recent_server_is_not_hidden() {
    let (backend, _, mwdb) = setup();
    let id = sha256('6');
    backend
        .fail(Method::Get, &format!("object/{}/attribute", id), 404, ENDPOINT_MISSING)
        .server_version("2.9.0");

    let mut file = MwdbFile::from_id(mwdb.api().clone(), &id);
    assert!(matches!(
        file.attributes(),
        Err(MwdbError::EndpointNotFound { .. })
    ));
}

#[test]
fn test_analyses_require_a_recent_server() {
    let (backend, _, mwdb) = setup();
    let id = sha256('7');
    backend
        .fail(Method::Get, &format!("object/{}/karton", id), 404, ENDPOINT_MISSING)
        .server_version("2.2.0");

    let mut file = MwdbFile::from_id(mwdb.api().clone(), &id);
    match file.analyses() {
        Err(MwdbError::VersionMismatch { actual, .. }) => assert_eq!(actual, "2.2.0"),
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn test_reanalyze_posts_arguments() {
    let (backend, _, mwdb) = setup();
    let id = sha256('8');
    backend.reply(
        Method::Post,
        &format!("object/{}/karton", id),
        200,
        json!({"id": "a1b2", "status": "running", "arguments": {"unpack": true}}),
    );

    let mut file = MwdbFile::from_id(mwdb.api().clone(), &id);
    let mut arguments = serde_json::Map::new();
    arguments.insert("unpack".to_string(), Value::Bool(true));
    let analysis = file.reanalyze(Some(arguments)).unwrap();

    assert!(analysis.is_running());
    assert_eq!(
        backend.requests()[0].body,
        RequestBody::Json(json!({"arguments": {"unpack": true}}))
    );
}

#[test]
fn test_only_running_analyses_are_running() {
    let (backend, _, mwdb) = setup();
    let id = sha256('d');
    backend.reply(
        Method::Get,
        &format!("object/{}/karton", id),
        200,
        json!({"analyses": [
            {"id": "k1", "status": "running"},
            {"id": "k2", "status": "finished"},
            {"id": "k3", "status": "failed"},
        ]}),
    );

    let mut file = MwdbFile::from_id(mwdb.api().clone(), &id);
    let running: Vec<bool> = file
        .analyses()
        .unwrap()
        .iter()
        .map(|analysis| analysis.is_running())
        .collect();
    assert_eq!(running, vec![true, false, false]);
}

#[test]
fn test_download_with_token() {
    let (backend, _, mwdb) = setup();
    let id = sha256('9');
    let endpoint = format!("file/{}/download", id);
    backend
        .reply(Method::Post, &endpoint, 200, json!({"token": "one-time"}))
        .reply_raw(Method::Get, &endpoint, 200, b"MZ\x90\x00");

    let mut file = MwdbFile::from_id(mwdb.api().clone(), &id);
    assert_eq!(file.download().unwrap(), b"MZ\x90\x00");
    assert_eq!(file.content().unwrap(), b"MZ\x90\x00");

    let requests = backend.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].query, vec![("token".to_string(), "one-time".to_string())]);
}

#[test]
fn test_download_on_old_server() {
    let (backend, _, mwdb) = setup();
    let id = sha256('0');
    backend
        .fail(Method::Post, &format!("file/{}/download", id), 404, ENDPOINT_MISSING)
        .server_version("2.1.0")
        .reply(
            Method::Post,
            &format!("request/sample/{}", id),
            200,
            json!({"url": "https://mwdb.test/api/download/legacy-token"}),
        )
        .reply_raw(Method::Get, "download/legacy-token", 200, b"sample");

    let mut file = MwdbFile::from_id(mwdb.api().clone(), &id);
    assert_eq!(file.download().unwrap(), b"sample");
}

#[test]
fn test_config_content_and_blob_references() {
    let (backend, _, mwdb) = setup();
    let id = sha256('c');
    let blob = sha256('d');
    backend.reply(
        Method::Get,
        &format!("config/{}", id),
        200,
        json!({"id": id, "cfg": {"c2": ["10.0.0.1"], "raw": {"in-blob": blob}}}),
    );

    let mut config = MwdbConfig::from_id(mwdb.api().clone(), &id);
    let content = String::from_utf8(config.content().unwrap()).unwrap();
    assert!(content.contains("\n    \"c2\": [\n        \"10.0.0.1\"\n    ]"));

    let entries = config.config().unwrap();
    match &entries["raw"] {
        ConfigValue::Blob(referenced) => assert_eq!(referenced.id(), blob),
        other => panic!("expected a blob reference, got {:?}", other),
    }
    assert!(matches!(entries["c2"], ConfigValue::Value(_)));
}

#[test]
fn test_recent_pages_with_older_than() {
    let (backend, _, mwdb) = setup();
    let (a, b, c) = (sha256('a'), sha256('b'), sha256('c'));
    let time = "2024-03-01T10:00:00+00:00";
    backend
        .reply(
            Method::Get,
            "file",
            200,
            json!({"files": [file_payload(&a, time), file_payload(&b, time)]}),
        )
        .reply(Method::Get, "file", 200, json!({"files": [file_payload(&c, time)]}))
        .reply(Method::Get, "file", 200, json!({"files": []}));

    let ids: Vec<String> = mwdb
        .search_files("tag:emotet")
        .map(|file| file.unwrap().id().to_string())
        .collect();
    assert_eq!(ids, vec![a, b.clone(), c.clone()]);

    let requests = backend.requests();
    assert_eq!(requests[0].query, vec![("query".to_string(), "tag:emotet".to_string())]);
    assert_eq!(
        requests[1].query,
        vec![
            ("older_than".to_string(), b),
            ("query".to_string(), "tag:emotet".to_string())
        ]
    );
    assert_eq!(requests[2].query[0], ("older_than".to_string(), c));
}

#[test]
fn test_recent_is_lazy_and_stops_on_not_found() {
    let (backend, _, mwdb) = setup();
    backend.fail(Method::Get, "object", 404, "Object not found");

    let mut recent = mwdb.recent_objects();
    assert_eq!(backend.requests().len(), 0);
    assert!(recent.next().is_none());
    assert!(recent.next().is_none());
    assert_eq!(backend.requests().len(), 1);
}

#[test]
fn test_recent_rejects_page_without_cursor() {
    let (backend, _, mwdb) = setup();
    backend.reply(
        Method::Get,
        "file",
        200,
        json!({"files": [{"type": "file", "file_name": "anonymous.bin"}]}),
    );

    let mut recent = mwdb.recent_files();
    assert!(matches!(recent.next(), Some(Err(MwdbError::BadResponse(_)))));
    assert!(recent.next().is_none());
    assert_eq!(backend.requests().len(), 1);
}

#[test]
fn test_count() {
    let (backend, _, mwdb) = setup();
    backend.reply(Method::Get, "blob/count", 200, json!({"count": 42}));

    assert_eq!(mwdb.count_blobs(Some("blob.type:dump")).unwrap(), 42);
}

#[test]
fn test_listen_yields_new_objects_oldest_first() {
    let (backend, sleeper, mwdb) = setup();
    let (pivot, older, newer) = (sha256('p'), sha256('1'), sha256('2'));
    backend
        .reply(
            Method::Get,
            "file",
            200,
            json!({"files": [file_payload(&pivot, "2024-03-01T10:00:00+00:00")]}),
        )
        .reply(
            Method::Get,
            "file",
            200,
            json!({"files": [
                file_payload(&newer, "2024-03-01T10:02:00+00:00"),
                file_payload(&older, "2024-03-01T10:01:00+00:00"),
                file_payload(&pivot, "2024-03-01T10:00:00+00:00"),
            ]}),
        );

    let ids: Vec<String> = mwdb
        .listen_for_files(None, false, Duration::from_secs(15))
        .unwrap()
        .map(|file| file.unwrap().id().to_string())
        .collect();

    assert_eq!(ids, vec![older, newer]);
    assert!(sleeper.sleeps().is_empty());
}

#[test]
fn test_blocking_listen_sleeps_between_polls() {
    let (backend, sleeper, mwdb) = setup();
    let (pivot, fresh) = (sha256('p'), sha256('3'));
    backend
        .reply(
            Method::Get,
            &format!("file/{}", pivot),
            200,
            file_payload(&pivot, "2024-03-01T10:00:00+00:00"),
        )
        .reply(
            Method::Get,
            "file",
            200,
            json!({"files": [file_payload(&pivot, "2024-03-01T10:00:00+00:00")]}),
        )
        .reply(
            Method::Get,
            "file",
            200,
            json!({"files": [
                file_payload(&fresh, "2024-03-01T10:05:00+00:00"),
                file_payload(&pivot, "2024-03-01T10:00:00+00:00"),
            ]}),
        );

    let mut listener = mwdb
        .listen_for_files(Some(&pivot), true, Duration::from_secs(2))
        .unwrap();
    let file = listener.next().unwrap().unwrap();

    assert_eq!(file.id(), fresh);
    assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(2)]);
}

#[test]
fn test_listen_rejects_objects_older_than_the_pivot() {
    let (backend, _, mwdb) = setup();
    let (pivot, stray) = (sha256('p'), sha256('4'));
    backend
        .reply(
            Method::Get,
            "file",
            200,
            json!({"files": [file_payload(&pivot, "2024-03-01T10:00:00+00:00")]}),
        )
        .reply(
            Method::Get,
            "file",
            200,
            json!({"files": [file_payload(&stray, "2024-02-01T10:00:00+00:00")]}),
        );

    let mut listener = mwdb
        .listen_for_files(None, false, Duration::from_secs(15))
        .unwrap();
    assert!(matches!(listener.next(), Some(Err(MwdbError::BadResponse(_)))));
    assert!(listener.next().is_none());
}

#[test]
fn test_upload_file_sends_multipart_options() {
    let (backend, _, mwdb) = setup();
    let id = sha256('u');
    let parent = sha256('v');
    backend.reply(
        Method::Post,
        "file",
        200,
        file_payload(&id, "2024-03-01T10:00:00+00:00"),
    );

    let options = UploadOptions::default()
        .parent(parent.clone())
        .tag("dropper")
        .share(ShareMode::Private);
    let file = mwdb.upload_file("a.exe", b"MZ".to_vec(), &options).unwrap();
    assert_eq!(file.sha256(), id);

    let fields = match &backend.requests()[0].body {
        RequestBody::Multipart(fields) => fields.clone(),
        other => panic!("expected multipart body, got {:?}", other),
    };
    assert_eq!(fields[0], MultipartField::file("file", "a.exe", b"MZ".to_vec()));
    let options: Value = serde_json::from_slice(&fields[1].content).unwrap();
    assert_eq!(options["parent"], json!(parent));
    assert_eq!(options["upload_as"], "analyst");
    assert_eq!(options["tags"], json!([{"tag": "dropper"}]));
}

#[test]
fn test_upload_config_merges_parameters() {
    let (backend, _, mwdb) = setup();
    let id = sha256('w');
    backend.reply(Method::Post, "config", 200, json!({"id": id, "family": "emotet"}));

    let mut cfg = serde_json::Map::new();
    cfg.insert("urls".to_string(), json!(["http://c2"]));
    let mut config = mwdb
        .upload_config("emotet", cfg, "static", &UploadOptions::default())
        .unwrap();
    assert_eq!(config.family().unwrap(), "emotet");

    match &backend.requests()[0].body {
        RequestBody::Json(body) => {
            assert_eq!(body["family"], "emotet");
            assert_eq!(body["config_type"], "static");
            assert_eq!(body["cfg"]["urls"][0], "http://c2");
            assert_eq!(body["upload_as"], "*");
            assert_eq!(body["parent"], Value::Null);
        }
        other => panic!("expected JSON body, got {:?}", other),
    }
}

#[test]
fn test_remove_deletes_the_object() {
    let (backend, _, mwdb) = setup();
    let id = sha256('x');
    backend.reply(Method::Delete, &format!("object/{}", id), 200, json!({}));

    let mut file = MwdbFile::from_id(mwdb.api().clone(), &id);
    file.remove().unwrap();
    assert_eq!(backend.calls(), vec![format!("DELETE object/{}", id)]);
}
