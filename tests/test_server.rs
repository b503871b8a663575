//! End-to-end behaviour of the demo routes over real sockets.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use common::{Reply, StubFetcher, TestServer, fast_config};

const JSON: (&str, &str) = ("Content-Type", "application/json");

fn server() -> TestServer {
    TestServer::demo(fast_config(), Arc::new(StubFetcher { replies: HashMap::new() }))
}

fn login(server: &TestServer, username: &str, password: &str) -> String {
    let body = format!(r#"{{"username":"{username}","password":"{password}"}}"#);
    let reply = server.request("POST", "/login", &[JSON], &body);
    assert_eq!(reply.status, 200, "{}", reply.raw);
    reply
        .message()
        .strip_prefix("Login successful. Token: ")
        .expect("token in login reply")
        .to_string()
}

#[test]
fn test_hello_world() {
    let server = server();
    let reply = server.request("GET", "/", &[], "");

    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, "200: OK\r\nHello, World!");
    assert_eq!(reply.headers["Content-Type"], "text/plain");
    assert_eq!(reply.headers["Content-Length"], reply.body.len().to_string());
    assert_eq!(reply.responses(), 1);
}

#[test]
fn test_query_string_does_not_affect_routing() {
    let server = server();
    let reply = server.request("GET", "/?lang=en", &[], "");
    assert_eq!(reply.status, 200);
}

#[test]
fn test_protocol_rejections() {
    let server = server();

    let reply = server.send(b"OPTIONS / HTTP/1.1\r\nHost: x\r\n\r\n");
    assert_eq!(reply.status, 501);

    let reply = server.send(b"GET / HTTP/1.0\r\nHost: x\r\n\r\n");
    assert_eq!(reply.status, 505);
    assert_eq!(reply.body, "505: HTTP Version Not Supported\r\nHTTP Version not supported");

    let reply = server.send(b"GET /\r\nHost: x\r\n\r\n");
    assert_eq!(reply.status, 400);

    let reply = server.request("GET", "/missing", &[], "");
    assert_eq!(reply.status, 404);
    assert_eq!(reply.body, "404: Not Found\r\nNot Found");

    let reply = server.request("POST", "/", &[], "");
    assert_eq!(reply.status, 404);
}

#[test]
fn test_submit_then_list() {
    let server = server();

    let reply = server.request(
        "POST",
        "/submit",
        &[JSON],
        r#"{"key":"k","value":"{\"a\":1}"}"#,
    );
    assert_eq!(reply.status, 201, "{}", reply.raw);
    assert!(reply.body.starts_with("201: Created"));
    assert_eq!(reply.message(), r#"New entry added: k = {"a":1}"#);

    let reply = server.request("GET", "/data", &[], "");
    assert_eq!(reply.status, 200);
    assert!(reply.body.contains(r#"k: {"a":1}"#), "{}", reply.body);
    assert!(reply.body.contains(r#"example: {"field1":"value1","field2":"value2"}"#));
}

#[test]
fn test_stored_fields_keep_client_order() {
    let server = server();

    let reply = server.request(
        "POST",
        "/submit",
        &[JSON],
        r#"{"key":"k","value":"{\"zeta\":1,\"alpha\":2}"}"#,
    );
    assert_eq!(reply.message(), r#"New entry added: k = {"zeta":1,"alpha":2}"#);

    let reply = server.request(
        "PATCH",
        "/modify",
        &[JSON],
        r#"{"key":"k","value":"{\"mid\":3}"}"#,
    );
    assert_eq!(reply.message(), r#"Modified entry: k = {"zeta":1,"alpha":2,"mid":3}"#);

    let reply = server.request("GET", "/data", &[], "");
    assert!(reply.body.contains(r#"k: {"zeta":1,"alpha":2,"mid":3}"#), "{}", reply.body);
}

#[test]
fn test_submit_validation() {
    let server = server();

    let reply = server.request("POST", "/submit", &[("Content-Type", "text/plain")], "{}");
    assert_eq!(reply.status, 415);

    let reply = server.request("POST", "/submit", &[JSON], "{not json");
    assert_eq!(reply.status, 400);
    assert_eq!(reply.message(), "Invalid JSON format.");

    let reply = server.request("POST", "/submit", &[JSON], r#"{"key":"only"}"#);
    assert_eq!(reply.status, 400);
    assert_eq!(
        reply.message(),
        "Invalid data format. Expected JSON with 'key' and 'value'."
    );
}

#[test]
fn test_update_then_modify_composes_fields() {
    let server = server();

    let reply = server.request(
        "PUT",
        "/update",
        &[JSON],
        r#"{"key":"example","value":"{\"field1\":\"newValue1\",\"field2\":\"newValue2\"}"}"#,
    );
    assert_eq!(reply.status, 200, "{}", reply.raw);
    assert_eq!(
        reply.message(),
        r#"Updated entry: example = {"field1":"newValue1","field2":"newValue2"}"#
    );

    let reply = server.request(
        "PATCH",
        "/modify",
        &[JSON],
        r#"{"key":"example","value":"{\"field1\":\"modifiedValue1\"}"}"#,
    );
    assert_eq!(reply.status, 200, "{}", reply.raw);
    assert_eq!(
        reply.message(),
        r#"Modified entry: example = {"field1":"modifiedValue1","field2":"newValue2"}"#
    );
}

#[test]
fn test_update_and_modify_missing_key() {
    let server = server();
    let body = r#"{"key":"ghost","value":"{\"a\":1}"}"#;

    let reply = server.request("PUT", "/update", &[JSON], body);
    assert_eq!(reply.status, 404);
    assert_eq!(reply.message(), "Data not found for key: ghost");

    let reply = server.request("PATCH", "/modify", &[JSON], body);
    assert_eq!(reply.status, 404);
}

#[test]
fn test_delete_is_idempotent_on_the_wire() {
    let server = server();
    let body = r#"{"key":"example"}"#;

    let reply = server.request("DELETE", "/delete", &[], body);
    assert_eq!(reply.status, 200);
    assert_eq!(reply.message(), "Deleted entry with key: example");

    let reply = server.request("DELETE", "/delete", &[], body);
    assert_eq!(reply.status, 404);

    let reply = server.request("DELETE", "/delete", &[], r#"{"key":"never"}"#);
    assert_eq!(reply.status, 404);
    let reply = server.request("DELETE", "/delete", &[], r#"{"key":"never"}"#);
    assert_eq!(reply.status, 404);

    let reply = server.request("GET", "/data", &[], "");
    assert_eq!(reply.body, "200: OK\r\n");
}

#[test]
fn test_secure_admin_access_levels() {
    let server = server();

    let reply = server.request("GET", "/secure/admin", &[], "");
    assert_eq!(reply.status, 401);

    let reply = server.request("GET", "/secure/admin", &[("Authorization", "bogus")], "");
    assert_eq!(reply.status, 401);

    let user = login(&server, "user1", "password1");
    let reply = server.request("GET", "/secure/admin", &[("Authorization", &user)], "");
    assert_eq!(reply.status, 403);

    let admin = login(&server, "admin", "admin");
    let reply = server.request("GET", "/secure/admin", &[("Authorization", &admin)], "");
    assert_eq!(reply.status, 200);
    assert_eq!(reply.message(), "You have access to admin data!");

    let bearer = format!("Bearer {admin}");
    let reply = server.request("GET", "/secure/admin", &[("Authorization", &bearer)], "");
    assert_eq!(reply.status, 200);
}

#[test]
fn test_secure_user_and_bad_login() {
    let server = server();

    let reply = server.request("GET", "/secure/user", &[], "");
    assert_eq!(reply.status, 401);

    let user = login(&server, "user1", "password1");
    let reply = server.request("GET", "/secure/user", &[("Authorization", &user)], "");
    assert_eq!(reply.status, 200);

    let reply = server.request("POST", "/login", &[JSON], r#"{"username":"eve","password":"x"}"#);
    assert_eq!(reply.status, 401);
    assert_eq!(reply.message(), "Invalid credentials");
}

#[test]
fn test_register_admin_issues_working_token() {
    let server = server();

    let reply = server.request(
        "POST",
        "/register",
        &[JSON],
        r#"{"username":"admin","password":"admin"}"#,
    );
    assert_eq!(reply.status, 200);
    let token = reply
        .message()
        .strip_prefix("Registration successful. Token: ")
        .unwrap()
        .to_string();
    assert!(server.state().auth.is_admin(&token));

    let reply = server.request(
        "POST",
        "/register",
        &[JSON],
        r#"{"username":"bob","password":"pw"}"#,
    );
    assert_eq!(reply.message(), "Registration successful for user: bob");
}

#[test]
fn test_redirect_is_raw() {
    let server = server();
    let reply = server.request("GET", "/redirect", &[], "");

    assert_eq!(reply.status, 302);
    assert_eq!(reply.headers["Location"], "http://example.com");
    assert_eq!(reply.body, "Found: http://example.com");
}

#[test]
fn test_upload_decodes_parts() {
    let server = server();
    let body = "--b0undary\r\n\
                Content-Disposition: form-data; name=\"title\"\r\n\
                \r\n\
                holiday\r\n\
                --b0undary\r\n\
                Content-Disposition: form-data; name=\"file\"; filename=\"a.txt\"\r\n\
                Content-Type: text/plain\r\n\
                \r\n\
                hello\r\n\
                --b0undary--\r\n";

    let reply = server.request(
        "POST",
        "/upload",
        &[("Content-Type", "multipart/form-data; boundary=b0undary")],
        body,
    );

    assert_eq!(reply.status, 200, "{}", reply.raw);
    assert_eq!(reply.message(), "Field: title\nUploaded: a.txt (5 bytes)");

    let reply = server.request("POST", "/upload", &[JSON], "{}");
    assert_eq!(reply.status, 400);
}

#[test]
fn test_external_follows_gate() {
    let cfg = fast_config();
    let mut replies = HashMap::new();
    replies.insert(cfg.external.available_url.clone(), (200, "{\"id\":1}".to_string()));
    replies.insert(cfg.external.unavailable_url.clone(), (404, "{}".to_string()));
    let server = TestServer::demo(cfg, Arc::new(StubFetcher { replies }));

    let reply = server.request("GET", "/external", &[], "");
    assert_eq!(reply.status, 200);
    assert_eq!(reply.message(), "{\"id\":1}");

    server.state().set_external_service_available(false);
    let reply = server.request("GET", "/external", &[], "");
    assert_eq!(reply.status, 502);
    assert_eq!(reply.body, "502: Bad Gateway\r\nBad Gateway");
}

#[test]
fn test_external_transport_failure_is_502() {
    let server = server();
    let reply = server.request("GET", "/external", &[], "");
    assert_eq!(reply.status, 502);
}

#[test]
fn test_service_unavailable_gate() {
    let server = server();
    server.state().set_service_available(false);

    let reply = server.request("GET", "/", &[], "");
    assert_eq!(reply.status, 503);

    server.state().set_service_available(true);
    let reply = server.request("GET", "/", &[], "");
    assert_eq!(reply.status, 200);
}

#[test]
fn test_oversized_body_is_413() {
    let mut cfg = fast_config();
    cfg.dispatch.max_body_bytes = 64;
    let server = TestServer::demo(cfg, Arc::new(StubFetcher { replies: HashMap::new() }));

    let big = format!(r#"{{"key":"k","value":"{}"}}"#, "x".repeat(200));
    let reply = server.request("POST", "/submit", &[JSON], &big);
    assert_eq!(reply.status, 413);
    assert_eq!(reply.responses(), 1);
}

#[test]
fn test_body_split_across_reads_is_reassembled() {
    use std::io::Write;

    let server = server();
    let mut stream = server.connect();
    let body = r#"{"key":"slow","value":"{\"n\":2}"}"#;
    let head = format!(
        "POST /submit HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n",
        body.len()
    );

    stream.write_all(head.as_bytes()).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(50));
    stream.write_all(body.as_bytes()).unwrap();

    let reply = Reply::parse(&common::read_all(&mut stream));
    assert_eq!(reply.status, 201, "{}", reply.raw);
    assert!(server.state().store.get("slow").is_some());
}

#[test]
fn test_peer_closing_early_does_not_disturb_server() {
    use std::io::Write;

    let server = server();
    {
        let mut stream = server.connect();
        stream.write_all(b"GET / HT").unwrap();
    }

    let reply = server.request("GET", "/", &[], "");
    assert_eq!(reply.status, 200);
}
