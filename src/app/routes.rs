//! The demo routes.
//!
//! Each route is a [`Route`] variant; [`register_routes`] binds every
//! variant to its method and path so the dispatcher wraps them all the same
//! way.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::app::state::AppState;
use crate::app::store::Record;
use crate::http::multipart::MultipartDecoder;
use crate::http::request::{Method, Request};
use crate::http::response::ResponseBuilder;
use crate::http::status::StatusCode;
use crate::http::writer::ResponseWriter;
use crate::server::registry::{Handler, Registry};

const REDIRECT_LOCATION: &str = "http://example.com";
const INVALID_JSON: &str = "Invalid JSON format.";
const EXPECTED_KEY_VALUE: &str = "Invalid data format. Expected JSON with 'key' and 'value'.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Hello,
    ListData,
    Submit,
    Update,
    Modify,
    Delete,
    External,
    SecureAdmin,
    SecureUser,
    Register,
    Login,
    Continue,
    Redirect,
    Upload,
}

impl Route {
    pub const ALL: [Route; 14] = [
        Route::Hello,
        Route::ListData,
        Route::Submit,
        Route::Update,
        Route::Modify,
        Route::Delete,
        Route::External,
        Route::SecureAdmin,
        Route::SecureUser,
        Route::Register,
        Route::Login,
        Route::Continue,
        Route::Redirect,
        Route::Upload,
    ];

    pub fn method(&self) -> Method {
        match self {
            Route::Hello
            | Route::ListData
            | Route::External
            | Route::SecureAdmin
            | Route::SecureUser
            | Route::Redirect => Method::GET,
            Route::Submit | Route::Register | Route::Login | Route::Continue | Route::Upload => {
                Method::POST
            }
            Route::Update => Method::PUT,
            Route::Modify => Method::PATCH,
            Route::Delete => Method::DELETE,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Route::Hello => "/",
            Route::ListData => "/data",
            Route::Submit => "/submit",
            Route::Update => "/update",
            Route::Modify => "/modify",
            Route::Delete => "/delete",
            Route::External => "/external",
            Route::SecureAdmin => "/secure/admin",
            Route::SecureUser => "/secure/user",
            Route::Register => "/register",
            Route::Login => "/login",
            Route::Continue => "/continue",
            Route::Redirect => "/redirect",
            Route::Upload => "/upload",
        }
    }
}

/// A route bound to the shared application state.
pub struct RouteHandler {
    route: Route,
    state: Arc<AppState>,
}

impl Handler for RouteHandler {
    fn handle(&self, request: &Request, response: &ResponseWriter) -> anyhow::Result<()> {
        let state = self.state.as_ref();
        match self.route {
            Route::Hello => {
                response.send(StatusCode::OK, "Hello, World!");
            }
            Route::ListData => list_data(state, response),
            Route::Submit => submit(state, request, response),
            Route::Update => update(state, request, response),
            Route::Modify => modify(state, request, response),
            Route::Delete => delete(state, request, response),
            Route::External => external(state, response),
            Route::SecureAdmin => secure(state, request, response, true),
            Route::SecureUser => secure(state, request, response, false),
            Route::Register => register(state, request, response),
            Route::Login => login(state, request, response),
            Route::Continue => {
                return state.handshake.run(request, response, |body| {
                    Ok((StatusCode::OK, format!("Received data: {body}")))
                });
            }
            Route::Redirect => redirect(response),
            Route::Upload => upload(request, response),
        }
        Ok(())
    }
}

pub fn register_routes(registry: &mut Registry, state: Arc<AppState>) {
    for route in Route::ALL {
        registry.register(
            route.method(),
            route.path(),
            RouteHandler {
                route,
                state: state.clone(),
            },
        );
    }
}

fn is_json(request: &Request) -> bool {
    request
        .header("Content-Type")
        .and_then(|ct| ct.split(';').next())
        .is_some_and(|media| media.trim().eq_ignore_ascii_case("application/json"))
}

/// A `{"key": ..., "value": ...}` body where `value` holds a JSON object
/// encoded as a string.
enum KeyValue {
    Parsed(String, Record),
    Incomplete,
    Invalid,
}

fn parse_key_value(body: &str) -> KeyValue {
    let Ok(fields) = serde_json::from_str::<HashMap<String, String>>(body) else {
        return KeyValue::Invalid;
    };
    let (Some(key), Some(raw)) = (fields.get("key"), fields.get("value")) else {
        return KeyValue::Incomplete;
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(record)) => KeyValue::Parsed(key.clone(), record),
        _ => KeyValue::Invalid,
    }
}

fn render(record: &Record) -> String {
    Value::Object(record.clone()).to_string()
}

fn list_data(state: &AppState, response: &ResponseWriter) {
    if !state.delays.list.is_zero() {
        std::thread::sleep(state.delays.list);
    }
    let listing = state
        .store
        .snapshot()
        .iter()
        .map(|(key, record)| format!("{key}: {}", render(record)))
        .collect::<Vec<_>>()
        .join("\n");
    response.send(StatusCode::OK, &listing);
}

fn submit(state: &AppState, request: &Request, response: &ResponseWriter) {
    if !is_json(request) {
        response.send(StatusCode::UNSUPPORTED_MEDIA_TYPE, "Unsupported Media Type");
        return;
    }
    match parse_key_value(&request.body) {
        KeyValue::Parsed(key, record) => {
            let rendered = render(&record);
            state.store.put(key.clone(), record);
            state.simulate_long_operation();
            response.send(StatusCode::CREATED, &format!("New entry added: {key} = {rendered}"));
        }
        KeyValue::Incomplete => {
            response.send(StatusCode::BAD_REQUEST, EXPECTED_KEY_VALUE);
        }
        KeyValue::Invalid => {
            response.send(StatusCode::BAD_REQUEST, INVALID_JSON);
        }
    }
}

fn update(state: &AppState, request: &Request, response: &ResponseWriter) {
    if !is_json(request) {
        response.send(StatusCode::UNSUPPORTED_MEDIA_TYPE, "Unsupported Media Type");
        return;
    }
    match parse_key_value(&request.body) {
        KeyValue::Parsed(key, record) => match state.store.update_existing(&key, record) {
            Some(updated) => {
                state.simulate_long_operation();
                response.send(
                    StatusCode::OK,
                    &format!("Updated entry: {key} = {}", render(&updated)),
                );
            }
            None => {
                response.send(StatusCode::NOT_FOUND, &format!("Data not found for key: {key}"));
            }
        },
        KeyValue::Incomplete => {
            response.send(StatusCode::BAD_REQUEST, EXPECTED_KEY_VALUE);
        }
        KeyValue::Invalid => {
            response.send(StatusCode::BAD_REQUEST, INVALID_JSON);
        }
    }
}

fn modify(state: &AppState, request: &Request, response: &ResponseWriter) {
    if !is_json(request) {
        response.send(StatusCode::UNSUPPORTED_MEDIA_TYPE, "Unsupported Media Type");
        return;
    }
    match parse_key_value(&request.body) {
        KeyValue::Parsed(key, patch) => match state.store.merge_existing(&key, patch) {
            Some(merged) => {
                state.simulate_long_operation();
                response.send(
                    StatusCode::OK,
                    &format!("Modified entry: {key} = {}", render(&merged)),
                );
            }
            None => {
                response.send(StatusCode::NOT_FOUND, &format!("Data not found for key: {key}"));
            }
        },
        KeyValue::Incomplete => {
            response.send(StatusCode::BAD_REQUEST, EXPECTED_KEY_VALUE);
        }
        KeyValue::Invalid => {
            response.send(StatusCode::BAD_REQUEST, INVALID_JSON);
        }
    }
}

fn delete(state: &AppState, request: &Request, response: &ResponseWriter) {
    let Ok(fields) = serde_json::from_str::<HashMap<String, String>>(&request.body) else {
        response.send(StatusCode::BAD_REQUEST, INVALID_JSON);
        return;
    };
    let Some(key) = fields.get("key") else {
        response.send(
            StatusCode::BAD_REQUEST,
            "Invalid data format. Expected JSON with 'key'.",
        );
        return;
    };

    if state.store.remove(key).is_some() {
        state.simulate_long_operation();
        response.send(StatusCode::OK, &format!("Deleted entry with key: {key}"));
    } else {
        response.send(StatusCode::NOT_FOUND, &format!("Data not found for key: {key}"));
    }
}

fn external(state: &AppState, response: &ResponseWriter) {
    let url = state.external_url();
    match state.fetcher.fetch(url) {
        Ok((200, body)) => {
            response.send(StatusCode::OK, &body);
        }
        Ok((status, _)) => {
            tracing::warn!(url, upstream_status = status, "Upstream returned non-success");
            response.send(StatusCode::BAD_GATEWAY, "Bad Gateway");
        }
        Err(e) => {
            tracing::warn!(url, error = %e, "Upstream fetch failed");
            response.send(StatusCode::BAD_GATEWAY, "Bad Gateway");
        }
    }
}

fn bearer_token(request: &Request) -> Option<&str> {
    let raw = request.header("Authorization")?.trim();
    Some(raw.strip_prefix("Bearer ").unwrap_or(raw))
}

fn secure(state: &AppState, request: &Request, response: &ResponseWriter, admin_only: bool) {
    let Some(token) = bearer_token(request).filter(|t| state.auth.is_authenticated(t)) else {
        response.send(StatusCode::UNAUTHORIZED, "Unauthorized");
        return;
    };

    if admin_only {
        if !state.auth.is_admin(token) {
            response.send(StatusCode::FORBIDDEN, "Forbidden");
            return;
        }
        response.send(StatusCode::OK, "You have access to admin data!");
    } else {
        response.send(StatusCode::OK, "You have access to user data!");
    }
}

fn credentials(request: &Request) -> Option<(String, String)> {
    let fields = serde_json::from_str::<HashMap<String, String>>(&request.body).ok()?;
    Some((
        fields.get("username").cloned().unwrap_or_default(),
        fields.get("password").cloned().unwrap_or_default(),
    ))
}

fn register(state: &AppState, request: &Request, response: &ResponseWriter) {
    let Some((username, password)) = credentials(request) else {
        response.send(StatusCode::BAD_REQUEST, INVALID_JSON);
        return;
    };

    if username == "admin" && password == "admin" {
        let token = state.auth.issue_token(true);
        response.send(StatusCode::OK, &format!("Registration successful. Token: {token}"));
    } else {
        response.send(
            StatusCode::OK,
            &format!("Registration successful for user: {username}"),
        );
    }
}

fn login(state: &AppState, request: &Request, response: &ResponseWriter) {
    let Some((username, password)) = credentials(request) else {
        response.send(StatusCode::BAD_REQUEST, INVALID_JSON);
        return;
    };

    let is_admin = match (username.as_str(), password.as_str()) {
        ("admin", "admin") => true,
        ("user1", "password1") => false,
        _ => {
            response.send(StatusCode::UNAUTHORIZED, "Invalid credentials");
            return;
        }
    };

    let token = state.auth.issue_token(is_admin);
    response.send(StatusCode::OK, &format!("Login successful. Token: {token}"));
}

fn redirect(response: &ResponseWriter) {
    let redirect = ResponseBuilder::new(StatusCode::FOUND)
        .header("Location", REDIRECT_LOCATION)
        .header("Content-Type", "text/plain")
        .body(format!("Found: {REDIRECT_LOCATION}").into_bytes())
        .build();
    response.send_response(&redirect);
}

fn upload(request: &Request, response: &ResponseWriter) {
    let content_type = request.header("Content-Type").unwrap_or_default();
    if !content_type.starts_with("multipart/form-data") {
        response.send(StatusCode::BAD_REQUEST, "Expected multipart/form-data");
        return;
    }

    let decoder = match MultipartDecoder::from_content_type(content_type) {
        Ok(decoder) => decoder,
        Err(e) => {
            response.send(StatusCode::BAD_REQUEST, &e.to_string());
            return;
        }
    };

    let parts = match decoder.decode(request.body.as_bytes()) {
        Ok(parts) => parts,
        Err(e) => {
            tracing::error!(error = %e, "Multipart decode failed");
            response.send(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
            return;
        }
    };

    let summary = parts
        .iter()
        .map(|part| match part.filename() {
            Some(filename) => format!("Uploaded: {filename} ({} bytes)", part.body.len()),
            None => format!("Field: {}", part.name().unwrap_or("unnamed")),
        })
        .collect::<Vec<_>>()
        .join("\n");

    response.send(StatusCode::OK, &summary);
}
