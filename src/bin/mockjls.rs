// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! A configurable mock Jasmin language server for testing.
//!
//! Speaks the LSP protocol over stdin/stdout using Content-Length framed
//! JSON-RPC. CLI flags control the required namespaces it reports, timing,
//! and failure modes. Every notification it receives is recorded and can be
//! read back with the `mock/received` request.
//! No tokio, plain blocking IO.

use std::io::{Read, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Mock Jasmin language server for integration testing.
#[derive(Parser, Debug)]
#[command(name = "mockjls")]
struct Args {
    /// Namespace reported by `jasmin/getRequiredNamespaces` (repeatable).
    #[arg(long)]
    required: Vec<String>,

    /// Answer `jasmin/getRequiredNamespaces` with `null`.
    #[arg(long)]
    null_required: bool,

    /// Sleep before every response (milliseconds).
    #[arg(long, default_value_t = 0)]
    response_delay: u64,

    /// Never respond to this method (repeatable).
    #[arg(long)]
    hang_on: Vec<String>,

    /// Return `InternalError` for this method (repeatable).
    #[arg(long)]
    fail_on: Vec<String>,

    /// Exit without a word after n responses (simulate crash).
    #[arg(long)]
    drop_after: Option<u64>,

    /// Send a `window/logMessage` after `initialized`.
    #[arg(long)]
    log_message: bool,

    /// Send a `workspace/configuration` request after `initialize`.
    #[arg(long)]
    send_configuration_request: bool,
}

/// An incoming JSON-RPC message: request, notification, or a client
/// response to one of our requests.
#[derive(Debug, Deserialize)]
struct Incoming {
    #[allow(dead_code, reason = "Required by JSON-RPC protocol")]
    jsonrpc: String,
    id: Option<Value>,
    method: Option<String>,
    #[serde(default)]
    params: Value,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

/// A JSON-RPC response.
#[derive(Debug, Serialize)]
struct Response {
    jsonrpc: String,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Serialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// Thread-safe writer handle. Wraps `std::io::Stdout` for production,
/// or a shared `Vec<u8>` for tests.
type Writer = Arc<Mutex<Box<dyn Write + Send>>>;

/// Create a writer that forwards to stdout.
fn stdout_writer() -> Writer {
    Arc::new(Mutex::new(Box::new(std::io::stdout())))
}

#[cfg(test)]
fn buffer_writer() -> (Writer, Arc<Mutex<Vec<u8>>>) {
    let buf = Arc::new(Mutex::new(Vec::<u8>::new()));
    let writer: Box<dyn Write + Send> = Box::new(SharedVecWriter(buf.clone()));
    (Arc::new(Mutex::new(writer)), buf)
}

/// Write adapter for `Arc<Mutex<Vec<u8>>>` used in tests.
#[cfg(test)]
struct SharedVecWriter(Arc<Mutex<Vec<u8>>>);

#[cfg(test)]
impl Write for SharedVecWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0
            .lock()
            .map_err(|e| std::io::Error::other(e.to_string()))?
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// State of the mock server.
struct MockServer {
    args: Args,
    received: Vec<Value>,
    response_count: u64,
    next_request_id: u64,
    writer: Writer,
    exited: bool,
}

impl MockServer {
    fn new(args: Args, writer: Writer) -> Self {
        Self {
            args,
            received: Vec::new(),
            response_count: 0,
            next_request_id: 1,
            writer,
            exited: false,
        }
    }

    /// Run the server, reading from the given reader until EOF or `exit`.
    fn run(&mut self, reader: &mut dyn Read) {
        let mut buffer = Vec::new();
        let mut temp = [0u8; 4096];

        while !self.exited {
            match reader.read(&mut temp) {
                Ok(0) | Err(_) => break,
                Ok(n) => buffer.extend_from_slice(&temp[..n]),
            }

            while let Some((message, consumed)) = try_parse_message(&buffer) {
                buffer.drain(..consumed);

                let Ok(message) = serde_json::from_str::<Incoming>(&message) else {
                    continue;
                };

                self.handle_message(message);
                if self.exited {
                    return;
                }
            }
        }
    }

    fn handle_message(&mut self, message: Incoming) {
        match (message.method.clone(), message.id.is_some()) {
            (Some(method), true) => self.handle_request(&method, message),
            (Some(method), false) => self.handle_notification(&method, message.params),
            (None, true) => {
                // Client answered one of our requests
                self.received.push(serde_json::json!({
                    "method": "$/response",
                    "params": {
                        "id": message.id,
                        "result": message.result,
                        "error": message.error,
                    }
                }));
            }
            (None, false) => {}
        }
    }

    fn handle_request(&mut self, method: &str, request: Incoming) {
        let Some(id) = request.id else { return };

        // hang_on: never respond
        if self.args.hang_on.iter().any(|m| m == method) {
            return;
        }

        if self.args.response_delay > 0 {
            std::thread::sleep(Duration::from_millis(self.args.response_delay));
        }

        // fail_on: return `InternalError`
        if self.args.fail_on.iter().any(|m| m == method) {
            self.send_response(&Response {
                jsonrpc: "2.0".to_string(),
                id,
                result: None,
                error: Some(RpcError {
                    code: -32603,
                    message: format!("mockjls: configured to fail on {method}"),
                }),
            });
            return;
        }

        let result = match method {
            "initialize" => Self::handle_initialize(),
            "shutdown" => Value::Null,
            "jasmin/getRequiredNamespaces" => self.handle_required_namespaces(),
            "mock/received" => Value::Array(self.received.clone()),
            _ => {
                self.send_response(&Response {
                    jsonrpc: "2.0".to_string(),
                    id,
                    result: None,
                    error: Some(RpcError {
                        code: -32601,
                        message: format!("mockjls: method not found: {method}"),
                    }),
                });
                return;
            }
        };

        self.send_response(&Response {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        });

        if method == "initialize" && self.args.send_configuration_request {
            self.send_configuration_request();
        }
    }

    fn handle_notification(&mut self, method: &str, params: Value) {
        match method {
            "initialized" if self.args.log_message => {
                send_message(
                    &self.writer,
                    &serde_json::json!({
                        "jsonrpc": "2.0",
                        "method": "window/logMessage",
                        "params": { "type": 3, "message": "mockjls: ready" }
                    }),
                );
            }
            "exit" => {
                self.exited = true;
                return;
            }
            _ => {}
        }

        self.received.push(serde_json::json!({
            "method": method,
            "params": params,
        }));
    }

    fn handle_initialize() -> Value {
        serde_json::json!({
            "capabilities": {
                "textDocumentSync": 1,
                "hoverProvider": true,
                "definitionProvider": true,
            },
            "serverInfo": {
                "name": "mockjls",
                "version": "0.1.0"
            }
        })
    }

    fn handle_required_namespaces(&self) -> Value {
        if self.args.null_required {
            return Value::Null;
        }
        serde_json::json!({ "namespaces": self.args.required })
    }

    fn send_configuration_request(&mut self) {
        let req_id = self.next_request_id;
        self.next_request_id += 1;
        send_message(
            &self.writer,
            &serde_json::json!({
                "jsonrpc": "2.0",
                "id": format!("mockjls-{req_id}"),
                "method": "workspace/configuration",
                "params": { "items": [{ "section": "jasmin" }] }
            }),
        );
    }

    fn send_response(&mut self, response: &Response) {
        let Ok(json) = serde_json::to_string(response) else {
            return;
        };

        write_framed(&self.writer, &json);

        self.response_count += 1;

        if let Some(max) = self.args.drop_after
            && self.response_count >= max
        {
            std::process::exit(1);
        }
    }
}

/// Write a Content-Length framed JSON string.
fn write_framed(writer: &Writer, json: &str) {
    let header = format!("Content-Length: {}\r\n\r\n", json.len());
    let Ok(mut w) = writer.lock() else { return };
    let _ = w.write_all(header.as_bytes());
    let _ = w.write_all(json.as_bytes());
    let _ = w.flush();
}

/// Send a JSON-RPC message to the client.
fn send_message(writer: &Writer, value: &Value) {
    let Ok(json) = serde_json::to_string(value) else {
        return;
    };
    write_framed(writer, &json);
}

/// Parse a Content-Length framed message from a buffer.
/// Returns the message string and the number of bytes consumed.
fn try_parse_message(buffer: &[u8]) -> Option<(String, usize)> {
    let header_end = buffer.windows(4).position(|w| w == b"\r\n\r\n")?;
    let headers = std::str::from_utf8(&buffer[..header_end]).ok()?;

    let mut content_length: Option<usize> = None;
    for line in headers.lines() {
        if line.to_ascii_lowercase().starts_with("content-length:") {
            content_length = line
                .split_once(':')
                .and_then(|(_, v)| v.trim().parse().ok());
        }
    }

    let content_length = content_length?;
    let total = header_end + 4 + content_length;

    if buffer.len() < total {
        return None;
    }

    let body = std::str::from_utf8(&buffer[header_end + 4..total]).ok()?;
    Some((body.to_string(), total))
}

fn main() {
    let args = Args::parse();
    let writer = stdout_writer();
    let mut server = MockServer::new(args, writer);
    let mut stdin = std::io::stdin().lock();
    server.run(&mut stdin);
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    reason = "Tests use expect/unwrap for clear failure messages"
)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn default_args() -> Args {
        Args {
            required: vec![],
            null_required: false,
            response_delay: 0,
            hang_on: vec![],
            fail_on: vec![],
            drop_after: None,
            log_message: false,
            send_configuration_request: false,
        }
    }

    fn frame(body: &Value) -> Vec<u8> {
        let body = body.to_string();
        format!("Content-Length: {}\r\n\r\n{}", body.len(), body).into_bytes()
    }

    fn request(id: u64, method: &str, params: Value) -> Vec<u8> {
        frame(&serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        }))
    }

    fn notification(method: &str, params: Value) -> Vec<u8> {
        frame(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        }))
    }

    fn run_server_with(args: Args, input: &[u8]) -> Vec<Value> {
        let (writer, buf) = buffer_writer();
        let mut server = MockServer::new(args, writer);
        let mut reader = Cursor::new(input.to_vec());
        server.run(&mut reader);
        let data = buf
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let mut messages = Vec::new();
        let mut rest = data.clone();
        while let Some((msg, consumed)) = try_parse_message(&rest) {
            if let Ok(v) = serde_json::from_str::<Value>(&msg) {
                messages.push(v);
            }
            rest.drain(..consumed);
        }
        messages
    }

    #[test]
    fn test_initialize_response_valid() {
        let input = request(1, "initialize", serde_json::json!({"capabilities": {}}));
        let messages = run_server_with(default_args(), &input);

        assert_eq!(messages[0]["id"], 1);
        assert!(messages[0]["result"]["capabilities"].is_object());
        assert_eq!(messages[0]["result"]["serverInfo"]["name"], "mockjls");
    }

    #[test]
    fn test_required_namespaces_from_flags() {
        let mut args = default_args();
        args.required = vec!["Common".to_string(), "Crypto".to_string()];

        let input = request(7, "jasmin/getRequiredNamespaces", serde_json::json!({}));
        let messages = run_server_with(args, &input);

        assert_eq!(messages[0]["id"], 7);
        assert_eq!(
            messages[0]["result"],
            serde_json::json!({"namespaces": ["Common", "Crypto"]})
        );
    }

    #[test]
    fn test_null_required_namespaces() {
        let mut args = default_args();
        args.null_required = true;

        let input = request(1, "jasmin/getRequiredNamespaces", serde_json::json!({}));
        let messages = run_server_with(args, &input);
        assert!(messages[0]["result"].is_null());
        assert!(messages[0].get("error").is_none());
    }

    #[test]
    fn test_received_notifications_are_recorded_in_order() {
        let mut input = notification(
            "jasmin/setMasterFile",
            serde_json::json!({"uri": "file:///w/main.jazz"}),
        );
        input.extend(notification(
            "jasmin/setNamespacePaths",
            serde_json::json!({"paths": []}),
        ));
        input.extend(request(2, "mock/received", Value::Null));

        let messages = run_server_with(default_args(), &input);
        let received = messages[0]["result"].as_array().expect("array result");
        assert_eq!(received.len(), 2);
        assert_eq!(received[0]["method"], "jasmin/setMasterFile");
        assert_eq!(received[0]["params"]["uri"], "file:///w/main.jazz");
        assert_eq!(received[1]["method"], "jasmin/setNamespacePaths");
    }

    #[test]
    fn test_fail_on_returns_internal_error() {
        let mut args = default_args();
        args.fail_on = vec!["jasmin/getRequiredNamespaces".to_string()];

        let input = request(3, "jasmin/getRequiredNamespaces", serde_json::json!({}));
        let messages = run_server_with(args, &input);
        assert_eq!(messages[0]["error"]["code"], -32603);
    }

    #[test]
    fn test_hang_on_never_responds() {
        let mut args = default_args();
        args.hang_on = vec!["jasmin/getRequiredNamespaces".to_string()];

        let mut input = request(1, "jasmin/getRequiredNamespaces", serde_json::json!({}));
        input.extend(request(2, "shutdown", Value::Null));
        let messages = run_server_with(args, &input);

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["id"], 2);
    }

    #[test]
    fn test_unknown_method_not_found() {
        let input = request(1, "textDocument/hover", serde_json::json!({}));
        let messages = run_server_with(default_args(), &input);
        assert_eq!(messages[0]["error"]["code"], -32601);
    }

    #[test]
    fn test_exit_stops_reading() {
        let mut input = notification("exit", Value::Null);
        input.extend(request(1, "shutdown", Value::Null));
        let messages = run_server_with(default_args(), &input);
        assert!(messages.is_empty());
    }

    #[test]
    fn test_configuration_request_follows_initialize() {
        let mut args = default_args();
        args.send_configuration_request = true;

        let input = request(1, "initialize", serde_json::json!({"capabilities": {}}));
        let messages = run_server_with(args, &input);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1]["method"], "workspace/configuration");
        assert_eq!(messages[1]["id"], "mockjls-1");
    }
}
