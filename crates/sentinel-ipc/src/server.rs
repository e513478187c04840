//! Unix-socket JSON-RPC 2.0 server.
//!
//! Framing is one JSON object per newline-terminated line, request and
//! response alike. Each accepted connection is serviced by its own task;
//! a malformed frame or EOF terminates that connection only. The endpoint
//! is protected by filesystem permissions, not authentication.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use sentinel_core::{Result, SentinelError};

/// JSON-RPC error code: request is not valid JSON.
pub const PARSE_ERROR: i32 = -32700;

/// JSON-RPC error code: method not found.
pub const METHOD_NOT_FOUND: i32 = -32601;

/// JSON-RPC error code: handler failed.
pub const HANDLER_ERROR: i32 = -32000;

/// One RPC method implementation.
#[async_trait]
pub trait RpcHandler: Send + Sync {
    async fn handle(&self, params: Value) -> Result<Value>;
}

/// Method name -> handler, built once at agent construction.
pub type HandlerMap = HashMap<String, Box<dyn RpcHandler>>;

/// Newline-delimited JSON-RPC server on a local Unix socket.
pub struct IpcServer {
    socket_path: PathBuf,
    handlers: Arc<HandlerMap>,
}

impl IpcServer {
    pub fn new(socket_path: impl Into<PathBuf>, handlers: HandlerMap) -> Self {
        Self {
            socket_path: socket_path.into(),
            handlers: Arc::new(handlers),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Bind the socket and spawn the accept loop.
    ///
    /// Binding happens before this returns, so an unusable endpoint is a
    /// startup error. The returned handle resolves once shutdown has
    /// drained all in-flight connections and unlinked the socket.
    pub fn start(&self, shutdown: watch::Receiver<bool>) -> Result<JoinHandle<()>> {
        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SentinelError::DirectoryCreation {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        // A stale socket from a previous run would make bind fail.
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|e| SentinelError::IpcBind {
                path: self.socket_path.clone(),
                message: format!("failed to remove stale socket: {e}"),
            })?;
        }

        let listener = UnixListener::bind(&self.socket_path).map_err(|e| SentinelError::IpcBind {
            path: self.socket_path.clone(),
            message: e.to_string(),
        })?;

        info!(path = %self.socket_path.display(), "IPC server listening");

        let handlers = Arc::clone(&self.handlers);
        let socket_path = self.socket_path.clone();
        Ok(tokio::spawn(accept_loop(
            listener,
            handlers,
            shutdown,
            socket_path,
        )))
    }
}

async fn accept_loop(
    listener: UnixListener,
    handlers: Arc<HandlerMap>,
    mut shutdown: watch::Receiver<bool>,
    socket_path: PathBuf,
) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _)) => {
                        connections.spawn(handle_connection(
                            stream,
                            Arc::clone(&handlers),
                            shutdown.clone(),
                        ));
                    }
                    Err(e) => warn!(error = %e, "accept failed"),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }

        // Reap connections that have already finished.
        while connections.try_join_next().is_some() {}
    }

    // Stop accepting, then drain in-flight connections.
    drop(listener);
    while connections.join_next().await.is_some() {}

    if let Err(e) = std::fs::remove_file(&socket_path) {
        debug!(error = %e, "socket unlink on shutdown");
    }
    info!("IPC server stopped");
}

async fn handle_connection(
    stream: UnixStream,
    handlers: Arc<HandlerMap>,
    mut shutdown: watch::Receiver<bool>,
) {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = shutdown.changed() => break,
        };

        let line = match line {
            Ok(Some(line)) => line,
            // EOF or a broken stream ends this connection only.
            Ok(None) => break,
            Err(e) => {
                debug!(error = %e, "connection read failed");
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let (response, close) = process_request(&line, &handlers).await;
        let mut frame = response.to_string();
        frame.push('\n');

        if writer.write_all(frame.as_bytes()).await.is_err() {
            break;
        }
        if close {
            break;
        }
    }
}

/// Decode one request line and dispatch it. Returns the response object
/// and whether the connection must be closed afterwards.
async fn process_request(line: &str, handlers: &HandlerMap) -> (Value, bool) {
    let request: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => {
            debug!(error = %e, "malformed request frame");
            return (error_response(PARSE_ERROR, "Parse error", Value::Null), true);
        }
    };

    let id = request.get("id").cloned().unwrap_or(Value::Null);
    let method = request.get("method").and_then(Value::as_str);
    let params = request.get("params").cloned().unwrap_or_else(|| json!({}));

    let Some(handler) = method.and_then(|m| handlers.get(m)) else {
        return (
            error_response(METHOD_NOT_FOUND, "Method not found", id),
            false,
        );
    };

    match handler.handle(params).await {
        Ok(result) => (
            json!({"jsonrpc": "2.0", "result": result, "id": id}),
            false,
        ),
        Err(e) => {
            warn!(method = method.unwrap_or(""), error = %e, "handler failed");
            (error_response(HANDLER_ERROR, &e.to_string(), id), false)
        }
    }
}

fn error_response(code: i32, message: &str, id: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "error": {"code": code, "message": message},
        "id": id,
    })
}
