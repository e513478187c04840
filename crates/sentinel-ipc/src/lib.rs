//! # sentinel-ipc
//!
//! The Sentinel local control channel: a Unix-socket server speaking
//! newline-delimited JSON-RPC 2.0, with a handler table built by the
//! agent at construction time.

pub mod server;

pub use server::{HandlerMap, IpcServer, RpcHandler};
