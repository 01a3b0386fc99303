//! Lambda extension that answers authorization requests on loopback.
//!
//! The function handler asks `GET http://127.0.0.1:<port>/?key=<value>`
//! whether a presented API key is valid. The extension registers with the
//! Lambda Extensions API and keeps polling for events until shutdown.

pub mod client;
pub mod ipc;
pub mod runtime;

pub use client::{EventType, ExtensionClient, NextEventResponse, RegisterResponse};
pub use ipc::{router, IpcServer, IpcState};
pub use runtime::ExtensionRuntime;
