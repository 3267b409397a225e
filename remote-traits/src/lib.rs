//! # Remote System Capability Traits
//!
//! Abstractions over the external field/record-oriented store that basemirror
//! keeps a local mirror of.
//!
//! ## Overview
//!
//! The remote system is treated as a fallible, rate-limited, eventually
//! consistent service. This crate defines the seams the engine talks through:
//!
//! - **`RemoteClient`**: list records changed since a timestamp, update one
//!   record's fields, fetch a table's schema
//! - **`HttpClient`**: the transport abstraction provider crates implement
//!   the client on top of
//! - **`RemoteError`**: the error taxonomy, split into retryable (network,
//!   rate limit, server) and permanent (auth, validation) classes

pub mod client;
pub mod error;
pub mod http;

pub use client::{FieldMap, RemoteClient, RemoteFieldSchema, RemoteRecord};
pub use error::{RemoteError, Result};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
