//! # Airtable Provider
//!
//! Implements the `RemoteClient` trait for the Airtable REST API.
//!
//! ## Overview
//!
//! One [`AirtableConnector`] wraps one base under one personal access token.
//! Changed-record listing uses a `filterByFormula` on last-modified time and
//! follows offset pagination; field updates go through `PATCH` so untouched
//! fields survive; table schemas come from the metadata API.
//!
//! ## Usage
//!
//! ```ignore
//! use provider_airtable::{AirtableConnector, ReqwestHttpClient};
//! use remote_traits::RemoteClient;
//! use std::sync::Arc;
//!
//! let http = Arc::new(ReqwestHttpClient::new());
//! let connector = AirtableConnector::new(http, token, base_id);
//! let changed = connector.list_changed("tblOrders", None).await?;
//! ```

pub mod connector;
pub mod http;
pub mod types;

pub use connector::AirtableConnector;
pub use http::ReqwestHttpClient;
