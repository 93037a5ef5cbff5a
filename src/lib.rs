//! Multy provider for Hemmer
//!
//! This crate is a Hemmer provider plugin that manages cloud-agnostic
//! infrastructure through the Multy resource service. The host drives
//! resources through validate, plan, create, read, update and delete over the
//! Hemmer provider protocol; each operation is forwarded to the matching
//! `Create{Kind}` / `Read{Kind}` / `Update{Kind}` / `Delete{Kind}` call of the
//! remote service, with the API key and cloud credentials attached to every
//! call.
//!
//! # Overview
//!
//! - **[`value`] and [`enums`]**: tri-state (null, unknown, known) attribute
//!   values, including protocol-buffer enums mapped to lowercase tokens
//! - **[`schema`], [`validators`], [`planmodifiers`]**: attribute
//!   declarations that drive validation, planning and the schema the host sees
//! - **[`resource`]**: the shared lifecycle every kind runs through
//! - **[`resources`]**: the catalog of resource kinds and data sources
//! - **[`client`], [`credentials`], [`refresh`]**: calls to the remote
//!   service, per-call credential metadata and the one-time cloud refresh
//! - **[`provider`] and [`server`]**: the [`ProviderService`] implementation
//!   and the gRPC server with the handshake protocol
//!
//! # Quick Start
//!
//! ```ignore
//! use multy_provider::{init_logging, serve, MultyProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging();
//!     serve(MultyProvider::new()).await
//! }
//! ```
//!
//! # Handshake Protocol
//!
//! On start the provider prints one line to stdout:
//!
//! ```text
//! HEMMER_PROVIDER|1|127.0.0.1:50051
//! ```
//!
//! Format: `HEMMER_PROVIDER|<protocol_version>|<address>`. Everything else,
//! including logs, goes to stderr.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod context;
pub mod credentials;
pub mod enums;
pub mod error;
pub mod logging;
pub mod plan;
pub mod planmodifiers;
pub mod provider;
pub mod refresh;
pub mod resource;
pub mod resources;
pub mod schema;
pub mod server;
pub mod testing;
pub mod types;
pub mod validation;
pub mod validators;
pub mod value;

#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod generated;

pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::MultyProvider;
pub use schema::ProviderSchema;
pub use server::{serve, serve_with_options, ProviderService, ServeOptions};
pub use types::{
    AttributeChange, ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities,
    HANDSHAKE_PREFIX, PROTOCOL_VERSION,
};
pub use validation::validate;
pub use value::{AttrValue, UNKNOWN_VALUE};

pub use async_trait::async_trait;
