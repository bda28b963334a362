//! Core domain types for the OData-to-MCP bridge.
//!
//! This crate has no I/O: it defines the error taxonomy, the resolved
//! [`Configuration`], the [`catalog::MetadataCatalog`] produced by parsing
//! `$metadata`, the [`tool::ToolDescriptor`] set synthesized from it, and the
//! [`hints::HintSet`] used for per-service guidance. Everything that talks to
//! the network or the filesystem lives in sibling crates.

pub mod catalog;
pub mod config;
pub mod edm;
pub mod error;
pub mod glob;
pub mod hints;
pub mod tool;

pub use error::{Error, Result};
