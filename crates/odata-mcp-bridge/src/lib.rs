//! Metadata-to-tool-catalog synthesis, naming, filtering, and dispatch.
//!
//! This crate owns the part of the system the spec calls "the bridge" (§4.3):
//! turning a [`odata_mcp_domain::catalog::MetadataCatalog`] plus a
//! [`odata_mcp_domain::config::Configuration`] into a catalog of
//! [`odata_mcp_domain::tool::ToolDescriptor`]s, and routing a tool call back
//! to the right [`odata_mcp_odata::client::ODataClient`] operation.

pub mod dispatch;
pub mod naming;
pub mod schema;
pub mod synth;

pub use synth::{build_catalog, ToolCatalog};
