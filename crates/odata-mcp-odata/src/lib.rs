//! CSDL metadata parsing and the OData HTTP client.

pub mod client;
pub mod metadata;

pub use client::ODataClient;
pub use metadata::parse as parse_metadata;
