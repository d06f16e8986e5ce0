//! Client-side WMTS tile-source configuration and addressing.
//!
//! This crate resolves a parsed capabilities document and a small
//! configuration request into a complete tile-source configuration, and
//! compiles the resulting URL templates into pure per-tile addressing
//! functions. It performs no I/O: transport, caching and rendering are
//! external collaborators.

pub mod capabilities;
pub mod dimensions;
pub mod resolver;
pub mod source;
pub mod template;

pub use capabilities::Capabilities;
pub use dimensions::DimensionSet;
pub use resolver::{options_from_capabilities, SourceConfig, SourceRequest};
pub use source::{TileAddressing, WmtsSource, WMTS_VERSION};
pub use template::{CompiledTemplate, RequestEncoding, TemplateContext};
