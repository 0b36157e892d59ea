//! MPEG-DASH manifest model.
//!
//! The manifest is kept as a generic element tree ([`document::Document`]) rather than a typed
//! schema, because the proxy rewrites it and writes it back out: every element, attribute,
//! text and comment inside the root has to survive the round trip. Whitespace between
//! elements is re-indented.

pub mod address;
pub mod document;
pub mod locator;
pub mod template;
pub mod timeline;
pub mod url;

pub use address::RepresentationAddress;
pub use document::{Attributes, Document, NodeId, NodeKind};
pub use locator::MpdLocator;
pub use template::{render_template, SegmentVars, Template};
pub use timeline::TimelineEntry;
