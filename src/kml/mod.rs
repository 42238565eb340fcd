//! KML output.
//!
//! - [`node`]: typed element tree and serializer
//! - [`document`]: the trace document (styles, gauge overlay, placemarks)
//! - [`envelope`]: the polling `NetworkLink` envelope

pub mod document;
pub mod envelope;
pub mod node;

pub use document::{trace_document, GaugeOverlay, KML_NAMESPACE};
pub use envelope::polling_envelope;
pub use node::{to_xml, Element, Node};

/// MIME type viewers expect for KML.
pub const KML_CONTENT_TYPE: &str = "application/vnd.google-earth.kml+xml";
