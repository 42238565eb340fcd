//! The trace document: styles, the speed gauge overlay and one
//! `Placemark`/`LineString` per segment.
//!
//! Height above ground is the vehicle speed and colour is the fuel-economy
//! classification, so the viewer shows a wall whose height tracks speed and
//! whose colour flips where economy crosses the target.

use std::fmt::Write;

use crate::kml::node::Element;
use crate::{Segment, Style, StyleCatalog, TracePoint};

pub const KML_NAMESPACE: &str = "http://www.opengis.net/kml/2.2";

pub const DOCUMENT_ID: &str = "livegpspos";

pub const DOCUMENT_NAME: &str = "Height=>speed, color=>mpg";

/// Screen overlay pointing at an auxiliary gauge image.
#[derive(Debug, Clone, PartialEq)]
pub struct GaugeOverlay {
    pub name: String,
    pub href: String,
}

impl GaugeOverlay {
    /// Vehicle speed gauge (`vss`, 0..=255) for a window ending
    /// `end_delta` seconds before now.
    pub fn vehicle_speed(gauge_url: &str, end_delta: i64) -> Self {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("startdelta", &end_delta.to_string())
            .append_pair("datacolumn", "vss")
            .append_pair("datamin", "0")
            .append_pair("datamax", "255")
            .append_pair("dataname", "Vehicle Speed")
            .finish();

        Self {
            name: "Vehicle Speed".to_string(),
            href: format!("{}?{}", gauge_url, query),
        }
    }

    fn to_element(&self) -> Element {
        Element::new("ScreenOverlay")
            .child(Element::leaf("name", self.name.as_str()))
            .child(top_left_anchor("overlayXY"))
            .child(top_left_anchor("screenXY"))
            .child(Element::new("Icon").child(Element::leaf("href", self.href.as_str())))
    }
}

fn top_left_anchor(name: &str) -> Element {
    Element::new(name)
        .attr("x", "0")
        .attr("y", "1")
        .attr("xunits", "fraction")
        .attr("yunits", "fraction")
}

/// `lon,lat,speed` per line. Points without a speed reading get no altitude.
pub fn coordinates_text(points: &[TracePoint]) -> String {
    let mut out = String::new();
    for p in points {
        match p.speed {
            Some(speed) => {
                let _ = writeln!(out, "{},{},{}", p.longitude, p.latitude, speed);
            }
            None => {
                let _ = writeln!(out, "{},{}", p.longitude, p.latitude);
            }
        }
    }
    out
}

pub fn style_element(style: &Style) -> Element {
    Element::new("Style")
        .attr("id", style.id.as_str())
        .child(Element::new("PolyStyle").child(Element::leaf("color", style.color.as_str())))
        .child(Element::new("LineStyle").child(Element::leaf("color", style.color.as_str())))
}

/// One extruded, tessellated line for a segment.
pub fn placemark(segment: &Segment, styles: &StyleCatalog) -> Element {
    let style_url = format!("#{}", styles.style_id(segment.classification));

    let line = Element::new("LineString")
        .child(Element::leaf("coordinates", coordinates_text(&segment.points)))
        .child(Element::leaf("extrude", "1"))
        .child(Element::leaf("tessellate", "1"))
        .child(Element::leaf("altitudeMode", "relativeToGround"));

    Element::new("Placemark")
        .child(Element::leaf("styleUrl", style_url))
        .child(line)
}

/// Build the full trace document.
pub fn trace_document(
    segments: &[Segment],
    styles: &StyleCatalog,
    gauge: &GaugeOverlay,
) -> Element {
    let mut document = Element::new("Document").attr("id", DOCUMENT_ID);

    for style in styles.styles() {
        document.push(style_element(style));
    }

    document.push(
        Element::new("Folder")
            .child(Element::leaf("name", "Gauges"))
            .child(gauge.to_element()),
    );

    document.push(Element::leaf("name", DOCUMENT_NAME));
    document.push(
        Element::new("Style").child(
            Element::new("ListStyle").child(Element::leaf("listItemType", "checkHideChildren")),
        ),
    );

    for segment in segments {
        document.push(placemark(segment, styles));
    }

    Element::new("kml").attr("xmlns", KML_NAMESPACE).child(document)
}
