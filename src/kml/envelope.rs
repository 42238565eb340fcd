//! Polling envelope: a `NetworkLink` that tells the viewer where to fetch the
//! trace document and how often to fetch it again.

use crate::kml::document::KML_NAMESPACE;
use crate::kml::node::Element;

pub const LINK_NAME: &str = "OBD GPS live updates";

/// Build the envelope. A non-positive `refresh_interval` leaves out the
/// refresh directive entirely, so the viewer fetches once.
pub fn polling_envelope(href: &str, refresh_interval: i64) -> Element {
    let mut link = Element::new("Link").child(Element::new("href").cdata(href));

    if refresh_interval > 0 {
        link.push(Element::leaf("refreshMode", "onInterval"));
        link.push(Element::leaf("refreshInterval", refresh_interval.to_string()));
    }

    Element::new("kml").attr("xmlns", KML_NAMESPACE).child(
        Element::new("NetworkLink")
            .child(Element::leaf("name", LINK_NAME))
            .child(link),
    )
}
