//! Style catalog: one colour per classification.
//!
//! KML colours are `aabbggrr` hex, so green is `ff00ff00` and red is
//! `ff0000ff`. Each style applies its colour to both polygon fill (the
//! extruded wall under the line) and the line itself.

use serde::{Deserialize, Serialize};

use crate::Classification;

/// Prefix that keeps our style ids from colliding with anything else loaded
/// into the viewer.
pub const DEFAULT_STYLE_PREFIX: &str = "LiveOBDKMLStyle";

const GREEN: &str = "ff00ff00";
const RED: &str = "ff0000ff";

/// A named style with a single colour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Style {
    pub id: String,
    /// `aabbggrr`
    pub color: String,
}

/// The fixed two-entry catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleCatalog {
    above: Style,
    below: Style,
}

impl StyleCatalog {
    pub fn new(prefix: &str) -> Self {
        Self {
            above: Style {
                id: format!("{}Green", prefix),
                color: GREEN.to_string(),
            },
            below: Style {
                id: format!("{}Red", prefix),
                color: RED.to_string(),
            },
        }
    }

    pub fn style_for(&self, classification: Classification) -> &Style {
        match classification {
            Classification::AboveTarget => &self.above,
            Classification::BelowTarget => &self.below,
        }
    }

    /// Style id for a segment tag. The unclassified default segment gets an
    /// empty id.
    pub fn style_id(&self, classification: Option<Classification>) -> &str {
        classification
            .map(|c| self.style_for(c).id.as_str())
            .unwrap_or("")
    }

    /// All entries, in document order.
    pub fn styles(&self) -> [&Style; 2] {
        [&self.above, &self.below]
    }
}

impl Default for StyleCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_STYLE_PREFIX)
    }
}
