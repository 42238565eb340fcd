//! HTML launch form.
//!
//! Submitting it (GET, `stage=1`) downloads the polling envelope, which the
//! earth viewer then opens.

use crate::config::LIVE_START_DELTA;
use crate::kml::node::{to_fragment, Element};
use crate::LiveConfig;

pub const FORM_TITLE: &str = "Launch OBD GPS Live";

/// Refresh choices offered, in seconds (`-1` = never).
const UPDATE_RATES: [(i64, &str); 7] = [
    (-1, "Never"),
    (1, "1 Second"),
    (2, "2 Seconds"),
    (4, "4 Seconds"),
    (8, "8 Seconds"),
    (16, "16 Seconds"),
    (32, "32 Seconds"),
];

fn option(value: i64, label: &str, selected: bool) -> Element {
    let option = Element::new("option").attr("value", value.to_string());
    let option = if selected {
        option.attr("selected", "selected")
    } else {
        option
    };
    option.text(label)
}

fn row(label: &str, control: Element) -> Element {
    Element::new("tr")
        .child(Element::leaf("td", label))
        .child(Element::new("td").child(control))
}

fn text_input(name: &str, value: &str) -> Element {
    Element::new("input")
        .attr("type", "text")
        .attr("name", name)
        .attr("value", value)
}

/// Render the form.
///
/// `recording_start_delta` is how many seconds ago the store's first fix was
/// taken; when known, replaying from there is offered and preselected.
pub fn render_form(config: &LiveConfig, recording_start_delta: Option<i64>) -> String {
    let mut start = Element::new("select").attr("name", "startdelta").child(option(
        LIVE_START_DELTA,
        "Live Data",
        recording_start_delta.is_none(),
    ));
    if let Some(delta) = recording_start_delta {
        start.push(option(
            delta,
            &format!("Start of {}", config.db_filename),
            true,
        ));
    }

    let mut rates = Element::new("select").attr("name", "updaterate");
    for (value, label) in UPDATE_RATES {
        rates.push(option(value, label, value == config.update_rate));
    }

    let table = Element::new("table")
        .child(row(
            "Target MPG",
            text_input("targetmpg", &config.target_mpg.to_string()),
        ))
        .child(row(
            "Sample Length (Seconds)",
            text_input("samplelength", &config.sample_length.to_string()),
        ))
        .child(row("Start Time", start))
        .child(row("Update Rate", rates))
        .child(row("DB File", text_input("dbfilename", &config.db_filename)))
        .child(
            Element::new("tr").child(
                Element::new("td").child(Element::new("input").attr("type", "submit")),
            ),
        );

    let form = Element::new("form")
        .attr("method", "GET")
        .child(
            Element::new("input")
                .attr("type", "hidden")
                .attr("name", "stage")
                .attr("value", "1"),
        )
        .child(table);

    let html = Element::new("html")
        .child(Element::new("head").child(Element::leaf("title", FORM_TITLE)))
        .child(
            Element::new("body")
                .child(Element::leaf("h1", FORM_TITLE))
                .child(form),
        );

    format!("<!DOCTYPE html>\n{}", to_fragment(&html))
}
