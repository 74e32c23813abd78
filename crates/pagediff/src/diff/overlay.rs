use std::io::Cursor;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;

use crate::error::DiffError;

const SVG_NS: &str = "http://www.w3.org/2000/svg";
const MARKER_STYLE: &str = "fill:none;stroke:currentColor;stroke-width:3";

/// Builds an SVG overlay sized to the raster with one hollow circle per
/// marker centre.
pub fn build_overlay_svg(
    width: u32,
    height: u32,
    markers: &[(f64, f64)],
    radius: u32,
) -> Result<String, DiffError> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    let width = width.to_string();
    let height = height.to_string();
    let view_box = format!("0 0 {} {}", width, height);
    let radius = radius.to_string();

    write(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
    )?;
    write(
        &mut writer,
        Event::Start(BytesStart::new("svg").with_attributes([
            ("xmlns", SVG_NS),
            ("width", width.as_str()),
            ("height", height.as_str()),
            ("viewBox", view_box.as_str()),
        ])),
    )?;

    for (cx, cy) in markers {
        let cx = format!("{:.2}", cx);
        let cy = format!("{:.2}", cy);
        write(
            &mut writer,
            Event::Empty(BytesStart::new("circle").with_attributes([
                ("cx", cx.as_str()),
                ("cy", cy.as_str()),
                ("r", radius.as_str()),
                ("style", MARKER_STYLE),
            ])),
        )?;
    }

    write(&mut writer, Event::End(BytesEnd::new("svg")))?;

    String::from_utf8(writer.into_inner().into_inner())
        .map_err(|e| DiffError::Overlay(e.to_string()))
}

fn write(writer: &mut Writer<Cursor<Vec<u8>>>, event: Event<'_>) -> Result<(), DiffError> {
    writer
        .write_event(event)
        .map_err(|e| DiffError::Overlay(e.to_string()))
}
