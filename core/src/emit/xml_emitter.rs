//! `XmlModelEmitter`: the dual-format selector XML written alongside a
//! tile's `.gltf` and `.ac` when both were produced, switching between
//! them by FlightGear version at runtime.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::Result;

const FLIGHTGEAR_VERSION_GATE: &str = "2024.2.0";

fn write_rotate(writer: &mut Writer<&mut Vec<u8>>, object_name: &str, axis: (&str, &str, &str), angle_deg: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("animation")))?;
    write_text_element(writer, "type", "rotate")?;
    write_text_element(writer, "object-name", object_name)?;

    writer.write_event(Event::Start(BytesStart::new("axis")))?;
    write_text_element(writer, "x", axis.0)?;
    write_text_element(writer, "y", axis.1)?;
    write_text_element(writer, "z", axis.2)?;
    writer.write_event(Event::End(BytesEnd::new("axis")))?;

    write_text_element(writer, "angle-deg", angle_deg)?;
    writer.write_event(Event::End(BytesEnd::new("animation")))?;
    Ok(())
}

fn write_select(writer: &mut Writer<&mut Vec<u8>>, object_name: &str, negate: bool) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("animation")))?;
    write_text_element(writer, "type", "select")?;
    write_text_element(writer, "object-name", object_name)?;

    writer.write_event(Event::Start(BytesStart::new("condition")))?;
    if negate {
        writer.write_event(Event::Start(BytesStart::new("not")))?;
    }
    writer.write_event(Event::Start(BytesStart::new("equals")))?;
    write_text_element(writer, "property", "/sim/version/flightgear")?;
    write_text_element(writer, "value", FLIGHTGEAR_VERSION_GATE)?;
    writer.write_event(Event::End(BytesEnd::new("equals")))?;
    if negate {
        writer.write_event(Event::End(BytesEnd::new("not")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("condition")))?;

    writer.write_event(Event::End(BytesEnd::new("animation")))?;
    Ok(())
}

fn write_text_element(writer: &mut Writer<&mut Vec<u8>>, name: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn write_model(writer: &mut Writer<&mut Vec<u8>>, path: &str, name: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("model")))?;
    write_text_element(writer, "path", path)?;
    write_text_element(writer, "name", name)?;
    writer.write_event(Event::End(BytesEnd::new("model")))?;
    Ok(())
}

/// Builds the selector `.xml` referencing `gltf_file` and `ac_file`
/// (bare filenames, resolved relative to the tile directory): two
/// `<model>` entries, three rotate animations, and two version-gated
/// select animations.
///
/// # Errors
/// Propagates XML writer I/O failures (writes into an in-memory
/// buffer, so these are effectively infallible in practice).
pub fn selector_xml(gltf_file: &str, ac_file: &str) -> Result<String> {
    let mut buf = Vec::new();
    let mut writer = Writer::new_with_indent(&mut buf, b' ', 2);

    writer.write_event(Event::Start(BytesStart::new("PropertyList")))?;
    write_text_element(&mut writer, "path", ac_file)?;
    write_model(&mut writer, ac_file, "ac")?;
    write_model(&mut writer, gltf_file, "gltf")?;

    write_rotate(&mut writer, "ac", ("0", "0", "1"), "90")?;
    write_rotate(&mut writer, "gltf", ("0", "0", "1"), "270")?;
    write_rotate(&mut writer, "gltf", ("1", "0", "0"), "90")?;

    write_select(&mut writer, "gltf", false)?;
    write_select(&mut writer, "ac", true)?;

    writer.write_event(Event::End(BytesEnd::new("PropertyList")))?;

    let mut xml = String::from_utf8(buf).map_err(|e| crate::error::Error::MalformedHeader(e.to_string()))?;
    xml.insert_str(0, "<?xml version=\"1.0\"?>\n");
    xml.push('\n');
    Ok(xml)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn references_both_artifacts() {
        let xml = selector_xml("123.gltf", "123.ac").unwrap();
        assert!(xml.contains("123.gltf"));
        assert!(xml.contains("123.ac"));
    }

    #[test]
    fn has_three_rotate_and_two_select_animations() {
        let xml = selector_xml("a.gltf", "a.ac").unwrap();
        assert_eq!(xml.matches("<type>rotate</type>").count(), 3);
        assert_eq!(xml.matches("<type>select</type>").count(), 2);
    }

    #[test]
    fn gates_on_flightgear_version() {
        let xml = selector_xml("a.gltf", "a.ac").unwrap();
        assert_eq!(xml.matches(FLIGHTGEAR_VERSION_GATE).count(), 2);
    }

    #[test]
    fn second_select_negates_the_condition() {
        let xml = selector_xml("a.gltf", "a.ac").unwrap();
        assert_eq!(xml.matches("<not>").count(), 1);
    }
}
