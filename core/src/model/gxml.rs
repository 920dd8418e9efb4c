//! `GXML` parsing: the small XML dialect carried in a `ModelData`
//! RIFF container's `GXML` chunk, naming the model and listing its
//! `LOD` variants.
//!
//! `<ModelInfo name="...">` names the model (`.gltf` suffix stripped,
//! spaces replaced with underscores); each `<LOD ModelFile="..."
//! minSize="..."/>` child names one level-of-detail variant.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::model::scene::LodDescriptor;

/// Parsed contents of a `GXML` chunk: the model's display name and its
/// LOD list, in document order.
#[derive(Debug, Clone, Default)]
pub struct ModelInfo {
    pub name: Option<String>,
    pub lods: Vec<LodDescriptor>,
}

fn sanitize_model_name(raw: &str) -> String {
    raw.strip_suffix(".gltf").unwrap_or(raw).replace(' ', "_")
}

fn attr_value(e: &quick_xml::events::BytesStart, key: &[u8]) -> Option<String> {
    e.attributes().filter_map(Result::ok).find(|a| a.key.as_ref() == key).map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

/// Parses a `GXML` chunk's text into its `ModelInfo`. Malformed or
/// unrecognized XML yields a default (empty) `ModelInfo` rather than an
/// error, since a missing model name only costs a friendlier object
/// name downstream.
#[must_use]
pub fn parse_model_info(xml: &str) -> ModelInfo {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut info = ModelInfo::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e) | Event::Empty(e)) => match e.name().as_ref() {
                b"ModelInfo" => {
                    if let Some(name) = attr_value(&e, b"name") {
                        info.name = Some(sanitize_model_name(&name));
                    }
                }
                b"LOD" => {
                    if let Some(model_file) = attr_value(&e, b"ModelFile") {
                        let min_size = attr_value(&e, b"minSize").and_then(|s| s.parse().ok()).unwrap_or(0.0);
                        info.lods.push(LodDescriptor { name: model_file, min_size });
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(_) => break,
        }
        buf.clear();
    }

    info
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_model_info_name_stripping_gltf_and_spaces() {
        let info = parse_model_info(r#"<ModelInfo name="Fence Post.gltf"></ModelInfo>"#);
        assert_eq!(info.name.as_deref(), Some("Fence_Post"));
    }

    #[test]
    fn parses_lod_list_in_document_order() {
        let xml = r#"<ModelInfo name="Barn.gltf">
            <LOD ModelFile="barn_hi.gltf" minSize="50"/>
            <LOD ModelFile="barn_lo.gltf" minSize="0"/>
        </ModelInfo>"#;
        let info = parse_model_info(xml);
        assert_eq!(info.lods.len(), 2);
        assert_eq!(info.lods[0].name, "barn_hi.gltf");
        assert!((info.lods[0].min_size - 50.0).abs() < f32::EPSILON);
        assert_eq!(info.lods[1].name, "barn_lo.gltf");
    }

    #[test]
    fn missing_model_info_yields_empty_default() {
        let info = parse_model_info("<Other/>");
        assert!(info.name.is_none());
        assert!(info.lods.is_empty());
    }
}
