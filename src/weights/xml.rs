use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use xmltree::{Element, EmitterConfig, XMLNode};

use super::model::{PointMap, WeightBlock, WeightFile};
use crate::error::{Result, WeightError};

const WEIGHTS_TAG: &str = "weights";
const POINT_TAG: &str = "point";

/// Parse a weight file from disk.
pub fn read_weight_file(path: &Path) -> Result<WeightFile> {
    let origin = path.display().to_string();
    let file = File::open(path).map_err(|source| WeightError::io(path, source))?;
    let root = Element::parse(BufReader::new(file))
        .map_err(|err| WeightError::format(&origin, err.to_string()))?;
    from_root(root, &origin)
}

/// Parse a weight file held in memory.
pub fn parse_weight_str(xml: &str) -> Result<WeightFile> {
    let root =
        Element::parse(xml.as_bytes()).map_err(|err| WeightError::format("<memory>", err.to_string()))?;
    from_root(root, "<memory>")
}

/// Write `file` to `path` and return the path written.
///
/// Blocks are emitted in ascending layer order and renumbered from zero;
/// `size` and `max` are recomputed from the points.
pub fn write_weight_file(file: &WeightFile, path: &Path) -> Result<PathBuf> {
    let handle = File::create(path).map_err(|source| WeightError::io(path, source))?;
    let mut writer = BufWriter::new(handle);
    to_element(file)
        .write_with_config(&mut writer, emitter_config())
        .map_err(|err| WeightError::io(path, std::io::Error::other(err.to_string())))?;
    writer
        .flush()
        .map_err(|source| WeightError::io(path, source))?;
    Ok(path.to_path_buf())
}

pub fn to_xml_string(file: &WeightFile) -> Result<String> {
    let mut buffer = Vec::new();
    to_element(file)
        .write_with_config(&mut buffer, emitter_config())
        .map_err(|err| WeightError::format("<memory>", err.to_string()))?;
    String::from_utf8(buffer).map_err(|err| WeightError::format("<memory>", err.to_string()))
}

fn emitter_config() -> EmitterConfig {
    EmitterConfig::new()
        .perform_indent(true)
        .write_document_declaration(true)
}

fn from_root(mut root: Element, origin: &str) -> Result<WeightFile> {
    let deformer_name = find_attribute(&root, "deformer")
        .ok_or_else(|| WeightError::format(origin, "no element carries a deformer attribute"))?
        .to_string();
    let shape_name = find_attribute(&root, "shape")
        .ok_or_else(|| WeightError::format(origin, "no element carries a shape attribute"))?
        .to_string();

    let mut blocks = Vec::new();
    let mut kept = Vec::with_capacity(root.children.len());
    for node in root.children.drain(..) {
        match node {
            XMLNode::Element(element) if element.name == WEIGHTS_TAG => {
                let block = parse_block(&element, blocks.len(), &deformer_name, &shape_name)
                    .map_err(|reason| WeightError::format(origin, reason))?;
                blocks.push(block);
            }
            XMLNode::Element(element) => kept.push(XMLNode::Element(element)),
            _ => {}
        }
    }
    root.children = kept;

    Ok(WeightFile {
        deformer_name,
        shape_name,
        blocks,
        envelope: root,
    })
}

/// Depth-first search for the first descendant carrying `name`.
fn find_attribute<'a>(element: &'a Element, name: &str) -> Option<&'a str> {
    element.children.iter().find_map(|node| match node {
        XMLNode::Element(child) => child
            .attributes
            .get(name)
            .map(String::as_str)
            .or_else(|| find_attribute(child, name)),
        _ => None,
    })
}

fn parse_block(
    element: &Element,
    position: usize,
    deformer_name: &str,
    shape_name: &str,
) -> std::result::Result<WeightBlock, String> {
    let attr = |name: &str| element.attributes.get(name).map(|value| value.trim());

    let source_joint = attr("source")
        .filter(|joint| !joint.is_empty())
        .ok_or_else(|| format!("weights block #{position} has no source joint"))?
        .to_string();

    let mut points = PointMap::new();
    for child in &element.children {
        let XMLNode::Element(point) = child else {
            continue;
        };
        if point.name != POINT_TAG {
            continue;
        }
        let index = point
            .attributes
            .get("index")
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .ok_or_else(|| format!("point in block {source_joint} has an invalid index"))?;
        let value = point
            .attributes
            .get("value")
            .and_then(|raw| raw.trim().parse::<f64>().ok())
            .ok_or_else(|| format!("point {index} in block {source_joint} has an invalid value"))?;
        points.insert(index, value);
    }

    // Derived metadata is read leniently; it is recomputed before any write.
    let size = attr("size")
        .and_then(|raw| raw.parse::<usize>().ok())
        .unwrap_or(points.len());

    Ok(WeightBlock {
        deformer_name: attr("deformer").unwrap_or(deformer_name).to_string(),
        shape_name: attr("shape").unwrap_or(shape_name).to_string(),
        layer: attr("layer")
            .and_then(|raw| raw.parse::<usize>().ok())
            .unwrap_or(position),
        max_index: attr("max")
            .and_then(|raw| raw.parse::<u32>().ok())
            .unwrap_or(0),
        size,
        default_value: attr("defaultValue")
            .and_then(|raw| raw.parse::<f64>().ok())
            .unwrap_or(0.0),
        source_joint,
        points,
    })
}

fn to_element(file: &WeightFile) -> Element {
    let mut file = file.clone();
    file.refresh_derived();

    let mut root = file.envelope;
    for block in &file.blocks {
        root.children.push(XMLNode::Element(block_element(block)));
    }
    root
}

fn block_element(block: &WeightBlock) -> Element {
    let mut element = Element::new(WEIGHTS_TAG);
    let attributes = [
        ("deformer", block.deformer_name.clone()),
        ("source", block.source_joint.clone()),
        ("shape", block.shape_name.clone()),
        ("layer", block.layer.to_string()),
        ("defaultValue", block.default_value.to_string()),
        ("size", block.size.to_string()),
        ("max", block.max_index.to_string()),
    ];
    for (name, value) in attributes {
        element.attributes.insert(name.to_string(), value);
    }

    for (index, value) in &block.points {
        let mut point = Element::new(POINT_TAG);
        point
            .attributes
            .insert("index".to_string(), index.to_string());
        point
            .attributes
            .insert("value".to_string(), value.to_string());
        element.children.push(XMLNode::Element(point));
    }
    element
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<deformerWeight>
  <headerInfo fileName="body.xml" worldMatrix="1 0 0 0 0 1 0 0 0 0 1 0 0 0 0 1 "/>
  <shape name="bodyShape" group="576" stride="3" size="12" max="12"/>
  <weights deformer="skinCluster1" source="hip" shape="bodyShape" layer="3" defaultValue="0.000" size="9" max="4">
    <point index="10" value="0.250"/>
    <point index="2" value="0.750"/>
  </weights>
  <weights deformer="skinCluster1" source="knee" shape="bodyShape" layer="1" defaultValue="0.000" size="1" max="4">
    <point index="3" value="1.000"/>
  </weights>
</deformerWeight>
"#;

    #[test]
    fn given_sample_file_when_parsing_then_identity_and_points_are_read() {
        let file = parse_weight_str(SAMPLE).unwrap();

        assert_eq!(file.deformer_name, "skinCluster1");
        assert_eq!(file.shape_name, "bodyShape");
        assert_eq!(file.joints(), vec!["hip".to_string(), "knee".to_string()]);
        let hip = file.block("hip").unwrap();
        assert_eq!(hip.points.keys().copied().collect::<Vec<_>>(), vec![2, 10]);
        assert_eq!(hip.points[&2], 0.75);
    }

    #[test]
    fn given_parsed_file_when_serializing_then_derived_fields_are_recomputed() {
        let file = parse_weight_str(SAMPLE).unwrap();
        let xml = to_xml_string(&file).unwrap();
        let reparsed = parse_weight_str(&xml).unwrap();

        assert_eq!(reparsed.joints(), vec!["knee".to_string(), "hip".to_string()]);
        for (layer, block) in reparsed.blocks.iter().enumerate() {
            assert_eq!(block.layer, layer);
            assert_eq!(block.size, block.points.len());
            assert_eq!(block.max_index, 10);
        }
        assert_eq!(reparsed.block("hip").unwrap().points, file.block("hip").unwrap().points);
        assert_eq!(reparsed.block("knee").unwrap().points, file.block("knee").unwrap().points);
    }

    #[test]
    fn given_multi_digit_indices_when_serializing_then_points_are_in_numeric_order() {
        let file = parse_weight_str(SAMPLE).unwrap();
        let xml = to_xml_string(&file).unwrap();

        let two = xml.find(r#"index="2""#).unwrap();
        let ten = xml.find(r#"index="10""#).unwrap();
        assert!(two < ten);
    }

    #[test]
    fn given_header_elements_when_round_tripping_then_they_are_preserved() {
        let file = parse_weight_str(SAMPLE).unwrap();
        let xml = to_xml_string(&file).unwrap();

        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<headerInfo"));
        assert!(xml.contains(r#"group="576""#));
    }

    #[test]
    fn given_file_without_deformer_anchor_when_parsing_then_format_error_is_returned() {
        let xml = r#"<deformerWeight><weights source="hip" shape="bodyShape"/></deformerWeight>"#;

        let err = parse_weight_str(xml).unwrap_err();
        assert!(matches!(err, WeightError::Format { .. }));
    }

    #[test]
    fn given_broken_markup_when_parsing_then_format_error_is_returned() {
        let err = parse_weight_str("<deformerWeight><weights").unwrap_err();
        assert!(matches!(err, WeightError::Format { .. }));
    }

    #[test]
    fn given_non_numeric_index_when_parsing_then_format_error_is_returned() {
        let xml = r#"<deformerWeight>
  <weights deformer="skinCluster1" source="hip" shape="bodyShape"><point index="two" value="1"/></weights>
</deformerWeight>"#;

        let err = parse_weight_str(xml).unwrap_err();
        assert!(matches!(err, WeightError::Format { .. }));
    }

    #[test]
    fn given_written_file_when_reading_back_then_blocks_match() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("body.xml");
        let file = parse_weight_str(SAMPLE).unwrap();

        let written = write_weight_file(&file, &path).unwrap();
        let reread = read_weight_file(&written).unwrap();

        assert_eq!(written, path);
        assert_eq!(reread.block("hip").unwrap().points, file.block("hip").unwrap().points);
    }

    #[test]
    fn given_missing_directory_when_writing_then_io_error_is_returned() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("body.xml");
        let file = parse_weight_str(SAMPLE).unwrap();

        let err = write_weight_file(&file, &path).unwrap_err();
        assert!(matches!(err, WeightError::Io { .. }));
    }
}
