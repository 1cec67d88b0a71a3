//! Tracker exports laid out as `<root><trackgroup><track><detection t= x= y=/>`.

use std::path::Path;

use roxmltree::{Document, Node};

use super::read_input;
use crate::error::ValidationError;
use crate::types::{Detection, DetectionTable};

pub fn load_detections(path: &Path) -> Result<DetectionTable, ValidationError> {
    let data = read_input(path, "track XML")?;
    let table = parse_detections(&data)?;
    tracing::debug!(
        path = %path.display(),
        detections = table.len(),
        "ingest: loaded track XML"
    );
    Ok(table)
}

/// Any detection lacking `t`, `x` or `y` fails the whole document; a
/// trajectory cannot be rebuilt from part of its detections.
pub fn parse_detections(data: &str) -> Result<DetectionTable, ValidationError> {
    let document = Document::parse(data).map_err(|e| ValidationError::xml("parsing track XML", e))?;
    let root = document.root_element();

    let trackgroups: Vec<Node> = if root.has_tag_name("trackgroup") {
        vec![root]
    } else {
        children_named(root, "trackgroup").collect()
    };

    let mut detections = Vec::new();
    let mut track_idx = 0usize;
    for group in trackgroups {
        for track in children_named(group, "track") {
            for detection in children_named(track, "detection") {
                detections.push(Detection {
                    track: track_idx,
                    t: float_attribute(detection, "t")?,
                    x: float_attribute(detection, "x")?,
                    y: float_attribute(detection, "y")?,
                });
            }
            track_idx += 1;
        }
    }
    Ok(DetectionTable { detections })
}

fn children_named<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(move |child| child.is_element() && child.has_tag_name(name))
}

fn float_attribute(node: Node, name: &str) -> Result<f64, ValidationError> {
    let position = node.document().text_pos_at(node.range().start);
    let raw = node.attribute(name).ok_or_else(|| {
        ValidationError::schema(
            "track XML",
            format!("detection at {position} is missing attribute '{name}'"),
        )
    })?;
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ValidationError::schema(
            "track XML",
            format!("detection at {position}: attribute '{name}'='{raw}' is not a finite number"),
        )),
    }
}
