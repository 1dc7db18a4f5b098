use crate::svg_doc::{Document, Element, Node, SODIPODI_NS, SVG_NS};
use anyhow::Result;
use std::{path::Path, str::FromStr};

/// Elements whose fill is replaced by `--color`
const COLORED_SHAPES: [&str; 15] = [
    "path",
    "rect",
    "circle",
    "ellipse",
    "line",
    "polyline",
    "polygon",
    "text",
    "tspan",
    "tref",
    "textPath",
    "altGlyph",
    "altGlyphDef",
    "altGlyphItem",
    "glyphRef",
];

pub const OPACITY_GROUP_ID: &str = "png_from_svg";

/// Edits applied to the source document before it is rasterized
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformParams {
    pub color: Option<String>,
    pub opacity: Option<f64>,
}

/// Read `source`, apply `params` and write the result to `dest`. `source` is never modified.
pub fn transform_file(source: &Path, dest: &Path, params: &TransformParams) -> Result<()> {
    let mut doc = Document::open(source)?;
    apply(&mut doc, params);
    doc.save(dest)
}

/// An empty color and an opacity of 0 count as not given
pub fn apply(doc: &mut Document, params: &TransformParams) {
    if let Some(color) = params.color.as_deref().filter(|c| !c.is_empty()) {
        if css_color::Srgb::from_str(color).is_err() {
            tracing::warn!("'{color}' is not a CSS color, applying it anyway");
        }
        override_fill(&mut doc.root, color);
    }

    if let Some(opacity) = params.opacity.filter(|&o| o != 0.0) {
        wrap_in_opacity_group(&mut doc.root, opacity);
    }
}

fn override_fill(root: &mut Element, color: &str) {
    let mut recolored = 0;
    root.for_each_element_mut(&mut |element| {
        let is_shape = element.name.namespace.as_deref() == Some(SVG_NS)
            && COLORED_SHAPES.contains(&element.name.local.as_str());

        // fill="none" marks intentional cutouts
        if !is_shape || element.attr("fill") == Some("none") {
            return;
        }

        if let Some(style) = element.attr("style").and_then(strip_hex_fill) {
            if style.trim().is_empty() {
                element.remove_attr("style");
            } else {
                element.set_attr("style", style);
            }
        }
        element.set_attr("fill", color);
        recolored += 1;
    });
    tracing::debug!("Set fill {color} on {recolored} elements");
}

/// Drop `fill: #rgb` / `fill: #rrggbb` declarations from an inline style.
/// Returns `None` when there was nothing to drop.
fn strip_hex_fill(style: &str) -> Option<String> {
    let is_hex_fill = |decl: &str| match decl.split_once(':') {
        Some((property, value)) => property.trim() == "fill" && is_hex_color(value.trim()),
        None => false,
    };

    if !style.split(';').any(is_hex_fill) {
        return None;
    }

    let kept: Vec<&str> = style
        .split(';')
        .filter(|decl| !decl.trim().is_empty() && !is_hex_fill(*decl))
        .collect();
    Some(kept.join(";"))
}

fn is_hex_color(value: &str) -> bool {
    value.strip_prefix('#').map_or(false, |digits| {
        (3..=6).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_hexdigit())
    })
}

fn is_kept_at_root(element: &Element) -> bool {
    element.name.is(SVG_NS, "metadata")
        || element.name.is(SVG_NS, "defs")
        || element.name.is(SODIPODI_NS, "namedview")
}

fn wrap_in_opacity_group(root: &mut Element, opacity: f64) {
    let mut group = Element::new_like(&root.name, "g");
    group.set_attr("id", OPACITY_GROUP_ID);
    group.set_attr("opacity", opacity.to_string());

    let (kept, moved): (Vec<Node>, Vec<Node>) =
        std::mem::take(&mut root.children)
            .into_iter()
            .partition(|node| match node {
                Node::Element(element) => is_kept_at_root(element),
                Node::Text(text) => text.trim().is_empty(),
                Node::Comment(_) => false,
            });

    tracing::debug!("Moved {} nodes into the opacity group", moved.len());
    group.children = moved;
    root.children = kept;
    root.children.push(Node::Element(group));
}
