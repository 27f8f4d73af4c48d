//! Wire payload → typed [`DisplayResponse`].
//!
//! Decoding is infallible once the payload is JSON: a line or atom without
//! exactly one populated variant becomes `Inert` and is counted in the
//! [`DecodeReport`]. Proto3 JSON conventions apply: every field is optional,
//! 64-bit integers may arrive as strings, and missing fields take zero values.

#![allow(missing_docs)]

use serde::Serialize;
use serde_json::{Map, Value};

use crate::core::errors::{Result, SolError};
use crate::tree::model::{
    Atom, Bucket, BucketedEntry, ChipDescriptor, ClickableAtom, Condition, Conditional,
    DisplayResponse, DisplayTree, FeatureId, GeometryAlternative, HistogramBar, Line, MapCenter,
    NodeRef, Substack, Tag, TileLayer,
};

/// Hard nesting bound for atoms while decoding. Deeper atoms decode as inert.
pub const DECODE_DEPTH_LIMIT: usize = 128;

const LINE_VARIANTS: [&str; 12] = [
    "value",
    "leftRightValue",
    "expression",
    "tags",
    "histogramBar",
    "swatch",
    "shell",
    "choice",
    "header",
    "error",
    "action",
    "comparison",
];

const ATOM_VARIANTS: [&str; 5] = ["value", "labelledIcon", "download", "chip", "conditional"];

/// Counts of nodes that decoded to placeholders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DecodeReport {
    pub lines: usize,
    pub inert_lines: usize,
    pub inert_atoms: usize,
    /// Atoms dropped because they nested deeper than [`DECODE_DEPTH_LIMIT`].
    pub depth_truncated: usize,
}

impl DecodeReport {
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.inert_lines == 0 && self.inert_atoms == 0 && self.depth_truncated == 0
    }
}

/// Parse and decode a JSON payload. Only non-JSON input is an error.
pub fn parse_response(raw: &str) -> Result<(DisplayResponse, DecodeReport)> {
    let value: Value = serde_json::from_str(raw).map_err(|e| SolError::Payload {
        details: e.to_string(),
    })?;
    Ok(decode(&value))
}

/// Decode a response. Accepts either the bare response or an envelope
/// `{proto, geoJSON, bucketed}` as served to the client.
#[must_use]
pub fn decode(payload: &Value) -> (DisplayResponse, DecodeReport) {
    let mut decoder = Decoder::default();
    let response = decoder.response(payload);
    (response, decoder.report)
}

/// Decode a bare display tree (`{substacks, id}`).
#[must_use]
pub fn decode_tree(payload: &Value) -> (DisplayTree, DecodeReport) {
    let mut decoder = Decoder::default();
    let tree = decoder.tree(payload);
    (tree, decoder.report)
}

#[derive(Default)]
struct Decoder {
    report: DecodeReport,
}

impl Decoder {
    fn response(&mut self, payload: &Value) -> DisplayResponse {
        // Envelope form carries the proto plus out-of-band side tables.
        let (proto, envelope) = match payload.get("proto") {
            Some(proto) if proto.is_object() => (proto, Some(payload)),
            _ => (payload, None),
        };
        let side = |key: &str| envelope.and_then(|e| e.get(key)).or_else(|| proto.get(key));

        let geometry = array(proto.get("geoJSON"))
            .iter()
            .filter(|entry| entry.get("condition").is_some() || entry.get("index").is_some())
            .filter_map(|entry| {
                let index = uint(entry.get("index")).unwrap_or(0);
                Some(GeometryAlternative {
                    condition: condition(entry.get("condition")),
                    index: usize::try_from(index).ok()?,
                })
            })
            .collect();

        // The side table shares the `geoJSON` key on the envelope.
        let geojson = envelope
            .map(|e| array(e.get("geoJSON")).to_vec())
            .unwrap_or_default();

        DisplayResponse {
            tree: proto.get("stack").map(|s| self.tree(s)).unwrap_or_default(),
            node: node(proto.get("node")),
            expression: string_opt(proto.get("expression")),
            highlighted: feature_ids(proto.get("highlighted")),
            geometry,
            geojson,
            bucketed: array(side("bucketed")).iter().map(bucketed_entry).collect(),
            layers: array(proto.get("layers")).iter().map(tile_layer).collect(),
            map_center: proto.get("mapCenter").and_then(map_center),
            locked: boolean(proto.get("locked")),
            chip_values: array(proto.get("chipValues"))
                .iter()
                .map(|v| int(Some(v)).unwrap_or(0))
                .collect(),
            tiles_changed: boolean(proto.get("tilesChanged")),
        }
    }

    fn tree(&mut self, stack: &Value) -> DisplayTree {
        let substacks = array(stack.get("substacks"))
            .iter()
            .map(|substack| Substack {
                lines: array(substack.get("lines"))
                    .iter()
                    .map(|line| self.line(line))
                    .collect(),
                collapsible: boolean(substack.get("collapsable")),
            })
            .collect();
        DisplayTree {
            id: stack.get("id").filter(|v| !v.is_null()).cloned(),
            substacks,
        }
    }

    fn line(&mut self, line: &Value) -> Line {
        self.report.lines += 1;
        let decoded = sole_variant(line, &LINE_VARIANTS)
            .and_then(|(name, body)| Some((name, body.as_object()?)))
            .and_then(|(name, body)| self.line_variant(name, body));
        decoded.unwrap_or_else(|| {
            self.report.inert_lines += 1;
            Line::Inert
        })
    }

    fn line_variant(&mut self, name: &str, body: &Map<String, Value>) -> Option<Line> {
        let line = match name {
            "value" => Line::Value(self.clickable(body, 0)),
            "leftRightValue" => Line::LeftRightValue {
                left: array(body.get("left"))
                    .iter()
                    .filter_map(Value::as_object)
                    .map(|c| self.clickable(c, 0))
                    .collect(),
                right: body
                    .get("right")
                    .and_then(Value::as_object)
                    .map(|c| self.clickable(c, 0)),
            },
            "expression" => Line::Expression {
                expression: string(body.get("expression")),
            },
            "tags" => Line::Tags {
                tags: array(body.get("tags"))
                    .iter()
                    .map(|tag| Tag {
                        prefix: string(tag.get("prefix")),
                        key: string(tag.get("key")),
                        value: string(tag.get("value")),
                        click: node(tag.get("clickExpression")),
                    })
                    .collect(),
            },
            "histogramBar" => Line::HistogramBar(self.histogram_bar(body)),
            "swatch" => Line::Swatch {
                label: self.atom_field(body.get("label"), 0),
                index: int(body.get("index")).unwrap_or(0),
            },
            "shell" => Line::Shell {
                functions: array(body.get("functions"))
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect(),
            },
            "choice" => Line::Choice {
                label: self.atom_field(body.get("label"), 0),
                chips: array(body.get("chips"))
                    .iter()
                    .filter_map(|atom| atom.get("chip").and_then(Value::as_object))
                    .map(chip)
                    .collect(),
            },
            "header" => Line::Header {
                title: body.get("title").map(|t| self.atom(t, 0)),
                close: boolean(body.get("close")),
                share: boolean(body.get("share")),
            },
            "error" => Line::Error {
                message: string(body.get("error")),
            },
            "action" => Line::Action {
                atom: self.atom_field(body.get("atom"), 0),
                click: node(body.get("clickExpression")),
                in_context: boolean(body.get("inContext")),
            },
            "comparison" => Line::Comparison {
                baseline: self.bars(body.get("baseline")),
                scenarios: array(body.get("scenarios"))
                    .iter()
                    .map(|h| self.bars(Some(h)))
                    .collect(),
            },
            _ => return None,
        };
        Some(line)
    }

    fn bars(&mut self, histogram: Option<&Value>) -> Vec<HistogramBar> {
        array(histogram.and_then(|h| h.get("bars")))
            .iter()
            .filter_map(Value::as_object)
            .map(|bar| self.histogram_bar(bar))
            .collect()
    }

    fn histogram_bar(&mut self, body: &Map<String, Value>) -> HistogramBar {
        HistogramBar {
            range: self.atom_field(body.get("range"), 0),
            value: int(body.get("value")).unwrap_or(0),
            total: int(body.get("total")).unwrap_or(0),
            index: int(body.get("index")).unwrap_or(0),
        }
    }

    fn clickable(&mut self, body: &Map<String, Value>, depth: usize) -> ClickableAtom {
        ClickableAtom {
            atom: self.atom_field(body.get("atom"), depth),
            click: node(body.get("clickExpression")),
        }
    }

    fn atom_field(&mut self, atom: Option<&Value>, depth: usize) -> Atom {
        match atom {
            Some(atom) => self.atom(atom, depth),
            None => {
                self.report.inert_atoms += 1;
                Atom::Inert
            }
        }
    }

    fn atom(&mut self, atom: &Value, depth: usize) -> Atom {
        if depth >= DECODE_DEPTH_LIMIT {
            self.report.depth_truncated += 1;
            return Atom::Inert;
        }
        let decoded = match sole_variant(atom, &ATOM_VARIANTS) {
            Some(("value", Value::String(text))) => Some(Atom::Value { text: text.clone() }),
            Some(("download", Value::String(handle))) => Some(Atom::Download {
                handle: handle.clone(),
            }),
            Some(("labelledIcon", Value::Object(body))) => Some(Atom::LabelledIcon {
                icon: string(body.get("icon")),
                label: string(body.get("label")),
            }),
            Some(("chip", Value::Object(body))) => Some(Atom::Chip(chip(body))),
            Some(("conditional", Value::Object(body))) => {
                let conditions = array(body.get("conditions"));
                let atoms = array(body.get("atoms"));
                let branches = conditions
                    .iter()
                    .zip(atoms)
                    .map(|(c, a)| (condition(Some(c)), self.atom(a, depth + 1)))
                    .collect();
                Some(Atom::Conditional(Conditional { branches }))
            }
            _ => None,
        };
        decoded.unwrap_or_else(|| {
            self.report.inert_atoms += 1;
            Atom::Inert
        })
    }
}

/// The single populated variant of a tagged union, or `None` when there are
/// zero or several.
fn sole_variant<'a>(node: &'a Value, variants: &[&'static str]) -> Option<(&'static str, &'a Value)> {
    let object = node.as_object()?;
    let mut found = None;
    for name in variants {
        match object.get(*name) {
            None | Some(Value::Null) => {}
            Some(body) => {
                if found.is_some() {
                    return None;
                }
                found = Some((*name, body));
            }
        }
    }
    found
}

fn chip(body: &Map<String, Value>) -> ChipDescriptor {
    ChipDescriptor {
        index: int(body.get("index")).unwrap_or(0),
        labels: array(body.get("labels"))
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
    }
}

fn condition(value: Option<&Value>) -> Condition {
    let Some(value) = value else {
        return Condition::always();
    };
    let ints = |key: &str| -> Vec<i64> {
        array(value.get(key)).iter().map(|v| int(Some(v)).unwrap_or(0)).collect()
    };
    Condition {
        indices: ints("indices"),
        values: ints("values"),
    }
}

fn feature_ids(value: Option<&Value>) -> Vec<FeatureId> {
    let Some(value) = value else {
        return Vec::new();
    };
    let namespaces = array(value.get("namespaces"));
    let groups = array(value.get("ids"));
    namespaces
        .iter()
        .zip(groups)
        .filter_map(|(ns, group)| Some((ns.as_str()?, group)))
        .flat_map(|(ns, group)| {
            array(group.get("ids"))
                .iter()
                .filter_map(|id| uint(Some(id)))
                .map(move |id| FeatureId::new(ns, id))
        })
        .collect()
}

fn bucketed_entry(value: &Value) -> BucketedEntry {
    BucketedEntry {
        condition: condition(value.get("condition")),
        buckets: array(value.get("buckets"))
            .iter()
            .map(|bucket| Bucket {
                ids: feature_ids(Some(bucket)),
                count: uint(bucket.get("count")),
            })
            .collect(),
    }
}

fn tile_layer(value: &Value) -> TileLayer {
    TileLayer {
        path: string(value.get("path")),
        q: string(value.get("q")),
        v: string(value.get("v")),
        before: match value.get("before") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        },
        condition: condition(value.get("condition")),
    }
}

fn map_center(value: &Value) -> Option<MapCenter> {
    Some(MapCenter {
        lat_e7: int(value.get("latE7"))?,
        lng_e7: int(value.get("lngE7"))?,
    })
}

fn node(value: Option<&Value>) -> Option<NodeRef> {
    value
        .filter(|v| v.as_object().is_some_and(|o| !o.is_empty()))
        .cloned()
        .map(NodeRef)
}

// ──────────────────── scalar helpers ────────────────────

fn array(value: Option<&Value>) -> &[Value] {
    value.and_then(Value::as_array).map_or(&[], Vec::as_slice)
}

fn string(value: Option<&Value>) -> String {
    string_opt(value).unwrap_or_default()
}

fn string_opt(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_string)
}

fn boolean(value: Option<&Value>) -> bool {
    value.and_then(Value::as_bool).unwrap_or(false)
}

fn int(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn uint(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
