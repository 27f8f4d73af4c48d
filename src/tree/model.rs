//! Typed display tree produced by the decoder.
//!
//! Every tagged union on the wire becomes a closed enum here. A node whose
//! wire form carries zero or several populated variants is `Inert`: it renders
//! as nothing and contributes no highlight or bucket entries.

#![allow(missing_docs)]

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

static NAMESPACE_KIND: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^/([a-z]+)/").ok());

/// Key into the chip value map.
pub type ChipIndex = i64;
/// Selected option of a chip, an index into its labels.
pub type ChipValue = i64;

/// Opaque expression node handed back to the evaluation collaborator on click.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct NodeRef(pub Value);

/// Conjunctive equality predicate over chip values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Condition {
    pub indices: Vec<ChipIndex>,
    pub values: Vec<ChipValue>,
}

impl Condition {
    /// Condition that holds regardless of state.
    #[must_use]
    pub const fn always() -> Self {
        Self {
            indices: Vec::new(),
            values: Vec::new(),
        }
    }

    /// `{indices: [index], values: [value]}`.
    #[must_use]
    pub fn single(index: ChipIndex, value: ChipValue) -> Self {
        Self {
            indices: vec![index],
            values: vec![value],
        }
    }
}

/// Chip descriptor. The selected value lives in the state store, never here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChipDescriptor {
    pub index: ChipIndex,
    pub labels: Vec<String>,
}

/// Guarded alternatives; `branches[i]` pairs the i-th condition and atom.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Conditional {
    pub branches: Vec<(Condition, Atom)>,
}

impl Conditional {
    /// Conditions in branch order, for the resolution engine.
    #[must_use]
    pub fn conditions(&self) -> Vec<&Condition> {
        self.branches.iter().map(|(c, _)| c).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Atom {
    /// Literal text; `_token_` spans are emphasized.
    Value { text: String },
    LabelledIcon { icon: String, label: String },
    /// Handle to a downloadable payload.
    Download { handle: String },
    Chip(ChipDescriptor),
    Conditional(Conditional),
    Inert,
}

impl Atom {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Value { text: text.into() }
    }

    #[must_use]
    pub const fn is_inert(&self) -> bool {
        matches!(self, Self::Inert)
    }
}

/// An atom with an optional click expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClickableAtom {
    pub atom: Atom,
    pub click: Option<NodeRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tag {
    pub prefix: String,
    pub key: String,
    pub value: String,
    pub click: Option<NodeRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBar {
    pub range: Atom,
    pub value: i64,
    pub total: i64,
    /// Bucket index into the active bucketed entry.
    pub index: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Line {
    Value(ClickableAtom),
    LeftRightValue {
        left: Vec<ClickableAtom>,
        right: Option<ClickableAtom>,
    },
    Expression {
        expression: String,
    },
    Tags {
        tags: Vec<Tag>,
    },
    HistogramBar(HistogramBar),
    Swatch {
        label: Atom,
        index: i64,
    },
    Shell {
        functions: Vec<String>,
    },
    Choice {
        label: Atom,
        chips: Vec<ChipDescriptor>,
    },
    Header {
        title: Option<Atom>,
        close: bool,
        share: bool,
    },
    Error {
        message: String,
    },
    Action {
        atom: Atom,
        click: Option<NodeRef>,
        in_context: bool,
    },
    Comparison {
        baseline: Vec<HistogramBar>,
        scenarios: Vec<Vec<HistogramBar>>,
    },
    Inert,
}

impl Line {
    #[must_use]
    pub const fn is_inert(&self) -> bool {
        matches!(self, Self::Inert)
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Value(_) => "value",
            Self::LeftRightValue { .. } => "left_right_value",
            Self::Expression { .. } => "expression",
            Self::Tags { .. } => "tags",
            Self::HistogramBar(_) => "histogram_bar",
            Self::Swatch { .. } => "swatch",
            Self::Shell { .. } => "shell",
            Self::Choice { .. } => "choice",
            Self::Header { .. } => "header",
            Self::Error { .. } => "error",
            Self::Action { .. } => "action",
            Self::Comparison { .. } => "comparison",
            Self::Inert => "inert",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Substack {
    pub lines: Vec<Line>,
    pub collapsible: bool,
}

/// Stable identifier of a map feature.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FeatureId {
    /// Namespace path such as `/area/openstreetmap.org/way`.
    pub namespace: String,
    pub id: u64,
}

impl FeatureId {
    #[must_use]
    pub fn new(namespace: impl Into<String>, id: u64) -> Self {
        Self {
            namespace: namespace.into(),
            id,
        }
    }

    /// First namespace segment: `/area/openstreetmap.org/way` → `area`.
    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        let re = NAMESPACE_KIND.as_ref()?;
        re.captures(&self.namespace)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }
}

impl std::fmt::Display for FeatureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.id)
    }
}

/// Display tree: ordered substacks plus an optional root identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DisplayTree {
    pub id: Option<Value>,
    pub substacks: Vec<Substack>,
}

impl DisplayTree {
    /// Every line in document order.
    pub fn lines(&self) -> impl Iterator<Item = &Line> {
        self.substacks.iter().flat_map(|s| s.lines.iter())
    }

    /// Choice chips declared by the tree's choice lines.
    #[must_use]
    pub fn choice_chips(&self) -> Vec<&ChipDescriptor> {
        self.lines()
            .filter_map(|line| match line {
                Line::Choice { chips, .. } => Some(chips.iter()),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

/// One bucket of a bucketed entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Bucket {
    pub ids: Vec<FeatureId>,
    pub count: Option<u64>,
}

impl Bucket {
    /// Explicit count when present, otherwise the number of ids.
    #[must_use]
    pub fn resolved_count(&self) -> u64 {
        self.count.unwrap_or(self.ids.len() as u64)
    }
}

/// Condition-guarded list of buckets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BucketedEntry {
    pub condition: Condition,
    pub buckets: Vec<Bucket>,
}

/// Condition-guarded pointer into the geometry side table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeometryAlternative {
    pub condition: Condition,
    pub index: usize,
}

/// Vector tile layer shown while its condition holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TileLayer {
    pub path: String,
    pub q: String,
    pub v: String,
    pub before: String,
    pub condition: Condition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MapCenter {
    pub lat_e7: i64,
    pub lng_e7: i64,
}

/// A decoded evaluation response: the tree plus its side tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DisplayResponse {
    pub tree: DisplayTree,
    pub node: Option<NodeRef>,
    pub expression: Option<String>,
    pub highlighted: Vec<FeatureId>,
    pub geometry: Vec<GeometryAlternative>,
    /// GeoJSON collections referenced by `geometry[..].index`.
    pub geojson: Vec<Value>,
    pub bucketed: Vec<BucketedEntry>,
    pub layers: Vec<TileLayer>,
    pub map_center: Option<MapCenter>,
    pub locked: bool,
    /// Chip defaults: index i receives `chip_values[i]`.
    pub chip_values: Vec<ChipValue>,
    pub tiles_changed: bool,
}
