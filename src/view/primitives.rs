//! Renderable primitives produced by projection.

#![allow(missing_docs)]

use serde::Serialize;

use crate::tree::model::{ChipIndex, ChipValue, NodeRef};
use crate::view::text::{Span, plain};
use crate::view::theme::Rgb;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderedAtom {
    Text { spans: Vec<Span> },
    Icon { glyph: String, icon: String, label: String },
    Download { handle: String },
    Chip {
        index: ChipIndex,
        labels: Vec<String>,
        selected: ChipValue,
    },
    /// Conditional atom without a matching branch.
    NotFound { label: String },
    Nothing,
}

impl RenderedAtom {
    /// Plain text form, used for terminal output and assertions.
    #[must_use]
    pub fn plain_text(&self) -> String {
        match self {
            Self::Text { spans } => plain(spans),
            Self::Icon { glyph, label, .. } => format!("{glyph} {label}"),
            Self::Download { handle } => format!("download {handle}"),
            Self::Chip {
                labels, selected, ..
            } => usize::try_from(*selected)
                .ok()
                .and_then(|i| labels.get(i))
                .cloned()
                .unwrap_or_default(),
            Self::NotFound { label } => format!("\u{26a0} {label}"),
            Self::Nothing => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedClickable {
    pub atom: RenderedAtom,
    pub click: Option<NodeRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagRow {
    pub prefix: String,
    pub key: String,
    pub value: String,
    pub click: Option<NodeRef>,
}

impl TagRow {
    /// `#shop = bakery`.
    #[must_use]
    pub fn plain_text(&self) -> String {
        format!("{}{} = {}", self.prefix, self.key, self.value)
    }
}

/// One histogram bar or swatch after bucket resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub label: RenderedAtom,
    pub index: i64,
    pub value: u64,
    pub total: u64,
    pub selected: bool,
    /// Swatches route clicks to the bucket toggle.
    pub swatch: bool,
    pub colour: Option<Rgb>,
}

impl Bar {
    /// `value / total` clamped to `[0, 1]`; 0 when the total is 0.
    #[must_use]
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let fraction = self.value as f64 / self.total as f64;
        fraction.clamp(0.0, 1.0)
    }
}

/// User-triggered header actions delegated to the owning outliner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderAction {
    Close,
    Share,
    Copy,
    Target,
    ToggleVisibility,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChoiceChipView {
    pub index: ChipIndex,
    pub labels: Vec<String>,
    pub selected: ChipValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderedLine {
    Value(RenderedClickable),
    LeftRight {
        left: Vec<RenderedClickable>,
        right: Option<RenderedClickable>,
    },
    Expression {
        text: String,
    },
    Tags {
        rows: Vec<TagRow>,
    },
    Bar(Bar),
    /// Consecutive swatches or histogram bars of one substack.
    Histogram {
        bars: Vec<Bar>,
    },
    Shell {
        functions: Vec<String>,
    },
    Choice {
        label: RenderedAtom,
        chips: Vec<ChoiceChipView>,
    },
    Header {
        title: Option<RenderedAtom>,
        actions: Vec<HeaderAction>,
    },
    Error {
        message: String,
    },
    Action {
        atom: RenderedAtom,
        click: Option<NodeRef>,
        in_context: bool,
    },
    Comparison {
        baseline: Vec<Bar>,
        scenarios: Vec<Vec<Bar>>,
    },
    /// A line whose projection failed; siblings are unaffected.
    Failed {
        node: String,
        message: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderedSubstack {
    pub lines: Vec<RenderedLine>,
    pub collapsible: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderedStack {
    pub substacks: Vec<RenderedSubstack>,
}

impl RenderedStack {
    pub fn lines(&self) -> impl Iterator<Item = &RenderedLine> {
        self.substacks.iter().flat_map(|s| s.lines.iter())
    }

    #[must_use]
    pub fn failed_lines(&self) -> usize {
        self.lines()
            .filter(|l| matches!(l, RenderedLine::Failed { .. }))
            .count()
    }

    /// Every rendered bar, grouped or not, in document order.
    #[must_use]
    pub fn bars(&self) -> Vec<&Bar> {
        self.lines()
            .flat_map(|line| match line {
                RenderedLine::Bar(bar) => vec![bar],
                RenderedLine::Histogram { bars } => bars.iter().collect(),
                _ => Vec::new(),
            })
            .collect()
    }
}
