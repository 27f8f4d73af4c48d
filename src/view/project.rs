//! View projection: resolved display tree → renderable primitives.
//!
//! Projection is pure. It reads the tree, the client state and the bucketed
//! side table, and never mutates any of them. Each line is projected in
//! isolation: an error becomes a [`RenderedLine::Failed`] entry and its
//! siblings still render.

#![allow(missing_docs)]

use crate::core::config::RenderConfig;
use crate::core::errors::{Result, SolError};
use crate::resolve::select::{bucket_count, conditional_branch};
use crate::state::store::ClientState;
use crate::tree::model::{Atom, BucketedEntry, ClickableAtom, DisplayTree, HistogramBar, Line, Substack};
use crate::view::icons::glyph_or;
use crate::view::primitives::{
    Bar, ChoiceChipView, HeaderAction, RenderedAtom, RenderedClickable, RenderedLine,
    RenderedStack, RenderedSubstack, TagRow,
};
use crate::view::text::spans;
use crate::view::theme::bucket_colour;

/// Swatch index meaning "not a bucket".
pub const NO_BUCKET: i64 = -1;

/// Inputs shared by every line of one projection pass.
#[derive(Debug, Clone, Copy)]
pub struct ProjectionContext<'a> {
    pub render: &'a RenderConfig,
    pub bucketed: &'a [BucketedEntry],
    /// Whether the response has a location the header can target.
    pub targetable: bool,
    /// Bucket this outliner shows as selected.
    pub selected_bucket: Option<i64>,
    /// Resolved sum of the substack's swatches; set per substack.
    pub swatch_total: u64,
}

/// Project a whole tree against current state.
#[must_use]
pub fn project(tree: &DisplayTree, state: &ClientState, ctx: &ProjectionContext<'_>) -> RenderedStack {
    RenderedStack {
        substacks: tree
            .substacks
            .iter()
            .map(|substack| project_substack(substack, state, ctx))
            .collect(),
    }
}

fn project_substack(substack: &Substack, state: &ClientState, ctx: &ProjectionContext<'_>) -> RenderedSubstack {
    let (header, content) = match substack.lines.split_first() {
        Some((first @ Line::Header { .. }, rest)) => (Some(first), rest),
        _ => (None, substack.lines.as_slice()),
    };

    let mut lines = Vec::with_capacity(substack.lines.len());
    if let Some(header) = header {
        lines.extend(isolated(header, state, ctx));
    }

    let visible: Vec<&Line> = content.iter().filter(|l| !l.is_inert()).collect();
    let ctx = &ProjectionContext {
        swatch_total: swatch_total(&visible, state, ctx),
        ..*ctx
    };
    match histogram_group(&visible) {
        Some(Group::Swatches) => lines.push(swatch_group(&visible, state, ctx)),
        Some(Group::Bars) => lines.push(bar_group(&visible, state, ctx)),
        None => lines.extend(visible.iter().filter_map(|line| isolated(line, state, ctx))),
    }

    RenderedSubstack {
        lines,
        collapsible: substack.collapsible,
    }
}

fn isolated(line: &Line, state: &ClientState, ctx: &ProjectionContext<'_>) -> Option<RenderedLine> {
    match project_line(line, state, ctx) {
        Ok(rendered) => rendered,
        Err(err) => Some(RenderedLine::Failed {
            node: match &err {
                SolError::Render { node, .. } => (*node).to_string(),
                _ => line.kind().to_string(),
            },
            message: err.to_string(),
        }),
    }
}

enum Group {
    Swatches,
    Bars,
}

fn histogram_group(lines: &[&Line]) -> Option<Group> {
    if lines.len() < 2 {
        return None;
    }
    if lines.iter().all(|l| matches!(l, Line::Swatch { .. })) {
        Some(Group::Swatches)
    } else if lines.iter().all(|l| matches!(l, Line::HistogramBar(_))) {
        Some(Group::Bars)
    } else {
        None
    }
}

fn bucket_swatches<'l>(lines: &[&'l Line]) -> Vec<(&'l Atom, i64)> {
    lines
        .iter()
        .copied()
        .filter_map(|line| match line {
            Line::Swatch { label, index } if *index != NO_BUCKET => Some((label, *index)),
            _ => None,
        })
        .collect()
}

fn swatch_total(lines: &[&Line], state: &ClientState, ctx: &ProjectionContext<'_>) -> u64 {
    bucket_swatches(lines)
        .iter()
        .map(|(_, index)| bucket_count(ctx.bucketed, *index, 0, state))
        .sum()
}

fn swatch_group(lines: &[&Line], state: &ClientState, ctx: &ProjectionContext<'_>) -> RenderedLine {
    let swatches = bucket_swatches(lines);
    let counts: Vec<u64> = swatches
        .iter()
        .map(|(_, index)| bucket_count(ctx.bucketed, *index, 0, state))
        .collect();
    let total = ctx.swatch_total;
    let n = swatches.len();
    let bars = swatches
        .iter()
        .zip(counts)
        .enumerate()
        .map(|(position, ((label, index), value))| Bar {
            label: label_or_failure(label, state, ctx),
            index: *index,
            value,
            total,
            selected: ctx.selected_bucket == Some(*index),
            swatch: true,
            colour: Some(bucket_colour(position, n)),
        })
        .collect();
    RenderedLine::Histogram { bars }
}

fn bar_group(lines: &[&Line], state: &ClientState, ctx: &ProjectionContext<'_>) -> RenderedLine {
    let bars: Vec<&HistogramBar> = lines
        .iter()
        .filter_map(|line| match line {
            Line::HistogramBar(bar) => Some(bar),
            _ => None,
        })
        .collect();
    let n = bars.len();
    let bars = bars
        .into_iter()
        .enumerate()
        .map(|(position, bar)| Bar {
            colour: Some(bucket_colour(position, n)),
            ..histogram_bar(bar, state, ctx, true)
        })
        .collect();
    RenderedLine::Histogram { bars }
}

/// Bar labels that fail to project render as the not-found marker.
fn label_or_failure(label: &Atom, state: &ClientState, ctx: &ProjectionContext<'_>) -> RenderedAtom {
    project_atom(label, state, ctx, 0).unwrap_or_else(|err| RenderedAtom::NotFound {
        label: err.to_string(),
    })
}

fn histogram_bar(bar: &HistogramBar, state: &ClientState, ctx: &ProjectionContext<'_>, resolve_bucket: bool) -> Bar {
    let value = if resolve_bucket {
        bucket_count(ctx.bucketed, bar.index, bar.value, state)
    } else {
        u64::try_from(bar.value).unwrap_or(0)
    };
    Bar {
        label: label_or_failure(&bar.range, state, ctx),
        index: bar.index,
        value,
        total: u64::try_from(bar.total).unwrap_or(0),
        selected: resolve_bucket && ctx.selected_bucket == Some(bar.index),
        swatch: false,
        colour: None,
    }
}

fn project_line(line: &Line, state: &ClientState, ctx: &ProjectionContext<'_>) -> Result<Option<RenderedLine>> {
    let rendered = match line {
        Line::Value(clickable) => RenderedLine::Value(project_clickable(clickable, state, ctx)?),
        Line::LeftRightValue { left, right } => RenderedLine::LeftRight {
            left: left
                .iter()
                .map(|c| project_clickable(c, state, ctx))
                .collect::<Result<_>>()?,
            right: right
                .as_ref()
                .map(|c| project_clickable(c, state, ctx))
                .transpose()?,
        },
        Line::Expression { expression } => RenderedLine::Expression {
            text: expression.clone(),
        },
        Line::Tags { tags } => RenderedLine::Tags {
            rows: tags
                .iter()
                .map(|tag| TagRow {
                    prefix: tag.prefix.clone(),
                    key: tag.key.clone(),
                    value: tag.value.clone(),
                    click: tag.click.clone(),
                })
                .collect(),
        },
        Line::HistogramBar(bar) => RenderedLine::Bar(histogram_bar(bar, state, ctx, true)),
        Line::Swatch { index, .. } if *index == NO_BUCKET => return Ok(None),
        Line::Swatch { label, index } => {
            let value = bucket_count(ctx.bucketed, *index, 0, state);
            RenderedLine::Bar(Bar {
                label: project_atom(label, state, ctx, 0)?,
                index: *index,
                value,
                total: ctx.swatch_total,
                selected: ctx.selected_bucket == Some(*index),
                swatch: true,
                colour: None,
            })
        }
        Line::Shell { functions } => RenderedLine::Shell {
            functions: functions.clone(),
        },
        Line::Choice { label, chips } => RenderedLine::Choice {
            label: project_atom(label, state, ctx, 0)?,
            chips: chips
                .iter()
                .map(|chip| ChoiceChipView {
                    index: chip.index,
                    labels: chip.labels.clone(),
                    selected: state.choice_chip(chip.index).map_or(0, |c| c.value),
                })
                .collect(),
        },
        Line::Header { title, close, share } => {
            let mut actions = Vec::new();
            if *close {
                actions.push(HeaderAction::Close);
            }
            if *share {
                actions.push(HeaderAction::Share);
            }
            actions.push(HeaderAction::Copy);
            if ctx.targetable {
                actions.push(HeaderAction::Target);
            }
            actions.push(HeaderAction::ToggleVisibility);
            RenderedLine::Header {
                title: title
                    .as_ref()
                    .map(|t| project_atom(t, state, ctx, 0))
                    .transpose()?,
                actions,
            }
        }
        Line::Error { message } => RenderedLine::Error {
            message: message.clone(),
        },
        Line::Action {
            atom,
            click,
            in_context,
        } => RenderedLine::Action {
            atom: project_atom(atom, state, ctx, 0)?,
            click: click.clone(),
            in_context: *in_context,
        },
        Line::Comparison { baseline, scenarios } => RenderedLine::Comparison {
            baseline: baseline
                .iter()
                .map(|b| histogram_bar(b, state, ctx, false))
                .collect(),
            scenarios: scenarios
                .iter()
                .map(|s| s.iter().map(|b| histogram_bar(b, state, ctx, false)).collect())
                .collect(),
        },
        Line::Inert => return Ok(None),
    };
    Ok(Some(rendered))
}

fn project_clickable(
    clickable: &ClickableAtom,
    state: &ClientState,
    ctx: &ProjectionContext<'_>,
) -> Result<RenderedClickable> {
    Ok(RenderedClickable {
        atom: project_atom(&clickable.atom, state, ctx, 0)?,
        click: clickable.click.clone(),
    })
}

/// Project one atom; `depth` counts enclosing conditionals.
pub fn project_atom(atom: &Atom, state: &ClientState, ctx: &ProjectionContext<'_>, depth: usize) -> Result<RenderedAtom> {
    if depth >= ctx.render.max_atom_depth {
        return Err(SolError::Render {
            node: "conditional",
            details: format!("atom nesting exceeds depth {}", ctx.render.max_atom_depth),
        });
    }
    let rendered = match atom {
        Atom::Value { text } => RenderedAtom::Text { spans: spans(text) },
        Atom::LabelledIcon { icon, label } => RenderedAtom::Icon {
            glyph: glyph_or(icon, &ctx.render.fallback_glyph).to_string(),
            icon: icon.clone(),
            label: label.clone(),
        },
        Atom::Download { handle } => RenderedAtom::Download {
            handle: handle.clone(),
        },
        Atom::Chip(chip) => {
            let selected = state.get_chip(chip.index);
            let in_range = usize::try_from(selected).is_ok_and(|i| i < chip.labels.len());
            if !in_range {
                return Err(SolError::Render {
                    node: "chip",
                    details: format!(
                        "chip {} value {selected} has no label among {}",
                        chip.index,
                        chip.labels.len()
                    ),
                });
            }
            RenderedAtom::Chip {
                index: chip.index,
                labels: chip.labels.clone(),
                selected,
            }
        }
        Atom::Conditional(conditional) => match conditional_branch(conditional, state) {
            Some(branch) => project_atom(branch, state, ctx, depth + 1)?,
            None => RenderedAtom::NotFound {
                label: ctx.render.not_found_label.clone(),
            },
        },
        Atom::Inert => RenderedAtom::Nothing,
    };
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::model::{Bucket, ChipDescriptor, Condition, Conditional, FeatureId, Tag};
    use crate::view::text::Span;

    fn tree(lines: Vec<Line>) -> DisplayTree {
        DisplayTree {
            id: None,
            substacks: vec![Substack {
                lines,
                collapsible: false,
            }],
        }
    }

    fn ab_conditional() -> Atom {
        Atom::Conditional(Conditional {
            branches: vec![
                (Condition::single(0, 1), Atom::text("A")),
                (Condition::single(0, 0), Atom::text("B")),
            ],
        })
    }

    fn value_line(atom: Atom) -> Line {
        Line::Value(ClickableAtom { atom, click: None })
    }

    fn only_atom(stack: &RenderedStack) -> RenderedAtom {
        match stack.lines().next() {
            Some(RenderedLine::Value(c)) => c.atom.clone(),
            other => panic!("expected value line, got {other:?}"),
        }
    }

    fn render_with(tree: &DisplayTree, state: &ClientState, bucketed: &[BucketedEntry]) -> RenderedStack {
        let render = RenderConfig::default();
        let ctx = ProjectionContext {
            render: &render,
            bucketed,
            targetable: false,
            selected_bucket: state.selected_bucket(),
            swatch_total: 0,
        };
        project(tree, state, &ctx)
    }

    #[test]
    fn conditional_renders_branch_or_warning() {
        let tree = tree(vec![value_line(ab_conditional())]);
        let mut state = ClientState::new();
        assert_eq!(only_atom(&render_with(&tree, &state, &[])).plain_text(), "B");
        state.set_chip(0, 1);
        assert_eq!(only_atom(&render_with(&tree, &state, &[])).plain_text(), "A");
        state.set_chip(0, 2);
        assert_eq!(
            only_atom(&render_with(&tree, &state, &[])),
            RenderedAtom::NotFound {
                label: "value not found".into()
            }
        );
    }

    #[test]
    fn emphasis_spans_survive_projection() {
        let tree = tree(vec![value_line(Atom::text("_7_ shops"))]);
        let atom = only_atom(&render_with(&tree, &ClientState::new(), &[]));
        assert_eq!(
            atom,
            RenderedAtom::Text {
                spans: vec![Span::Emphasis("7".into()), Span::Plain(" shops".into())]
            }
        );
    }

    #[test]
    fn unknown_icon_uses_fallback_glyph() {
        let tree = tree(vec![value_line(Atom::LabelledIcon {
            icon: "heliport".into(),
            label: "pad".into(),
        })]);
        match only_atom(&render_with(&tree, &ClientState::new(), &[])) {
            RenderedAtom::Icon { glyph, .. } => assert_eq!(glyph, RenderConfig::default().fallback_glyph),
            other => panic!("unexpected atom {other:?}"),
        }
    }

    #[test]
    fn failing_line_does_not_hide_siblings() {
        let bad_chip = Atom::Chip(ChipDescriptor {
            index: 3,
            labels: Vec::new(),
        });
        let tree = tree(vec![
            Line::Error {
                message: "before".into(),
            },
            value_line(bad_chip),
            Line::Expression {
                expression: "after".into(),
            },
        ]);
        let stack = render_with(&tree, &ClientState::new(), &[]);
        assert_eq!(stack.failed_lines(), 1);
        assert_eq!(stack.lines().count(), 3);
        assert!(matches!(stack.lines().last(), Some(RenderedLine::Expression { .. })));
    }

    #[test]
    fn nesting_beyond_depth_is_a_line_failure() {
        let mut atom = Atom::text("leaf");
        for _ in 0..20 {
            atom = Atom::Conditional(Conditional {
                branches: vec![(Condition::always(), atom)],
            });
        }
        let tree = tree(vec![value_line(atom), value_line(Atom::text("ok"))]);
        let stack = render_with(&tree, &ClientState::new(), &[]);
        match stack.lines().next() {
            Some(RenderedLine::Failed { node, .. }) => assert_eq!(node, "conditional"),
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(stack.failed_lines(), 1);
    }

    #[test]
    fn histogram_bucket_miss_renders_zero() {
        let bucketed = vec![BucketedEntry {
            condition: Condition::single(0, 0),
            buckets: vec![
                Bucket {
                    ids: vec![FeatureId::new("/area/a", 1)],
                    count: None,
                },
                Bucket {
                    ids: Vec::new(),
                    count: Some(4),
                },
            ],
        }];
        let bars = vec![
            Line::HistogramBar(HistogramBar {
                range: Atom::text("0-10"),
                value: 1,
                total: 5,
                index: 0,
            }),
            Line::HistogramBar(HistogramBar {
                range: Atom::text("10-20"),
                value: 4,
                total: 5,
                index: 1,
            }),
        ];
        let tree = tree(bars);
        let mut state = ClientState::new();
        let hit = render_with(&tree, &state, &bucketed);
        let values: Vec<u64> = hit.bars().iter().map(|b| b.value).collect();
        assert_eq!(values, vec![1, 4]);

        state.set_chip(0, 9);
        let miss = render_with(&tree, &state, &bucketed);
        assert!(miss.bars().iter().all(|b| b.value == 0 && b.total == 5));
        assert_eq!(miss.failed_lines(), 0);
    }

    #[test]
    fn swatch_group_sums_total_and_skips_no_bucket() {
        let bucketed = vec![BucketedEntry {
            condition: Condition::always(),
            buckets: vec![
                Bucket {
                    ids: Vec::new(),
                    count: Some(3),
                },
                Bucket {
                    ids: Vec::new(),
                    count: Some(1),
                },
            ],
        }];
        let swatch = |label: &str, index| Line::Swatch {
            label: Atom::text(label),
            index,
        };
        let tree = DisplayTree {
            id: None,
            substacks: vec![Substack {
                lines: vec![
                    Line::Header {
                        title: Some(Atom::text("Buckets")),
                        close: false,
                        share: false,
                    },
                    swatch("low", 0),
                    swatch("high", 1),
                    swatch("other", NO_BUCKET),
                ],
                collapsible: true,
            }],
        };
        let mut state = ClientState::new();
        state.toggle_bucket(1);
        let stack = render_with(&tree, &state, &bucketed);
        let lines: Vec<&RenderedLine> = stack.lines().collect();
        assert_eq!(lines.len(), 2);
        let RenderedLine::Histogram { bars } = lines[1] else {
            panic!("expected histogram group");
        };
        assert_eq!(bars.len(), 2);
        assert!(bars.iter().all(|b| b.total == 4 && b.swatch));
        assert!(bars[1].selected);
        assert_ne!(bars[0].colour, bars[1].colour);
    }

    #[test]
    fn ungrouped_swatches_share_substack_total() {
        let bucketed = vec![BucketedEntry {
            condition: Condition::always(),
            buckets: vec![
                Bucket {
                    ids: Vec::new(),
                    count: Some(3),
                },
                Bucket {
                    ids: Vec::new(),
                    count: Some(1),
                },
            ],
        }];
        let tree = tree(vec![
            value_line(Atom::text("legend")),
            Line::Swatch {
                label: Atom::text("low"),
                index: 0,
            },
            Line::Swatch {
                label: Atom::text("high"),
                index: 1,
            },
        ]);
        let stack = render_with(&tree, &ClientState::new(), &bucketed);
        let bars: Vec<(u64, u64)> = stack
            .lines()
            .filter_map(|line| match line {
                RenderedLine::Bar(bar) => Some((bar.value, bar.total)),
                _ => None,
            })
            .collect();
        assert_eq!(bars, vec![(3, 4), (1, 4)]);
    }

    #[test]
    fn header_actions_follow_flags() {
        let tree = tree(vec![Line::Header {
            title: Some(Atom::text("Shop")),
            close: true,
            share: false,
        }]);
        let stack = render_with(&tree, &ClientState::new(), &[]);
        let Some(RenderedLine::Header { title, actions }) = stack.lines().next() else {
            panic!("expected header");
        };
        assert_eq!(title.as_ref().map(RenderedAtom::plain_text).as_deref(), Some("Shop"));
        assert!(actions.contains(&HeaderAction::Close));
        assert!(!actions.contains(&HeaderAction::Share));
        assert!(!actions.contains(&HeaderAction::Target));
    }

    #[test]
    fn tags_and_inert_lines() {
        let tree = tree(vec![
            Line::Inert,
            Line::Tags {
                tags: vec![Tag {
                    prefix: "#".into(),
                    key: "shop".into(),
                    value: "bakery".into(),
                    click: None,
                }],
            },
        ]);
        let stack = render_with(&tree, &ClientState::new(), &[]);
        assert_eq!(stack.lines().count(), 1);
        let Some(RenderedLine::Tags { rows }) = stack.lines().next() else {
            panic!("expected tags");
        };
        assert_eq!(rows[0].plain_text(), "#shop = bakery");
    }

    #[test]
    fn choice_chips_read_choice_namespace() {
        let chip = ChipDescriptor {
            index: 0,
            labels: vec!["2020".into(), "2030".into()],
        };
        let tree = tree(vec![Line::Choice {
            label: Atom::text("year"),
            chips: vec![chip.clone()],
        }]);
        let mut state = ClientState::new();
        state.register_choice_chips([&chip]);
        state.set_choice_chip(0, 1);
        let stack = render_with(&tree, &state, &[]);
        let Some(RenderedLine::Choice { chips, .. }) = stack.lines().next() else {
            panic!("expected choice");
        };
        assert_eq!(chips[0].selected, 1);
        assert_eq!(state.get_chip(0), 0);
    }
}
