//! Plain and coloured terminal rendering of a projected stack.

#![allow(missing_docs)]

use std::fmt::Write as _;

use colored::{ColoredString, Colorize};

use crate::view::primitives::{
    Bar, HeaderAction, RenderedAtom, RenderedClickable, RenderedLine, RenderedStack,
};
use crate::view::text::Span;
use crate::view::theme::ColorMode;

#[derive(Debug, Clone, Copy)]
pub struct TextOptions {
    pub bar_width: usize,
    pub color: ColorMode,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            bar_width: 24,
            color: ColorMode::Disabled,
        }
    }
}

/// Render a stack as terminal text, one substack per block.
#[must_use]
pub fn render_text(stack: &RenderedStack, opts: &TextOptions) -> String {
    let painter = Painter { opts };
    let mut out = String::new();
    for (i, substack) in stack.substacks.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        for line in &substack.lines {
            painter.line(&mut out, line);
        }
    }
    out
}

struct Painter<'a> {
    opts: &'a TextOptions,
}

impl Painter<'_> {
    fn paint(&self, text: &str, style: fn(&str) -> ColoredString) -> String {
        if self.opts.color.enabled() {
            style(text).to_string()
        } else {
            text.to_string()
        }
    }

    fn atom(&self, atom: &RenderedAtom) -> String {
        match atom {
            RenderedAtom::Text { spans } => spans
                .iter()
                .map(|span| match span {
                    Span::Plain(t) => t.clone(),
                    Span::Emphasis(t) => self.paint(t, |s| s.bold()),
                })
                .collect(),
            RenderedAtom::Icon { glyph, label, .. } => {
                format!("{} {label}", self.paint(glyph, |s| s.blue()))
            }
            RenderedAtom::Download { handle } => self.paint(&format!("[download {handle}]"), |s| s.underline()),
            RenderedAtom::Chip { labels, selected, .. } => {
                let current = atom.plain_text();
                let marker = format!("[{current} \u{25be}]");
                if labels.len() > 1 && *selected >= 0 {
                    self.paint(&marker, |s| s.cyan())
                } else {
                    marker
                }
            }
            RenderedAtom::NotFound { .. } => self.paint(&atom.plain_text(), |s| s.yellow()),
            RenderedAtom::Nothing => String::new(),
        }
    }

    fn clickable(&self, clickable: &RenderedClickable) -> String {
        let text = self.atom(&clickable.atom);
        if clickable.click.is_some() {
            format!("{text} \u{203a}")
        } else {
            text
        }
    }

    fn bar(&self, bar: &Bar) -> String {
        let width = self.opts.bar_width;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let filled = ((bar.fraction() * width as f64).round() as usize).min(width);
        let mut fill = "\u{2588}".repeat(filled);
        if self.opts.color.enabled()
            && let Some(c) = bar.colour
        {
            fill = fill.as_str().truecolor(c.r, c.g, c.b).to_string();
        }
        let rest = "\u{00b7}".repeat(width - filled);
        let marker = if bar.selected { "\u{25cf}" } else if bar.swatch { "\u{25cb}" } else { " " };
        format!(
            "{marker} {:<12} {fill}{rest} {}/{}",
            self.atom(&bar.label),
            bar.value,
            bar.total
        )
    }

    fn line(&self, out: &mut String, line: &RenderedLine) {
        match line {
            RenderedLine::Value(c) => {
                let _ = writeln!(out, "{}", self.clickable(c));
            }
            RenderedLine::LeftRight { left, right } => {
                let left: Vec<String> = left.iter().map(|c| self.clickable(c)).collect();
                let right = right.as_ref().map(|c| self.clickable(c)).unwrap_or_default();
                let _ = writeln!(out, "{}  {right}", left.join(" "));
            }
            RenderedLine::Expression { text } => {
                let _ = writeln!(out, "{}", self.paint(text, |s| s.dimmed()));
            }
            RenderedLine::Tags { rows } => {
                for row in rows {
                    let _ = writeln!(out, "{}", row.plain_text());
                }
            }
            RenderedLine::Bar(bar) => {
                let _ = writeln!(out, "{}", self.bar(bar));
            }
            RenderedLine::Histogram { bars } => {
                for bar in bars {
                    let _ = writeln!(out, "{}", self.bar(bar));
                }
            }
            RenderedLine::Shell { functions } => {
                let _ = writeln!(out, "> ({} functions)", functions.len());
            }
            RenderedLine::Choice { label, chips } => {
                let chips: Vec<String> = chips
                    .iter()
                    .map(|chip| {
                        let current = usize::try_from(chip.selected)
                            .ok()
                            .and_then(|i| chip.labels.get(i))
                            .map_or("", String::as_str);
                        format!("[{current} \u{25be}]")
                    })
                    .collect();
                let _ = writeln!(out, "{} {}", self.atom(label), chips.join(" "));
            }
            RenderedLine::Header { title, actions } => {
                let title = title.as_ref().map(|t| self.atom(t)).unwrap_or_default();
                let actions: Vec<&str> = actions.iter().map(|a| action_glyph(*a)).collect();
                let _ = writeln!(out, "{}  {}", self.paint(&title, |s| s.bold()), actions.join(" "));
            }
            RenderedLine::Error { message } => {
                let _ = writeln!(out, "{}", self.paint(message, |s| s.red()));
            }
            RenderedLine::Action { atom, .. } => {
                let _ = writeln!(out, "{} \u{21b5}", self.atom(atom));
            }
            RenderedLine::Comparison { baseline, scenarios } => {
                let _ = writeln!(out, "baseline");
                for bar in baseline {
                    let _ = writeln!(out, "{}", self.bar(bar));
                }
                for (i, scenario) in scenarios.iter().enumerate() {
                    let _ = writeln!(out, "scenario {}", i + 1);
                    for bar in scenario {
                        let _ = writeln!(out, "{}", self.bar(bar));
                    }
                }
            }
            RenderedLine::Failed { node, message } => {
                let text = format!("\u{2716} {node}: {message}");
                let _ = writeln!(out, "{}", self.paint(&text, |s| s.red()));
            }
        }
    }
}

const fn action_glyph(action: HeaderAction) -> &'static str {
    match action {
        HeaderAction::Close => "[x]",
        HeaderAction::Share => "[share]",
        HeaderAction::Copy => "[copy]",
        HeaderAction::Target => "[target]",
        HeaderAction::ToggleVisibility => "[eye]",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::primitives::{RenderedSubstack, TagRow};

    fn stack(lines: Vec<RenderedLine>) -> RenderedStack {
        RenderedStack {
            substacks: vec![RenderedSubstack {
                lines,
                collapsible: false,
            }],
        }
    }

    #[test]
    fn header_and_tags_render_plainly() {
        let stack = stack(vec![
            RenderedLine::Header {
                title: Some(RenderedAtom::Text {
                    spans: vec![Span::Plain("Shop".into())],
                }),
                actions: vec![HeaderAction::Close],
            },
            RenderedLine::Tags {
                rows: vec![TagRow {
                    prefix: "#".into(),
                    key: "shop".into(),
                    value: "bakery".into(),
                    click: None,
                }],
            },
        ]);
        let text = render_text(&stack, &TextOptions::default());
        assert_eq!(text, "Shop  [x]\n#shop = bakery\n");
    }

    #[test]
    fn bar_width_follows_fraction() {
        let stack = stack(vec![RenderedLine::Bar(Bar {
            label: RenderedAtom::Nothing,
            index: 0,
            value: 1,
            total: 4,
            selected: false,
            swatch: false,
            colour: None,
        })]);
        let opts = TextOptions {
            bar_width: 8,
            color: ColorMode::Disabled,
        };
        let text = render_text(&stack, &opts);
        assert_eq!(text.matches('\u{2588}').count(), 2);
        assert!(text.trim_end().ends_with("1/4"));
    }

    #[test]
    fn failed_line_is_visible() {
        let stack = stack(vec![RenderedLine::Failed {
            node: "chip".into(),
            message: "no label".into(),
        }]);
        let text = render_text(&stack, &TextOptions::default());
        assert!(text.contains("chip: no label"));
    }
}
