//! Structured Markdown documents with deferred links
//!
//! A document is a list of lines, each made of text fragments and link slots.
//! Link slots point into the document's [`LinkReference`] list and are only
//! turned into Markdown once the link resolver has decided where they lead.

use crate::model::{NodeId, Style};

/// Marker appended to the display text of a link whose target has no file
pub const BROKEN_LINK_MARKER: &str = " [broken link]";

/// Resolution state of a link reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    /// Not resolved yet
    Pending,

    /// Relative path from the referencing document to the target file
    Resolved(String),

    /// The target has no output file
    Broken,
}

/// Reference to another node, rendered after path assignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkReference {
    pub target: NodeId,

    /// Raw display text; empty means "use the target's title"
    pub text: String,
    pub style: Style,
    pub state: LinkState,

    /// Sits inside a table cell, so the label needs pipes escaped
    pub table_cell: bool,
}

impl LinkReference {
    pub fn new(target: impl Into<NodeId>, text: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            text: text.into(),
            style: Style::default(),
            state: LinkState::Pending,
            table_cell: false,
        }
    }

    pub fn styled(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    /// Renders the reference in its current state
    pub fn render(&self) -> String {
        let text = if self.table_cell {
            escape_cell(&self.text)
        } else {
            self.text.replace('\n', " ")
        };

        match &self.state {
            LinkState::Resolved(path) => {
                let label = wrap_style(&escape_label(&text), self.style);
                format!("[{}]({})", label, path)
            }
            LinkState::Broken => format!("{}{}", wrap_style(&text, self.style), BROKEN_LINK_MARKER),
            LinkState::Pending => wrap_style(&text, self.style),
        }
    }
}

/// One piece of a line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Text(String),

    /// Index into [`Document::links`]
    Link(usize),
}

/// One output line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Line {
    pub fragments: Vec<Fragment>,

    /// Code content: rendered without trimming trailing whitespace
    pub verbatim: bool,
}

impl Line {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(text: impl Into<String>) -> Self {
        let mut line = Self::new();
        line.push_text(&text.into());
        line
    }

    /// A line inside a code fence, kept exactly as given
    pub fn verbatim(text: impl Into<String>) -> Self {
        let mut line = Self::text(text);
        line.verbatim = true;
        line
    }

    /// Appends text, merging it into a trailing text fragment
    pub fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        match self.fragments.last_mut() {
            Some(Fragment::Text(last)) => last.push_str(text),
            _ => self.fragments.push(Fragment::Text(text.to_string())),
        }
    }

    pub fn push_link(&mut self, index: usize) {
        self.fragments.push(Fragment::Link(index));
    }

    /// Appends every fragment of another line
    pub fn append(&mut self, other: Line) {
        for fragment in other.fragments {
            match fragment {
                Fragment::Text(text) => self.push_text(&text),
                Fragment::Link(index) => self.push_link(index),
            }
        }
    }

    /// True if the line renders as nothing
    pub fn is_blank(&self) -> bool {
        self.fragments.iter().all(|f| match f {
            Fragment::Text(text) => text.trim().is_empty(),
            Fragment::Link(_) => false,
        })
    }

    /// Puts `prefix` in front of the line
    ///
    /// Blank lines keep only the non-whitespace part of the prefix, so nested
    /// blank lines carry no trailing spaces (`"> "` becomes `">"`). Verbatim
    /// lines keep their whitespace-only content.
    pub fn prefixed(self, prefix: &str) -> Line {
        let verbatim = self.verbatim;
        let empty = if verbatim {
            self.fragments.is_empty()
        } else {
            self.is_blank()
        };

        let mut line = if empty {
            Line::text(prefix.trim_end())
        } else {
            let mut line = Line::text(prefix);
            line.append(self);
            line
        };
        line.verbatim = verbatim;
        line
    }

    /// Splits text fragments on `'\n'` into separate lines
    pub fn split_newlines(self) -> Vec<Line> {
        let mut lines = vec![Line::new()];
        for fragment in self.fragments {
            match fragment {
                Fragment::Text(text) => {
                    let mut parts = text.split('\n');
                    if let (Some(first), Some(current)) = (parts.next(), lines.last_mut()) {
                        current.push_text(first);
                    }
                    for part in parts {
                        lines.push(Line::text(part));
                    }
                }
                Fragment::Link(index) => {
                    if let Some(current) = lines.last_mut() {
                        current.push_link(index);
                    }
                }
            }
        }
        lines
    }

    /// Renders the line against the document's links
    pub fn render(&self, links: &[LinkReference]) -> String {
        let mut out = String::new();
        for fragment in &self.fragments {
            match fragment {
                Fragment::Text(text) => out.push_str(text),
                Fragment::Link(index) => {
                    if let Some(link) = links.get(*index) {
                        out.push_str(&link.render());
                    }
                }
            }
        }
        if self.verbatim {
            out
        } else {
            out.trim_end().to_string()
        }
    }
}

/// Converted output for one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub node_id: NodeId,
    pub title: String,

    /// Output path relative to the output root
    pub path: String,
    pub lines: Vec<Line>,
    pub links: Vec<LinkReference>,
}

impl Document {
    pub fn new(node_id: impl Into<NodeId>, title: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            title: title.into(),
            path: path.into(),
            lines: Vec::new(),
            links: Vec::new(),
        }
    }

    pub fn push_line(&mut self, line: Line) {
        self.lines.push(line);
    }

    /// Appends lines, separated from existing content by one blank line
    pub fn push_section(&mut self, lines: Vec<Line>) {
        if lines.is_empty() {
            return;
        }
        if self.lines.last().is_some_and(|last| !last.is_blank()) {
            self.lines.push(Line::new());
        }
        self.lines.extend(lines);
    }

    /// Renders the final Markdown text, ending with a single newline
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(&line.render(&self.links));
            out.push('\n');
        }

        while out.ends_with("\n\n") {
            out.pop();
        }
        out
    }
}

/// Wraps text in the Markdown markers of `style`
///
/// Leading and trailing whitespace stays outside the markers; whitespace-only
/// text is returned unchanged.
pub fn wrap_style(text: &str, style: Style) -> String {
    if style.is_plain() {
        return text.to_string();
    }

    let core = text.trim();
    if core.is_empty() {
        return text.to_string();
    }
    let start = text.len() - text.trim_start().len();
    let end = start + core.len();

    let mut open = String::new();
    if style.bold {
        open.push_str("**");
    }
    if style.italic {
        open.push('*');
    }
    if style.strikethrough {
        open.push_str("~~");
    }
    if style.code {
        open.push('`');
    }
    let close: String = open.chars().rev().collect();

    format!("{}{}{}{}{}", &text[..start], open, core, close, &text[end..])
}

/// Makes text safe inside a Markdown table cell
pub fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace("\r\n", "<br>").replace('\n', "<br>")
}

/// Escapes brackets so display text cannot end a link label early
fn escape_label(text: &str) -> String {
    text.replace('[', "\\[").replace(']', "\\]")
}
