//! Block tree to Markdown conversion
//!
//! This module turns one node's block tree into a [`Document`]. It handles:
//! - Inline span styling, equations and links
//! - Tight lists with per-run numbering and nested indentation
//! - Quotes, callouts, code fences, tables and media blocks
//! - Placeholders for blocks that could not be interpreted
//!
//! Conversion is pure: internal links are left as pending [`LinkReference`]s
//! for the link resolver.

use crate::model::{Block, BlockKind, LinkTarget, Node, RichText, Span};
use crate::output::document::{escape_cell, wrap_style, Document, Fragment, Line, LinkReference};

/// Indentation of content nested under a bullet, to-do or toggle
const BULLET_INDENT: &str = "  ";

/// Indentation of content nested under a numbered item
const NUMBER_INDENT: &str = "   ";

const QUOTE_PREFIX: &str = "> ";

/// Converts a page or record into a document
///
/// The document starts with the node title as a level-one heading followed by
/// the rendered blocks.
pub fn convert(node: &Node, blocks: &[Block]) -> Document {
    let mut doc = Document::new(
        node.id.clone(),
        node.title.clone(),
        node.output_path.clone().unwrap_or_default(),
    );
    doc.push_line(title_heading(&node.title));

    let body = render_blocks(blocks, &mut doc.links);
    doc.push_section(body);
    doc
}

/// Level-one heading for a document title, kept on one line
pub fn title_heading(title: &str) -> Line {
    Line::text(format!("# {}", title.replace(['\r', '\n'], " ")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Bulleted,
    Numbered,
    ToDo,
}

fn list_kind(kind: &BlockKind) -> Option<ListKind> {
    match kind {
        BlockKind::BulletedListItem(_) | BlockKind::Toggle(_) => Some(ListKind::Bulleted),
        BlockKind::NumberedListItem(_) => Some(ListKind::Numbered),
        BlockKind::ToDo { .. } => Some(ListKind::ToDo),
        _ => None,
    }
}

/// Renders sibling blocks
///
/// Consecutive list items of the same kind stay tight; every other pair of
/// siblings is separated by one blank line. Blocks that render to nothing are
/// skipped but still end a list run.
pub fn render_blocks(blocks: &[Block], links: &mut Vec<LinkReference>) -> Vec<Line> {
    let mut out: Vec<Line> = Vec::new();
    let mut previous: Option<ListKind> = None;
    let mut number = 0;

    for block in blocks {
        let list = list_kind(&block.kind);
        number = match list {
            Some(ListKind::Numbered) if previous == list => number + 1,
            Some(ListKind::Numbered) => 1,
            _ => 0,
        };

        let rendered = render_block(block, number, links);
        if rendered.is_empty() {
            previous = None;
            continue;
        }

        let tight = list.is_some() && list == previous;
        if !out.is_empty() && !tight {
            out.push(Line::new());
        }
        out.extend(rendered);
        previous = list;
    }

    out
}

fn render_block(block: &Block, number: usize, links: &mut Vec<LinkReference>) -> Vec<Line> {
    match &block.kind {
        BlockKind::Paragraph(text) => {
            let lines = text_lines(text, links);
            if lines.iter().all(Line::is_blank) {
                return render_blocks(&block.children, links);
            }
            followed_by_children(lines, block, links)
        }
        BlockKind::Heading { level, text } => {
            let marker = "#".repeat(usize::from((*level).clamp(1, 3)));
            let mut line = Line::text(format!("{} ", marker));
            line.append(single_line(inline(text, links)));
            followed_by_children(vec![line], block, links)
        }
        BlockKind::BulletedListItem(text) | BlockKind::Toggle(text) => {
            list_item("- ", BULLET_INDENT, text, &block.children, links)
        }
        BlockKind::NumberedListItem(text) => {
            list_item(&format!("{}. ", number), NUMBER_INDENT, text, &block.children, links)
        }
        BlockKind::ToDo { text, checked } => {
            let marker = if *checked { "- [x] " } else { "- [ ] " };
            list_item(marker, BULLET_INDENT, text, &block.children, links)
        }
        BlockKind::Quote(text) => {
            let lines = text_lines(text, links);
            quoted(lines, &block.children, links)
        }
        BlockKind::Callout { icon, text } => {
            let mut lines = text_lines(text, links);
            if let (Some(icon), Some(first)) = (icon, lines.first_mut()) {
                let mut line = Line::text(format!("{} ", icon));
                line.append(std::mem::take(first));
                *first = line;
            }
            quoted(lines, &block.children, links)
        }
        BlockKind::Code { language, text } => {
            let code = text.plain_text();
            let fence = code_fence(&code);
            let mut lines = vec![Line::text(format!("{}{}", fence, language))];
            lines.extend(code.split('\n').map(Line::verbatim));
            lines.push(Line::text(fence));
            lines
        }
        BlockKind::Table { has_column_header } => {
            let mut rows: Vec<Vec<Line>> = block
                .children
                .iter()
                .filter_map(|child| match &child.kind {
                    BlockKind::TableRow { cells } => Some(table_row(cells, links)),
                    _ => None,
                })
                .collect();

            let header = if *has_column_header && !rows.is_empty() {
                rows.remove(0)
            } else {
                Vec::new()
            };
            markdown_table(header, rows)
        }
        BlockKind::TableRow { cells } => {
            let row = table_row(cells, links);
            markdown_table(Vec::new(), vec![row])
        }
        BlockKind::Image { url, caption } => {
            let alt = escape_brackets(&caption.plain_text().replace('\n', " "));
            vec![Line::text(format!("![{}]({})", alt, link_url(url)))]
        }
        BlockKind::Bookmark { url, caption } => vec![media_link(url, caption, url)],
        BlockKind::File { url, caption } => vec![media_link(url, caption, file_name(url))],
        BlockKind::Equation { expression } => {
            let mut lines = vec![Line::text("$$")];
            lines.extend(expression.trim().split('\n').map(Line::text));
            lines.push(Line::text("$$"));
            lines
        }
        BlockKind::Divider => vec![Line::text("---")],
        BlockKind::ChildPage { title } | BlockKind::ChildDatabase { title } => {
            vec![link_line(block.id.as_str(), title, links)]
        }
        BlockKind::LinkToPage { target } => vec![link_line(target, "", links)],
        BlockKind::Container => render_blocks(&block.children, links),
        BlockKind::Unsupported { block_type, reason } => {
            let placeholder = match reason {
                Some(reason) => format!("*[Unsupported block: {} ({})]*", block_type, reason),
                None => format!("*[Unsupported block: {}]*", block_type),
            };
            vec![Line::text(placeholder)]
        }
    }
}

/// Backtick fence longer than any backtick run inside `code`, at least three
fn code_fence(code: &str) -> String {
    let longest = code
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    "`".repeat((longest + 1).max(3))
}

/// Appends nested blocks after a blank line, without indentation
fn followed_by_children(
    mut lines: Vec<Line>,
    block: &Block,
    links: &mut Vec<LinkReference>,
) -> Vec<Line> {
    let children = render_blocks(&block.children, links);
    if !children.is_empty() {
        lines.push(Line::new());
        lines.extend(children);
    }
    lines
}

fn list_item(
    marker: &str,
    indent: &str,
    text: &RichText,
    children: &[Block],
    links: &mut Vec<LinkReference>,
) -> Vec<Line> {
    let mut text = text_lines(text, links).into_iter();
    let mut lines = vec![text.next().unwrap_or_default().prefixed(marker)];
    lines.extend(text.map(|line| line.prefixed(indent)));

    lines.extend(
        render_blocks(children, links)
            .into_iter()
            .map(|line| line.prefixed(indent)),
    );
    lines
}

fn quoted(text: Vec<Line>, children: &[Block], links: &mut Vec<LinkReference>) -> Vec<Line> {
    let mut lines: Vec<Line> = text
        .into_iter()
        .map(|line| line.prefixed(QUOTE_PREFIX))
        .collect();

    let children = render_blocks(children, links);
    if !children.is_empty() {
        lines.push(Line::new().prefixed(QUOTE_PREFIX));
        lines.extend(children.into_iter().map(|line| line.prefixed(QUOTE_PREFIX)));
    }
    lines
}

fn link_line(target: &str, text: &str, links: &mut Vec<LinkReference>) -> Line {
    links.push(LinkReference::new(target, text));
    let mut line = Line::new();
    line.push_link(links.len() - 1);
    line
}

fn media_link(url: &str, caption: &RichText, fallback: &str) -> Line {
    let caption = caption.plain_text().replace('\n', " ");
    let label = if caption.trim().is_empty() {
        fallback
    } else {
        caption.trim()
    };
    Line::text(format!("[{}]({})", escape_brackets(label), link_url(url)))
}

/// Last path segment of a file URL, without the query string
pub(crate) fn file_name(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    match path.rsplit('/').next() {
        Some(name) if !name.is_empty() => name,
        _ => "File",
    }
}

/// Rich text as lines, split on embedded newlines
fn text_lines(text: &RichText, links: &mut Vec<LinkReference>) -> Vec<Line> {
    inline(text, links).split_newlines()
}

/// Renders rich text as a single logical line
///
/// Embedded newlines are kept in text fragments; callers decide whether to
/// split them into lines or escape them.
pub fn inline(text: &RichText, links: &mut Vec<LinkReference>) -> Line {
    let mut line = Line::new();

    for span in merge_spans(&text.spans) {
        if span.equation {
            line.push_text(&format!("${}$", span.text.trim()));
            continue;
        }

        let (lead, core, trail) = split_whitespace(&span.text);
        match &span.link {
            Some(_) if core.is_empty() => line.push_text(&span.text),
            Some(LinkTarget::Internal(target)) => {
                line.push_text(lead);
                links.push(LinkReference::new(target.as_str(), core).styled(span.style));
                line.push_link(links.len() - 1);
                line.push_text(trail);
            }
            Some(LinkTarget::External(url)) => {
                let label = wrap_style(&escape_brackets(core), span.style);
                line.push_text(&format!("{}[{}]({}){}", lead, label, link_url(url), trail));
            }
            None => {
                let styled: Vec<String> = span
                    .text
                    .split('\n')
                    .map(|part| wrap_style(part, span.style))
                    .collect();
                line.push_text(&styled.join("\n"));
            }
        }
    }

    line
}

/// Joins adjacent spans that share style and link so markers are not repeated
fn merge_spans(spans: &[Span]) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::with_capacity(spans.len());
    for span in spans {
        match merged.last_mut() {
            Some(last)
                if !last.equation
                    && !span.equation
                    && last.style == span.style
                    && last.link == span.link =>
            {
                last.text.push_str(&span.text);
            }
            _ => merged.push(span.clone()),
        }
    }
    merged
}

fn split_whitespace(text: &str) -> (&str, &str, &str) {
    let core = text.trim();
    if core.is_empty() {
        return (text, "", "");
    }
    let start = text.len() - text.trim_start().len();
    let end = start + core.len();
    (&text[..start], core, &text[end..])
}

/// Replaces embedded newlines with spaces
fn single_line(line: Line) -> Line {
    let mut flat = Line::new();
    for fragment in line.fragments {
        match fragment {
            Fragment::Text(text) => flat.push_text(&text.replace('\n', " ")),
            Fragment::Link(index) => flat.push_link(index),
        }
    }
    flat
}

/// Prepares a line for use inside a table cell
///
/// Pipes are escaped and newlines become `<br>`, both in plain text and in
/// the labels of the line's link references.
pub fn cell_line(line: Line, links: &mut [LinkReference]) -> Line {
    let mut cell = Line::new();
    for fragment in line.fragments {
        match fragment {
            Fragment::Text(text) => cell.push_text(&escape_cell(&text)),
            Fragment::Link(index) => {
                if let Some(link) = links.get_mut(index) {
                    link.table_cell = true;
                }
                cell.push_link(index);
            }
        }
    }
    cell
}

fn table_row(cells: &[RichText], links: &mut Vec<LinkReference>) -> Vec<Line> {
    cells
        .iter()
        .map(|cell| {
            let line = inline(cell, links);
            cell_line(line, links)
        })
        .collect()
}

/// Builds a Markdown table
///
/// The table is as wide as its widest row; short rows are padded with empty
/// cells. An empty `header` produces an empty header row. Cells must already
/// be escaped (see [`cell_line`]).
pub fn markdown_table(header: Vec<Line>, rows: Vec<Vec<Line>>) -> Vec<Line> {
    let width = rows
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(header.len()))
        .max()
        .unwrap_or(0);
    if width == 0 {
        return Vec::new();
    }

    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(table_line(header, width));
    lines.push(Line::text(format!("|{}", " --- |".repeat(width))));
    for row in rows {
        lines.push(table_line(row, width));
    }
    lines
}

fn table_line(cells: Vec<Line>, width: usize) -> Line {
    let mut cells = cells.into_iter();
    let mut line = Line::text("|");
    for _ in 0..width {
        line.push_text(" ");
        if let Some(cell) = cells.next() {
            line.append(cell);
        }
        line.push_text(" |");
    }
    line
}

fn escape_brackets(text: &str) -> String {
    text.replace('[', "\\[").replace(']', "\\]")
}

/// Wraps URLs that would end a Markdown link early in angle brackets
fn link_url(url: &str) -> String {
    if url.contains([' ', '(', ')']) {
        format!("<{}>", url)
    } else {
        url.to_string()
    }
}
