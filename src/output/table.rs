//! Database table projection
//!
//! A database becomes one Markdown table with a row per record, and every
//! record becomes its own document with a property table, its block content
//! and the records of other databases that point at it through relations.

use crate::model::{Block, CellValue, Column, ContentGraph, Node, NodeId, NodeKind};
use crate::output::document::{escape_cell, Document, Line, LinkReference};
use crate::output::markdown::{
    cell_line, file_name, inline, markdown_table, render_blocks, title_heading,
};
use std::collections::HashMap;

/// A record pointing at another record through a relation property
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReverseReference {
    pub source_record: NodeId,
    pub property: String,
}

/// Reverse references coming from one database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReverseGroup {
    pub database_id: NodeId,
    pub database_title: String,
    pub references: Vec<ReverseReference>,
}

/// Renders a database as a table of its records
///
/// Columns follow the declared property order. The title column links to
/// each record's own document; a record missing a property gets an empty cell.
pub fn project_table(database: &Node, records: &[&Node]) -> Document {
    let mut doc = Document::new(
        database.id.clone(),
        database.title.clone(),
        database.output_path.clone().unwrap_or_default(),
    );
    doc.push_line(title_heading(&database.title));

    let header: Vec<Line> = database
        .columns
        .iter()
        .map(|column| Line::text(escape_cell(&column.name)))
        .collect();

    let rows: Vec<Vec<Line>> = records
        .iter()
        .map(|record| {
            database
                .columns
                .iter()
                .map(|column| record_cell(record, column, &mut doc.links))
                .collect()
        })
        .collect();

    doc.push_section(markdown_table(header, rows));
    doc
}

fn record_cell(record: &Node, column: &Column, links: &mut Vec<LinkReference>) -> Line {
    if column.is_title() {
        let mut link = LinkReference::new(record.id.as_str(), record.title.as_str());
        link.table_cell = true;
        links.push(link);

        let mut line = Line::new();
        line.push_link(links.len() - 1);
        return line;
    }
    render_cell(record.cells.get(&column.name), links)
}

/// Renders one property value as table cell content
pub fn render_cell(value: Option<&CellValue>, links: &mut Vec<LinkReference>) -> Line {
    let Some(value) = value else {
        return Line::new();
    };

    let text = match value {
        CellValue::Text(text) => {
            let line = inline(text, links);
            return cell_line(line, links);
        }
        CellValue::Relation(targets) => {
            let mut line = Line::new();
            for (i, target) in targets.iter().enumerate() {
                if i > 0 {
                    line.push_text(", ");
                }
                let mut link = LinkReference::new(target.as_str(), "");
                link.table_cell = true;
                links.push(link);
                line.push_link(links.len() - 1);
            }
            return line;
        }
        CellValue::Number(number) => number.map(format_number).unwrap_or_default(),
        CellValue::Select(name) | CellValue::Plain(name) => name.clone().unwrap_or_default(),
        CellValue::MultiSelect(names) | CellValue::People(names) => names.join(", "),
        CellValue::Date(date) => date.as_ref().map(ToString::to_string).unwrap_or_default(),
        CellValue::Checkbox(checked) => {
            if *checked {
                "X".to_string()
            } else {
                String::new()
            }
        }
        CellValue::Files(urls) => {
            let files: Vec<String> = urls
                .iter()
                .map(|url| format!("[{}]({})", file_name(url), url))
                .collect();
            files.join(", ")
        }
        CellValue::Unsupported(_) => String::new(),
    };

    Line::text(escape_cell(&text))
}

/// Integral numbers print without a fractional part
fn format_number(number: f64) -> String {
    if number.is_finite() && number.fract() == 0.0 && number.abs() < 1e15 {
        format!("{}", number as i64)
    } else {
        number.to_string()
    }
}

/// Renders a record page
///
/// # Arguments
///
/// * `record` - The record node
/// * `database` - Database owning the record, if it is known
/// * `blocks` - The record's own block content
/// * `referenced_by` - Relations pointing at this record, grouped by database
pub fn project_record(
    record: &Node,
    database: Option<&Node>,
    blocks: &[Block],
    referenced_by: &[ReverseGroup],
) -> Document {
    let mut doc = Document::new(
        record.id.clone(),
        record.title.clone(),
        record.output_path.clone().unwrap_or_default(),
    );
    doc.push_line(title_heading(&record.title));

    if let Some(database) = database {
        doc.links
            .push(LinkReference::new(database.id.as_str(), database.title.as_str()));
        let mut back = Line::text("*Database record: ");
        back.push_link(doc.links.len() - 1);
        back.push_text("*");
        doc.push_section(vec![back]);

        let rows: Vec<Vec<Line>> = database
            .columns
            .iter()
            .filter(|column| !column.is_title())
            .map(|column| {
                vec![
                    Line::text(escape_cell(&column.name)),
                    render_cell(record.cells.get(&column.name), &mut doc.links),
                ]
            })
            .collect();
        if !rows.is_empty() {
            let header = vec![Line::text("Property"), Line::text("Value")];
            doc.push_section(markdown_table(header, rows));
        }
    }

    let body = render_blocks(blocks, &mut doc.links);
    doc.push_section(body);

    for group in referenced_by {
        doc.links
            .push(LinkReference::new(group.database_id.as_str(), group.database_title.as_str()));
        let mut heading = Line::text("## Referenced by ");
        heading.push_link(doc.links.len() - 1);
        doc.push_section(vec![heading]);

        let rows: Vec<Vec<Line>> = group
            .references
            .iter()
            .map(|reference| {
                let mut link = LinkReference::new(reference.source_record.as_str(), "");
                link.table_cell = true;
                doc.links.push(link);

                let mut source = Line::new();
                source.push_link(doc.links.len() - 1);
                vec![source, Line::text(escape_cell(&reference.property))]
            })
            .collect();
        let header = vec![Line::text("Record"), Line::text("Property")];
        doc.push_section(markdown_table(header, rows));
    }

    doc
}

/// Collects, for every relation target, the records pointing at it
///
/// Records are visited in discovery order and their relation properties in
/// declared column order, so the result is stable across runs. Failed records
/// contribute nothing.
pub fn build_reverse_references(graph: &ContentGraph) -> HashMap<NodeId, Vec<ReverseGroup>> {
    let mut reverse: HashMap<NodeId, Vec<ReverseGroup>> = HashMap::new();

    for record in graph.iter() {
        if record.kind != NodeKind::DatabaseRecord || record.is_failed() {
            continue;
        }
        let Some(database) = record.parent_id.as_deref().and_then(|id| graph.get(id)) else {
            continue;
        };

        for column in &database.columns {
            let Some(CellValue::Relation(targets)) = record.cells.get(&column.name) else {
                continue;
            };

            for target in targets {
                let groups = reverse.entry(target.clone()).or_default();
                let index = match groups.iter().position(|g| g.database_id == database.id) {
                    Some(index) => index,
                    None => {
                        groups.push(ReverseGroup {
                            database_id: database.id.clone(),
                            database_title: database.title.clone(),
                            references: Vec::new(),
                        });
                        groups.len() - 1
                    }
                };

                let reference = ReverseReference {
                    source_record: record.id.clone(),
                    property: column.name.clone(),
                };
                if !groups[index].references.contains(&reference) {
                    groups[index].references.push(reference);
                }
            }
        }
    }

    reverse
}
