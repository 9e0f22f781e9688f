//! Conversion of raw Notion API payloads into the typed content model
//!
//! This is the only place that inspects loosely typed JSON. Property values of
//! every shape collapse into [`CellValue`], block payloads into [`BlockKind`].
//! A block that cannot be interpreted degrades to `BlockKind::Unsupported`
//! instead of failing the page it belongs to.

use crate::model::{
    normalize_id, Block, BlockKind, CellValue, Column, DateValue, IsoDate, LinkTarget, NodeId,
    RichText, Span, Style,
};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;
use url::Url;

/// A block or record payload that does not have the expected shape
#[derive(Debug, Clone, Error)]
#[error("Cannot convert {block_type} block {block_id}: {message}")]
pub struct ConversionError {
    pub block_id: String,
    pub block_type: String,
    pub message: String,
}

/// A database record with its properties converted
#[derive(Debug, Clone)]
pub struct RecordData {
    pub id: NodeId,
    pub title: String,
    pub cells: HashMap<String, CellValue>,
}

/// Extracts the title of a page object from its `title`-typed property
pub fn page_title(page: &Value) -> String {
    page.get("properties")
        .and_then(Value::as_object)
        .and_then(|props| {
            props
                .values()
                .find(|prop| prop.get("type").and_then(Value::as_str) == Some("title"))
        })
        .map(|prop| parse_rich_text(&prop["title"]).plain_text())
        .map(|title| title.trim().to_string())
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| "Untitled".to_string())
}

/// Extracts the title of a database object
pub fn database_title(database: &Value) -> String {
    let title = parse_rich_text(&database["title"]).plain_text();
    let title = title.trim();
    if title.is_empty() {
        "Untitled Database".to_string()
    } else {
        title.to_string()
    }
}

/// Lists the declared columns of a database object in declared order
pub fn database_columns(database: &Value) -> Vec<Column> {
    database
        .get("properties")
        .and_then(Value::as_object)
        .map(|props| {
            props
                .iter()
                .map(|(name, prop)| Column {
                    name: name.clone(),
                    kind: prop
                        .get("type")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown")
                        .to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Converts a block payload, degrading unreadable payloads to a placeholder
///
/// Nested children are not part of the payload; the crawler attaches them.
pub fn parse_block_lenient(value: &Value) -> Block {
    parse_block(value).unwrap_or_else(|e| {
        tracing::debug!("{}", e);
        let mut block = Block::new(
            e.block_id.clone(),
            BlockKind::Unsupported {
                block_type: e.block_type.clone(),
                reason: Some(e.message),
            },
        );
        block.has_children = false;
        block
    })
}

/// Converts a block payload
pub fn parse_block(value: &Value) -> Result<Block, ConversionError> {
    let raw_id = value.get("id").and_then(Value::as_str).unwrap_or_default();
    let id = normalize_id(raw_id).unwrap_or_else(|| raw_id.to_string());
    let block_type = value
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();

    let fail = |message: &str| ConversionError {
        block_id: id.clone(),
        block_type: block_type.clone(),
        message: message.to_string(),
    };

    let payload = value
        .get(block_type.as_str())
        .filter(|p| p.is_object())
        .ok_or_else(|| fail("missing payload"))?;
    let text = || parse_rich_text(&payload["rich_text"]);
    let caption = || parse_rich_text(&payload["caption"]);

    let kind = match block_type.as_str() {
        "paragraph" => BlockKind::Paragraph(text()),
        "heading_1" | "heading_2" | "heading_3" => BlockKind::Heading {
            level: block_type[block_type.len() - 1..].parse().unwrap_or(1),
            text: text(),
        },
        "bulleted_list_item" => BlockKind::BulletedListItem(text()),
        "numbered_list_item" => BlockKind::NumberedListItem(text()),
        "to_do" => BlockKind::ToDo {
            text: text(),
            checked: payload["checked"].as_bool().unwrap_or(false),
        },
        "toggle" => BlockKind::Toggle(text()),
        "quote" => BlockKind::Quote(text()),
        "callout" => BlockKind::Callout {
            icon: payload["icon"]["emoji"].as_str().map(String::from),
            text: text(),
        },
        "code" => BlockKind::Code {
            language: payload["language"]
                .as_str()
                .filter(|l| *l != "plain text")
                .unwrap_or_default()
                .to_string(),
            text: text(),
        },
        "table" => BlockKind::Table {
            has_column_header: payload["has_column_header"].as_bool().unwrap_or(false),
        },
        "table_row" => BlockKind::TableRow {
            cells: payload["cells"]
                .as_array()
                .ok_or_else(|| fail("table row without cells"))?
                .iter()
                .map(parse_rich_text)
                .collect(),
        },
        "image" => BlockKind::Image {
            url: hosted_url(payload).ok_or_else(|| fail("image without url"))?,
            caption: caption(),
        },
        "bookmark" | "embed" | "link_preview" => BlockKind::Bookmark {
            url: payload["url"]
                .as_str()
                .ok_or_else(|| fail("bookmark without url"))?
                .to_string(),
            caption: caption(),
        },
        "file" | "pdf" | "video" | "audio" => BlockKind::File {
            url: hosted_url(payload).ok_or_else(|| fail("file without url"))?,
            caption: caption(),
        },
        "equation" => BlockKind::Equation {
            expression: payload["expression"].as_str().unwrap_or_default().to_string(),
        },
        "divider" => BlockKind::Divider,
        "child_page" => BlockKind::ChildPage {
            title: non_empty_title(&payload["title"], "Untitled"),
        },
        "child_database" => BlockKind::ChildDatabase {
            title: non_empty_title(&payload["title"], "Untitled Database"),
        },
        "link_to_page" => {
            let target = payload["page_id"]
                .as_str()
                .or_else(|| payload["database_id"].as_str())
                .and_then(normalize_id)
                .ok_or_else(|| fail("link without a page or database id"))?;
            BlockKind::LinkToPage { target }
        }
        "column_list" | "column" | "synced_block" => BlockKind::Container,
        other => BlockKind::Unsupported {
            block_type: other.to_string(),
            reason: None,
        },
    };

    let mut block = Block::new(id, kind);
    block.has_children = value["has_children"].as_bool().unwrap_or(false);
    Ok(block)
}

fn non_empty_title(value: &Value, fallback: &str) -> String {
    value
        .as_str()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

/// URL of a Notion-hosted or external file payload
fn hosted_url(payload: &Value) -> Option<String> {
    payload["file"]["url"]
        .as_str()
        .or_else(|| payload["external"]["url"].as_str())
        .map(String::from)
}

/// Converts a rich text array; anything that is not an array is empty text
pub fn parse_rich_text(value: &Value) -> RichText {
    let spans = value
        .as_array()
        .map(|items| items.iter().map(parse_span).collect())
        .unwrap_or_default();
    RichText::new(spans)
}

fn parse_span(item: &Value) -> Span {
    let annotations = &item["annotations"];
    let style = Style {
        bold: annotations["bold"].as_bool().unwrap_or(false),
        italic: annotations["italic"].as_bool().unwrap_or(false),
        strikethrough: annotations["strikethrough"].as_bool().unwrap_or(false),
        code: annotations["code"].as_bool().unwrap_or(false),
    };

    let span_type = item["type"].as_str().unwrap_or("text");
    let equation = span_type == "equation";
    let text = if equation {
        item["equation"]["expression"].as_str()
    } else {
        item["plain_text"]
            .as_str()
            .or_else(|| item["text"]["content"].as_str())
    }
    .unwrap_or_default()
    .to_string();

    let mention = &item["mention"];
    let link = match mention["type"].as_str() {
        Some("page") => mention["page"]["id"].as_str().and_then(normalize_id).map(LinkTarget::Internal),
        Some("database") => mention["database"]["id"]
            .as_str()
            .and_then(normalize_id)
            .map(LinkTarget::Internal),
        _ => None,
    }
    .or_else(|| {
        item["text"]["link"]["url"]
            .as_str()
            .or_else(|| item["href"].as_str())
            .map(link_target)
    });

    Span {
        text,
        style,
        link,
        equation,
    }
}

/// Classifies a link URL as internal (another workspace node) or external
///
/// Internal links come as `/<id>` paths or as `notion.so` / `notion.site`
/// URLs whose last path segment ends with the target ID.
pub fn link_target(url: &str) -> LinkTarget {
    match internal_id(url) {
        Some(id) => LinkTarget::Internal(id),
        None => LinkTarget::External(url.to_string()),
    }
}

fn internal_id(url: &str) -> Option<NodeId> {
    if let Some(path) = url.strip_prefix('/') {
        let path = path.split(['#', '?']).next().unwrap_or_default();
        return path.rsplit('/').next().and_then(id_from_segment);
    }

    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    if !(host == "notion.so" || host.ends_with(".notion.so") || host.ends_with("notion.site")) {
        return None;
    }
    parsed
        .path_segments()?
        .filter(|s| !s.is_empty())
        .last()
        .and_then(id_from_segment)
}

/// Extracts an ID from a path segment like `Page-Title-<32 hex chars>`
fn id_from_segment(segment: &str) -> Option<NodeId> {
    if let Some(id) = normalize_id(segment) {
        return Some(id);
    }
    let start = segment.len().checked_sub(32)?;
    if !segment.is_char_boundary(start) {
        return None;
    }
    normalize_id(&segment[start..])
}

/// Converts a database record payload
pub fn parse_record(value: &Value) -> Result<RecordData, ConversionError> {
    let raw_id = value["id"].as_str().unwrap_or_default();
    let id = normalize_id(raw_id).ok_or_else(|| ConversionError {
        block_id: raw_id.to_string(),
        block_type: "record".to_string(),
        message: "record without a valid id".to_string(),
    })?;

    let mut title = String::new();
    let mut cells = HashMap::new();
    if let Some(props) = value["properties"].as_object() {
        for (name, prop) in props {
            if prop["type"].as_str() == Some("title") {
                title = parse_rich_text(&prop["title"]).plain_text().trim().to_string();
            }
            cells.insert(name.clone(), parse_cell(prop));
        }
    }

    if title.is_empty() {
        title = "Untitled".to_string();
    }

    Ok(RecordData { id, title, cells })
}

/// Converts one property value into a closed cell value
pub fn parse_cell(prop: &Value) -> CellValue {
    let kind = prop["type"].as_str().unwrap_or_default();
    let value = &prop[kind];

    match kind {
        "title" | "rich_text" => CellValue::Text(parse_rich_text(value)),
        "number" => CellValue::Number(value.as_f64()),
        "select" | "status" => CellValue::Select(value["name"].as_str().map(String::from)),
        "multi_select" => CellValue::MultiSelect(names(value)),
        "date" => CellValue::Date(parse_date(value)),
        "created_time" | "last_edited_time" => CellValue::Date(value.as_str().and_then(|raw| {
            IsoDate::parse(raw).map(|start| DateValue { start, end: None })
        })),
        "relation" => CellValue::Relation(
            value
                .as_array()
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|item| item["id"].as_str().and_then(normalize_id))
                        .collect()
                })
                .unwrap_or_default(),
        ),
        "checkbox" => CellValue::Checkbox(value.as_bool().unwrap_or(false)),
        "url" | "email" | "phone_number" => CellValue::Plain(value.as_str().map(String::from)),
        "people" => CellValue::People(
            value
                .as_array()
                .map(|people| people.iter().filter_map(person_name).collect())
                .unwrap_or_default(),
        ),
        "created_by" | "last_edited_by" => CellValue::People(person_name(value).into_iter().collect()),
        "files" => CellValue::Files(
            value
                .as_array()
                .map(|files| files.iter().filter_map(hosted_url).collect())
                .unwrap_or_default(),
        ),
        "unique_id" => CellValue::Plain(value["number"].as_i64().map(|n| {
            match value["prefix"].as_str() {
                Some(prefix) => format!("{}-{}", prefix, n),
                None => n.to_string(),
            }
        })),
        "formula" => parse_computed(value),
        "rollup" => parse_computed(value),
        other => CellValue::Unsupported(other.to_string()),
    }
}

/// Formula and rollup results carry their own inner type tag
fn parse_computed(value: &Value) -> CellValue {
    let kind = value["type"].as_str().unwrap_or_default();
    let inner = &value[kind];
    match kind {
        "string" => CellValue::Plain(inner.as_str().map(String::from)),
        "number" => CellValue::Number(inner.as_f64()),
        "boolean" => CellValue::Checkbox(inner.as_bool().unwrap_or(false)),
        "date" => CellValue::Date(parse_date(inner)),
        other => CellValue::Unsupported(format!("computed {}", other)),
    }
}

fn parse_date(value: &Value) -> Option<DateValue> {
    let start = value["start"].as_str().and_then(IsoDate::parse)?;
    let end = value["end"].as_str().and_then(IsoDate::parse);
    Some(DateValue { start, end })
}

fn names(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item["name"].as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

fn person_name(person: &Value) -> Option<String> {
    person["name"]
        .as_str()
        .or_else(|| person["id"].as_str())
        .map(String::from)
}
