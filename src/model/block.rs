use crate::model::{NodeId, RichText};

/// One content unit inside a page
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: String,
    pub kind: BlockKind,
    pub children: Vec<Block>,

    /// Whether the API reported nested content for this block
    pub has_children: bool,
}

/// Closed set of block shapes understood by the converter
#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    Paragraph(RichText),
    Heading { level: u8, text: RichText },
    BulletedListItem(RichText),
    NumberedListItem(RichText),
    ToDo { text: RichText, checked: bool },
    Toggle(RichText),
    Quote(RichText),
    Callout { icon: Option<String>, text: RichText },
    Code { language: String, text: RichText },
    Table { has_column_header: bool },
    TableRow { cells: Vec<RichText> },
    Image { url: String, caption: RichText },
    Bookmark { url: String, caption: RichText },
    File { url: String, caption: RichText },
    Equation { expression: String },
    Divider,
    ChildPage { title: String },
    ChildDatabase { title: String },
    LinkToPage { target: NodeId },

    /// Layout-only wrappers (columns, synced blocks) whose children render in place
    Container,

    /// Anything the converter cannot render, with the reason
    Unsupported { block_type: String, reason: Option<String> },
}

impl Block {
    pub fn new(id: impl Into<String>, kind: BlockKind) -> Self {
        Self {
            id: id.into(),
            kind,
            children: Vec::new(),
            has_children: false,
        }
    }

    pub fn with_children(mut self, children: Vec<Block>) -> Self {
        self.has_children = !children.is_empty();
        self.children = children;
        self
    }

    /// Returns true if the crawler must fetch this block's nested blocks
    ///
    /// Child pages and child databases also report children, but those belong
    /// to their own node and are never inlined.
    pub fn needs_children(&self) -> bool {
        self.has_children
            && !matches!(
                self.kind,
                BlockKind::ChildPage { .. } | BlockKind::ChildDatabase { .. }
            )
    }

    /// Visits this block and all of its descendants in document order
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Block)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }
}

/// Collects the child page and child database references of a block tree in
/// document order, including references nested in toggles and columns
pub fn child_references(blocks: &[Block]) -> Vec<(&str, &BlockKind)> {
    let mut found = Vec::new();
    for block in blocks {
        block.walk(&mut |b| {
            if matches!(
                b.kind,
                BlockKind::ChildPage { .. } | BlockKind::ChildDatabase { .. }
            ) {
                found.push((b.id.as_str(), &b.kind));
            }
        });
    }
    found
}
