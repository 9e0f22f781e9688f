use crate::model::NodeId;

/// Inline style flags of a span
///
/// Flags combine additively: a span can be bold, italic and struck through at
/// the same time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Style {
    pub bold: bool,
    pub italic: bool,
    pub strikethrough: bool,
    pub code: bool,
}

impl Style {
    pub fn plain() -> Self {
        Self::default()
    }

    pub fn is_plain(&self) -> bool {
        *self == Self::default()
    }
}

/// Where a span points to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    /// Another node of the workspace, resolved to a relative path later
    Internal(NodeId),

    /// Anything else
    External(String),
}

/// One inline run of text
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub text: String,
    pub style: Style,
    pub link: Option<LinkTarget>,

    /// Inline equation (rendered between `$` signs)
    pub equation: bool,
}

impl Span {
    /// Creates an unstyled, unlinked span
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: Style::plain(),
            link: None,
            equation: false,
        }
    }

    pub fn styled(text: impl Into<String>, style: Style) -> Self {
        Self {
            style,
            ..Self::plain(text)
        }
    }

    pub fn linked(text: impl Into<String>, link: LinkTarget) -> Self {
        Self {
            link: Some(link),
            ..Self::plain(text)
        }
    }
}

/// Ordered sequence of inline spans
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RichText {
    pub spans: Vec<Span>,
}

impl RichText {
    pub fn new(spans: Vec<Span>) -> Self {
        Self { spans }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            spans: vec![Span::plain(text)],
        }
    }

    /// Concatenated text of every span, without any markup
    pub fn plain_text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.iter().all(|s| s.text.is_empty())
    }
}
