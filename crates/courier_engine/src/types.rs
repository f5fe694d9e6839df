use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

pub const UNTITLED: &str = "Untitled Article";
pub const UNKNOWN_AUTHOR: &str = "Unknown Author";

/// Immutable snapshot of one saved article, as returned by the article source.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Article {
    pub id: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub source_url: Option<String>,
    pub raw_html: Option<String>,
    pub archived: bool,
}

impl Article {
    pub fn display_title(&self) -> &str {
        non_empty(self.title.as_deref()).unwrap_or(UNTITLED)
    }

    pub fn display_author(&self) -> &str {
        non_empty(self.author.as_deref()).unwrap_or(UNKNOWN_AUTHOR)
    }

    pub fn display_publisher(&self) -> &str {
        self.publisher.as_deref().unwrap_or("")
    }

    pub fn display_url(&self) -> &str {
        self.source_url.as_deref().unwrap_or("")
    }

    pub fn body(&self) -> &str {
        self.raw_html.as_deref().unwrap_or("")
    }

    pub fn summary(&self) -> courier_core::ArticleSummary {
        courier_core::ArticleSummary {
            id: self.id.clone(),
            title: self.display_title().to_string(),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputFormat {
    Html,
    #[default]
    Pdf,
    Epub,
    Mobi,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Html => "html",
            OutputFormat::Pdf => "pdf",
            OutputFormat::Epub => "epub",
            OutputFormat::Mobi => "mobi",
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported output format '{0}' (expected pdf, epub, mobi or html)")]
pub struct UnknownFormat(pub String);

impl FromStr for OutputFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "html" | "htm" => Ok(OutputFormat::Html),
            "pdf" => Ok(OutputFormat::Pdf),
            "epub" => Ok(OutputFormat::Epub),
            "mobi" => Ok(OutputFormat::Mobi),
            other => Err(UnknownFormat(other.to_string())),
        }
    }
}

/// A resolved, size-checked image, ready to be embedded as a data URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlinedImage {
    pub content_type: String,
    pub byte_len: usize,
    data_uri: Arc<str>,
}

impl InlinedImage {
    pub fn new(content_type: impl Into<String>, bytes: &[u8]) -> Self {
        use base64::{engine::general_purpose::STANDARD, Engine as _};

        let content_type = content_type.into();
        let data_uri = format!("data:{};base64,{}", content_type, STANDARD.encode(bytes));
        Self {
            content_type,
            byte_len: bytes.len(),
            data_uri: data_uri.into(),
        }
    }

    pub fn data_uri(&self) -> &str {
        &self.data_uri
    }
}

/// Complete HTML document on disk, before format conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub title: String,
    pub path: PathBuf,
    pub html: String,
}

/// The converter's output. `format` is what was actually produced, which is
/// HTML whenever every stage of the requested chain failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedDocument {
    pub path: PathBuf,
    pub format: OutputFormat,
    pub requested: OutputFormat,
}

impl ConvertedDocument {
    pub fn is_degraded(&self) -> bool {
        self.format != self.requested
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutput {
    pub bytes: Vec<u8>,
    pub metadata: FetchMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchMetadata {
    pub original_url: String,
    pub final_url: String,
    pub content_type: Option<String>,
    pub byte_len: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::Network => write!(f, "network error"),
        }
    }
}
