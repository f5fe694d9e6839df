use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use epub_builder::{EpubBuilder, EpubContent, ReferenceType, ZipLibrary};

use crate::convert::{ConversionStrategy, ConvertError};
use crate::extract::document_title;
use crate::xhtml::to_xhtml;

const CHAPTER_FILE: &str = "article.xhtml";

/// In-process EPUB builder: one XHTML chapter holding the whole document,
/// titled from its `<title>` element or, failing that, the file stem.
#[derive(Debug, Clone)]
pub struct EmbeddedEpub {
    timeout: Duration,
}

impl EmbeddedEpub {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ConversionStrategy for EmbeddedEpub {
    fn name(&self) -> &str {
        "epub-builder"
    }

    async fn convert(&self, input: &Path, output: &Path) -> Result<(), ConvertError> {
        let html = tokio::fs::read_to_string(input).await?;
        let title = document_title(&html).unwrap_or_else(|| file_stem(input));
        let output: PathBuf = output.to_path_buf();

        let task = tokio::task::spawn_blocking(move || build_epub(&title, &html, &output));
        tokio::time::timeout(self.timeout, task)
            .await
            .map_err(|_| ConvertError::Timeout {
                tool: self.name().to_string(),
                secs: self.timeout.as_secs(),
            })?
            .map_err(epub_err)?
    }
}

fn build_epub(title: &str, html: &str, output: &Path) -> Result<(), ConvertError> {
    let zip = ZipLibrary::new().map_err(epub_err)?;
    let mut builder = EpubBuilder::new(zip).map_err(epub_err)?;
    builder.metadata("title", title).map_err(epub_err)?;
    builder.metadata("lang", "en").map_err(epub_err)?;
    let chapter = to_xhtml(html);
    builder
        .add_content(
            EpubContent::new(CHAPTER_FILE, chapter.as_bytes())
                .title(title)
                .reftype(ReferenceType::Text),
        )
        .map_err(epub_err)?;
    builder.inline_toc();

    let mut file = File::create(output)?;
    builder.generate(&mut file).map_err(epub_err)?;
    Ok(())
}

fn epub_err(err: impl std::fmt::Display) -> ConvertError {
    ConvertError::Epub(err.to_string())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}
