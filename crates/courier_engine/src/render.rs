use std::sync::Arc;

use chrono::NaiveDateTime;
use engine_logging::engine_info;
use thiserror::Error;

use crate::embed::HtmlEmbedder;
use crate::filename::{article_filename, article_stem, compilation_filename};
use crate::output::{OutputDir, PersistError};
use crate::templates::{self, ArticleView, COMPILATION_TITLE};
use crate::{Article, RenderedDocument};

/// Source of "now" for timestamps in documents and filenames.
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(|| chrono::Local::now().naive_local())
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to write {filename}: {source}")]
    Write {
        filename: String,
        #[source]
        source: PersistError,
    },
}

/// Builds styled HTML documents and writes them to the output directory.
///
/// Rendering itself cannot fail on article content; only the write can.
pub struct DocumentRenderer<'a> {
    embedder: HtmlEmbedder<'a>,
    output: OutputDir,
    clock: Clock,
}

impl<'a> DocumentRenderer<'a> {
    pub fn new(embedder: HtmlEmbedder<'a>, output: OutputDir, clock: Clock) -> Self {
        Self {
            embedder,
            output,
            clock,
        }
    }

    pub async fn render_single(&self, article: &Article) -> Result<RenderedDocument, RenderError> {
        let now = (self.clock)();
        let body = self.embedder.embed(article.body()).await;
        let html = templates::single_document(&view(article, &body), now);

        let stem = article_stem(
            article.title.as_deref(),
            article.author.as_deref(),
            article.publisher.as_deref(),
        );
        let filename = article_filename(&stem, now);
        let path = self.write(&filename, &html)?;
        engine_info!("Created HTML file: {}", path.display());

        Ok(RenderedDocument {
            title: article.display_title().to_string(),
            path,
            html,
        })
    }

    /// One document for all `articles`, in the given order. Each body is
    /// embedded on its own; images shared between articles hit the cache.
    pub async fn render_compilation(
        &self,
        articles: &[Article],
    ) -> Result<RenderedDocument, RenderError> {
        let now = (self.clock)();
        engine_info!("Creating compilation with {} article(s)", articles.len());

        let mut bodies = Vec::with_capacity(articles.len());
        for (i, article) in articles.iter().enumerate() {
            engine_info!(
                "Processing article {}/{}: {}",
                i + 1,
                articles.len(),
                article.display_title()
            );
            bodies.push(self.embedder.embed(article.body()).await);
        }
        let views: Vec<ArticleView<'_>> = articles
            .iter()
            .zip(&bodies)
            .map(|(article, body)| view(article, body))
            .collect();
        let html = templates::compilation_document(&views, now);

        let filename = compilation_filename(articles.len(), now);
        let path = self.write(&filename, &html)?;
        engine_info!("Created compilation HTML: {}", path.display());

        Ok(RenderedDocument {
            title: COMPILATION_TITLE.to_string(),
            path,
            html,
        })
    }

    fn write(&self, filename: &str, html: &str) -> Result<std::path::PathBuf, RenderError> {
        self.output
            .write(filename, html)
            .map_err(|source| RenderError::Write {
                filename: filename.to_string(),
                source,
            })
    }
}

fn view<'v>(article: &'v Article, body: &'v str) -> ArticleView<'v> {
    ArticleView {
        title: article.display_title(),
        author: article.display_author(),
        publisher: article.display_publisher(),
        url: article.display_url(),
        body,
    }
}
