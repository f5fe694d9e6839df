use crate::ArticleId;

/// Side effects requested by [`crate::update`]; executed by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    FetchArticles,
    /// Render, convert, deliver and archive the article at `index`.
    ProcessArticle { index: usize },
    /// Render one compilation of every fetched article and deliver it once.
    ProcessCompilation { article_count: usize },
    AnnounceDryRun(DryRunIntent),
    Report,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DryRunIntent {
    Compilation { article_count: usize },
    Article { article_id: ArticleId, title: String },
}
