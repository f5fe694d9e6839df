use crate::ArticleId;

/// Outcome of one article within a run. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub article_id: ArticleId,
    pub title: String,
    /// The document carrying this article was delivered.
    pub processed: bool,
    pub archived: bool,
    pub error: Option<String>,
}

impl RunResult {
    pub fn delivered(
        article_id: impl Into<ArticleId>,
        title: impl Into<String>,
        archived: bool,
    ) -> Self {
        Self {
            article_id: article_id.into(),
            title: title.into(),
            processed: true,
            archived,
            error: None,
        }
    }

    pub fn failed(
        article_id: impl Into<ArticleId>,
        title: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            article_id: article_id.into(),
            title: title.into(),
            processed: false,
            archived: false,
            error: Some(error.into()),
        }
    }

    /// Delivered but the archive call did not go through.
    pub fn is_partial(&self) -> bool {
        self.processed && !self.archived
    }
}

/// Terminal summary of a run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunReport {
    pub total: usize,
    pub processed: usize,
    pub archived: usize,
    pub failed: usize,
    pub dry_run: bool,
    pub results: Vec<RunResult>,
}

impl RunReport {
    pub fn from_results(total: usize, dry_run: bool, results: Vec<RunResult>) -> Self {
        let processed = results.iter().filter(|r| r.processed).count();
        let archived = results.iter().filter(|r| r.archived).count();
        let failed = results.iter().filter(|r| !r.processed).count();
        Self {
            total,
            processed,
            archived,
            failed,
            dry_run,
            results,
        }
    }

    /// Articles that were delivered but are still unarchived at the source.
    pub fn partial(&self) -> impl Iterator<Item = &RunResult> {
        self.results.iter().filter(|r| r.is_partial())
    }
}
