use crate::report::{RunReport, RunResult};

pub type ArticleId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Fetching,
    Compiling,
    IndividualProcessing,
    Reporting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunMode {
    pub compilation: bool,
    pub dry_run: bool,
}

/// Identity of a fetched article as the state machine sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleSummary {
    pub id: ArticleId,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunState {
    mode: RunMode,
    phase: Phase,
    articles: Vec<ArticleSummary>,
    cursor: usize,
    results: Vec<RunResult>,
}

impl RunState {
    pub fn new(mode: RunMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn articles(&self) -> &[ArticleSummary] {
        &self.articles
    }

    pub fn results(&self) -> &[RunResult] {
        &self.results
    }

    pub fn report(&self) -> RunReport {
        RunReport::from_results(self.articles.len(), self.mode.dry_run, self.results.clone())
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub(crate) fn set_articles(&mut self, articles: Vec<ArticleSummary>) {
        self.articles = articles;
        self.cursor = 0;
    }

    pub(crate) fn cursor(&self) -> usize {
        self.cursor
    }

    /// Records a finished article and moves to the next one.
    pub(crate) fn record_article(&mut self, result: RunResult) {
        self.results.push(result);
        self.cursor += 1;
    }

    pub(crate) fn record_batch(&mut self, results: Vec<RunResult>) {
        self.cursor = self.articles.len();
        self.results.extend(results);
    }
}
