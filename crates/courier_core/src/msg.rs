use crate::{ArticleSummary, RunResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Begin a run.
    Start,
    /// The article source returned the unarchived articles, newest first.
    ArticlesFetched(Vec<ArticleSummary>),
    /// One article finished in individual mode, successfully or not.
    ArticleDone(RunResult),
    /// The compilation document finished; one result per constituent article.
    CompilationDone(Vec<RunResult>),
}
