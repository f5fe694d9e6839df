//! Courier core: pure run state machine and report helpers.
mod effect;
mod msg;
mod report;
mod state;
mod update;

pub use effect::{DryRunIntent, Effect};
pub use msg::Msg;
pub use report::{RunReport, RunResult};
pub use state::{ArticleId, ArticleSummary, Phase, RunMode, RunState};
pub use update::update;
