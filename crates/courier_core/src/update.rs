use crate::{DryRunIntent, Effect, Msg, Phase, RunState};

/// Pure update function: applies a message to state and returns any effects.
///
/// Messages that do not belong to the current phase are ignored.
pub fn update(mut state: RunState, msg: Msg) -> (RunState, Vec<Effect>) {
    let effects = match msg {
        Msg::Start => {
            if state.phase() != Phase::Idle {
                return (state, Vec::new());
            }
            state.set_phase(Phase::Fetching);
            vec![Effect::FetchArticles]
        }
        Msg::ArticlesFetched(articles) => {
            if state.phase() != Phase::Fetching {
                return (state, Vec::new());
            }
            state.set_articles(articles);
            plan_batch(&mut state)
        }
        Msg::ArticleDone(result) => {
            if state.phase() != Phase::IndividualProcessing {
                return (state, Vec::new());
            }
            state.record_article(result);
            let next = state.cursor();
            if next < state.articles().len() {
                vec![Effect::ProcessArticle { index: next }]
            } else {
                state.set_phase(Phase::Reporting);
                vec![Effect::Report]
            }
        }
        Msg::CompilationDone(results) => {
            if state.phase() != Phase::Compiling {
                return (state, Vec::new());
            }
            state.record_batch(results);
            state.set_phase(Phase::Reporting);
            vec![Effect::Report]
        }
    };

    (state, effects)
}

fn plan_batch(state: &mut RunState) -> Vec<Effect> {
    let mode = state.mode();
    let count = state.articles().len();

    if count == 0 {
        state.set_phase(Phase::Reporting);
        return vec![Effect::Report];
    }

    if mode.dry_run {
        // Nothing is rendered, converted, delivered or archived.
        let mut effects: Vec<Effect> = if mode.compilation {
            vec![Effect::AnnounceDryRun(DryRunIntent::Compilation {
                article_count: count,
            })]
        } else {
            state
                .articles()
                .iter()
                .map(|a| {
                    Effect::AnnounceDryRun(DryRunIntent::Article {
                        article_id: a.id.clone(),
                        title: a.title.clone(),
                    })
                })
                .collect()
        };
        state.set_phase(Phase::Reporting);
        effects.push(Effect::Report);
        return effects;
    }

    if mode.compilation {
        state.set_phase(Phase::Compiling);
        vec![Effect::ProcessCompilation {
            article_count: count,
        }]
    } else {
        state.set_phase(Phase::IndividualProcessing);
        vec![Effect::ProcessArticle { index: 0 }]
    }
}
