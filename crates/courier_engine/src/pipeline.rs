use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use courier_core::{update, DryRunIntent, Effect, Msg, RunMode, RunReport, RunResult, RunState};
use engine_logging::{engine_error, engine_info, engine_warn};
use futures_util::FutureExt;
use thiserror::Error;

use crate::convert::{ConverterSettings, FormatConverter};
use crate::delivery::{DeliveryCoordinator, DeliveryOptions, DeliveryTransport};
use crate::embed::{HtmlEmbedder, DEFAULT_IMAGE_CONCURRENCY};
use crate::fetch::Fetcher;
use crate::images::{AssetStore, ImageCache, ImageResolver};
use crate::output::{OutputDir, PersistError};
use crate::render::{system_clock, Clock, DocumentRenderer};
use crate::source::{ArticleSource, SourceError};
use crate::{Article, OutputFormat};

/// Errors that end a run before any article is touched.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("could not fetch articles: {0}")]
    Fetch(#[from] SourceError),
    #[error("output directory unusable: {0}")]
    Output(#[from] PersistError),
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub format: OutputFormat,
    pub compilation: bool,
    pub dry_run: bool,
    pub cleanup: bool,
    pub image_concurrency: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            compilation: false,
            dry_run: false,
            cleanup: false,
            image_concurrency: DEFAULT_IMAGE_CONCURRENCY,
        }
    }
}

/// Runs one batch: fetch, then render, convert, deliver and archive either
/// each article on its own or all of them as one compilation.
pub struct Pipeline {
    source: Arc<dyn ArticleSource>,
    transport: Arc<dyn DeliveryTransport>,
    fetcher: Arc<dyn Fetcher>,
    assets: Option<AssetStore>,
    converter: FormatConverter,
    output: OutputDir,
    clock: Clock,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn ArticleSource>,
        transport: Arc<dyn DeliveryTransport>,
        fetcher: Arc<dyn Fetcher>,
        output: OutputDir,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            source,
            transport,
            fetcher,
            assets: None,
            converter: FormatConverter::new(&ConverterSettings::default()),
            output,
            clock: system_clock(),
            settings,
        }
    }

    pub fn with_asset_store(mut self, assets: AssetStore) -> Self {
        self.assets = Some(assets);
        self
    }

    pub fn with_converter(mut self, settings: &ConverterSettings) -> Self {
        self.converter = FormatConverter::new(settings);
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Drive the run state machine to its report. Individual article failures
    /// are part of the report; only an unreachable source or an unusable
    /// output directory end the run with an error.
    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        // One cache per run; it is dropped with the resolver.
        let mut resolver = ImageResolver::new(self.fetcher.clone(), ImageCache::new());
        if let Some(assets) = &self.assets {
            resolver = resolver.with_asset_store(assets.clone());
        }
        let embedder = HtmlEmbedder::new(&resolver).with_concurrency(self.settings.image_concurrency);
        let renderer = DocumentRenderer::new(embedder, self.output.clone(), self.clock.clone());
        let coordinator = DeliveryCoordinator::new(self.transport.as_ref(), self.source.as_ref());

        let mode = RunMode {
            compilation: self.settings.compilation,
            dry_run: self.settings.dry_run,
        };
        let mut state = RunState::new(mode);
        let mut articles: Vec<Article> = Vec::new();
        let mut queue = VecDeque::from([Msg::Start]);
        let mut report = None;

        while let Some(msg) = queue.pop_front() {
            let (next, effects) = update(state, msg);
            state = next;
            for effect in effects {
                match effect {
                    Effect::FetchArticles => {
                        engine_info!("Starting article processing...");
                        articles = self.source.fetch_unarchived().await?;
                        if articles.is_empty() {
                            engine_info!("No unarchived articles found");
                        } else if !mode.dry_run {
                            self.output.ensure()?;
                        }
                        let summaries = articles.iter().map(Article::summary).collect();
                        queue.push_back(Msg::ArticlesFetched(summaries));
                    }
                    Effect::ProcessArticle { index } => {
                        let result = match articles.get(index) {
                            Some(article) => {
                                self.guarded_article(&renderer, &coordinator, article).await
                            }
                            None => RunResult::failed(
                                format!("#{index}"),
                                crate::UNTITLED,
                                "article index out of range",
                            ),
                        };
                        queue.push_back(Msg::ArticleDone(result));
                    }
                    Effect::ProcessCompilation { article_count } => {
                        engine_info!(
                            "COMPILATION MODE: creating one document with {} article(s)",
                            article_count
                        );
                        let results = self
                            .guarded_compilation(&renderer, &coordinator, &articles)
                            .await;
                        queue.push_back(Msg::CompilationDone(results));
                    }
                    Effect::AnnounceDryRun(intent) => announce(intent, self.settings.format),
                    Effect::Report => report = Some(state.report()),
                }
            }
        }

        let report = report.unwrap_or_else(|| state.report());
        engine_info!(
            "Run finished: processed={} archived={} failed={}",
            report.processed,
            report.archived,
            report.failed
        );
        Ok(report)
    }

    /// A panic inside one article is contained and counted as its failure.
    async fn guarded_article(
        &self,
        renderer: &DocumentRenderer<'_>,
        coordinator: &DeliveryCoordinator<'_>,
        article: &Article,
    ) -> RunResult {
        let attempt = AssertUnwindSafe(self.process_article(renderer, coordinator, article));
        match attempt.catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                engine_error!("Article {} aborted: {}", article.id, reason);
                RunResult::failed(article.id.clone(), article.display_title(), reason)
            }
        }
    }

    async fn process_article(
        &self,
        renderer: &DocumentRenderer<'_>,
        coordinator: &DeliveryCoordinator<'_>,
        article: &Article,
    ) -> RunResult {
        let title = article.display_title();
        engine_info!("Processing: {}", title);

        let rendered = match renderer.render_single(article).await {
            Ok(doc) => doc,
            Err(err) => {
                engine_error!("Error rendering {}: {}", title, err);
                return RunResult::failed(article.id.clone(), title, err.to_string());
            }
        };
        let converted = self.converter.convert(&rendered, self.settings.format).await;
        if converted.is_degraded() {
            engine_warn!("{} could not be produced for {}; sending HTML", converted.requested, title);
        }

        let ids = std::slice::from_ref(&article.id);
        let outcome = coordinator
            .deliver_and_archive(&converted, &rendered, ids, self.delivery_options())
            .await;
        if outcome.delivered {
            RunResult::delivered(article.id.clone(), title, outcome.is_archived(&article.id))
        } else {
            let error = outcome.error.unwrap_or_else(|| "delivery failed".to_string());
            RunResult::failed(article.id.clone(), title, error)
        }
    }

    async fn guarded_compilation(
        &self,
        renderer: &DocumentRenderer<'_>,
        coordinator: &DeliveryCoordinator<'_>,
        articles: &[Article],
    ) -> Vec<RunResult> {
        let attempt = AssertUnwindSafe(self.process_compilation(renderer, coordinator, articles));
        match attempt.catch_unwind().await {
            Ok(results) => results,
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                engine_error!("Compilation aborted: {}", reason);
                all_failed(articles, &reason)
            }
        }
    }

    /// One shared artifact: if it cannot be delivered, nothing is archived.
    async fn process_compilation(
        &self,
        renderer: &DocumentRenderer<'_>,
        coordinator: &DeliveryCoordinator<'_>,
        articles: &[Article],
    ) -> Vec<RunResult> {
        let rendered = match renderer.render_compilation(articles).await {
            Ok(doc) => doc,
            Err(err) => {
                engine_error!("Error rendering compilation: {}", err);
                return all_failed(articles, &err.to_string());
            }
        };
        let converted = self.converter.convert(&rendered, self.settings.format).await;
        if converted.is_degraded() {
            engine_warn!("{} could not be produced for the compilation; sending HTML", converted.requested);
        }

        let ids: Vec<String> = articles.iter().map(|a| a.id.clone()).collect();
        let outcome = coordinator
            .deliver_and_archive(&converted, &rendered, &ids, self.delivery_options())
            .await;
        if !outcome.delivered {
            let error = outcome.error.unwrap_or_else(|| "delivery failed".to_string());
            return all_failed(articles, &error);
        }
        engine_info!(
            "Compilation delivered; archived {} of {} article(s)",
            outcome.archived_count(),
            articles.len()
        );
        articles
            .iter()
            .map(|a| RunResult::delivered(a.id.clone(), a.display_title(), outcome.is_archived(&a.id)))
            .collect()
    }

    fn delivery_options(&self) -> DeliveryOptions {
        DeliveryOptions {
            cleanup: self.settings.cleanup,
        }
    }
}

fn all_failed(articles: &[Article], error: &str) -> Vec<RunResult> {
    articles
        .iter()
        .map(|a| RunResult::failed(a.id.clone(), a.display_title(), error))
        .collect()
}

fn announce(intent: DryRunIntent, format: OutputFormat) {
    match intent {
        DryRunIntent::Compilation { article_count } => engine_info!(
            "DRY RUN: would create a {} compilation of {} article(s), send it and archive them",
            format,
            article_count
        ),
        DryRunIntent::Article { article_id, title } => engine_info!(
            "DRY RUN: would convert '{}' ({}) to {}, send it and archive it",
            title,
            article_id,
            format
        ),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}
