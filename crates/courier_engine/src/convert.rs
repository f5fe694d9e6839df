use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use engine_logging::{engine_info, engine_warn};
use thiserror::Error;

use crate::epub::EmbeddedEpub;
use crate::output::remove_artifact;
use crate::tools::ExternalTool;
use crate::{ConvertedDocument, OutputFormat, RenderedDocument};

pub const DEFAULT_CONVERTER_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("{0} not found on PATH")]
    ToolMissing(String),
    #[error("{tool} timed out after {secs}s")]
    Timeout { tool: String, secs: u64 },
    #[error("{tool} failed (exit code {code:?}): {stderr}")]
    Failed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("{tool} reported success but produced no file at {}", .path.display())]
    MissingOutput { tool: String, path: PathBuf },
    #[error("epub build failed: {0}")]
    Epub(String),
    #[error("intermediate {format} could not be produced")]
    Intermediate { format: OutputFormat },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// One way of producing `output` from `input`.
#[async_trait]
pub trait ConversionStrategy: Send + Sync {
    fn name(&self) -> &str;
    async fn convert(&self, input: &Path, output: &Path) -> Result<(), ConvertError>;
}

#[derive(Debug)]
pub enum ChainOutcome {
    Converted { path: PathBuf, strategy: String },
    /// Every strategy failed; one entry per attempt, in order.
    Exhausted { attempts: Vec<(String, ConvertError)> },
}

/// Ordered strategies for one target format, tried until one produces a file.
pub struct FallbackChain {
    target: OutputFormat,
    strategies: Vec<Box<dyn ConversionStrategy>>,
}

impl FallbackChain {
    pub fn new(target: OutputFormat) -> Self {
        Self {
            target,
            strategies: Vec::new(),
        }
    }

    pub fn then(mut self, strategy: impl ConversionStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn target(&self) -> OutputFormat {
        self.target
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// The output lands next to `input` with the target's extension.
    pub async fn run(&self, input: &Path) -> ChainOutcome {
        let output = input.with_extension(self.target.extension());
        let mut attempts = Vec::new();

        for strategy in &self.strategies {
            let result = match strategy.convert(input, &output).await {
                Ok(()) if output.is_file() => Ok(()),
                Ok(()) => Err(ConvertError::MissingOutput {
                    tool: strategy.name().to_string(),
                    path: output.clone(),
                }),
                Err(err) => Err(err),
            };
            match result {
                Ok(()) => {
                    engine_info!(
                        "Converted to {} using {}: {}",
                        self.target,
                        strategy.name(),
                        output.display()
                    );
                    return ChainOutcome::Converted {
                        path: output,
                        strategy: strategy.name().to_string(),
                    };
                }
                Err(err) => {
                    engine_warn!("{} conversion via {} failed: {}", self.target, strategy.name(), err);
                    // Leftovers from a failed stage must not satisfy the next one's check.
                    remove_artifact(&output);
                    attempts.push((strategy.name().to_string(), err));
                }
            }
        }
        ChainOutcome::Exhausted { attempts }
    }
}

/// Produce an intermediate format with one chain, then finish with a tool
/// reading it. The intermediate file is removed whether or not the finish
/// step succeeds.
pub struct ViaIntermediate {
    name: String,
    first: FallbackChain,
    finish: ExternalTool,
}

impl ViaIntermediate {
    pub fn new(first: FallbackChain, finish: ExternalTool) -> Self {
        let name = format!("{} via {}", finish.label(), first.target());
        Self {
            name,
            first,
            finish,
        }
    }
}

#[async_trait]
impl ConversionStrategy for ViaIntermediate {
    fn name(&self) -> &str {
        &self.name
    }

    async fn convert(&self, input: &Path, output: &Path) -> Result<(), ConvertError> {
        let intermediate = match self.first.run(input).await {
            ChainOutcome::Converted { path, .. } => path,
            ChainOutcome::Exhausted { .. } => {
                return Err(ConvertError::Intermediate {
                    format: self.first.target(),
                });
            }
        };
        let finished = self.finish.run(&intermediate, output).await;
        remove_artifact(&intermediate);
        finished
    }
}

/// Program names for every delegated converter. Overridable so deployments
/// (and tests) can point at specific executables.
#[derive(Debug, Clone)]
pub struct ToolNames {
    pub weasyprint: String,
    pub wkhtmltopdf: String,
    pub chrome: Vec<String>,
    pub ebook_convert: String,
    pub kindlegen: String,
}

impl Default for ToolNames {
    fn default() -> Self {
        Self {
            weasyprint: "weasyprint".into(),
            wkhtmltopdf: "wkhtmltopdf".into(),
            chrome: [
                "chromium",
                "chromium-browser",
                "google-chrome",
                "google-chrome-stable",
                "chrome",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            ebook_convert: "ebook-convert".into(),
            kindlegen: "kindlegen".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConverterSettings {
    pub timeout: Duration,
    /// Build EPUBs in-process. When off, EPUB has no strategy and degrades.
    pub embedded_epub: bool,
    pub tools: ToolNames,
}

impl Default for ConverterSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_CONVERTER_TIMEOUT,
            embedded_epub: true,
            tools: ToolNames::default(),
        }
    }
}

/// Turns a rendered HTML document into the requested format. Never fails:
/// when every strategy is exhausted the HTML itself is returned, and the
/// result's `format` says so.
pub struct FormatConverter {
    pdf: FallbackChain,
    epub: FallbackChain,
    mobi: FallbackChain,
}

impl FormatConverter {
    pub fn new(settings: &ConverterSettings) -> Self {
        Self {
            pdf: pdf_chain(settings),
            epub: epub_chain(settings),
            mobi: mobi_chain(settings),
        }
    }

    pub async fn convert(
        &self,
        document: &RenderedDocument,
        format: OutputFormat,
    ) -> ConvertedDocument {
        let chain = match format {
            OutputFormat::Html => return degraded(document, format),
            OutputFormat::Pdf => &self.pdf,
            OutputFormat::Epub => &self.epub,
            OutputFormat::Mobi => &self.mobi,
        };

        match chain.run(&document.path).await {
            ChainOutcome::Converted { path, .. } => ConvertedDocument {
                path,
                format,
                requested: format,
            },
            ChainOutcome::Exhausted { attempts } => {
                engine_warn!(
                    "All {} conversion methods failed ({} tried), delivering HTML",
                    format,
                    attempts.len()
                );
                degraded(document, format)
            }
        }
    }
}

fn degraded(document: &RenderedDocument, requested: OutputFormat) -> ConvertedDocument {
    ConvertedDocument {
        path: document.path.clone(),
        format: OutputFormat::Html,
        requested,
    }
}

fn pdf_chain(settings: &ConverterSettings) -> FallbackChain {
    let tools = &settings.tools;
    FallbackChain::new(OutputFormat::Pdf)
        .then(ExternalTool::new(
            tools.weasyprint.clone(),
            &["{input}", "{output}"],
            settings.timeout,
        ))
        .then(ExternalTool::new(
            tools.wkhtmltopdf.clone(),
            &["--quiet", "{input}", "{output}"],
            settings.timeout,
        ))
        .then(ExternalTool::any_of(
            "chrome",
            tools.chrome.clone(),
            &["--headless", "--disable-gpu", "--print-to-pdf={output}", "{input}"],
            settings.timeout,
        ))
}

fn epub_chain(settings: &ConverterSettings) -> FallbackChain {
    let chain = FallbackChain::new(OutputFormat::Epub);
    if settings.embedded_epub {
        chain.then(EmbeddedEpub::new(settings.timeout))
    } else {
        chain
    }
}

fn mobi_chain(settings: &ConverterSettings) -> FallbackChain {
    let tools = &settings.tools;
    FallbackChain::new(OutputFormat::Mobi)
        .then(ExternalTool::new(
            tools.ebook_convert.clone(),
            &["{input}", "{output}", "--output-profile", "kindle", "--mobi-file-type", "new"],
            settings.timeout,
        ))
        // kindlegen exits with 1 when it only emitted warnings.
        .then(
            ExternalTool::new(
                tools.kindlegen.clone(),
                &["{input}", "-o", "{output_name}"],
                settings.timeout,
            )
            .accept_exit_codes(&[0, 1]),
        )
        .then(ViaIntermediate::new(
            epub_chain(settings),
            ExternalTool::new(
                tools.ebook_convert.clone(),
                &["{input}", "{output}", "--output-profile", "kindle"],
                settings.timeout,
            ),
        ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chains_are_ordered_per_format() {
        let settings = ConverterSettings::default();
        assert_eq!(pdf_chain(&settings).len(), 3);
        assert_eq!(epub_chain(&settings).len(), 1);
        assert_eq!(mobi_chain(&settings).len(), 3);

        let without_epub = ConverterSettings {
            embedded_epub: false,
            ..ConverterSettings::default()
        };
        assert!(epub_chain(&without_epub).is_empty());
    }
}
