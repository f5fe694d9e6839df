//! Courier engine: image inlining, document rendering, format conversion,
//! delivery and the run pipeline.
mod convert;
mod delivery;
mod embed;
mod epub;
mod extract;
mod fetch;
mod filename;
mod images;
mod output;
mod pipeline;
mod render;
mod source;
mod templates;
mod tools;
mod types;
mod xhtml;

pub use convert::{
    ChainOutcome, ConversionStrategy, ConvertError, ConverterSettings, FallbackChain,
    FormatConverter, ToolNames, ViaIntermediate, DEFAULT_CONVERTER_TIMEOUT,
};
pub use delivery::{
    send_file, DeliveryCoordinator, DeliveryError, DeliveryOptions, DeliveryOutcome,
    DeliveryTransport, SmtpDelivery, SmtpSettings,
};
pub use embed::{HtmlEmbedder, DEFAULT_IMAGE_CONCURRENCY};
pub use epub::EmbeddedEpub;
pub use extract::document_title;
pub use fetch::{FetchSettings, Fetcher, ReqwestFetcher, DEFAULT_MAX_IMAGE_BYTES, DEFAULT_USER_AGENT};
pub use filename::{article_filename, article_stem, compilation_filename};
pub use images::{AssetStore, ImageCache, ImageResolver, DEFAULT_IMAGE_TYPE};
pub use output::{remove_artifact, OutputDir, PersistError, RECENT_WINDOW};
pub use pipeline::{Pipeline, PipelineError, PipelineSettings};
pub use render::{system_clock, Clock, DocumentRenderer, RenderError};
pub use source::{ArticleSource, KarakeepClient, SourceError, MAX_PAGES};
pub use templates::{anchor, COMPILATION_TITLE};
pub use tools::ExternalTool;
pub use types::{
    Article, ConvertedDocument, FailureKind, FetchError, FetchMetadata, FetchOutput, InlinedImage,
    OutputFormat, RenderedDocument, UnknownFormat, UNKNOWN_AUTHOR, UNTITLED,
};
