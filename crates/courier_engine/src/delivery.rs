use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use engine_logging::{engine_error, engine_info, engine_warn};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

use crate::output::{display_name, remove_artifact};
use crate::source::ArticleSource;
use crate::{ConvertedDocument, RenderedDocument};

const MAIL_BODY: &str = "Article sent from Karakeep to Kindle converter";
const IMPLICIT_TLS_PORT: u16 = 465;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("file to send does not exist: {}", .0.display())]
    MissingFile(PathBuf),
    #[error("invalid address {address:?}: {reason}")]
    Address { address: String, reason: String },
    #[error("could not build message: {0}")]
    Message(String),
    #[error("smtp error: {0}")]
    Smtp(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Sends one finished document somewhere it will be read.
#[async_trait]
pub trait DeliveryTransport: Send + Sync {
    async fn deliver(&self, file: &Path) -> Result<(), DeliveryError>;
}

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub recipient: String,
    pub timeout: Duration,
}

/// Authenticated mail submission with the document as the only attachment.
#[derive(Debug, Clone)]
pub struct SmtpDelivery {
    settings: SmtpSettings,
}

impl SmtpDelivery {
    pub fn new(settings: SmtpSettings) -> Self {
        Self { settings }
    }

    fn message(&self, file: &Path, bytes: Vec<u8>) -> Result<Message, DeliveryError> {
        let from = mailbox(&self.settings.username)?;
        let to = mailbox(&self.settings.recipient)?;
        let stem = file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content_type = ContentType::parse("application/octet-stream")
            .map_err(|err| DeliveryError::Message(err.to_string()))?;
        let attachment = Attachment::new(display_name(file)).body(bytes, content_type);

        Message::builder()
            .from(from)
            .to(to)
            .subject(format!("Article from Karakeep - {stem}"))
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(MAIL_BODY.to_string()))
                    .singlepart(attachment),
            )
            .map_err(|err| DeliveryError::Message(err.to_string()))
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, DeliveryError> {
        let settings = &self.settings;
        let builder = if settings.port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.server)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.server)
        }
        .map_err(|err| DeliveryError::Smtp(err.to_string()))?;

        Ok(builder
            .port(settings.port)
            .credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ))
            .timeout(Some(settings.timeout))
            .build())
    }
}

fn mailbox(address: &str) -> Result<Mailbox, DeliveryError> {
    address.parse().map_err(|err: lettre::address::AddressError| DeliveryError::Address {
        address: address.to_string(),
        reason: err.to_string(),
    })
}

#[async_trait]
impl DeliveryTransport for SmtpDelivery {
    async fn deliver(&self, file: &Path) -> Result<(), DeliveryError> {
        let bytes = tokio::fs::read(file).await?;
        let message = self.message(file, bytes)?;
        self.transport()?
            .send(message)
            .await
            .map_err(|err| DeliveryError::Smtp(err.to_string()))?;
        engine_info!("Successfully sent {} to {}", display_name(file), self.settings.recipient);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryOptions {
    /// Delete local artifacts after a successful delivery.
    pub cleanup: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub delivered: bool,
    pub archived_ids: Vec<String>,
    pub failed_ids: Vec<String>,
    pub error: Option<String>,
}

impl DeliveryOutcome {
    pub fn archived_count(&self) -> usize {
        self.archived_ids.len()
    }

    pub fn is_archived(&self, id: &str) -> bool {
        self.archived_ids.iter().any(|a| a == id)
    }
}

/// Delivers a document once and, only then, archives its articles.
pub struct DeliveryCoordinator<'a> {
    transport: &'a dyn DeliveryTransport,
    source: &'a dyn ArticleSource,
}

impl<'a> DeliveryCoordinator<'a> {
    pub fn new(transport: &'a dyn DeliveryTransport, source: &'a dyn ArticleSource) -> Self {
        Self { transport, source }
    }

    /// One delivery attempt, no retry. Each id is archived independently after
    /// a successful delivery; archive failures are reported, not retried.
    /// Cleanup happens after the archive attempts and only if delivery worked.
    pub async fn deliver_and_archive(
        &self,
        document: &ConvertedDocument,
        rendered: &RenderedDocument,
        article_ids: &[String],
        options: DeliveryOptions,
    ) -> DeliveryOutcome {
        if let Err(err) = self.transport.deliver(&document.path).await {
            engine_error!("Failed to deliver {}: {}", display_name(&document.path), err);
            return DeliveryOutcome {
                error: Some(err.to_string()),
                ..DeliveryOutcome::default()
            };
        }

        let mut outcome = DeliveryOutcome {
            delivered: true,
            ..DeliveryOutcome::default()
        };
        for id in article_ids {
            match self.source.archive(id).await {
                Ok(()) => outcome.archived_ids.push(id.clone()),
                Err(err) => {
                    engine_error!("Error archiving article {}: {}", id, err);
                    outcome.failed_ids.push(id.clone());
                }
            }
        }
        if !outcome.failed_ids.is_empty() {
            engine_warn!(
                "Delivered but archived only {} of {} article(s)",
                outcome.archived_count(),
                article_ids.len()
            );
        }

        if options.cleanup {
            remove_artifact(&document.path);
            if rendered.path != document.path {
                remove_artifact(&rendered.path);
            }
        }
        outcome
    }
}

/// Deliver an existing file as is, without touching the article source.
pub async fn send_file(
    transport: &dyn DeliveryTransport,
    file: &Path,
    options: DeliveryOptions,
) -> Result<(), DeliveryError> {
    if !file.is_file() {
        return Err(DeliveryError::MissingFile(file.to_path_buf()));
    }
    transport.deliver(file).await?;
    if options.cleanup {
        remove_artifact(file);
    }
    Ok(())
}
