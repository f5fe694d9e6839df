use std::time::Duration;

use async_trait::async_trait;
use engine_logging::{engine_debug, engine_info, engine_warn};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::fetch::DEFAULT_USER_AGENT;
use crate::Article;

/// Upper bound on followed `nextCursor` pages for one listing.
pub const MAX_PAGES: usize = 50;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request to article source failed: {0}")]
    Http(String),
    #[error("article source returned {status} for {url}")]
    Status { status: u16, url: String },
    #[error("unexpected response from article source: {0}")]
    Decode(String),
}

/// The remote store articles come from and are archived in.
#[async_trait]
pub trait ArticleSource: Send + Sync {
    /// Unarchived articles, newest first.
    async fn fetch_unarchived(&self) -> Result<Vec<Article>, SourceError>;
    /// One-way transition to archived.
    async fn archive(&self, id: &str) -> Result<(), SourceError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookmarkPage {
    #[serde(default)]
    bookmarks: Vec<Bookmark>,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Bookmark {
    id: String,
    #[serde(default)]
    archived: bool,
    #[serde(default)]
    content: Option<BookmarkContent>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct BookmarkContent {
    title: Option<String>,
    author: Option<String>,
    publisher: Option<String>,
    url: Option<String>,
    html_content: Option<String>,
}

impl From<Bookmark> for Article {
    fn from(bookmark: Bookmark) -> Self {
        let content = bookmark.content.unwrap_or_default();
        Article {
            id: bookmark.id,
            title: content.title,
            author: content.author,
            publisher: content.publisher,
            source_url: content.url,
            raw_html: content.html_content,
            archived: bookmark.archived,
        }
    }
}

/// Karakeep REST client (`/bookmarks`), authenticated with a bearer token.
#[derive(Debug, Clone)]
pub struct KarakeepClient {
    api_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl KarakeepClient {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .user_agent(DEFAULT_USER_AGENT)
            .build()
            .map_err(|err| SourceError::Http(err.to_string()))?;
        Ok(Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    async fn fetch_page(&self, cursor: Option<&str>) -> Result<BookmarkPage, SourceError> {
        let mut url = url::Url::parse(&format!("{}/bookmarks", self.api_url))
            .map_err(|err| SourceError::Http(err.to_string()))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("sortOrder", "desc");
            if let Some(cursor) = cursor {
                query.append_pair("cursor", cursor);
            }
        }
        let url = url.to_string();
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|err| SourceError::Http(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                url,
            });
        }
        let body = response
            .bytes()
            .await
            .map_err(|err| SourceError::Http(err.to_string()))?;
        serde_json::from_slice(&body).map_err(|err| SourceError::Decode(err.to_string()))
    }
}

#[async_trait]
impl ArticleSource for KarakeepClient {
    async fn fetch_unarchived(&self) -> Result<Vec<Article>, SourceError> {
        let mut articles = Vec::new();
        let mut cursor: Option<String> = None;

        for page_no in 1..=MAX_PAGES {
            let page = self.fetch_page(cursor.as_deref()).await?;
            engine_debug!("Bookmark page {}: {} record(s)", page_no, page.bookmarks.len());
            articles.extend(
                page.bookmarks
                    .into_iter()
                    .filter(|b| !b.archived)
                    .map(Article::from),
            );
            cursor = page.next_cursor.filter(|c| !c.is_empty());
            if cursor.is_none() {
                break;
            }
            if page_no == MAX_PAGES {
                engine_warn!("Stopped listing bookmarks after {} pages", MAX_PAGES);
            }
        }

        engine_info!(
            "Found {} unarchived article(s) (sorted newest to oldest)",
            articles.len()
        );
        Ok(articles)
    }

    async fn archive(&self, id: &str) -> Result<(), SourceError> {
        let url = format!("{}/bookmarks/{}", self.api_url, id);
        let response = self
            .client
            .patch(&url)
            .bearer_auth(&self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .body(json!({ "archived": true }).to_string())
            .send()
            .await
            .map_err(|err| SourceError::Http(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                url,
            });
        }
        engine_info!("Archived article {}", id);
        Ok(())
    }
}
