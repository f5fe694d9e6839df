//! Image resolution: fetch one image (asset store first, then its public URL),
//! enforce the size ceiling, pick a content type and memoize the outcome.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use engine_logging::{engine_debug, engine_info, engine_warn};
use tokio::sync::OnceCell;

use crate::fetch::Fetcher;
use crate::{FetchOutput, InlinedImage};

pub const DEFAULT_IMAGE_TYPE: &str = "image/jpeg";

type Slot = Arc<OnceCell<Option<InlinedImage>>>;

/// Run-scoped memo of image resolutions, keyed by asset id or URL.
///
/// Failures are stored as `None` so a key is resolved at most once per run.
/// Each key owns a once-cell: concurrent lookups of the same key wait on a
/// single fetch.
#[derive(Debug, Clone, Default)]
pub struct ImageCache {
    slots: Arc<Mutex<HashMap<String, Slot>>>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` if the key was never resolved, `Some(None)` for a cached failure.
    pub fn get(&self, key: &str) -> Option<Option<InlinedImage>> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.get(key).and_then(|slot| slot.get().cloned())
    }

    /// Number of keys with a settled outcome.
    pub fn len(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.values().filter(|slot| slot.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, key: &str) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.entry(key.to_string()).or_default().clone()
    }
}

/// The article source's own binary store, preferred for images it hosts.
#[derive(Debug, Clone)]
pub struct AssetStore {
    api_url: String,
    token: String,
}

impl AssetStore {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            token: token.into(),
        }
    }

    pub fn asset_url(&self, asset_id: &str) -> String {
        format!("{}/assets/{}", self.api_url.trim_end_matches('/'), asset_id)
    }
}

pub struct ImageResolver {
    fetcher: Arc<dyn Fetcher>,
    assets: Option<AssetStore>,
    cache: ImageCache,
}

impl ImageResolver {
    pub fn new(fetcher: Arc<dyn Fetcher>, cache: ImageCache) -> Self {
        Self {
            fetcher,
            assets: None,
            cache,
        }
    }

    pub fn with_asset_store(mut self, assets: AssetStore) -> Self {
        self.assets = Some(assets);
        self
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    /// Resolve one image reference. Never fails: every error is logged and
    /// becomes `None`. An empty `url` means the reference only has an asset id.
    pub async fn resolve(&self, url: &str, asset_id: Option<&str>) -> Option<InlinedImage> {
        let asset_id = asset_id.filter(|id| !id.is_empty());
        let key = match asset_id {
            Some(id) => id,
            None if !url.is_empty() => url,
            None => return None,
        };

        let slot = self.cache.slot(key);
        if let Some(hit) = slot.get() {
            engine_debug!("Using cached image: {}", key);
            return hit.clone();
        }
        slot.get_or_init(|| self.fetch_uncached(url, asset_id))
            .await
            .clone()
    }

    async fn fetch_uncached(&self, url: &str, asset_id: Option<&str>) -> Option<InlinedImage> {
        if let Some(id) = asset_id {
            match &self.assets {
                Some(store) => {
                    match self.fetcher.fetch(&store.asset_url(id), Some(&store.token)).await {
                        Ok(output) => {
                            engine_info!("Downloaded asset {} ({} bytes)", id, output.bytes.len());
                            return Some(inline(output, url));
                        }
                        Err(err) => engine_warn!("Failed to download asset {}: {}", id, err),
                    }
                }
                None => engine_debug!("No asset store configured; skipping asset {}", id),
            }
        }

        if url.is_empty() {
            return None;
        }
        match self.fetcher.fetch(url, None).await {
            Ok(output) => {
                engine_info!("Downloaded external image: {} ({} bytes)", url, output.bytes.len());
                Some(inline(output, url))
            }
            Err(err) => {
                engine_warn!("Failed to download image {}: {}", url, err);
                None
            }
        }
    }
}

fn inline(output: FetchOutput, url: &str) -> InlinedImage {
    let content_type = resolve_content_type(output.metadata.content_type.as_deref(), url);
    InlinedImage::new(content_type, &output.bytes)
}

/// Response header if it names an image type, else a guess from the URL path
/// extension, else [`DEFAULT_IMAGE_TYPE`].
pub(crate) fn resolve_content_type(header: Option<&str>, url: &str) -> String {
    let from_header = header
        .map(|value| value.split(';').next().unwrap_or(value).trim().to_ascii_lowercase())
        .filter(|essence| essence.starts_with("image/"));
    if let Some(content_type) = from_header {
        return content_type;
    }

    let path = url::Url::parse(url)
        .map(|parsed| parsed.path().to_string())
        .unwrap_or_else(|_| url.split(['?', '#']).next().unwrap_or(url).to_string());
    mime_guess::from_path(&path)
        .iter()
        .find(|guess| guess.type_() == mime_guess::mime::IMAGE)
        .map(|guess| guess.essence_str().to_string())
        .unwrap_or_else(|| DEFAULT_IMAGE_TYPE.to_string())
}
