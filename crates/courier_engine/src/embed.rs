use std::collections::HashMap;
use std::sync::LazyLock;

use engine_logging::{engine_debug, engine_info};
use futures_util::stream::{self, StreamExt};
use regex::Regex;

use crate::images::ImageResolver;
use crate::InlinedImage;

pub const DEFAULT_IMAGE_CONCURRENCY: usize = 8;

static IMG_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<img[\s/>]").expect("valid img tag pattern"));

/// Rewrites `<img src>` references in an article body into data URIs.
///
/// Only the attribute value is replaced; the rest of the markup is copied
/// through byte for byte. References that cannot be resolved stay as they are.
pub struct HtmlEmbedder<'a> {
    resolver: &'a ImageResolver,
    concurrency: usize,
}

struct SrcSpan {
    start: usize,
    end: usize,
    raw: String,
}

impl<'a> HtmlEmbedder<'a> {
    pub fn new(resolver: &'a ImageResolver) -> Self {
        Self {
            resolver,
            concurrency: DEFAULT_IMAGE_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub async fn embed(&self, html: &str) -> String {
        let spans = find_image_sources(html);
        if spans.is_empty() {
            return html.to_string();
        }

        let mut targets: Vec<String> = Vec::new();
        for span in &spans {
            if let Some(url) = fetchable_url(&span.raw) {
                if !targets.contains(&url) {
                    targets.push(url);
                }
            }
        }
        engine_info!(
            "Embedding {} image reference(s), {} distinct URL(s)",
            spans.len(),
            targets.len()
        );

        // Asset-level resolution is never attempted here; the URL is the key.
        let resolved: HashMap<String, InlinedImage> = stream::iter(targets)
            .map(|url| async move {
                let image = self.resolver.resolve(&url, None).await;
                (url, image)
            })
            .buffer_unordered(self.concurrency)
            .filter_map(|(url, image)| async move { image.map(|image| (url, image)) })
            .collect()
            .await;

        let mut out = String::with_capacity(html.len());
        let mut last = 0;
        for span in &spans {
            let Some(image) = fetchable_url(&span.raw).and_then(|url| resolved.get(&url)) else {
                continue;
            };
            out.push_str(&html[last..span.start]);
            out.push_str("src=\"");
            out.push_str(image.data_uri());
            out.push('"');
            last = span.end;
        }
        out.push_str(&html[last..]);
        out
    }
}

/// Byte spans of the `src=...` attribute of every `<img>` tag, in order.
fn find_image_sources(html: &str) -> Vec<SrcSpan> {
    let mut spans = Vec::new();
    let mut pos = 0;
    while let Some(open) = IMG_OPEN.find_at(html, pos) {
        let (src, tag_end) = scan_attributes(html, open.start() + "<img".len());
        spans.extend(src);
        pos = tag_end;
    }
    spans
}

/// Walk one tag's attributes from just after its name, stepping over quoted
/// values whole. Returns the first `src` attribute and the offset past the tag.
fn scan_attributes(html: &str, from: usize) -> (Option<SrcSpan>, usize) {
    let bytes = html.as_bytes();
    let skip_space = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        i
    };
    let mut src = None;
    let mut i = from;
    loop {
        while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b'/') {
            i += 1;
        }
        match bytes.get(i) {
            None => return (src, i),
            Some(b'>') => return (src, i + 1),
            // A stray `=` where a name should start.
            Some(b'=') => {
                i += 1;
                continue;
            }
            Some(_) => {}
        }

        let name_start = i;
        while i < bytes.len()
            && !bytes[i].is_ascii_whitespace()
            && !matches!(bytes[i], b'=' | b'>' | b'/')
        {
            i += 1;
        }
        let name = &html[name_start..i];

        let eq = skip_space(i);
        if bytes.get(eq) != Some(&b'=') {
            i = eq;
            continue;
        }
        let value_at = skip_space(eq + 1);
        let (value_start, value_end, attr_end) = match bytes.get(value_at) {
            Some(&quote @ (b'"' | b'\'')) => {
                let start = value_at + 1;
                let Some(len) = html[start..].find(quote as char) else {
                    // Unterminated quote: nothing after this point is safe to rewrite.
                    return (src, bytes.len());
                };
                (start, start + len, start + len + 1)
            }
            _ => {
                let mut end = value_at;
                while end < bytes.len() && !bytes[end].is_ascii_whitespace() && bytes[end] != b'>' {
                    end += 1;
                }
                (value_at, end, end)
            }
        };
        if src.is_none() && name.eq_ignore_ascii_case("src") {
            src = Some(SrcSpan {
                start: name_start,
                end: attr_end,
                raw: html[value_start..value_end].to_string(),
            });
        }
        i = attr_end;
    }
}

/// The URL to fetch for a raw `src` value, or `None` when it is already
/// self-contained or not something we can download.
fn fetchable_url(raw: &str) -> Option<String> {
    let decoded = html_escape::decode_html_entities(raw.trim()).into_owned();
    if decoded.is_empty() {
        return None;
    }
    let lower = decoded.to_ascii_lowercase();
    if lower.starts_with("data:") {
        engine_debug!("Image already embedded; leaving as is");
        return None;
    }
    if decoded.starts_with("//") {
        return Some(format!("https:{decoded}"));
    }
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Some(decoded);
    }
    None
}
