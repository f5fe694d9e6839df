use std::sync::Arc;
use std::time::Duration;

use courier_engine::{
    AssetStore, FailureKind, FetchSettings, Fetcher, ImageCache, ImageResolver, ReqwestFetcher,
    DEFAULT_MAX_IMAGE_BYTES,
};
use pretty_assertions::assert_eq;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn resolver() -> ImageResolver {
    let fetcher = ReqwestFetcher::new(FetchSettings::default()).expect("client");
    ImageResolver::new(Arc::new(fetcher), ImageCache::new())
}

async fn mount_image(server: &MockServer, route: &str, body: Vec<u8>, content_type: &str, hits: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, content_type))
        .expect(hits)
        .mount(server)
        .await;
}

#[tokio::test]
async fn fetcher_reports_http_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(FetchSettings::default()).unwrap();
    let err = fetcher
        .fetch(&format!("{}/missing.png", server.uri()), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(404));
}

#[tokio::test]
async fn fetcher_rejects_non_http_schemes() {
    let fetcher = ReqwestFetcher::new(FetchSettings::default()).unwrap();
    let err = fetcher.fetch("ftp://example.com/a.png", None).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::InvalidUrl);
}

#[tokio::test]
async fn same_url_is_fetched_once_per_run() {
    let server = MockServer::start().await;
    mount_image(&server, "/a.png", b"png-bytes".to_vec(), "image/png", 1).await;

    let resolver = resolver();
    let url = format!("{}/a.png", server.uri());
    let first = resolver.resolve(&url, None).await;
    let second = resolver.resolve(&url, None).await;

    let first = first.expect("resolved");
    assert_eq!(Some(first.clone()), second);
    assert_eq!(first.content_type, "image/png");
    assert!(first.data_uri().starts_with("data:image/png;base64,"));
    assert_eq!(resolver.cache().len(), 1);
}

#[tokio::test]
async fn failures_are_cached_as_absent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broken.png"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let resolver = resolver();
    let url = format!("{}/broken.png", server.uri());
    assert_eq!(resolver.resolve(&url, None).await, None);
    assert_eq!(resolver.resolve(&url, None).await, None);
    assert_eq!(resolver.cache().get(&url), Some(None));
}

#[tokio::test]
async fn size_ceiling_is_inclusive() {
    let max = DEFAULT_MAX_IMAGE_BYTES as usize;
    let server = MockServer::start().await;
    mount_image(&server, "/exact.jpg", vec![7u8; max], "image/jpeg", 1).await;
    mount_image(&server, "/over.jpg", vec![7u8; max + 1], "image/jpeg", 1).await;

    let resolver = resolver();
    let exact = resolver.resolve(&format!("{}/exact.jpg", server.uri()), None).await;
    let over = resolver.resolve(&format!("{}/over.jpg", server.uri()), None).await;

    assert_eq!(exact.map(|image| image.byte_len), Some(max));
    assert_eq!(over, None);
}

#[tokio::test]
async fn oversized_streamed_body_is_rejected() {
    let server = MockServer::start().await;
    mount_image(&server, "/big.gif", vec![1u8; 64], "image/gif", 1).await;

    let fetcher = ReqwestFetcher::new(FetchSettings {
        max_bytes: 16,
        ..FetchSettings::default()
    })
    .unwrap();
    let err = fetcher
        .fetch(&format!("{}/big.gif", server.uri()), None)
        .await
        .unwrap_err();
    assert!(matches!(err.kind, FailureKind::TooLarge { max_bytes: 16, .. }));
}

#[tokio::test]
async fn asset_store_is_preferred_and_authenticated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/assets/asset-1"))
        .and(header("authorization", "Bearer secret-token"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"asset".to_vec(), "image/webp"))
        .expect(1)
        .mount(&server)
        .await;
    mount_image(&server, "/public.png", b"public".to_vec(), "image/png", 0).await;

    let resolver = resolver().with_asset_store(AssetStore::new(
        format!("{}/api/v1", server.uri()),
        "secret-token",
    ));
    let image = resolver
        .resolve(&format!("{}/public.png", server.uri()), Some("asset-1"))
        .await
        .expect("asset resolved");
    assert_eq!(image.content_type, "image/webp");

    // The asset id is the cache key, so the URL is never consulted again.
    let again = resolver
        .resolve(&format!("{}/other.png", server.uri()), Some("asset-1"))
        .await;
    assert_eq!(again, Some(image));
}

#[tokio::test]
async fn failed_asset_falls_back_to_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/assets/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    mount_image(&server, "/photo", b"jpeg".to_vec(), "application/octet-stream", 1).await;

    let resolver = resolver().with_asset_store(AssetStore::new(
        format!("{}/api/v1", server.uri()),
        "t",
    ));
    let image = resolver
        .resolve(&format!("{}/photo", server.uri()), Some("gone"))
        .await
        .expect("fell back to url");
    // Neither header nor extension names an image type.
    assert_eq!(image.content_type, "image/jpeg");
}

#[tokio::test]
async fn concurrent_lookups_share_one_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(b"slow".to_vec(), "image/png")
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let resolver = resolver();
    let url = format!("{}/slow.png", server.uri());
    let results = futures_util::future::join_all((0..5).map(|_| resolver.resolve(&url, None))).await;

    assert!(results.iter().all(|r| r.is_some()));
    assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
}

#[tokio::test]
async fn separate_runs_do_not_share_results() {
    let server = MockServer::start().await;
    mount_image(&server, "/a.png", b"png".to_vec(), "image/png", 2).await;
    let url = format!("{}/a.png", server.uri());

    assert!(resolver().resolve(&url, None).await.is_some());
    assert!(resolver().resolve(&url, None).await.is_some());
}
