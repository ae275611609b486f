//! Unit tests for page metadata extraction and the fetcher implementations.
//!
//! Extraction is tested on inline HTML; no test touches the network.

use linkshelf::services::metadata_fetcher::{
    append_capped, extract_metadata, MetadataFetcher, NoopMetadataFetcher, MAX_BODY_BYTES,
};
use linkshelf::types::metadata::PageMetadata;
use rstest::rstest;

#[test]
fn test_open_graph_tags_win() {
    let html = r#"
        <html><head>
          <title>Plain title</title>
          <meta name="description" content="Plain description">
          <meta property="og:title" content="OG title">
          <meta property="og:description" content="OG description">
          <meta property="og:image" content="https://example.com/card.png">
        </head></html>"#;

    let meta = extract_metadata(html);
    assert_eq!(meta.title.as_deref(), Some("OG title"));
    assert_eq!(meta.description.as_deref(), Some("OG description"));
    assert_eq!(meta.image.as_deref(), Some("https://example.com/card.png"));
}

#[test]
fn test_falls_back_to_title_and_meta_description() {
    let html = r#"<HTML><HEAD><TITLE> Classic page </TITLE>
        <META NAME="Description" CONTENT="Old school"></HEAD></HTML>"#;

    let meta = extract_metadata(html);
    assert_eq!(meta.title.as_deref(), Some("Classic page"));
    assert_eq!(meta.description.as_deref(), Some("Old school"));
    assert!(meta.image.is_none());
}

#[rstest]
#[case::content_first(r#"<meta content="Swapped" property="og:title">"#)]
#[case::single_quotes(r#"<meta property='og:title' content='Swapped'>"#)]
#[case::self_closing(r#"<meta property="og:title" content="Swapped" />"#)]
fn test_attribute_order_and_quoting(#[case] html: &str) {
    assert_eq!(extract_metadata(html).title.as_deref(), Some("Swapped"));
}

#[test]
fn test_entities_are_decoded() {
    let html = r#"<meta property="og:title" content="Tom &amp; Jerry&#39;s &quot;Show&quot;">"#;
    assert_eq!(
        extract_metadata(html).title.as_deref(),
        Some("Tom & Jerry's \"Show\"")
    );
}

#[rstest]
#[case::empty("")]
#[case::no_head("<p>just text</p>")]
#[case::blank_values(r#"<title>   </title><meta property="og:title" content="">"#)]
fn test_missing_metadata_is_empty(#[case] html: &str) {
    assert!(extract_metadata(html).is_empty());
}

#[test]
fn test_unterminated_tags_do_not_panic() {
    let meta = extract_metadata(r#"<title>Never closed <meta property="og:image" content="x"#);
    assert!(meta.image.is_none());
}

#[tokio::test]
async fn test_noop_fetcher_returns_empty_metadata() {
    let fetcher = NoopMetadataFetcher;
    assert_eq!(fetcher.fetch("https://example.com").await, PageMetadata::default());
}

// ─── Body limit ───

#[test]
fn test_body_never_grows_past_the_limit() {
    let mut body = Vec::new();
    let chunk = vec![b'x'; 300];

    assert!(append_capped(&mut body, &chunk, 1_000));
    assert!(append_capped(&mut body, &chunk, 1_000));
    assert!(append_capped(&mut body, &chunk, 1_000));
    assert!(!append_capped(&mut body, &chunk, 1_000));
    assert_eq!(body.len(), 1_000);

    assert!(!append_capped(&mut body, &chunk, 1_000));
    assert_eq!(body.len(), 1_000);
}

#[test]
fn test_reading_stops_after_head_closes() {
    let mut body = Vec::new();
    assert!(append_capped(&mut body, b"<html><head><title>T</title>", MAX_BODY_BYTES));
    assert!(!append_capped(&mut body, b"</HEAD><body>", MAX_BODY_BYTES));
    assert_eq!(extract_metadata(&String::from_utf8_lossy(&body)).title.as_deref(), Some("T"));
}

#[cfg(feature = "network")]
mod http {
    use linkshelf::services::metadata_fetcher::{HttpMetadataFetcher, MetadataFetcher};
    use linkshelf::types::settings::MetadataSettings;

    #[tokio::test]
    async fn test_unsupported_scheme_yields_empty_metadata() {
        let fetcher = HttpMetadataFetcher::new(&MetadataSettings::default()).unwrap();
        assert!(fetcher.fetch("ftp://example.com/file").await.is_empty());
        assert!(fetcher.fetch("javascript:alert(1)").await.is_empty());
    }
}
