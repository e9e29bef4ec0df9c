// tests/url_resolver.rs
// The resolver's one hard guarantee: it never errors and never loses the
// original link.

use country_risk_analyzer::resolve::UrlResolver;

fn resolver() -> UrlResolver {
    UrlResolver::new(
        reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_millis(200))
            .timeout(std::time::Duration::from_millis(500))
            .build()
            .unwrap(),
    )
}

#[tokio::test]
async fn publisher_links_pass_through_untouched() {
    let r = resolver();
    for link in [
        "https://example.com/a/b?c=d",
        "http://sub.example.org/story",
        "https://example.net/news.google.com-lookalike/path",
    ] {
        assert_eq!(r.resolve(link).await, link);
    }
}

#[tokio::test]
async fn malformed_inputs_come_back_unchanged() {
    let r = resolver();
    for link in ["", "not a url", "ftp://weird", "//missing-scheme"] {
        assert_eq!(r.resolve(link).await, link);
    }
}

#[tokio::test]
async fn embedded_url_parameter_is_extracted_without_network() {
    let r = resolver();
    let link = "https://news.google.com/rss/articles/x?url=https%3A%2F%2Fpub.example%2Fstory&y=1";
    assert_eq!(r.resolve(link).await, "https://pub.example/story");
}

#[tokio::test]
async fn unreachable_aggregator_degrades_to_original() {
    // Reserved TEST-NET address: the fetch fails fast, the link survives.
    let r = resolver();
    let link = "https://news.google.com.192.0.2.1.nip.io/rss/articles/zzz";
    assert_eq!(r.resolve(link).await, link);
}
