use docvector_crawler::{CrawlConfig, Crawler};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn bfs_discovers_and_fetches_linked_pages() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(format!(
                    r#"<html><head><title>Home</title></head><body><a href="{}/guide">Guide</a></body></html>"#,
                    server.uri()
                )),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/guide"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string("<html><head><title>Guide</title></head><body>content</body></html>"),
        )
        .mount(&server)
        .await;

    let crawler = Crawler::new("docvector-test/0.1", 5).unwrap();
    let config = CrawlConfig {
        start_url: server.uri(),
        max_depth: 2,
        max_pages: 10,
        allowed_hosts: vec![],
        respect_robots: true,
        concurrency: 4,
        user_agent: "docvector-test/0.1".to_string(),
        request_timeout_secs: 5,
        url_pattern: None,
    };

    let documents = crawler.crawl(&config).await.unwrap();
    let urls: Vec<&str> = documents.iter().map(|d| d.url.as_str()).collect();

    assert!(urls.iter().any(|u| u.ends_with("/guide")));
    assert_eq!(documents.len(), 2);
}

#[tokio::test]
async fn respects_robots_disallow() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private\n"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(format!(
                    r#"<html><body><a href="{0}/private">Private</a><a href="{0}/public">Public</a></body></html>"#,
                    server.uri()
                )),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/public"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "text/html").set_body_string("<html><body>public</body></html>"))
        .mount(&server)
        .await;

    let crawler = Crawler::new("docvector-test/0.1", 5).unwrap();
    let config = CrawlConfig {
        start_url: server.uri(),
        max_depth: 2,
        max_pages: 10,
        allowed_hosts: vec![],
        respect_robots: true,
        concurrency: 4,
        user_agent: "docvector-test/0.1".to_string(),
        request_timeout_secs: 5,
        url_pattern: None,
    };

    let documents = crawler.crawl(&config).await.unwrap();
    let urls: Vec<&str> = documents.iter().map(|d| d.url.as_str()).collect();

    assert!(urls.iter().any(|u| u.ends_with("/public")));
    assert!(!urls.iter().any(|u| u.ends_with("/private")));
}

#[tokio::test]
async fn sitemap_discovery_filters_by_url_pattern() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            "<urlset><url><loc>{0}/docs/a</loc></url><url><loc>{0}/blog/b</loc></url><url><loc>{0}/docs/c</loc></url></urlset>",
            server.uri()
        )))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    for p in ["/docs/a", "/docs/c"] {
        Mock::given(method("GET"))
            .and(path(p))
            .respond_with(ResponseTemplate::new(200).insert_header("content-type", "text/html").set_body_string("<html><body>doc</body></html>"))
            .mount(&server)
            .await;
    }

    let crawler = Crawler::new("docvector-test/0.1", 5).unwrap();
    let config = CrawlConfig {
        start_url: server.uri(),
        max_depth: 2,
        max_pages: 10,
        allowed_hosts: vec![],
        respect_robots: true,
        concurrency: 4,
        user_agent: "docvector-test/0.1".to_string(),
        request_timeout_secs: 5,
        url_pattern: Some(format!("{}/docs/*", server.uri())),
    };

    let documents = crawler.crawl(&config).await.unwrap();
    let urls: Vec<&str> = documents.iter().map(|d| d.url.as_str()).collect();

    assert_eq!(documents.len(), 2);
    assert!(urls.iter().all(|u| u.contains("/docs/")));
    assert!(!urls.iter().any(|u| u.contains("/blog/")));
}
