//! Integration tests for the scrape pipeline
//!
//! These tests use wiremock to stand in for the site and exercise the full
//! discover-fetch-extract-store cycle end-to-end.

use hasznaltauto_scraper::config::ScrapeConfig;
use hasznaltauto_scraper::fetch::{HttpClient, PageFetcher};
use hasznaltauto_scraper::pipeline;
use hasznaltauto_scraper::robots::RobotsGate;
use hasznaltauto_scraper::storage::{SqliteStore, Store};
use std::sync::Arc;
use std::time::Instant;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Test configuration with pacing disabled
fn test_config(base_url: &str) -> ScrapeConfig {
    ScrapeConfig {
        base_url: base_url.trim_end_matches('/').to_string(),
        categories: vec!["szemelyauto".to_string()],
        max_pages: 3,
        max_listings: 50,
        delay_seconds: 0.0,
        jitter_seconds: 0.0,
        user_agent: "TestBot".to_string(),
        ..Default::default()
    }
}

/// Builds a browserless fetcher with a loaded robots gate
async fn build_fetcher(config: &ScrapeConfig) -> PageFetcher {
    let mut client = HttpClient::new(
        &config.user_agent,
        config.delay_seconds,
        config.jitter_seconds,
        config.timeout(),
    )
    .expect("client builds");

    let robots = Arc::new(RobotsGate::new(&config.base_url, &config.user_agent));
    robots.load(&mut client).await;
    client.set_robots(Arc::clone(&robots));

    PageFetcher::new(client, robots, None, false, false)
}

fn xml_response(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "application/xml")
}

fn html_response(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "text/html; charset=utf-8")
}

async fn mount_robots(server: &MockServer, content: &str) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(content.to_string()))
        .mount(server)
        .await;
}

fn detail_page(title: &str, price: &str, year: &str) -> String {
    format!(
        r#"<html><body>
        <h1>{}</h1>
        <div>{} Ft</div>
        <table>
            <tr><th>Évjárat</th><td>{}</td></tr>
            <tr><th>Üzemanyag</th><td>Benzin</td></tr>
        </table>
        </body></html>"#,
        title, price, year
    )
}

async fn mount_listing(server: &MockServer, route: &str, title: &str) {
    Mock::given(method("GET"))
        .and(path(route.to_string()))
        .respond_with(html_response(detail_page(title, "1 990 000", "2014/5")))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_scrape_via_sitemap() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_robots(&server, "User-agent: *\nAllow: /").await;

    let index = format!(
        r#"<?xml version="1.0"?><sitemapindex>
            <sitemap><loc>{}/sitemaps/cars.xml</loc></sitemap>
        </sitemapindex>"#,
        base
    );
    Mock::given(method("GET"))
        .and(path("/sitemap/sitemap_index.xml"))
        .respond_with(xml_response(index))
        .mount(&server)
        .await;

    let urlset = format!(
        r#"<?xml version="1.0"?><urlset>
            <url><loc>{base}/szemelyauto/opel/opel-astra-101</loc></url>
            <url><loc>{base}/szemelyauto/ford/ford-focus-102</loc></url>
            <url><loc>{base}/hirek/valami-cikk</loc></url>
        </urlset>"#,
        base = base
    );
    Mock::given(method("GET"))
        .and(path("/sitemaps/cars.xml"))
        .respond_with(xml_response(urlset))
        .mount(&server)
        .await;

    mount_listing(&server, "/szemelyauto/opel/opel-astra-101", "OPEL ASTRA").await;
    mount_listing(&server, "/szemelyauto/ford/ford-focus-102", "FORD FOCUS").await;

    let config = test_config(&base);
    let mut fetcher = build_fetcher(&config).await;
    let store = SqliteStore::open_in_memory().unwrap();

    let report = pipeline::run(&config, &mut fetcher, &store).await.unwrap();

    // The non-listing URL from the urlset must have been filtered out.
    assert_eq!(report.discovered, 2);
    assert_eq!(report.stored, 2);
    assert!(store.exists(101).unwrap());
    assert!(store.exists(102).unwrap());
    assert_eq!(store.count().unwrap(), 2);
}

#[tokio::test]
async fn test_max_listings_caps_discovery() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_robots(&server, "User-agent: *\nAllow: /").await;

    let index = format!(
        r#"<sitemapindex>
            <sitemap><loc>{base}/sitemaps/a.xml</loc></sitemap>
            <sitemap><loc>{base}/sitemaps/b.xml</loc></sitemap>
        </sitemapindex>"#,
        base = base
    );
    Mock::given(method("GET"))
        .and(path("/sitemap/sitemap_index.xml"))
        .respond_with(xml_response(index))
        .mount(&server)
        .await;

    // 5 category-matching leaves and 3 non-matching ones across two docs.
    let doc_a = format!(
        r#"<urlset>
            <url><loc>{base}/szemelyauto/auto-201</loc></url>
            <url><loc>{base}/hirek/cikk-egy</loc></url>
            <url><loc>{base}/szemelyauto/auto-202</loc></url>
            <url><loc>{base}/teherauto/kamion-997</loc></url>
        </urlset>"#,
        base = base
    );
    let doc_b = format!(
        r#"<urlset>
            <url><loc>{base}/kapcsolat</loc></url>
            <url><loc>{base}/szemelyauto/auto-203</loc></url>
            <url><loc>{base}/szemelyauto/auto-204</loc></url>
            <url><loc>{base}/szemelyauto/auto-205</loc></url>
        </urlset>"#,
        base = base
    );
    Mock::given(method("GET"))
        .and(path("/sitemaps/a.xml"))
        .respond_with(xml_response(doc_a))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sitemaps/b.xml"))
        .respond_with(xml_response(doc_b))
        .mount(&server)
        .await;

    for id in 201..=205 {
        mount_listing(&server, &format!("/szemelyauto/auto-{}", id), "AUTO").await;
    }

    let config = ScrapeConfig {
        max_listings: 3,
        ..test_config(&base)
    };
    let mut fetcher = build_fetcher(&config).await;
    let store = SqliteStore::open_in_memory().unwrap();

    let report = pipeline::run(&config, &mut fetcher, &store).await.unwrap();

    // Exactly the first three matching leaves, in document order.
    assert_eq!(report.discovered, 3);
    assert_eq!(report.stored, 3);
    assert!(store.exists(201).unwrap());
    assert!(store.exists(202).unwrap());
    assert!(store.exists(203).unwrap());
    assert!(!store.exists(204).unwrap());
}

#[tokio::test]
async fn test_sitemap_leaf_without_url_id_is_kept_and_keyed_by_embedded_code() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_robots(&server, "User-agent: *\nAllow: /").await;

    // The leaf carries no trailing numeric id; its identity only exists on
    // the page itself.
    let urlset = format!(
        "<urlset><url><loc>{}/szemelyauto/opel-astra</loc></url></urlset>",
        base
    );
    Mock::given(method("GET"))
        .and(path("/sitemap/sitemap_index.xml"))
        .respond_with(xml_response(urlset))
        .mount(&server)
        .await;

    let page = r#"<html><body>
        <h1>OPEL ASTRA</h1>
        <table><tr><th>Évjárat</th><td>2015</td></tr></table>
        <div><span>Hirdetéskód</span><span>88112233</span></div>
    </body></html>"#;
    Mock::given(method("GET"))
        .and(path("/szemelyauto/opel-astra"))
        .respond_with(html_response(page.to_string()))
        .mount(&server)
        .await;

    let config = test_config(&base);
    let mut fetcher = build_fetcher(&config).await;
    let store = SqliteStore::open_in_memory().unwrap();

    let report = pipeline::run(&config, &mut fetcher, &store).await.unwrap();

    assert_eq!(report.discovered, 1);
    assert_eq!(report.stored, 1);
    assert_eq!(report.discarded, 0);
    assert!(store.exists(88_112_233).unwrap());
}

#[tokio::test]
async fn test_resume_skips_existing() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_robots(&server, "User-agent: *\nAllow: /").await;

    let urlset = format!(
        r#"<urlset>
            <url><loc>{base}/szemelyauto/regi-auto-301</loc></url>
            <url><loc>{base}/szemelyauto/uj-auto-302</loc></url>
        </urlset>"#,
        base = base
    );
    Mock::given(method("GET"))
        .and(path("/sitemap/sitemap_index.xml"))
        .respond_with(xml_response(urlset))
        .mount(&server)
        .await;

    mount_listing(&server, "/szemelyauto/uj-auto-302", "UJ AUTO").await;
    // No mock for listing 301: a fetch for it would fail the test tallies.

    let config = test_config(&base);
    let mut fetcher = build_fetcher(&config).await;
    let store = SqliteStore::open_in_memory().unwrap();

    let mut existing =
        hasznaltauto_scraper::ListingRecord::new(&format!("{}/szemelyauto/regi-auto-301", base));
    existing.ad_id = Some(301);
    store.upsert(&existing).unwrap();

    let report = pipeline::run(&config, &mut fetcher, &store).await.unwrap();

    assert_eq!(report.skipped_existing, 1);
    assert_eq!(report.stored, 1);
    assert_eq!(report.fetch_failures, 0);
    assert_eq!(store.count().unwrap(), 2);
}

#[tokio::test]
async fn test_robots_disallow_blocks_detail_fetch() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_robots(&server, "User-agent: *\nDisallow: /szemelyauto").await;

    let urlset = format!(
        "<urlset><url><loc>{}/szemelyauto/tiltott-auto-401</loc></url></urlset>",
        base
    );
    Mock::given(method("GET"))
        .and(path("/sitemap/sitemap_index.xml"))
        .respond_with(xml_response(urlset))
        .mount(&server)
        .await;
    mount_listing(&server, "/szemelyauto/tiltott-auto-401", "TILTOTT").await;

    let config = test_config(&base);
    let mut fetcher = build_fetcher(&config).await;
    let store = SqliteStore::open_in_memory().unwrap();

    let report = pipeline::run(&config, &mut fetcher, &store).await.unwrap();

    // Discovery still lists the URL; the fetch layer refuses to touch it.
    assert_eq!(report.discovered, 1);
    assert_eq!(report.stored, 0);
    assert_eq!(report.fetch_failures, 1);
    assert_eq!(store.count().unwrap(), 0);
}

#[tokio::test]
async fn test_challenge_page_with_ok_status_is_not_stored() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_robots(&server, "User-agent: *\nAllow: /").await;

    let urlset = format!(
        "<urlset><url><loc>{}/szemelyauto/gyanus-auto-501</loc></url></urlset>",
        base
    );
    Mock::given(method("GET"))
        .and(path("/sitemap/sitemap_index.xml"))
        .respond_with(xml_response(urlset))
        .mount(&server)
        .await;

    // Status 200, but the body is a challenge page.
    Mock::given(method("GET"))
        .and(path("/szemelyauto/gyanus-auto-501"))
        .respond_with(html_response(
            "<html><body>Too Many Requests</body></html>".to_string(),
        ))
        .mount(&server)
        .await;

    let config = test_config(&base);
    let mut fetcher = build_fetcher(&config).await;
    let store = SqliteStore::open_in_memory().unwrap();

    let report = pipeline::run(&config, &mut fetcher, &store).await.unwrap();

    assert_eq!(report.stored, 0);
    assert_eq!(report.fetch_failures, 1);
}

#[tokio::test]
async fn test_category_crawl_fallback_with_pagination() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_robots(&server, "User-agent: *\nAllow: /").await;

    // No sitemap: the tree walk finds nothing and the category crawl kicks in.
    Mock::given(method("GET"))
        .and(path("/sitemap/sitemap_index.xml"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;

    // The page=2 mock is mounted first: wiremock answers with the first
    // mounted mock whose matchers all pass.
    // Page 2 links back to itself: the visited set must break the cycle.
    let page2 = format!(
        r#"<html><body>
            <a href="{base}/szemelyauto/ford/ford-focus-602">Ford Focus</a>
            <a href="/szemelyauto?page=2">2</a>
        </body></html>"#,
        base = base
    );
    Mock::given(method("GET"))
        .and(path("/szemelyauto"))
        .and(wiremock::matchers::query_param("page", "2"))
        .respond_with(html_response(page2))
        .mount(&server)
        .await;

    let landing = format!(
        r#"<html><body>
            <a href="{base}/szemelyauto/opel/opel-astra-601">Opel Astra</a>
            <a href="/szemelyauto?page=2">Következő oldal</a>
            <a href="https://other-site.example/szemelyauto/csali-999">külső</a>
        </body></html>"#,
        base = base
    );
    Mock::given(method("GET"))
        .and(path("/szemelyauto"))
        .respond_with(html_response(landing))
        .mount(&server)
        .await;

    mount_listing(&server, "/szemelyauto/opel/opel-astra-601", "OPEL ASTRA").await;
    mount_listing(&server, "/szemelyauto/ford/ford-focus-602", "FORD FOCUS").await;

    let config = test_config(&base);
    let mut fetcher = build_fetcher(&config).await;
    let store = SqliteStore::open_in_memory().unwrap();

    let report = pipeline::run(&config, &mut fetcher, &store).await.unwrap();

    // Both pages crawled, the off-site anchor ignored.
    assert_eq!(report.discovered, 2);
    assert_eq!(report.stored, 2);
    assert!(store.exists(601).unwrap());
    assert!(store.exists(602).unwrap());
}

#[tokio::test]
async fn test_rescrape_refreshes_record() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_robots(&server, "User-agent: *\nAllow: /").await;

    let urlset = format!(
        "<urlset><url><loc>{}/szemelyauto/friss-auto-701</loc></url></urlset>",
        base
    );
    Mock::given(method("GET"))
        .and(path("/sitemap/sitemap_index.xml"))
        .respond_with(xml_response(urlset))
        .mount(&server)
        .await;
    mount_listing(&server, "/szemelyauto/friss-auto-701", "FRISS AUTO").await;

    let config = ScrapeConfig {
        resume: false,
        ..test_config(&base)
    };
    let mut fetcher = build_fetcher(&config).await;
    let store = SqliteStore::open_in_memory().unwrap();

    let mut stale =
        hasznaltauto_scraper::ListingRecord::new(&format!("{}/szemelyauto/regi-url-701", base));
    stale.ad_id = Some(701);
    store.upsert(&stale).unwrap();

    let report = pipeline::run(&config, &mut fetcher, &store).await.unwrap();

    // resume is off, so the existing row is re-scraped and replaced.
    assert_eq!(report.stored, 1);
    assert_eq!(store.count().unwrap(), 1);
    assert_eq!(
        store.url_for(701).unwrap().unwrap(),
        format!("{}/szemelyauto/friss-auto-701", base)
    );
}

/// A store that refuses every write
struct RejectingStore;

impl Store for RejectingStore {
    fn exists(&self, _ad_id: i64) -> Result<bool, hasznaltauto_scraper::storage::StorageError> {
        Ok(false)
    }

    fn upsert(
        &self,
        record: &hasznaltauto_scraper::ListingRecord,
    ) -> Result<(), hasznaltauto_scraper::storage::StorageError> {
        Err(hasznaltauto_scraper::storage::StorageError::MissingAdId {
            url: record.url.clone(),
        })
    }

    fn count(&self) -> Result<i64, hasznaltauto_scraper::storage::StorageError> {
        Ok(0)
    }
}

#[tokio::test]
async fn test_store_failures_are_tallied_separately() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_robots(&server, "User-agent: *\nAllow: /").await;

    let urlset = format!(
        "<urlset><url><loc>{}/szemelyauto/makacs-auto-801</loc></url></urlset>",
        base
    );
    Mock::given(method("GET"))
        .and(path("/sitemap/sitemap_index.xml"))
        .respond_with(xml_response(urlset))
        .mount(&server)
        .await;
    mount_listing(&server, "/szemelyauto/makacs-auto-801", "MAKACS").await;

    let config = test_config(&base);
    let mut fetcher = build_fetcher(&config).await;

    let report = pipeline::run(&config, &mut fetcher, &RejectingStore)
        .await
        .unwrap();

    // The page itself fetched fine; only persistence failed.
    assert_eq!(report.stored, 0);
    assert_eq!(report.store_failures, 1);
    assert_eq!(report.fetch_failures, 0);
}

#[tokio::test]
async fn test_requests_are_spaced_by_the_delay() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .respond_with(html_response("<html><body>ok</body></html>".to_string()))
        .mount(&server)
        .await;

    let mut client = HttpClient::new("TestBot", 0.25, 0.0, std::time::Duration::from_secs(5))
        .expect("client builds");

    let start = Instant::now();
    let first = client.fetch(&format!("{}/a", base), true, true).await;
    let second = client.fetch(&format!("{}/b", base), true, true).await;
    let elapsed = start.elapsed();

    assert!(first.body.is_some());
    assert!(second.body.is_some());
    assert!(
        elapsed.as_secs_f64() >= 0.25,
        "requests were only {:?} apart",
        elapsed
    );
}
