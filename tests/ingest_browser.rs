#![cfg(feature = "browser")]

use jobboard::{
    config::{DriverKind, ScrapeConfig},
    driver::ChromeLauncher,
    ingest::{IngestSettings, StopReason, run_ingestion},
    repositories::InMemoryJobStore,
};
use std::time::Duration;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

fn card(id: u32) -> String {
    format!(
        r#"<div class="Job_job-card__YgDAV">
             <p class="Job_job-card__position__ic1rc">Actuary {id}</p>
             <p class="Job_job-card__company__7T9qY">Acme Re</p>
             <a class="Job_job-page-link__a5I5g" href="/job/{id}"></a>
           </div>"#
    )
}

async fn mount_page(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(body, "text/html; charset=utf-8")
                .insert_header("Content-Type", "text/html; charset=utf-8"),
        )
        .mount(server)
        .await;
}

fn chrome_enabled() -> bool {
    if std::env::var("CHROME_TESTS").is_err() {
        eprintln!("Skipping browser tests: CHROME_TESTS not set");
        return false;
    }
    true
}

#[tokio::test]
async fn test_script_driven_pager_is_followed_in_browser() {
    if !chrome_enabled() {
        return;
    }
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        format!(
            r#"<html><body>{}{}
                 <button type="button" onclick="window.location.href='/page/2'">Next</button>
               </body></html>"#,
            card(1),
            card(2),
        ),
    )
    .await;
    mount_page(
        &server,
        "/page/2",
        format!(
            "<html><body>{}<button disabled>Next</button></body></html>",
            card(3)
        ),
    )
    .await;

    let config = ScrapeConfig {
        source_url: format!("{}/", server.uri()),
        max_jobs: 50,
        wait_timeout: Duration::from_secs(10),
        page_delay: Duration::ZERO,
        poll_interval: Duration::from_millis(100),
        user_agent: "jobboard-test/1.0".to_string(),
        driver: DriverKind::Chrome,
    };
    let settings = IngestSettings::from_config(&config);
    let launcher = ChromeLauncher::new(config);
    let store = InMemoryJobStore::new();

    let summary = run_ingestion(&launcher, &store, &settings, None)
        .await
        .unwrap();

    assert_eq!(summary.stop_reason, StopReason::NoMorePages);
    assert_eq!(summary.pages_visited, 2);
    assert_eq!(summary.scraped_count, 3);
}
