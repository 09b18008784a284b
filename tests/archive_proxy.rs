//! Archive proxy behaviour against a scripted archive.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

mod common;
use common::{
    client, raw_get, start_mock_backend, start_programmable_backend, start_proxy,
    start_reloadable_proxy, test_config, MockReply,
};

const QUERY: &str = "query=select+pl_name+from+ps+where+default_flag=1&format=json";

#[tokio::test]
async fn test_miss_then_hit_serves_identical_body() {
    let archive = start_mock_backend(MockReply::json(200, r#"[{"pl_name":"Kepler-22 b"}]"#)).await;
    let mut config = test_config();
    config.archive.base_url = archive.url("/TAP/sync");
    let proxy = start_proxy(config).await;
    let client = client();

    let first = client.get(proxy.url(&format!("/api/exoplanets?{}", QUERY))).send().await.unwrap();
    assert_eq!(first.status(), 200);
    assert_eq!(first.headers()["x-cache"], "MISS");
    assert_eq!(first.headers()["content-type"], "application/json");
    assert_eq!(
        first.headers()["cache-control"],
        "s-maxage=300, stale-while-revalidate=60"
    );
    let first_body = first.bytes().await.unwrap();

    let second = client.get(proxy.url(&format!("/api/exoplanets?{}", QUERY))).send().await.unwrap();
    assert_eq!(second.status(), 200);
    assert_eq!(second.headers()["x-cache"], "HIT");
    assert_eq!(second.headers()["content-type"], "application/json");
    let second_body = second.bytes().await.unwrap();

    assert_eq!(first_body, second_body);
    assert_eq!(archive.hits(), 1, "second request must not reach the archive");
}

#[tokio::test]
async fn test_query_forwarded_verbatim_with_allowed_headers() {
    let archive = start_mock_backend(MockReply::json(200, "[]")).await;
    let mut config = test_config();
    config.archive.base_url = archive.url("/TAP/sync");
    let proxy = start_proxy(config).await;

    let res = client()
        .get(proxy.url(&format!("/api/exoplanets?{}", QUERY)))
        .header("accept", "application/json")
        .header("user-agent", "planet-browser/2.0")
        .header("cookie", "session=secret")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let seen = archive.last_request();
    assert_eq!(seen.method, "GET");
    assert_eq!(seen.target, format!("/TAP/sync?{}", QUERY));
    assert_eq!(seen.header("accept"), Some("application/json"));
    assert_eq!(seen.header("user-agent"), Some("planet-browser/2.0"));
    assert_eq!(seen.header("cookie"), None);
}

#[tokio::test]
async fn test_default_user_agent_when_client_sends_none() {
    let archive = start_mock_backend(MockReply::json(200, "[]")).await;
    let mut config = test_config();
    config.archive.base_url = archive.url("/TAP/sync");
    let proxy = start_proxy(config).await;

    // reqwest sends no user-agent unless asked to.
    client().get(proxy.url("/api/exoplanets?format=json")).send().await.unwrap();

    let ua = archive.last_request().header("user-agent").map(str::to_owned);
    assert!(ua.unwrap_or_default().starts_with("exoplanet-proxy/"));
}

#[tokio::test]
async fn test_upstream_cache_control_is_kept() {
    let archive =
        start_mock_backend(MockReply::json(200, "[]").header("Cache-Control", "max-age=10")).await;
    let mut config = test_config();
    config.archive.base_url = archive.url("/TAP/sync");
    let proxy = start_proxy(config).await;
    let client = client();

    let miss = client.get(proxy.url("/api/exoplanets?q=1")).send().await.unwrap();
    assert_eq!(miss.headers()["cache-control"], "max-age=10");
    miss.bytes().await.unwrap();

    let hit = client.get(proxy.url("/api/exoplanets?q=1")).send().await.unwrap();
    assert_eq!(hit.headers()["x-cache"], "HIT");
    assert_eq!(hit.headers()["cache-control"], "max-age=10");
}

#[tokio::test]
async fn test_entry_expires_after_ttl() {
    let archive = start_mock_backend(MockReply::json(200, "[]")).await;
    let mut config = test_config();
    config.archive.base_url = archive.url("/TAP/sync");
    config.archive.cache_ttl_secs = 1;
    let proxy = start_proxy(config).await;
    let client = client();

    let first = client.get(proxy.url("/api/exoplanets?q=ttl")).send().await.unwrap();
    first.bytes().await.unwrap();
    let hit = client.get(proxy.url("/api/exoplanets?q=ttl")).send().await.unwrap();
    assert_eq!(hit.headers()["x-cache"], "HIT");

    tokio::time::sleep(Duration::from_millis(1200)).await;

    let expired = client.get(proxy.url("/api/exoplanets?q=ttl")).send().await.unwrap();
    assert_eq!(expired.headers()["x-cache"], "MISS");
    expired.bytes().await.unwrap();
    assert_eq!(archive.hits(), 2);
}

#[tokio::test]
async fn test_distinct_queries_are_distinct_entries() {
    let archive = start_mock_backend(MockReply::json(200, "[]")).await;
    let mut config = test_config();
    config.archive.base_url = archive.url("/TAP/sync");
    let proxy = start_proxy(config).await;
    let client = client();

    for query in ["a=1&b=2", "b=2&a=1", "a=%31&b=2"] {
        let res = client.get(proxy.url(&format!("/api/exoplanets?{}", query))).send().await.unwrap();
        assert_eq!(res.headers()["x-cache"], "MISS", "query {query} must not share an entry");
        res.bytes().await.unwrap();
    }
    assert_eq!(archive.hits(), 3);
}

#[tokio::test]
async fn test_non_success_relayed_and_not_cached() {
    let archive = start_mock_backend(MockReply::text(400, "ERROR: bad ADQL")).await;
    let mut config = test_config();
    config.archive.base_url = archive.url("/TAP/sync");
    let proxy = start_proxy(config).await;
    let client = client();

    for _ in 0..2 {
        let res = client.get(proxy.url("/api/exoplanets?query=selec")).send().await.unwrap();
        assert_eq!(res.status(), 400);
        assert_eq!(res.headers()["x-cache"], "MISS");
        assert_eq!(res.text().await.unwrap(), "ERROR: bad ADQL");
    }
    assert_eq!(archive.hits(), 2);
}

#[tokio::test]
async fn test_head_request_populates_cache() {
    let archive = start_mock_backend(MockReply::json(200, r#"{"rows":1}"#)).await;
    let mut config = test_config();
    config.archive.base_url = archive.url("/TAP/sync");
    let proxy = start_proxy(config).await;
    let client = client();

    let head = client.head(proxy.url("/api/exoplanets?q=head")).send().await.unwrap();
    assert_eq!(head.status(), 200);
    assert_eq!(head.headers()["x-cache"], "MISS");
    assert_eq!(archive.last_request().method, "GET");

    let get = client.get(proxy.url("/api/exoplanets?q=head")).send().await.unwrap();
    assert_eq!(get.headers()["x-cache"], "HIT");
    assert_eq!(get.text().await.unwrap(), r#"{"rows":1}"#);
    assert_eq!(archive.hits(), 1);
}

#[tokio::test]
async fn test_method_not_allowed() {
    let proxy = start_proxy(test_config()).await;

    let res = client().post(proxy.url("/api/exoplanets?q=1")).send().await.unwrap();
    assert_eq!(res.status(), 405);
    assert_eq!(res.headers()["allow"], "GET, HEAD");
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "MethodNotAllowed");
}

#[tokio::test]
async fn test_missing_query() {
    let archive = start_mock_backend(MockReply::json(200, "[]")).await;
    let mut config = test_config();
    config.archive.base_url = archive.url("/TAP/sync");
    let proxy = start_proxy(config).await;
    let client = client();

    for path in ["/api/exoplanets", "/api/exoplanets?"] {
        let res = client.get(proxy.url(path)).send().await.unwrap();
        assert_eq!(res.status(), 400);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["error"], "MissingQuery");
        assert!(body["message"].as_str().unwrap().contains("query"));
    }
    assert_eq!(archive.hits(), 0);
}

#[tokio::test]
async fn test_unreachable_archive_is_bad_gateway() {
    let proxy = start_proxy(test_config()).await;

    let res = client().get(proxy.url("/api/exoplanets?q=1")).send().await.unwrap();
    assert_eq!(res.status(), 502);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "UpstreamError");
}

#[tokio::test]
async fn test_slow_archive_times_out() {
    let archive =
        start_mock_backend(MockReply::json(200, "[]").delayed(Duration::from_secs(3))).await;
    let mut config = test_config();
    config.archive.base_url = archive.url("/TAP/sync");
    config.timeouts.upstream_secs = 1;
    let proxy = start_proxy(config).await;

    let res = client().get(proxy.url("/api/exoplanets?q=slow")).send().await.unwrap();
    assert_eq!(res.status(), 502);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "UpstreamError");
}

#[tokio::test]
async fn test_quoted_adql_is_escaped_upstream_and_keyed_raw() {
    let archive = start_mock_backend(MockReply::json(200, r#"[{"pl_name":"Kepler-22 b"}]"#)).await;
    let mut config = test_config();
    config.archive.base_url = archive.url("/TAP/sync");
    let proxy = start_proxy(config).await;
    let target = "/api/exoplanets?query=select+*+from+ps+where+pl_name='Kepler-22+b'&format=json";

    let (status, head) = raw_get(proxy.addr, target).await;
    assert_eq!(status, 200);
    assert!(head.contains("x-cache: miss"), "{head}");
    // The URL parser escapes quotes in https/http queries; the archive decodes both forms.
    assert_eq!(
        archive.last_request().target,
        "/TAP/sync?query=select+*+from+ps+where+pl_name=%27Kepler-22+b%27&format=json"
    );

    let (status, head) = raw_get(proxy.addr, target).await;
    assert_eq!(status, 200);
    assert!(head.contains("x-cache: hit"), "{head}");
    assert_eq!(archive.hits(), 1);
}

#[tokio::test]
async fn test_dropped_upstream_stream_aborts_and_is_not_cached() {
    let full = r#"[{"pl_name":"Kepler-22 b"}]"#;
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    let archive = start_programmable_backend(move |_| {
        if seen.fetch_add(1, Ordering::SeqCst) == 0 {
            MockReply::json(200, r#"[{"pl_name":"#).truncated(4096)
        } else {
            MockReply::json(200, full)
        }
    })
    .await;
    let mut config = test_config();
    config.archive.base_url = archive.url("/TAP/sync");
    let proxy = start_proxy(config).await;
    let client = client();
    let url = proxy.url("/api/exoplanets?q=dropped");

    // Either the head never arrives or the body ends in an error; never a clean reply.
    let aborted = match client.get(&url).send().await {
        Ok(res) => {
            assert_eq!(res.status(), 200);
            res.bytes().await.is_err()
        }
        Err(_) => true,
    };
    assert!(aborted, "truncated upstream body must abort the client connection");

    let retry = client.get(&url).send().await.unwrap();
    assert_eq!(retry.headers()["x-cache"], "MISS");
    assert_eq!(retry.text().await.unwrap(), full);

    let hit = client.get(&url).send().await.unwrap();
    assert_eq!(hit.headers()["x-cache"], "HIT");
    assert_eq!(hit.text().await.unwrap(), full);
    assert_eq!(archive.hits(), 2);
}

#[tokio::test]
async fn test_reload_cannot_outgrow_running_request_timeout() {
    let archive =
        start_mock_backend(MockReply::json(200, "[]").delayed(Duration::from_millis(2500))).await;
    let mut config = test_config();
    config.archive.base_url = archive.url("/TAP/sync");
    config.timeouts.upstream_secs = 1;
    config.timeouts.request_secs = 2;
    let (proxy, reload) = start_reloadable_proxy(config.clone()).await;

    let mut reloaded = config;
    reloaded.timeouts.upstream_secs = 4;
    reloaded.timeouts.request_secs = 5;
    reload.send(reloaded).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    // The 1s upstream deadline is still in force, so the archive call fails first.
    let res = client().get(proxy.url("/api/exoplanets?q=reload")).send().await.unwrap();
    assert_eq!(res.status(), 502);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "UpstreamError");
}
