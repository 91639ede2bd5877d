//! Proxy routing and dispatch against live mock backends.

use indexmap::IndexMap;
use site_serve::config::{Credential, ProxyOptions, ProxyTargetConfig, SiteConfig};

mod common;

fn url(addr: std::net::SocketAddr) -> url::Url {
    format!("http://{addr}").parse().unwrap()
}

fn site() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "static home").unwrap();
    dir
}

#[tokio::test]
async fn test_first_registered_prefix_wins() {
    let (a, _) = common::start_echo_backend("A").await;
    let (b, _) = common::start_echo_backend("B").await;

    let mut config = SiteConfig::default();
    config.proxies.insert("/api".into(), ProxyTargetConfig::Url(url(a)));
    config.proxies.insert("/".into(), ProxyTargetConfig::Url(url(b)));
    let (addr, shutdown) = common::start_server(config).await;
    let client = common::client();

    let body = client
        .get(format!("http://{addr}/api/x?q=1"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "A /api/x?q=1");

    let body = client
        .get(format!("http://{addr}/other"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "B /other");

    shutdown.trigger();
}

#[tokio::test]
async fn test_unmatched_paths_fall_through_to_static() {
    let (a, _) = common::start_echo_backend("A").await;
    let dir = site();

    let mut config = SiteConfig::default();
    config.serve.public = dir.path().to_path_buf();
    config.proxies.insert("/api".into(), ProxyTargetConfig::Url(url(a)));
    let (addr, shutdown) = common::start_server(config).await;
    let client = common::client();

    let res = client.get(format!("http://{addr}/")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "static home");

    let res = client.get(format!("http://{addr}/missing")).send().await.unwrap();
    assert_eq!(res.status(), 404);
    assert_eq!(res.text().await.unwrap(), "Not Found");

    shutdown.trigger();
}

#[tokio::test]
async fn test_target_options_rewrite_and_headers() {
    let (backend, seen) = common::start_echo_backend("A").await;

    let mut path_rewrite = IndexMap::new();
    path_rewrite.insert("^/auth".to_string(), String::new());
    let mut headers = IndexMap::new();
    headers.insert("x-from".to_string(), "site-serve".to_string());

    let mut config = SiteConfig::default();
    config.proxies.insert(
        "/auth".into(),
        ProxyTargetConfig::Options(ProxyOptions {
            target: format!("http://{backend}/v1").parse().unwrap(),
            change_origin: false,
            path_rewrite,
            headers,
        }),
    );
    let (addr, shutdown) = common::start_server(config).await;

    let body = common::client()
        .get(format!("http://{addr}/auth/login"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "A /v1/login");

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].header("x-from"), Some("site-serve"));
    assert_eq!(seen[0].header("host"), Some(addr.to_string().as_str()));
    assert_eq!(seen[0].header("x-forwarded-for"), Some("127.0.0.1"));

    shutdown.trigger();
}

#[tokio::test]
async fn test_bare_url_changes_origin() {
    let (backend, seen) = common::start_echo_backend("A").await;

    let mut config = SiteConfig::default();
    config.proxies.insert("/api".into(), ProxyTargetConfig::Url(url(backend)));
    let (addr, shutdown) = common::start_server(config).await;

    let res = common::client()
        .get(format!("http://{addr}/api"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen[0].header("host"), Some(backend.to_string().as_str()));

    shutdown.trigger();
}

#[tokio::test]
async fn test_unreachable_upstream_is_bad_gateway() {
    let dead = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };

    let mut config = SiteConfig::default();
    config.proxies.insert("/api".into(), ProxyTargetConfig::Url(url(dead)));
    let (addr, shutdown) = common::start_server(config).await;

    let res = common::client()
        .get(format!("http://{addr}/api/x"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 502);

    shutdown.trigger();
}

#[tokio::test]
async fn test_proxied_paths_are_access_controlled() {
    let (backend, seen) = common::start_echo_backend("A").await;

    let mut config = SiteConfig::default();
    config.access.users = Some(vec![Credential::new("vip", "123123")]);
    config.proxies.insert("/api".into(), ProxyTargetConfig::Url(url(backend)));
    let (addr, shutdown) = common::start_server(config).await;
    let client = common::client();

    let res = client.get(format!("http://{addr}/api/x")).send().await.unwrap();
    assert_eq!(res.status(), 401);
    assert!(seen.lock().unwrap().is_empty());

    let res = client
        .get(format!("http://{addr}/api/x"))
        .basic_auth("vip", Some("123123"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(seen.lock().unwrap().len(), 1);

    shutdown.trigger();
}

#[tokio::test]
async fn test_concurrent_requests_get_independent_verdicts() {
    let (backend, _) = common::start_echo_backend("A").await;

    let mut config = SiteConfig::default();
    config.access.users = Some(vec![Credential::new("vip", "123123")]);
    config.proxies.insert("/".into(), ProxyTargetConfig::Url(url(backend)));
    let (addr, shutdown) = common::start_server(config).await;
    let client = common::client();

    let mut handles = Vec::new();
    for i in 0..40 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            let req = client.get(format!("http://{addr}/r{i}"));
            let req = if i % 2 == 0 {
                req.basic_auth("vip", Some("123123"))
            } else {
                req
            };
            (i, req.send().await.unwrap().status().as_u16())
        }));
    }

    for handle in handles {
        let (i, status) = handle.await.unwrap();
        let expected = if i % 2 == 0 { 200 } else { 401 };
        assert_eq!(status, expected, "request {i}");
    }

    shutdown.trigger();
}
