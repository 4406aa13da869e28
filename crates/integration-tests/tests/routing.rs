//! URL generation per deployment, health checks and static assets.

use axum::http::StatusCode;
use roster_integration_tests::TestContext;

#[tokio::test]
async fn test_docker_links_are_root_relative() {
    let ctx = TestContext::with_env(&[("BASE_PATH", "/sub")]).await;

    let html = ctx.server.get("/test").await.text();
    assert!(html.contains(r#"href="/test""#));
    assert!(html.contains(r#"href="/static/style.css""#));
}

#[tokio::test]
async fn test_lolipop_links_carry_base_path() {
    let ctx = TestContext::with_env(&[
        ("ENV_TYPE", "lolipop-test"),
        ("BASE_PATH", "/sub/"),
        ("SCRIPT_NAME", "/index.cgi"),
    ])
    .await;

    let response = ctx.server.get("/test").await;
    response.assert_status_ok();

    let html = response.text();
    assert!(html.contains(r#"href="/sub/test""#));
    assert!(html.contains(r#"href="/sub/""#));
    assert!(html.contains(r#"href="/sub/static/style.css""#));
    assert!(!html.contains("index.cgi"));
}

#[tokio::test]
async fn test_health_endpoints() {
    let ctx = TestContext::new().await;

    let response = ctx.server.get("/health").await;
    response.assert_status_ok();
    response.assert_text("ok");

    ctx.server.get("/health/ready").await.assert_status_ok();
}

#[tokio::test]
async fn test_readiness_fails_once_pool_is_closed() {
    let ctx = TestContext::new().await;
    ctx.state.database().close().await;

    let response = ctx.server.get("/health/ready").await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    assert!(response.text().contains("database"));

    ctx.server.get("/health").await.assert_status_ok();
}

#[tokio::test]
async fn test_static_assets_are_served() {
    let ctx = TestContext::new().await;

    let response = ctx.server.get("/static/style.css").await;
    response.assert_status_ok();
    assert!(response.text().contains(".flash"));
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let ctx = TestContext::new().await;

    ctx.server
        .get("/nope")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let ctx = TestContext::new().await;

    let response = ctx.server.get("/health").await;
    assert!(!response.header("x-request-id").is_empty());
}
