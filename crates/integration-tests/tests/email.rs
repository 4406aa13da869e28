//! Send-email form.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use axum::http::StatusCode;
use roster_integration_tests::{RecordingNotifier, TestContext};

#[tokio::test]
async fn test_email_is_sent_to_configured_notifier() {
    let notifier = Arc::new(RecordingNotifier::default());
    let ctx = TestContext::with_notifier(notifier.clone()).await;

    assert!(ctx.index_html().await.contains(r#"name="subject""#));

    ctx.post_form("/send_email", &[("subject", "Hello"), ("body", "First line\nSecond")])
        .await
        .assert_status(StatusCode::SEE_OTHER);

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject(), "Hello");
    assert_eq!(sent[0].body(), "First line\nSecond");
    assert!(ctx.index_html().await.contains("メールを送信しました。"));
}

#[tokio::test]
async fn test_missing_fields_are_rejected_before_sending() {
    let notifier = Arc::new(RecordingNotifier::default());
    let ctx = TestContext::with_notifier(notifier.clone()).await;

    ctx.post_form("/send_email", &[("subject", ""), ("body", "text")])
        .await;

    assert!(notifier.sent().is_empty());
    assert!(ctx.index_html().await.contains("件名と本文を入力してください。"));
}

#[tokio::test]
async fn test_send_failure_shows_generic_error() {
    let ctx = TestContext::with_notifier(Arc::new(RecordingNotifier::failing())).await;

    ctx.post_form("/send_email", &[("subject", "Hi"), ("body", "there")])
        .await;

    assert!(ctx.index_html().await.contains("メール送信に失敗しました。"));
}

#[tokio::test]
async fn test_email_form_hidden_without_smtp() {
    let ctx = TestContext::new().await;

    assert!(!ctx.index_html().await.contains(r#"name="subject""#));

    ctx.post_form("/send_email", &[("subject", "Hi"), ("body", "there")])
        .await;
    assert!(ctx.index_html().await.contains("メール送信は設定されていません。"));
}
