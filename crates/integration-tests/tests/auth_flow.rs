//! Sign-up, login and logout against a running app.

#![allow(clippy::unwrap_used)]

use plant_health_integration_tests::{TEST_PASSWORD, TestApp, location};
use reqwest::StatusCode;

#[tokio::test]
async fn test_dashboard_requires_login() {
    let app = TestApp::spawn().await;

    for path in ["/app/home", "/app/history", "/app/treatment-guide"] {
        let resp = app.get(path).await;
        assert!(resp.status().is_redirection(), "{path} should redirect");
        assert_eq!(location(&resp), "/auth/login");
    }
}

#[tokio::test]
async fn test_root_redirects_to_home() {
    let app = TestApp::spawn().await;

    let resp = app.get("/").await;
    assert!(resp.status().is_redirection());
    assert_eq!(location(&resp), "/app/home");
}

#[tokio::test]
async fn test_register_login_logout() {
    let app = TestApp::spawn().await;
    app.register_and_login("grower").await;

    let resp = app.get("/app/home").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.unwrap();
    assert!(body.contains("Logged in as"));
    assert!(body.contains("grower"));
    assert!(body.contains("Offline"));

    let resp = app.post_form("/auth/logout", &[]).await;
    assert_eq!(location(&resp), "/auth/login?success=logged_out");

    let resp = app.get("/app/home").await;
    assert_eq!(location(&resp), "/auth/login");
}

#[tokio::test]
async fn test_login_page_shows_registration_notice() {
    let app = TestApp::spawn().await;

    let body = app
        .get("/auth/login?success=registered")
        .await
        .text()
        .await
        .unwrap();
    assert!(body.contains("Account created successfully! Please login."));
}

#[tokio::test]
async fn test_wrong_password_is_rejected() {
    let app = TestApp::spawn().await;
    app.register_and_login("grower").await;
    app.post_form("/auth/logout", &[]).await;

    let resp = app
        .post_form(
            "/auth/login",
            &[("username", "grower"), ("password", "not-the-password")],
        )
        .await;
    assert_eq!(location(&resp), "/auth/login?error=credentials");

    let body = app
        .get("/auth/login?error=credentials")
        .await
        .text()
        .await
        .unwrap();
    assert!(body.contains("Invalid username or password"));
}

#[tokio::test]
async fn test_duplicate_username_is_rejected() {
    let app = TestApp::spawn().await;
    app.register_and_login("grower").await;

    let resp = app
        .post_form(
            "/auth/register",
            &[
                ("username", "grower"),
                ("email", "other@example.com"),
                ("password", TEST_PASSWORD),
                ("password_confirm", TEST_PASSWORD),
            ],
        )
        .await;
    assert_eq!(location(&resp), "/auth/register?error=exists");
}

#[tokio::test]
async fn test_registration_validation_errors() {
    let app = TestApp::spawn().await;

    let cases = [
        ("grower", "grower@example.com", "secret1", "secret2", "mismatch"),
        ("grower", "grower@example.com", "abc", "abc", "weak"),
        ("grower", "not-an-email", "secret1", "secret1", "invalid_email"),
    ];

    for (username, email, password, confirm, code) in cases {
        let resp = app
            .post_form(
                "/auth/register",
                &[
                    ("username", username),
                    ("email", email),
                    ("password", password),
                    ("password_confirm", confirm),
                ],
            )
            .await;
        assert_eq!(location(&resp), format!("/auth/register?error={code}"));
    }
}
