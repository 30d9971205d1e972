//! Login flows: snapshot the guest cart, authenticate, merge.

#![allow(clippy::unwrap_used)]

use reqwest::Method;
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::json;

use tote_client::storage::MemoryStorage;
use tote_client::{CartStore, GatewayError, LoginMethod, SessionError, SessionState};
use tote_core::{CartLine, LineKey};
use tote_integration_tests::{CannedResponse, MockBackend, auth_ok};

fn mug(quantity: u32) -> CartLine {
    CartLine::new("mug", "Mug", Decimal::new(1200, 2), quantity)
}

fn tee(quantity: u32) -> CartLine {
    CartLine::new("tee", "Tee", Decimal::new(2500, 2), quantity).with_size("m", Some("M".to_string()))
}

fn password_login() -> LoginMethod {
    LoginMethod::password("ann@example.com", SecretString::from("hunter22")).unwrap()
}

#[tokio::test]
async fn test_login_merges_snapshot_into_post_login_cart() {
    let backend = MockBackend::builder()
        .route(Method::POST, "/api/auth/login", CannedResponse::json(200, &auth_ok("tok-1")))
        .route(Method::GET, "/api/orders", CannedResponse::json(200, &json!([])))
        .start()
        .await
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let client = backend.client(dir.path());
    let session = client.reconciler();

    let mut cart = client.open_cart();
    cart.add_to_cart(mug(1));
    let pending = session.begin(&cart).unwrap();

    // The store is reset and repopulated while the login is in flight.
    cart.clear_cart();
    cart.add_to_cart(tee(2));

    let outcome = session.complete(pending, password_login(), &mut cart).await.unwrap();

    assert_eq!(outcome.user.email, "ann@example.com");
    assert_eq!(outcome.merged_lines, 1);
    assert_eq!(outcome.snapshot_items, 1);
    assert_eq!(outcome.cart_total_items, 3);
    assert_eq!(cart.len(), 2);
    assert_eq!(cart.find(&LineKey::new("tee", Some("m".into()))).unwrap().quantity, 2);
    assert_eq!(cart.find(&LineKey::new("mug", None)).unwrap().quantity, 1);
    assert!(matches!(session.state(), SessionState::Authenticated(ref user) if user.name.as_deref() == Some("Ann")));

    // The merged cart was persisted.
    assert_eq!(client.open_cart().lines(), cart.lines());

    // Later calls present the new credential.
    client.api().gateway().get("/orders").await.unwrap();
    let login = &backend.requests_to("/api/auth/login")[0];
    assert_eq!(login.header("authorization"), None);
    assert_eq!(login.json(), Some(json!({"email": "ann@example.com", "password": "hunter22"})));
    assert_eq!(
        backend.requests_to("/api/orders")[0].header("authorization"),
        Some("Bearer tok-1")
    );
}

#[tokio::test]
async fn test_login_sums_quantities_of_matching_lines() {
    let backend = MockBackend::builder()
        .route(Method::POST, "/api/auth/login", CannedResponse::json(200, &auth_ok("tok")))
        .start()
        .await
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let client = backend.client(dir.path());

    let mut guest = client.open_cart();
    guest.add_to_cart(mug(2));
    let pending = client.reconciler().begin(&guest).unwrap();

    // The account's own cart already holds a mug.
    let mut account = CartStore::open(MemoryStorage::new(), client.config().cart_options());
    account.add_to_cart(mug(1));

    let outcome = client
        .reconciler()
        .complete(pending, password_login(), &mut account)
        .await
        .unwrap();

    assert_eq!(account.len(), 1);
    assert_eq!(account.lines()[0].quantity, 3);
    assert_eq!(account.total_price(), Decimal::new(3600, 2));
    assert_eq!(outcome.snapshot_items, 2);
    assert_eq!(outcome.cart_total_items, 3);
}

#[tokio::test]
async fn test_rejected_login_changes_nothing() {
    let backend = MockBackend::builder()
        .route(
            Method::POST,
            "/api/auth/login",
            CannedResponse::json(401, &json!({"success": false, "message": "Invalid email or password"})),
        )
        .start()
        .await
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let client = backend.client(dir.path());

    let mut cart = client.open_cart();
    cart.add_to_cart(mug(1));
    let before = cart.lines().to_vec();

    let pending = client.reconciler().begin(&cart).unwrap();
    let err = client
        .reconciler()
        .complete(pending, password_login(), &mut cart)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SessionError::Rejected { status: Some(401), ref message } if message == "Invalid email or password"
    ));
    assert_eq!(client.reconciler().state(), SessionState::Anonymous);
    assert!(!client.tokens().is_authenticated());
    assert_eq!(cart.lines(), before.as_slice());
    assert_eq!(client.open_cart().lines(), before.as_slice());

    // The caller can start over.
    assert!(client.reconciler().begin(&cart).is_ok());
}

#[tokio::test]
async fn test_unsuccessful_reply_with_ok_status_is_a_rejection() {
    let backend = MockBackend::builder()
        .route(
            Method::POST,
            "/api/auth/otp/verify",
            CannedResponse::json(200, &json!({"success": false, "message": "Invalid or expired OTP"})),
        )
        .start()
        .await
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let client = backend.client(dir.path());
    let mut cart = client.open_cart();

    let pending = client.reconciler().begin(&cart).unwrap();
    let method = LoginMethod::otp("ann@example.com", "000000").unwrap();
    let err = client
        .reconciler()
        .complete(pending, method, &mut cart)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SessionError::Rejected { status: None, ref message } if message == "Invalid or expired OTP"
    ));
    assert!(!client.tokens().is_authenticated());
}

#[tokio::test]
async fn test_html_during_login_leaves_cart_and_session_unchanged() {
    let backend = MockBackend::builder()
        .route(
            Method::POST,
            "/api/auth/login",
            CannedResponse::html(502, "<html><body>Bad Gateway</body></html>"),
        )
        .start()
        .await
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let client = backend.client(dir.path());

    let mut cart = client.open_cart();
    cart.add_to_cart(tee(1));
    let pending = client.reconciler().begin(&cart).unwrap();

    let err = client
        .reconciler()
        .complete(pending, password_login(), &mut cart)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SessionError::Gateway(GatewayError::UnexpectedResponse { status: 502, .. })
    ));
    assert_eq!(client.reconciler().state(), SessionState::Anonymous);
    assert_eq!(cart.total_items(), 1);
}

#[tokio::test]
async fn test_otp_flow() {
    let backend = MockBackend::builder()
        .route(
            Method::POST,
            "/api/auth/otp/send",
            CannedResponse::json(200, &json!({"success": true, "message": "OTP sent to your email"})),
        )
        .route(Method::POST, "/api/auth/otp/verify", CannedResponse::json(200, &auth_ok("otp-tok")))
        .start()
        .await
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let client = backend.client(dir.path());
    client.open_cart().add_to_cart(mug(1));

    let email = tote_core::Email::parse("ann@example.com").unwrap();
    let sent = client.api().send_otp(&email).await.unwrap();
    assert!(sent.success);

    let method = LoginMethod::otp("ann@example.com", "123456").unwrap();
    let outcome = client.login(method).await.unwrap();

    assert_eq!(
        backend.requests_to("/api/auth/otp/verify")[0].json(),
        Some(json!({"email": "ann@example.com", "otp": "123456"}))
    );
    assert_eq!(client.tokens().bearer().as_deref(), Some("otp-tok"));
    assert_eq!(outcome.cart_total_items, 1);
    assert_eq!(client.open_cart().total_items(), 1);
}

#[tokio::test]
async fn test_google_and_register_exchanges() {
    let backend = MockBackend::builder()
        .route(Method::POST, "/api/auth/google", CannedResponse::json(200, &auth_ok("g-tok")))
        .route(Method::POST, "/api/auth/register", CannedResponse::json(201, &auth_ok("r-tok")))
        .start()
        .await
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let client = backend.client(dir.path());
    let session = client.reconciler();
    let mut cart = client.open_cart();

    let pending = session.begin(&cart).unwrap();
    let method = LoginMethod::google("ann@gmail.com", "Ann", "g-123").unwrap();
    session.complete(pending, method, &mut cart).await.unwrap();
    assert_eq!(
        backend.requests_to("/api/auth/google")[0].json(),
        Some(json!({"email": "ann@gmail.com", "name": "Ann", "googleId": "g-123"}))
    );

    session.logout().unwrap();
    assert!(!client.tokens().is_authenticated());

    let pending = session.begin(&cart).unwrap();
    let method = LoginMethod::register("Ann", "ann@example.com", SecretString::from("hunter22")).unwrap();
    session.complete(pending, method, &mut cart).await.unwrap();
    assert_eq!(client.tokens().bearer().as_deref(), Some("r-tok"));
    assert_eq!(
        backend.requests_to("/api/auth/register")[0].json(),
        Some(json!({"name": "Ann", "email": "ann@example.com", "password": "hunter22"}))
    );
}

#[tokio::test]
async fn test_logout_keeps_cart_and_drops_bearer() {
    let backend = MockBackend::builder()
        .route(Method::POST, "/api/auth/login", CannedResponse::json(200, &auth_ok("tok")))
        .route(Method::GET, "/api/orders", CannedResponse::json(200, &json!([])))
        .start()
        .await
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let client = backend.client(dir.path());
    client.open_cart().add_to_cart(mug(3));

    client.login(password_login()).await.unwrap();
    client.reconciler().logout().unwrap();

    assert_eq!(client.reconciler().state(), SessionState::Anonymous);
    assert_eq!(client.open_cart().total_items(), 3);

    client.api().gateway().get("/orders").await.unwrap();
    assert_eq!(backend.requests_to("/api/orders")[0].header("authorization"), None);
}

#[tokio::test]
async fn test_repeated_client_logins_count_guest_lines_once() {
    let backend = MockBackend::builder()
        .route(Method::POST, "/api/auth/login", CannedResponse::json(200, &auth_ok("tok")))
        .start()
        .await
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let client = backend.client(dir.path());
    let mut cart = client.open_cart();
    cart.add_to_cart(mug(3));
    cart.add_to_cart(tee(1));
    let guest_lines = cart.lines().to_vec();

    for _ in 0..3 {
        let outcome = client.login(password_login()).await.unwrap();
        assert_eq!(outcome.merged_lines, 2);
        assert_eq!(outcome.cart_total_items, 4);
        client.reconciler().logout().unwrap();
    }

    let saved = client.open_cart();
    assert_eq!(saved.lines(), guest_lines.as_slice());
    assert_eq!(saved.total_price(), Decimal::new(6100, 2));
    assert_eq!(backend.requests_to("/api/auth/login").len(), 3);
}

#[tokio::test]
async fn test_rejected_client_login_keeps_persisted_cart() {
    let backend = MockBackend::builder()
        .route(
            Method::POST,
            "/api/auth/login",
            CannedResponse::json(401, &json!({"success": false, "message": "Invalid email or password"})),
        )
        .start()
        .await
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let client = backend.client(dir.path());
    client.open_cart().add_to_cart(mug(2));

    let err = client.login(password_login()).await.unwrap_err();

    assert!(matches!(err, SessionError::Rejected { status: Some(401), .. }));
    assert_eq!(client.reconciler().state(), SessionState::Anonymous);
    assert_eq!(client.open_cart().total_items(), 2);
}
