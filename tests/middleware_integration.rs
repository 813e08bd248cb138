use std::sync::Arc;

use actix_web::dev::Service;
use actix_web::http::header::AUTHORIZATION;
use actix_web::http::StatusCode;
use actix_web::{test, web, App, HttpResponse};
use chrono::{Duration, Utc};
use serde_json::Value;

use chirpy_auth::auth::MIN_BCRYPT_COST;
use chirpy_auth::clock::ManualClock;
use chirpy_auth::configuration::AuthSettings;
use chirpy_auth::middleware::{AuthenticatedUser, JwtMiddleware};
use chirpy_auth::store::InMemoryCredentialStore;
use chirpy_auth::{AuthError, AuthService};

type Auth = AuthService<InMemoryCredentialStore>;

async fn me(user: AuthenticatedUser) -> HttpResponse {
    HttpResponse::Ok().body(user.user_id.to_string())
}

#[derive(serde::Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

async fn login(
    form: web::Json<LoginRequest>,
    auth: web::Data<Auth>,
) -> Result<HttpResponse, AuthError> {
    let session = auth.login(&form.email, &form.password).await?;
    Ok(HttpResponse::Ok().json(session))
}

async fn build_auth() -> (Arc<Auth>, ManualClock, uuid::Uuid) {
    let mut settings = AuthSettings::with_secret("middleware-secret");
    settings.bcrypt_cost = MIN_BCRYPT_COST;
    let store = Arc::new(InMemoryCredentialStore::new());
    let clock = ManualClock::new(Utc::now());
    let auth = Arc::new(AuthService::new(store.clone(), &settings, Arc::new(clock.clone())));

    let hash = auth.hash_password("hunter22").await.unwrap();
    let user = store.add_user("walt@example.com", hash).unwrap();
    (auth, clock, user.id)
}

#[actix_web::test]
async fn protected_route_sees_authenticated_user() {
    let (auth, _, user_id) = build_auth().await;
    let session = auth.login("walt@example.com", "hunter22").await.unwrap();

    let app = test::init_service(
        App::new().service(
            web::scope("/api")
                .wrap(JwtMiddleware::new(auth.clone()))
                .route("/me", web::get().to(me)),
        ),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api/me")
        .insert_header((AUTHORIZATION, format!("Bearer {}", session.access_token)))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert_eq!(body, user_id.to_string().as_bytes());
}

#[actix_web::test]
async fn protected_route_rejects_missing_and_expired_tokens() {
    let (auth, clock, _) = build_auth().await;
    let session = auth.login("walt@example.com", "hunter22").await.unwrap();

    let app = test::init_service(
        App::new().service(
            web::scope("/api")
                .wrap(JwtMiddleware::new(auth.clone()))
                .route("/me", web::get().to(me)),
        ),
    )
    .await;

    let missing = test::TestRequest::get().uri("/api/me").to_request();
    let err = match app.call(missing).await {
        Ok(_) => panic!("request without token was accepted"),
        Err(e) => e,
    };
    assert_eq!(err.as_response_error().status_code(), StatusCode::UNAUTHORIZED);

    clock.advance(Duration::minutes(61));
    let expired = test::TestRequest::get()
        .uri("/api/me")
        .insert_header((AUTHORIZATION, format!("Bearer {}", session.access_token)))
        .to_request();
    let err = match app.call(expired).await {
        Ok(_) => panic!("expired token was accepted"),
        Err(e) => e,
    };
    assert_eq!(err.as_response_error().status_code(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn extractor_outside_protected_scope_is_unauthenticated() {
    let app = test::init_service(App::new().route("/me", web::get().to(me))).await;

    let req = test::TestRequest::get().uri("/me").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn login_errors_share_one_response_shape() {
    let (auth, _, _) = build_auth().await;
    let app = test::init_service(
        App::new()
            .app_data(web::Data::from(auth))
            .route("/login", web::post().to(login)),
    )
    .await;

    let mut bodies = Vec::new();
    for (email, password) in [
        ("nobody@example.com", "hunter22"),
        ("walt@example.com", "wrong-password"),
    ] {
        let req = test::TestRequest::post()
            .uri("/login")
            .set_json(serde_json::json!({ "email": email, "password": password }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let body: Value = test::read_body_json(resp).await;
        bodies.push((body["code"].clone(), body["message"].clone()));
    }

    assert_eq!(bodies[0], bodies[1]);
    assert_eq!(bodies[0].0, "INVALID_CREDENTIALS");
}

#[actix_web::test]
async fn login_success_returns_session_json() {
    let (auth, _, user_id) = build_auth().await;
    let app = test::init_service(
        App::new()
            .app_data(web::Data::from(auth))
            .route("/login", web::post().to(login)),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/login")
        .set_json(serde_json::json!({ "email": "walt@example.com", "password": "hunter22" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["user_id"], user_id.to_string());
    assert_eq!(body["token_type"], "Bearer");
    assert!(body["access_token"].is_string());
    assert_eq!(body["refresh_token"].as_str().map(str::len), Some(64));
}
