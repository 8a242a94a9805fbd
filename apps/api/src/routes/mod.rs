pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::credits::handlers as credits;
use crate::plans::handlers as plans;
use crate::state::AppState;
use crate::users::handlers as users;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Credit ledger
        .route("/api/credits", get(credits::handle_balance))
        .route("/api/credits/consume", post(credits::handle_consume))
        .route("/api/credits/history", get(credits::handle_history))
        // Plans
        .route("/api/plan/free", post(plans::handle_claim_free_plan))
        // User state
        .route("/api/user/state", get(users::handle_user_state))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::auth::JwtVerifier;
    use crate::config::{Config, StoreBackend};
    use crate::credits::memory::MemoryCreditStore;

    const SECRET: &str = "router-test-secret-0123";

    fn test_config() -> Config {
        Config {
            store_backend: StoreBackend::Memory,
            database_url: None,
            db_max_connections: 1,
            run_migrations: false,
            jwt_secret: SECRET.to_string(),
            free_plan_credits: 3,
            port: 0,
            rust_log: "debug".to_string(),
        }
    }

    fn test_app(store: &MemoryCreditStore) -> (Router, JwtVerifier) {
        let verifier = JwtVerifier::new(SECRET);
        let state = AppState {
            store: Arc::new(store.clone()),
            verifier: verifier.clone(),
            config: test_config(),
        };
        (build_router(state), verifier)
    }

    fn consume(token: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/credits/consume")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn claim(token: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/plan/free")
            .header(header::COOKIE, format!("token={token}"))
            .body(Body::empty())
            .unwrap()
    }

    fn authed_get(uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn balance(store: &MemoryCreditStore, user_id: i64) -> i64 {
        use crate::credits::store::CreditStore;
        store.get_user(user_id).await.unwrap().unwrap().coin
    }

    #[tokio::test]
    async fn test_consume_success() {
        let store = MemoryCreditStore::new();
        let user = store.insert_user("a@example.com", 10);
        let (app, verifier) = test_app(&store);
        let token = verifier.issue(user.id, 60);

        let response = app
            .oneshot(consume(Some(token.as_str()), r#"{"amount": 4, "feature": "cv_analysis"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["remainingCredits"], 6);
    }

    #[tokio::test]
    async fn test_consume_full_balance_then_402() {
        let store = MemoryCreditStore::new();
        let user = store.insert_user("b@example.com", 5);
        let (app, verifier) = test_app(&store);
        let token = verifier.issue(user.id, 60);

        let first = app
            .clone()
            .oneshot(consume(Some(token.as_str()), r#"{"amount": 5}"#))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(json_body(first).await["remainingCredits"], 0);

        let second = app
            .oneshot(consume(Some(token.as_str()), r#"{"amount": 1}"#))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::PAYMENT_REQUIRED);
        let body = json_body(second).await;
        assert_eq!(body["error"]["code"], "INSUFFICIENT_CREDITS");
        assert_eq!(body["remainingCredits"], 0);
        assert_eq!(body["requiredCredits"], 1);
    }

    #[tokio::test]
    async fn test_consume_invalid_amounts_leave_balance() {
        let store = MemoryCreditStore::new();
        let user = store.insert_user("c@example.com", 10);
        let (app, verifier) = test_app(&store);
        let token = verifier.issue(user.id, 60);

        for body in [
            r#"{"amount": 0}"#,
            r#"{"amount": -5}"#,
            r#"{"amount": "ten"}"#,
            r#"{"amount": 2.5}"#,
            r#"{"feature": "x"}"#,
            r#"{"amount": 1, "extra": true}"#,
            "not json",
        ] {
            let response = app
                .clone()
                .oneshot(consume(Some(token.as_str()), body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
        }

        assert_eq!(balance(&store, user.id).await, 10);
    }

    #[tokio::test]
    async fn test_unauthenticated_rejected_before_store() {
        let store = MemoryCreditStore::new();
        let user = store.insert_user("d@example.com", 10);
        let (app, _) = test_app(&store);
        let forged = JwtVerifier::new("some-other-secret-xyz").issue(user.id, 60);

        let missing = app
            .clone()
            .oneshot(consume(None, r#"{"amount": 1}"#))
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let bad = app
            .clone()
            .oneshot(consume(Some(forged.as_str()), r#"{"amount": 1}"#))
            .await
            .unwrap();
        assert_eq!(bad.status(), StatusCode::UNAUTHORIZED);

        let claimed = app.oneshot(claim(&forged)).await.unwrap();
        assert_eq!(claimed.status(), StatusCode::UNAUTHORIZED);

        assert_eq!(balance(&store, user.id).await, 10);
    }

    #[tokio::test]
    async fn test_unknown_user_is_404() {
        let store = MemoryCreditStore::new();
        let (app, verifier) = test_app(&store);
        let token = verifier.issue(999, 60);

        let response = app
            .oneshot(consume(Some(token.as_str()), r#"{"amount": 1}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_consumes_are_mutually_exclusive() {
        let store = MemoryCreditStore::new();
        let user = store.insert_user("race@example.com", 50);
        let (app, verifier) = test_app(&store);
        let token = verifier.issue(user.id, 60);

        let a = tokio::spawn(
            app.clone()
                .oneshot(consume(Some(token.as_str()), r#"{"amount": 30}"#)),
        );
        let b = tokio::spawn(app.oneshot(consume(Some(token.as_str()), r#"{"amount": 30}"#)));

        let statuses = [
            a.await.unwrap().unwrap().status(),
            b.await.unwrap().unwrap().status(),
        ];
        let ok = statuses.iter().filter(|s| **s == StatusCode::OK).count();
        let rejected = statuses
            .iter()
            .filter(|s| **s == StatusCode::PAYMENT_REQUIRED)
            .count();

        assert_eq!(ok, 1);
        assert_eq!(rejected, 1);
        assert_eq!(balance(&store, user.id).await, 20);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_free_plan_claims_single_winner() {
        let store = MemoryCreditStore::new();
        let user = store.insert_user("plan@example.com", 0);
        let (app, verifier) = test_app(&store);
        let token = verifier.issue(user.id, 60);

        let mut handles = Vec::new();
        for _ in 0..10 {
            handles.push(tokio::spawn(app.clone().oneshot(claim(&token))));
        }

        let mut ok = 0;
        let mut conflict = 0;
        for handle in handles {
            match handle.await.unwrap().unwrap().status() {
                StatusCode::OK => ok += 1,
                StatusCode::CONFLICT => conflict += 1,
                other => panic!("unexpected status {other}"),
            }
        }

        assert_eq!(ok, 1);
        assert_eq!(conflict, 9);
        assert_eq!(balance(&store, user.id).await, 3);
    }

    #[tokio::test]
    async fn test_free_plan_response_and_user_state() {
        let store = MemoryCreditStore::new();
        let user = store.insert_user("state@example.com", 2);
        let (app, verifier) = test_app(&store);
        let token = verifier.issue(user.id, 60);

        let granted = app.clone().oneshot(claim(&token)).await.unwrap();
        assert_eq!(granted.status(), StatusCode::OK);
        let body = json_body(granted).await;
        assert_eq!(body["planStatus"], "free");
        assert_eq!(body["remainingCredits"], 5);
        assert_eq!(body["grantedCredits"], 3);

        let again = app.clone().oneshot(claim(&token)).await.unwrap();
        assert_eq!(again.status(), StatusCode::CONFLICT);
        assert_eq!(json_body(again).await["error"]["code"], "ALREADY_GRANTED");

        let state = app
            .oneshot(authed_get("/api/user/state", &token))
            .await
            .unwrap();
        assert_eq!(state.status(), StatusCode::OK);
        let body = json_body(state).await;
        assert_eq!(body["plan"], "free");
        assert_eq!(body["coin"], 5);
        assert_eq!(body["canClaimFreePlan"], false);
    }

    #[tokio::test]
    async fn test_balance_and_history() {
        let store = MemoryCreditStore::new();
        let user = store.insert_user("hist@example.com", 8);
        let (app, verifier) = test_app(&store);
        let token = verifier.issue(user.id, 60);

        app.clone()
            .oneshot(consume(Some(token.as_str()), r#"{"amount": 3, "feature": "interview"}"#))
            .await
            .unwrap();

        let balance = app
            .clone()
            .oneshot(authed_get("/api/credits", &token))
            .await
            .unwrap();
        assert_eq!(json_body(balance).await["remainingCredits"], 5);

        let history = app
            .clone()
            .oneshot(authed_get("/api/credits/history?limit=5", &token))
            .await
            .unwrap();
        assert_eq!(history.status(), StatusCode::OK);
        let rows = json_body(history).await;
        assert_eq!(rows.as_array().unwrap().len(), 1);
        assert_eq!(rows[0]["feature"], "interview");
        assert_eq!(rows[0]["balanceAfter"], 5);

        let too_many = app
            .oneshot(authed_get("/api/credits/history?limit=1000", &token))
            .await
            .unwrap();
        assert_eq!(too_many.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health_reports_backend() {
        let store = MemoryCreditStore::new();
        let (app, _) = test_app(&store);
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["store"], "memory");
        assert_eq!(body["service"], env!("CARGO_PKG_NAME"));
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }
}
