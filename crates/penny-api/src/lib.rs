//! JSON HTTP API for the penny ledger.
//!
//! Exposes an axum [`Router`] backed by any [`penny_core::store::LedgerStore`].
//! Session identity is taken from a header set by the login proxy in front of
//! the service; admin routes use HTTP Basic auth. TLS and transport concerns
//! are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = penny_api::api_router(state).layer(TraceLayer::new_for_http());
//! ```

pub mod admin;
pub mod beneficiaries;
pub mod bookmarklet;
pub mod caller;
pub mod campaigns;
pub mod checkout;
pub mod donations;
pub mod error;
pub mod extract;
pub mod members;

use std::sync::Arc;

use axum::{
  Router,
  http::HeaderName,
  routing::{get, post},
};
use penny_core::store::LedgerStore;

pub use admin::AdminCredentials;
pub use error::ApiError;

// ─── Settings ────────────────────────────────────────────────────────────────

/// Request-independent knobs the handlers read.
#[derive(Debug, Clone)]
pub struct ApiSettings {
  /// Header carrying the login provider's stable user id.
  pub identity_header:        HeaderName,
  /// Public origin used when rendering the bookmarklet.
  pub base_url:               String,
  pub recent_campaigns_limit: usize,
  /// Units a pledge group needs before checkout opens.
  pub min_checkout_units:     u64,
}

impl Default for ApiSettings {
  fn default() -> Self {
    Self {
      identity_header:        HeaderName::from_static("x-authenticated-user"),
      base_url:               "http://localhost:8080".to_string(),
      recent_campaigns_limit: 7,
      min_checkout_units:     1000,
    }
  }
}

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct ApiState<S: LedgerStore> {
  pub store:    Arc<S>,
  pub settings: Arc<ApiSettings>,
  pub admin:    Arc<AdminCredentials>,
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the full API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: ApiState<S>) -> Router<()>
where
  S: LedgerStore + Clone + 'static,
{
  Router::new()
    // Session callers
    .route("/me", get(members::me))
    .route(
      "/donations",
      get(donations::list::<S>)
        .post(donations::donate::<S>)
        .delete(donations::delete::<S>),
    )
    .route("/donations/undo", post(donations::undo::<S>))
    .route("/checkout", get(checkout::view::<S>))
    .route("/bookmarklet", get(bookmarklet::script::<S>))
    // Hashed-key callers
    .route("/bookmarklet/donate", get(bookmarklet::donate::<S>))
    .route("/bookmarklet/undo", get(bookmarklet::undo::<S>))
    // Public
    .route("/campaigns/recent", get(campaigns::recent::<S>))
    // Admin
    .route(
      "/admin/beneficiaries",
      get(beneficiaries::list::<S>).post(beneficiaries::create::<S>),
    )
    .route(
      "/admin/beneficiaries/{id}",
      get(beneficiaries::get_one::<S>)
        .put(beneficiaries::edit::<S>)
        .delete(beneficiaries::delete::<S>),
    )
    .route("/admin/campaigns/assign", post(campaigns::assign::<S>))
    .route("/admin/campaigns/unassigned", get(campaigns::unassigned::<S>))
    .route("/admin/reconcile", post(campaigns::reconcile::<S>))
    .with_state(state)
}

#[cfg(test)]
mod tests {
  use super::*;

  use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
  };
  use base64::Engine as _;
  use base64::engine::general_purpose::STANDARD as B64;
  use penny_core::campaign::CampaignLink;
  use penny_store_sqlite::SqliteStore;
  use rand_core::OsRng;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;

  async fn make_state(password: &str) -> ApiState<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let salt  = SaltString::generate(&mut OsRng);
    let hash  = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string();

    ApiState {
      store:    Arc::new(store),
      settings: Arc::new(ApiSettings {
        base_url:           "https://penny.example".to_string(),
        min_checkout_units: 3,
        ..ApiSettings::default()
      }),
      admin:    Arc::new(AdminCredentials {
        username:      "admin".to_string(),
        password_hash: hash,
      }),
    }
  }

  fn admin_auth() -> String {
    format!("Basic {}", B64.encode("admin:secret"))
  }

  async fn call(
    state:   &ApiState<SqliteStore>,
    method:  &str,
    uri:     &str,
    headers: Vec<(&str, String)>,
    body:    Option<Value>,
  ) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    for (k, v) in headers {
      builder = builder.header(k, v);
    }
    let body = match body {
      Some(json) => {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
        Body::from(json.to_string())
      }
      None => Body::empty(),
    };
    api_router(state.clone())
      .oneshot(builder.body(body).unwrap())
      .await
      .unwrap()
  }

  fn as_user(name: &str) -> Vec<(&'static str, String)> {
    vec![("x-authenticated-user", name.to_string())]
  }

  fn as_admin() -> Vec<(&'static str, String)> {
    vec![("authorization", admin_auth())]
  }

  async fn json_body(resp: Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  async fn donate(state: &ApiState<SqliteStore>, user: &str, link: &str) -> Value {
    let resp = call(state, "POST", "/donations", as_user(user), Some(json!({ "link": link }))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    json_body(resp).await
  }

  // ── Session callers ─────────────────────────────────────────────────────────

  #[tokio::test]
  async fn session_routes_require_identity_header() {
    let state = make_state("secret").await;
    let resp = call(&state, "GET", "/donations", vec![], None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = call(&state, "GET", "/me", as_user("   "), None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  }

  #[tokio::test]
  async fn me_is_stable_across_requests() {
    let state = make_state("secret").await;
    let first = json_body(call(&state, "GET", "/me", as_user("alice"), None).await).await;
    let again = json_body(call(&state, "GET", "/me", as_user("alice"), None).await).await;
    assert_eq!(first["member_id"], again["member_id"]);
    assert_eq!(first["hashed_key"], again["hashed_key"]);
  }

  #[tokio::test]
  async fn donate_undo_delete_roundtrip() {
    let state = make_state("secret").await;
    let link = "http://example.com/a";

    donate(&state, "alice", link).await;
    let receipt = donate(&state, "alice", link).await;
    assert_eq!(receipt["campaign"]["counter"], 2);
    assert_eq!(receipt["state"]["state"], "active");
    assert_eq!(receipt["state"]["timestamps"].as_array().unwrap().len(), 2);

    let resp = call(
      &state,
      "POST",
      "/donations/undo",
      as_user("alice"),
      Some(json!({ "link": link })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["campaign"]["counter"], 1);

    let listing = json_body(call(&state, "GET", "/donations", as_user("alice"), None).await).await;
    assert_eq!(listing["total_units"], 1);

    let resp = call(
      &state,
      "DELETE",
      &format!("/donations?link={link}"),
      as_user("alice"),
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let listing = json_body(call(&state, "GET", "/donations", as_user("alice"), None).await).await;
    assert_eq!(listing["total_units"], 0);
  }

  #[tokio::test]
  async fn invalid_link_is_bad_request() {
    let state = make_state("secret").await;
    let resp = call(
      &state,
      "POST",
      "/donations",
      as_user("alice"),
      Some(json!({ "link": "ftp://example.com" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn undo_without_donation_is_not_found() {
    let state = make_state("secret").await;
    let resp = call(
      &state,
      "POST",
      "/donations/undo",
      as_user("alice"),
      Some(json!({ "link": "http://example.com/none" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  // ── Bookmarklet ─────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn bookmarklet_flow_uses_hashed_key() {
    let state = make_state("secret").await;
    let me = json_body(call(&state, "GET", "/me", as_user("alice"), None).await).await;
    let key = me["hashed_key"].as_str().unwrap().to_string();

    let script = json_body(call(&state, "GET", "/bookmarklet", as_user("alice"), None).await).await;
    assert!(script["bookmarklet"].as_str().unwrap().contains(&key));

    let uri = format!("/bookmarklet/donate?k={key}&link=http://example.com/b");
    let resp = call(&state, "GET", &uri, vec![], None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["campaign"]["counter"], 1);

    let uri = format!("/bookmarklet/undo?k={key}&link=http://example.com/b");
    let resp = call(&state, "GET", &uri, vec![], None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["state"]["state"], "non_existent");
  }

  #[tokio::test]
  async fn bookmarklet_rejects_unknown_or_missing_key() {
    let state = make_state("secret").await;
    let unknown = "0".repeat(64);
    let uri = format!("/bookmarklet/donate?k={unknown}&link=http://example.com/b");
    let resp = call(&state, "GET", &uri, vec![], None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = call(&state, "GET", "/bookmarklet/donate?link=http://example.com/b", vec![], None).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = call(&state, "GET", "/bookmarklet/donate?k=nothex&link=http://example.com/b", vec![], None).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  // ── Public ──────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn recent_campaigns_respects_limit() {
    let state = make_state("secret").await;
    for path in ["a", "b", "c"] {
      donate(&state, "alice", &format!("http://example.com/{path}")).await;
    }
    let recent = json_body(call(&state, "GET", "/campaigns/recent?limit=2", vec![], None).await).await;
    assert_eq!(recent.as_array().unwrap().len(), 2);

    let recent = json_body(call(&state, "GET", "/campaigns/recent", vec![], None).await).await;
    assert_eq!(recent.as_array().unwrap().len(), 3);
  }

  #[tokio::test]
  async fn recent_campaigns_limit_is_capped() {
    let state = make_state("secret").await;
    for i in 0..=campaigns::MAX_RECENT_LIMIT {
      let link = CampaignLink::parse(&format!("http://example.com/{i}")).unwrap();
      state.store.get_or_create_campaign(link).await.unwrap();
    }
    let resp = call(&state, "GET", "/campaigns/recent?limit=1000", vec![], None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let recent = json_body(resp).await;
    assert_eq!(recent.as_array().unwrap().len(), campaigns::MAX_RECENT_LIMIT);
  }

  #[tokio::test]
  async fn malformed_query_is_a_json_bad_request() {
    let state = make_state("secret").await;
    let me = json_body(call(&state, "GET", "/me", as_user("alice"), None).await).await;
    let key = me["hashed_key"].as_str().unwrap().to_string();

    for (method, uri, headers) in [
      ("GET", "/campaigns/recent?limit=abc".to_string(), vec![]),
      ("GET", "/campaigns/recent?limit=-1".to_string(), vec![]),
      ("DELETE", "/donations".to_string(), as_user("alice")),
      ("GET", format!("/bookmarklet/donate?k={key}"), vec![]),
    ] {
      let resp = call(&state, method, &uri, headers, None).await;
      assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{method} {uri}");
      assert!(json_body(resp).await["error"].is_string(), "{method} {uri}");
    }
  }

  #[tokio::test]
  async fn malformed_json_body_is_a_json_bad_request() {
    let state = make_state("secret").await;
    let resp = call(&state, "POST", "/donations", as_user("alice"), Some(json!({}))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(resp).await["error"].as_str().unwrap().contains("link"));

    let resp = call(
      &state,
      "POST",
      "/admin/campaigns/assign",
      as_admin(),
      Some(json!({ "pledge_campaign_id": 42 })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(resp).await["error"].is_string());
  }

  // ── Admin ───────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn admin_routes_require_basic_auth() {
    let state = make_state("secret").await;
    let resp = call(&state, "GET", "/admin/beneficiaries", vec![], None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));

    let wrong = vec![("authorization", format!("Basic {}", B64.encode("admin:nope")))];
    let resp = call(&state, "GET", "/admin/beneficiaries", wrong, None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = call(&state, "GET", "/admin/beneficiaries", as_admin(), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
  }

  fn beneficiary_body(identity: &str, pledge: Value) -> Value {
    json!({
      "external_identity":    identity,
      "payout_email":         format!("{identity}@example.org"),
      "pledge_campaign_id":   pledge,
      "pledge_platform_name": "Clean Water",
    })
  }

  #[tokio::test]
  async fn checkout_groups_assigned_campaigns() {
    let state = make_state("secret").await;
    for _ in 0..2 {
      donate(&state, "alice", "http://example.com/x").await;
    }
    donate(&state, "alice", "http://example.com/y").await;
    donate(&state, "alice", "http://example.com/z").await;

    let resp = call(
      &state,
      "POST",
      "/admin/beneficiaries",
      as_admin(),
      Some(beneficiary_body("carol", json!("42"))),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let unassigned =
      json_body(call(&state, "GET", "/admin/campaigns/unassigned", as_admin(), None).await).await;
    assert_eq!(unassigned[0]["link"], "http://example.com/x");

    for link in ["http://example.com/x", "http://example.com/y"] {
      let resp = call(
        &state,
        "POST",
        "/admin/campaigns/assign",
        as_admin(),
        Some(json!({ "link": link, "pledge_campaign_id": 42 })),
      )
      .await;
      assert_eq!(resp.status(), StatusCode::OK);
    }

    let groups = json_body(call(&state, "GET", "/checkout", as_user("alice"), None).await).await;
    let groups = groups.as_array().unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0]["pledge_campaign_id"], 42);
    assert_eq!(groups[0]["total_units"], 3);
    assert_eq!(groups[0]["checkout_open"], true);
    assert_eq!(groups[1]["pledge_campaign_id"], Value::Null);
    assert_eq!(groups[1]["checkout_open"], false);
  }

  #[tokio::test]
  async fn beneficiary_lifecycle() {
    let state = make_state("secret").await;
    let created = json_body(
      call(
        &state,
        "POST",
        "/admin/beneficiaries",
        as_admin(),
        Some(beneficiary_body("carol", json!(7))),
      )
      .await,
    )
    .await;
    let id = created["beneficiary_id"].as_str().unwrap().to_string();

    let resp = call(
      &state,
      "POST",
      "/admin/beneficiaries",
      as_admin(),
      Some(beneficiary_body("carol", json!(8))),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = call(
      &state,
      "POST",
      "/admin/beneficiaries",
      as_admin(),
      Some(beneficiary_body("dave", json!("seven"))),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let uri = format!("/admin/beneficiaries/{id}");
    let resp = call(&state, "PUT", &uri, as_admin(), Some(beneficiary_body("carol", json!(9)))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let fetched = json_body(call(&state, "GET", &uri, as_admin(), None).await).await;
    assert_eq!(fetched["pledge_campaign_id"], 9);

    let deleted = json_body(call(&state, "DELETE", &uri, as_admin(), None).await).await;
    assert_eq!(deleted["cleared_campaigns"], 0);

    let resp = call(&state, "GET", &uri, as_admin(), None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn invalid_pledge_ids_are_json_bad_requests() {
    let state = make_state("secret").await;
    for pledge in [
      json!(-1),
      json!(4.5),
      json!(9_223_372_036_854_775_808u64),
      json!("9223372036854775808"),
    ] {
      let resp = call(
        &state,
        "POST",
        "/admin/beneficiaries",
        as_admin(),
        Some(beneficiary_body("carol", pledge.clone())),
      )
      .await;
      assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{pledge}");
      assert!(json_body(resp).await["error"].is_string(), "{pledge}");
    }

    let mut missing = beneficiary_body("carol", json!(7));
    missing.as_object_mut().unwrap().remove("pledge_campaign_id");
    let resp = call(&state, "POST", "/admin/beneficiaries", as_admin(), Some(missing)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(
      json_body(resp).await["error"]
        .as_str()
        .unwrap()
        .contains("pledge_campaign_id")
    );

    let listing = json_body(call(&state, "GET", "/admin/beneficiaries", as_admin(), None).await).await;
    assert_eq!(listing, json!([]));
  }

  #[tokio::test]
  async fn reconcile_reports_no_drift() {
    let state = make_state("secret").await;
    donate(&state, "alice", "http://example.com/r").await;
    let corrections =
      json_body(call(&state, "POST", "/admin/reconcile", as_admin(), None).await).await;
    assert_eq!(corrections, json!([]));
  }
}
