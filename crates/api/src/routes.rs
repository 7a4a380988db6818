//! Routes and handlers.
//!
//! The build routes always answer 200 with a build result, successful or
//! not; only malformed bodies (400) and service faults (500) are errors.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::{get, post};
use axum::{Json, Router};
use c2wasm_lib::headers::default_headers;
use c2wasm_lib::{BuildRequest, BuildResult, OutputKind, run_build};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
  Router::new()
    .route("/", get(liveness))
    // Builds
    .route("/build", post(build_native))
    .route("/api/build", post(build_native))
    .route("/build/bytecode", post(build_bytecode))
    .route("/api/build/js", post(build_bytecode))
    // Headers
    .route("/header-files", get(header_files))
    .route("/api/header-files", get(header_files))
    .layer(TraceLayer::new_for_http())
    .layer(
      CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any),
    )
    .with_state(state)
}

async fn liveness() -> &'static str {
  "ok"
}

async fn build_native(
  State(state): State<AppState>,
  payload: Result<Json<BuildRequest>, JsonRejection>,
) -> ApiResult<Json<BuildResult>> {
  build(&state, payload?.0, OutputKind::Wasm).await
}

async fn build_bytecode(
  State(state): State<AppState>,
  payload: Result<Json<BuildRequest>, JsonRejection>,
) -> ApiResult<Json<BuildResult>> {
  build(&state, payload?.0, OutputKind::Bytecode).await
}

async fn build(state: &AppState, request: BuildRequest, kind: OutputKind) -> ApiResult<Json<BuildResult>> {
  let base = state.next_base();
  info!(kind = %kind, base = %base.display(), "build requested");
  let result = run_build(&request, kind, &base, &state.toolchain).await?;
  Ok(Json(result))
}

async fn header_files(State(state): State<AppState>) -> ApiResult<Json<BTreeMap<String, String>>> {
  let headers = default_headers(&state.toolchain.default_include_dir)
    .await
    .map_err(ApiError::Headers)?;
  Ok(Json(headers))
}

#[cfg(all(test, unix))]
mod tests {
  use super::*;
  use axum::body::Body;
  use axum::http::{Request, StatusCode};
  use axum::response::Response;
  use c2wasm_lib::util::testutil::{FakeToolchain, failing_script, write_script};
  use serial_test::serial;
  use tempfile::TempDir;
  use tower::ServiceExt;

  // Every test installs tool scripts, so all of them run #[serial].
  struct TestApp {
    temp: TempDir,
    fake: FakeToolchain,
  }

  impl TestApp {
    fn new() -> Self {
      let temp = TempDir::new().unwrap();
      std::fs::create_dir(temp.path().join("work")).unwrap();
      let fake = FakeToolchain::install(&temp.path().join("tools")).unwrap();
      Self { temp, fake }
    }

    fn router(&self) -> Router {
      create_router(AppState::new(
        self.fake.toolchain.clone(),
        self.temp.path().join("work"),
      ))
    }

    fn work_dir_is_empty(&self) -> bool {
      std::fs::read_dir(self.temp.path().join("work")).unwrap().next().is_none()
    }
  }

  fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
      .method("POST")
      .uri(uri)
      .header("content-type", "application/json")
      .body(Body::from(body.to_string()))
      .unwrap()
  }

  fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
  }

  async fn json_body(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  fn native_request() -> serde_json::Value {
    serde_json::json!({
      "outputKind": "wasm",
      "compress": false,
      "strip": true,
      "files": [{ "type": "c", "name": "a.c", "options": "-O3", "src": "int main(){return 0;}" }]
    })
  }

  #[tokio::test]
  #[serial]
  async fn liveness_probe() {
    let app = TestApp::new();
    let response = app.router().oneshot(get("/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
  }

  #[tokio::test]
  #[serial]
  async fn native_build_returns_result() {
    let app = TestApp::new();

    let response = app.router().oneshot(post_json("/build", native_request())).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Success");
    assert_eq!(body["output"], "AGFzbQEAAAA=");
    let names: Vec<_> = body["tasks"]
      .as_array()
      .unwrap()
      .iter()
      .map(|task| task["name"].as_str().unwrap().to_string())
      .collect();
    assert_eq!(
      names,
      vec!["Compile+Link", "Optimize (pass 1)", "Strip", "Optimize (pass 2)", "Guard check"]
    );
    assert!(body["tasks"][0]["console"].is_string());
    assert!(app.work_dir_is_empty());
  }

  #[tokio::test]
  #[serial]
  async fn api_alias_builds_too() {
    let app = TestApp::new();

    let response = app.router().oneshot(post_json("/api/build", native_request())).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["success"], true);
  }

  #[tokio::test]
  #[serial]
  async fn stage_failure_is_still_200() {
    let app = TestApp::new();
    write_script(&app.fake.toolchain.guard_checker, &failing_script("guard: missing _g call")).unwrap();

    let response = app.router().oneshot(post_json("/build", native_request())).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Guard checking error");
    assert_eq!(body["output"], "");
    assert!(
      body["tasks"][4]["console"]
        .as_str()
        .unwrap()
        .contains("missing _g call")
    );
    assert!(app.work_dir_is_empty());
  }

  #[tokio::test]
  #[serial]
  async fn validation_failure_is_a_result() {
    let app = TestApp::new();
    let request = serde_json::json!({
      "outputKind": "wasm",
      "files": [{ "type": "c", "name": "../evil.c", "src": "x" }]
    });

    let response = app.router().oneshot(post_json("/build", request)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Invalid filename ../evil.c");
    assert_eq!(body["tasks"], serde_json::json!([]));
    assert!(app.work_dir_is_empty());
  }

  #[tokio::test]
  #[serial]
  async fn bytecode_build() {
    let app = TestApp::new();
    let request = serde_json::json!({
      "output": "bc",
      "files": [{ "type": "js", "name": "hook.js", "src": "function Hook() { return 0; }" }]
    });

    let response = app.router().oneshot(post_json("/api/build/js", request)).await.unwrap();

    let body = json_body(response).await;
    assert_eq!(body["success"], true, "{body}");
    assert_eq!(body["output"], "QwL/");
    assert_eq!(body["tasks"][0]["name"], "Compile bytecode");
  }

  #[tokio::test]
  #[serial]
  async fn malformed_body_is_400() {
    let app = TestApp::new();
    let request = Request::builder()
      .method("POST")
      .uri("/build")
      .header("content-type", "application/json")
      .body(Body::from("{\"outputKind\": \"wasm\""))
      .unwrap();

    let response = app.router().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], "BAD_REQUEST");
    assert!(body.get("output").is_none());
  }

  #[tokio::test]
  #[serial]
  async fn missing_files_field_is_400() {
    let app = TestApp::new();

    let response = app
      .router()
      .oneshot(post_json("/build", serde_json::json!({ "outputKind": "wasm" })))
      .await
      .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  #[serial]
  async fn wrong_method_is_405() {
    let app = TestApp::new();

    for uri in ["/build", "/build/bytecode", "/api/build", "/api/build/js"] {
      let response = app.router().oneshot(get(uri)).await.unwrap();
      assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "{uri}");
    }
  }

  #[tokio::test]
  #[serial]
  async fn workspace_fault_is_500() {
    let app = TestApp::new();
    let router = create_router(AppState::new(
      app.fake.toolchain.clone(),
      app.temp.path().join("no-such-dir"),
    ));

    let response = router.oneshot(post_json("/build", native_request())).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["code"], "INTERNAL_ERROR");
    assert!(body.get("output").is_none());
  }

  #[tokio::test]
  #[serial]
  async fn header_files_lists_default_headers() {
    let app = TestApp::new();
    let include_dir = &app.fake.toolchain.default_include_dir;
    std::fs::write(include_dir.join("hookapi.h"), "#define HOOK 1").unwrap();
    std::fs::write(include_dir.join("README.md"), "skip").unwrap();

    for uri in ["/header-files", "/api/header-files"] {
      let response = app.router().oneshot(get(uri)).await.unwrap();
      assert_eq!(response.status(), StatusCode::OK);
      assert_eq!(
        json_body(response).await,
        serde_json::json!({ "hookapi": "#define HOOK 1" })
      );
    }
  }

  #[tokio::test]
  #[serial]
  async fn missing_include_dir_is_500() {
    let app = TestApp::new();
    std::fs::remove_dir(&app.fake.toolchain.default_include_dir).unwrap();

    let response = app.router().oneshot(get("/header-files")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
  }
}
