//! JSON API over the catalog and cart services.

use std::sync::Arc;

use axum::{
    body::Bytes,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{de::DeserializeOwned, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};
use uuid::Uuid;

use easyshop_core::config::AuthConfig;
use easyshop_core::{ApplicationError, InterfaceError};
use easyshop_db::{CartService, CatalogService};

pub mod cart;
pub mod categories;
pub mod extract;
pub mod products;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<CatalogService>,
    pub cart: Arc<CartService>,
    pub auth: Arc<AuthConfig>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    pub correlation_id: String,
}

pub type ApiError = (StatusCode, Json<ErrorBody>);
pub type ApiResult<T> = Result<T, ApiError>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/products", get(products::search).post(products::create))
        .route(
            "/products/{id}",
            get(products::get_by_id).put(products::update).delete(products::delete),
        )
        .route("/categories", get(categories::list).post(categories::create))
        .route(
            "/categories/{id}",
            get(categories::get_by_id).put(categories::update).delete(categories::delete),
        )
        .route("/categories/{id}/products", get(categories::products))
        .route("/cart", get(cart::get_cart).delete(cart::clear))
        .route(
            "/cart/products/{id}",
            post(cart::add_item).put(cart::update_quantity).delete(cart::remove_item),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Maps a service failure onto an HTTP response. Every rejection gets a fresh
/// correlation id that is both logged and returned to the client.
pub(crate) fn reject(operation: &'static str, error: ApplicationError) -> ApiError {
    let correlation_id = Uuid::new_v4().to_string();
    let detail = error.to_string();
    let interface = error.into_interface(correlation_id.clone());
    let (status, kind) = status_of(&interface);

    if status.is_server_error() {
        error!(
            event_name = "api.request.failed",
            correlation_id = %correlation_id,
            operation,
            error = %detail,
            "request failed on storage"
        );
    } else {
        warn!(
            event_name = "api.request.rejected",
            correlation_id = %correlation_id,
            operation,
            status = status.as_u16(),
            error = %detail,
            "request rejected"
        );
    }

    (status, Json(ErrorBody { error: kind, message: interface.public_message(), correlation_id }))
}

pub(crate) fn error_response(
    status: StatusCode,
    kind: &'static str,
    message: impl Into<String>,
) -> ApiError {
    let correlation_id = Uuid::new_v4().to_string();
    let message = message.into();
    warn!(
        event_name = "api.request.rejected",
        correlation_id = %correlation_id,
        status = status.as_u16(),
        error = %message,
        "request rejected"
    );
    (status, Json(ErrorBody { error: kind, message, correlation_id }))
}

/// Decodes a JSON request body. Malformed or mistyped bodies become invalid-argument
/// errors so they share the `ErrorBody` shape.
pub(crate) fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApplicationError> {
    serde_json::from_slice(body).map_err(|error| {
        ApplicationError::InvalidArgument(format!("invalid request body: {error}"))
    })
}

fn status_of(error: &InterfaceError) -> (StatusCode, &'static str) {
    match error {
        InterfaceError::BadRequest { .. } => (StatusCode::BAD_REQUEST, "bad_request"),
        InterfaceError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
        InterfaceError::Conflict { .. } => (StatusCode::CONFLICT, "conflict"),
        InterfaceError::ServiceUnavailable { .. } => {
            (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable")
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use secrecy::SecretString;
    use serde_json::Value;
    use tower::ServiceExt;

    use easyshop_core::config::AuthConfig;
    use easyshop_db::repositories::{
        SqlCartRepository, SqlCategoryRepository, SqlProductRepository,
    };
    use easyshop_db::{
        connect_with_settings, migrations, CartService, CatalogService, DemoCatalog,
    };

    use super::{router, AppState};

    pub const ADMIN_TOKEN: &str = "test-admin-token-0123456789";

    /// Router over an in-memory database holding the demo catalog.
    pub async fn seeded_app() -> Router {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        DemoCatalog::load(&pool).await.expect("seed");

        let products = Arc::new(SqlProductRepository::new(pool.clone()));
        let state = AppState {
            catalog: Arc::new(CatalogService::new(
                products.clone(),
                Arc::new(SqlCategoryRepository::new(pool.clone())),
            )),
            cart: Arc::new(CartService::new(products, Arc::new(SqlCartRepository::new(pool)))),
            auth: Arc::new(AuthConfig {
                admin_token: Some(SecretString::from(ADMIN_TOKEN.to_string())),
            }),
        };
        router(state)
    }

    pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.expect("router response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, body)
    }

    pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    pub fn admin(mut request: Request<Body>) -> Request<Body> {
        request.headers_mut().insert(
            "authorization",
            format!("Bearer {ADMIN_TOKEN}").parse().expect("header value"),
        );
        request
    }

    pub fn as_user(mut request: Request<Body>, user_id: i64) -> Request<Body> {
        request
            .headers_mut()
            .insert("x-user-id", user_id.to_string().parse().expect("header value"));
        request
    }

    pub fn empty(method: &str, uri: &str) -> Request<Body> {
        Request::builder().method(method).uri(uri).body(Body::empty()).expect("request")
    }
}
