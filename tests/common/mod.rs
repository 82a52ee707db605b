//! In-process fake of the Supabase Storage REST API.
//!
//! Routes mirror the endpoints `SupabaseStore` calls and delegate to a shared
//! `MemoryStore`, so tests can seed and inspect remote state directly.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use futures::{StreamExt, stream};
use harakka_backup::{
    errors::StoreError,
    models::bucket::{Bucket, BucketSettings},
    models::object::ListEntry,
    services::{memory_store::MemoryStore, store::ObjectStore, supabase_store::SupabaseStore},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::{net::TcpListener, task::JoinHandle};

pub const SERVICE_KEY: &str = "test-service-key";

pub struct FakeStorage {
    pub base_url: String,
    pub store: Arc<MemoryStore>,
    handle: JoinHandle<()>,
}

impl FakeStorage {
    /// Serve `store` on an ephemeral local port.
    pub async fn start(store: Arc<MemoryStore>) -> Self {
        let app = Router::new()
            .route("/storage/v1/bucket", get(list_buckets).post(create_bucket))
            .route("/storage/v1/bucket/{id}", put(update_bucket))
            .route("/storage/v1/object/list/{bucket}", post(list_objects))
            .route(
                "/storage/v1/object/{bucket}/{*key}",
                get(download).post(upload),
            )
            .layer(middleware::from_fn(require_service_key))
            .with_state(store.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind fake storage");
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            base_url,
            store,
            handle,
        }
    }

    /// A client authenticated with `key`.
    pub fn client_with_key(&self, key: &str) -> Arc<dyn ObjectStore> {
        Arc::new(SupabaseStore::builder(&self.base_url, key).build().unwrap())
    }

    pub fn client(&self) -> Arc<dyn ObjectStore> {
        self.client_with_key(SERVICE_KEY)
    }
}

impl Drop for FakeStorage {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Storage errors rendered the way the hosted API does: missing things come
/// back as 400 with a `statusCode` of "404" in the body.
struct ApiError(StoreError);

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, error) = match &self.0 {
            StoreError::BucketNotFound(_) | StoreError::ObjectNotFound { .. } => {
                (StatusCode::BAD_REQUEST, "404".to_string(), "not_found")
            }
            StoreError::AlreadyExists(_) => (StatusCode::CONFLICT, "409".to_string(), "Duplicate"),
            StoreError::Status { status, .. } => (
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_REQUEST),
                status.to_string(),
                "rejected",
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "500".to_string(),
                "internal",
            ),
        };
        let body = json!({
            "statusCode": code,
            "error": error,
            "message": self.0.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

async fn require_service_key(req: Request, next: Next) -> Response {
    let headers = req.headers();
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let apikey = headers.get("apikey").and_then(|v| v.to_str().ok());
    let expected = format!("Bearer {SERVICE_KEY}");

    if bearer != Some(expected.as_str()) || apikey != Some(SERVICE_KEY) {
        let body = json!({
            "statusCode": "401",
            "error": "Unauthorized",
            "message": "invalid signature",
        });
        return (StatusCode::UNAUTHORIZED, Json(body)).into_response();
    }
    next.run(req).await
}

async fn list_buckets(
    State(store): State<Arc<MemoryStore>>,
) -> Result<Json<Vec<Bucket>>, ApiError> {
    Ok(Json(store.list_buckets().await?))
}

async fn create_bucket(
    State(store): State<Arc<MemoryStore>>,
    Json(settings): Json<BucketSettings>,
) -> Result<Json<Value>, ApiError> {
    store.create_bucket(&settings).await?;
    Ok(Json(json!({ "name": settings.name })))
}

async fn update_bucket(
    State(store): State<Arc<MemoryStore>>,
    Path(id): Path<String>,
    Json(settings): Json<BucketSettings>,
) -> Result<Json<Value>, ApiError> {
    let settings = BucketSettings { name: id, ..settings };
    store.update_bucket(&settings).await?;
    Ok(Json(json!({ "message": "Successfully updated" })))
}

#[derive(Deserialize)]
struct ListBody {
    #[serde(default)]
    prefix: String,
    limit: usize,
    #[serde(default)]
    offset: usize,
}

async fn list_objects(
    State(store): State<Arc<MemoryStore>>,
    Path(bucket): Path<String>,
    Json(body): Json<ListBody>,
) -> Result<Json<Vec<ListEntry>>, ApiError> {
    let entries = store
        .list_page(&bucket, &body.prefix, body.limit, body.offset)
        .await?;
    Ok(Json(entries))
}

async fn download(
    State(store): State<Arc<MemoryStore>>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let mut body = store.download(&bucket, &key).await?;
    let mut data = Vec::new();
    while let Some(chunk) = body.next().await {
        data.extend_from_slice(&chunk.map_err(StoreError::from)?);
    }
    let content_type = store
        .object(&bucket, &key)
        .map(|object| object.content_type)
        .unwrap_or_else(|| "application/octet-stream".to_string());
    Ok(([(header::CONTENT_TYPE, content_type)], data).into_response())
}

async fn upload(
    State(store): State<Arc<MemoryStore>>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    let upsert = headers
        .get("x-upsert")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("true"));
    let length = body.len() as u64;
    let stream = stream::once(async move { Ok::<_, std::io::Error>(body) }).boxed();

    store
        .upload(&bucket, &key, &content_type, length, stream, upsert)
        .await?;
    Ok(Json(json!({ "Key": format!("{bucket}/{key}") })))
}
