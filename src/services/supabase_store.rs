//! [`ObjectStore`] over the Supabase Storage REST API.
//!
//! ## Endpoints used
//! - `GET  /storage/v1/bucket`: list buckets
//! - `POST /storage/v1/bucket`: create bucket
//! - `PUT  /storage/v1/bucket/{id}`: update bucket settings
//! - `POST /storage/v1/object/list/{bucket}`: list one prefix level
//! - `GET  /storage/v1/object/{bucket}/{*key}`: download
//! - `POST /storage/v1/object/{bucket}/{*key}`: upload (`x-upsert`)
//!
//! Every request carries the service key both as bearer token and `apikey`.

use super::store::{ByteStream, ObjectStore};
use crate::{
    errors::{StoreError, StoreResult},
    models::{
        bucket::{Bucket, BucketSettings},
        object::ListEntry,
    },
};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::{Body, Client, RequestBuilder, Response, header};
use serde::{Deserialize, Serialize};
use std::{fmt, io, time::Duration};
use tracing::debug;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Characters left as-is inside one key segment.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

#[derive(Clone)]
pub struct SupabaseStore {
    client: Client,
    base_url: String,
    key: String,
}

impl fmt::Debug for SupabaseStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupabaseStore")
            .field("base_url", &self.base_url)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Builder for configuring a [`SupabaseStore`].
#[derive(Debug)]
pub struct SupabaseStoreBuilder {
    base_url: String,
    key: String,
    timeout: Duration,
}

impl SupabaseStoreBuilder {
    pub fn new(base_url: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            key: key.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> StoreResult<SupabaseStore> {
        let client = Client::builder().timeout(self.timeout).build()?;
        Ok(SupabaseStore {
            client,
            base_url: self.base_url,
            key: self.key,
        })
    }
}

#[derive(Serialize)]
struct SortBy {
    column: &'static str,
    order: &'static str,
}

#[derive(Serialize)]
struct ListRequest<'a> {
    prefix: &'a str,
    limit: usize,
    offset: usize,
    #[serde(rename = "sortBy")]
    sort_by: SortBy,
}

#[derive(Serialize)]
struct BucketRequest<'a> {
    id: &'a str,
    name: &'a str,
    public: bool,
    file_size_limit: Option<u64>,
    allowed_mime_types: Option<&'a [String]>,
}

impl<'a> From<&'a BucketSettings> for BucketRequest<'a> {
    fn from(settings: &'a BucketSettings) -> Self {
        Self {
            id: &settings.name,
            name: &settings.name,
            public: settings.public,
            file_size_limit: settings.file_size_limit,
            allowed_mime_types: settings.allowed_mime_types.as_deref(),
        }
    }
}

/// Error payload returned by the storage API. `statusCode` is sometimes a
/// string and sometimes a number.
#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(rename = "statusCode", default)]
    status_code: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// What a request was about, for turning 404/409 into typed errors.
enum Subject<'a> {
    Buckets,
    Bucket(&'a str),
    Object { bucket: &'a str, key: &'a str },
}

impl SupabaseStore {
    pub fn builder(base_url: impl Into<String>, key: impl Into<String>) -> SupabaseStoreBuilder {
        SupabaseStoreBuilder::new(base_url, key)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/storage/v1/{}", self.base_url, path)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.bearer_auth(&self.key).header("apikey", &self.key)
    }

    /// Pass 2xx responses through, map everything else to a [`StoreError`].
    async fn check(response: Response, subject: Subject<'_>) -> StoreResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();
        let code = match &body.status_code {
            Some(serde_json::Value::String(code)) => code.parse::<u16>().ok(),
            Some(serde_json::Value::Number(code)) => code.as_u64().map(|c| c as u16),
            _ => None,
        }
        .unwrap_or(status.as_u16());
        let message = body
            .message
            .or(body.error.clone())
            .unwrap_or_else(|| text.clone());

        let duplicate = body
            .error
            .as_deref()
            .is_some_and(|e| e.eq_ignore_ascii_case("duplicate"));
        if status.as_u16() == 409 || code == 409 || duplicate {
            let name = match subject {
                Subject::Buckets => String::new(),
                Subject::Bucket(name) => name.to_string(),
                Subject::Object { bucket, key } => format!("{bucket}/{key}"),
            };
            return Err(StoreError::AlreadyExists(name));
        }
        if status.as_u16() == 404 || code == 404 {
            match subject {
                Subject::Bucket(name) => return Err(StoreError::BucketNotFound(name.to_string())),
                Subject::Object { bucket, key } => {
                    return Err(StoreError::ObjectNotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    });
                }
                Subject::Buckets => {}
            }
        }
        Err(StoreError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

/// Percent-encode each `/`-separated segment of an object key.
pub fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait]
impl ObjectStore for SupabaseStore {
    async fn list_buckets(&self) -> StoreResult<Vec<Bucket>> {
        let response = self
            .authed(self.client.get(self.url("bucket")))
            .send()
            .await?;
        let response = Self::check(response, Subject::Buckets).await?;
        response
            .json::<Vec<Bucket>>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<ListEntry>> {
        debug!("listing {}/{} offset={} limit={}", bucket, prefix, offset, limit);
        let request = ListRequest {
            prefix,
            limit,
            offset,
            sort_by: SortBy {
                column: "name",
                order: "asc",
            },
        };
        let url = self.url(&format!("object/list/{}", encode_key(bucket)));
        let response = self
            .authed(self.client.post(url))
            .json(&request)
            .send()
            .await?;
        let response = Self::check(response, Subject::Bucket(bucket)).await?;
        response
            .json::<Vec<ListEntry>>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn download(&self, bucket: &str, key: &str) -> StoreResult<ByteStream> {
        let url = self.url(&format!("object/{}/{}", encode_key(bucket), encode_key(key)));
        let response = self.authed(self.client.get(url)).send().await?;
        let response = Self::check(response, Subject::Object { bucket, key }).await?;
        Ok(response.bytes_stream().map_err(io::Error::other).boxed())
    }

    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        length: u64,
        body: ByteStream,
        upsert: bool,
    ) -> StoreResult<()> {
        let url = self.url(&format!("object/{}/{}", encode_key(bucket), encode_key(key)));
        let response = self
            .authed(self.client.post(url))
            .header(header::CONTENT_TYPE, content_type)
            .header(header::CONTENT_LENGTH, length)
            .header("x-upsert", if upsert { "true" } else { "false" })
            .body(Body::wrap_stream(body))
            .send()
            .await?;
        Self::check(response, Subject::Object { bucket, key }).await?;
        Ok(())
    }

    async fn create_bucket(&self, settings: &BucketSettings) -> StoreResult<()> {
        let response = self
            .authed(self.client.post(self.url("bucket")))
            .json(&BucketRequest::from(settings))
            .send()
            .await?;
        Self::check(response, Subject::Bucket(&settings.name)).await?;
        Ok(())
    }

    async fn update_bucket(&self, settings: &BucketSettings) -> StoreResult<()> {
        let url = self.url(&format!("bucket/{}", encode_key(&settings.name)));
        let response = self
            .authed(self.client.put(url))
            .json(&BucketRequest::from(settings))
            .send()
            .await?;
        Self::check(response, Subject::Bucket(&settings.name)).await?;
        Ok(())
    }
}
