use std::time::Duration;

use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// PostgREST client over the Supabase REST surface.
///
/// All access uses the service role key; inbound traffic is machine events
/// (webhooks, sweeps), not end-user sessions.
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    service_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build http client");

        Self {
            client,
            base_url: config.supabase_url.clone(),
            service_key: config.supabase_service_key.clone(),
        }
    }

    fn get_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", HeaderValue::from_str(&self.service_key).unwrap());
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.service_key)).unwrap(),
        );

        headers
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, DbError>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(method, path, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T, DbError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making request to {}", url);

        let mut headers = self.get_headers();
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url).headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Database API error ({}): {}", status, error_text);

            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => DbError::Auth(error_text),
                StatusCode::NOT_FOUND => DbError::NotFound(error_text),
                StatusCode::CONFLICT => DbError::Conflict(error_text),
                _ => DbError::Api {
                    status: status.as_u16(),
                    body: error_text,
                },
            });
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// SELECT rows via a PostgREST filter path.
    pub async fn select<T>(&self, path: &str) -> Result<Vec<T>, DbError>
    where
        T: DeserializeOwned,
    {
        let rows: Vec<Value> = self.request(Method::GET, path, None).await?;
        rows.into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| DbError::Api {
                    status: 200,
                    body: format!("failed to parse row: {}", e),
                })
            })
            .collect()
    }

    /// INSERT a single row and return the stored representation.
    ///
    /// A unique-constraint violation surfaces as `DbError::Conflict`.
    pub async fn insert<T>(&self, table: &str, body: Value) -> Result<T, DbError>
    where
        T: DeserializeOwned,
    {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let path = format!("/rest/v1/{}", table);
        let rows: Vec<Value> = self
            .request_with_headers(Method::POST, &path, Some(body), Some(headers))
            .await?;

        let row = rows.into_iter().next().ok_or_else(|| DbError::Api {
            status: 200,
            body: format!("insert into {} returned no rows", table),
        })?;

        serde_json::from_value(row).map_err(|e| DbError::Api {
            status: 200,
            body: format!("failed to parse inserted row: {}", e),
        })
    }

    /// UPDATE rows matching the filter path and return them.
    ///
    /// An empty result means no row matched the filter; callers performing
    /// conditional (optimistic) updates treat that as losing the race.
    pub async fn update<T>(&self, path: &str, body: Value) -> Result<Vec<T>, DbError>
    where
        T: DeserializeOwned,
    {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let rows: Vec<Value> = self
            .request_with_headers(Method::PATCH, path, Some(body), Some(headers))
            .await?;

        rows.into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| DbError::Api {
                    status: 200,
                    body: format!("failed to parse updated row: {}", e),
                })
            })
            .collect()
    }
}
