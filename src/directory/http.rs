//! HTTP directory client.
//!
//! Fetches `GET {url}/v1/services/{service}` and expects a JSON array of
//! `{"host": .., "port": .., "weight": ..}` objects (`weight` optional).

use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};

use crate::config::DirectoryConfig;
use crate::directory::{Directory, DirectoryError};
use crate::load_balancer::EndpointAddr;

#[derive(Debug, Clone)]
pub struct HttpDirectory {
    base_url: String,
    client: reqwest::Client,
}

impl HttpDirectory {
    pub fn new(config: &DirectoryConfig) -> Result<Self, DirectoryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;
        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn fetch(&self, service: &str) -> Result<Vec<EndpointAddr>, DirectoryError> {
        let url = format!("{}/v1/services/{}", self.base_url, service);
        let res = self.client.get(&url).send().await?;
        match res.status() {
            s if s.is_success() => Ok(res.json().await?),
            reqwest::StatusCode::NOT_FOUND => Err(DirectoryError::UnknownService(service.to_string())),
            s => Err(DirectoryError::Status(s.as_u16())),
        }
    }
}

impl Directory for HttpDirectory {
    fn list_endpoints_for<'a>(
        &'a self,
        service: &'a str,
    ) -> BoxFuture<'a, Result<Vec<EndpointAddr>, DirectoryError>> {
        self.fetch(service).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Path, http::StatusCode, routing::get, Json, Router};

    async fn serve() -> String {
        let app = Router::new().route(
            "/v1/services/{name}",
            get(|Path(name): Path<String>| async move {
                if name == "middletier" {
                    Ok(Json(serde_json::json!([
                        {"host": "10.0.0.1", "port": 8080},
                        {"host": "10.0.0.2", "port": 8080, "weight": 4}
                    ])))
                } else {
                    Err(StatusCode::NOT_FOUND)
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_fetches_and_decodes() {
        let config = DirectoryConfig {
            url: serve().await,
            ..DirectoryConfig::default()
        };
        let dir = HttpDirectory::new(&config).unwrap();

        let eps = dir.list_endpoints_for("middletier").await.unwrap();
        assert_eq!(eps.len(), 2);
        assert_eq!(eps[0].weight, 1);
        assert_eq!(eps[1], EndpointAddr::new("10.0.0.2", 8080).with_weight(4));

        let err = dir.list_endpoints_for("nope").await.unwrap_err();
        assert!(matches!(err, DirectoryError::UnknownService(_)));
    }
}
