//! HTTP implementation of the remote record service.

use crate::error::CoreError;
use async_trait::async_trait;
use log::{debug, warn};
use pdfdesk_config::RemoteConfig;
use pdfdesk_protocol::{FilterState, Record, RecordId, RecordService, ServiceError, UploadFile};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

/// Collection path segment shared by every endpoint.
const COLLECTION: &str = "pdfs";

/// Record service speaking JSON over HTTP to a single base URL.
#[derive(Debug, Clone)]
pub struct HttpRecordService {
    client: Client,
    base_url: Url,
}

impl HttpRecordService {
    /// Build a service from remote settings.
    pub fn new(config: &RemoteConfig) -> Result<Self, CoreError> {
        let base_url = Url::parse(config.base_url.trim())
            .map_err(|err| CoreError::InvalidBaseUrl(format!("{}: {err}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(CoreError::InvalidBaseUrl(config.base_url.clone()));
        }
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        debug!(
            "http record service ready (base_url={}, timeout_ms={})",
            base_url, config.request_timeout_ms
        );
        Ok(Self { client, base_url })
    }

    /// Base URL requests are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve `{base}/pdfs/{segments...}`, percent-encoding each segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ServiceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ServiceError::Transport(format!("invalid base url: {}", self.base_url)))?
            .pop_if_empty()
            .push(COLLECTION)
            .extend(segments);
        Ok(url)
    }
}

fn transport(err: reqwest::Error) -> ServiceError {
    ServiceError::Transport(err.to_string())
}

/// Map non-2xx responses to `ServiceError::Status`, keeping the body for diagnostics.
async fn ensure_success(response: Response) -> Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().clone();
    let body = response.text().await.unwrap_or_default();
    warn!(
        "remote request rejected (url={}, status={})",
        url,
        status.as_u16()
    );
    Err(ServiceError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, ServiceError> {
    let bytes = response.bytes().await.map_err(transport)?;
    serde_json::from_slice(&bytes).map_err(|err| ServiceError::Decode(err.to_string()))
}

#[async_trait]
impl RecordService for HttpRecordService {
    async fn list(&self, filter: FilterState) -> Result<Vec<Record>, ServiceError> {
        let url = self.endpoint(&[])?;
        debug!("GET {} (filter={})", url, filter);
        let mut request = self.client.get(url);
        if let Some(selected) = filter.query_value() {
            request = request.query(&[("selected", selected)]);
        }
        let response = request.send().await.map_err(transport)?;
        decode_json(ensure_success(response).await?).await
    }

    async fn update(&self, record: &Record) -> Result<(), ServiceError> {
        let id = record.id.to_string();
        let url = self.endpoint(&[&id])?;
        debug!("PUT {}", url);
        let response = self
            .client
            .put(url)
            .json(record)
            .send()
            .await
            .map_err(transport)?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn delete(&self, id: &RecordId) -> Result<(), ServiceError> {
        let id = id.to_string();
        let url = self.endpoint(&[&id])?;
        debug!("DELETE {}", url);
        let response = self.client.delete(url).send().await.map_err(transport)?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn upload(&self, file: UploadFile) -> Result<Record, ServiceError> {
        let url = self.endpoint(&["upload"])?;
        debug!(
            "POST {} (file_name={}, bytes={})",
            url,
            file.file_name,
            file.bytes.len()
        );
        let part = Part::bytes(file.bytes)
            .file_name(file.file_name)
            .mime_str(&file.content_type)
            .map_err(transport)?;
        let form = Form::new().part("file", part);
        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(transport)?;
        decode_json(ensure_success(response).await?).await
    }

    async fn ask(&self, id: &RecordId, question: &str) -> Result<Value, ServiceError> {
        let id = id.to_string();
        let url = self.endpoint(&["qa-pdf", &id])?;
        debug!("POST {} (question_len={})", url, question.len());
        let response = self
            .client
            .post(url)
            .json(&json!({ "question": question }))
            .send()
            .await
            .map_err(transport)?;
        decode_json(ensure_success(response).await?).await
    }
}

#[cfg(test)]
mod tests {
    use super::HttpRecordService;
    use pdfdesk_config::RemoteConfig;
    use pretty_assertions::assert_eq;

    fn service(base_url: &str) -> HttpRecordService {
        HttpRecordService::new(&RemoteConfig {
            base_url: base_url.to_string(),
            ..RemoteConfig::default()
        })
        .expect("service")
    }

    #[test]
    fn endpoint_joins_segments_under_collection() {
        let service = service("http://localhost:8080");
        assert_eq!(
            service.endpoint(&[]).expect("url").as_str(),
            "http://localhost:8080/pdfs"
        );
        assert_eq!(
            service.endpoint(&["qa-pdf", "7"]).expect("url").as_str(),
            "http://localhost:8080/pdfs/qa-pdf/7"
        );
    }

    #[test]
    fn endpoint_keeps_base_path_and_encodes_ids() {
        let service = service("http://host/api/");
        assert_eq!(
            service.endpoint(&["a b"]).expect("url").as_str(),
            "http://host/api/pdfs/a%20b"
        );
    }

    #[test]
    fn rejects_unusable_base_url() {
        let err = HttpRecordService::new(&RemoteConfig {
            base_url: "not a url".to_string(),
            ..RemoteConfig::default()
        })
        .expect_err("invalid");
        assert!(format!("{err}").contains("invalid base url"));
    }
}
