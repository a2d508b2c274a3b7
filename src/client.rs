use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Proxy, Response};
use serde::Deserialize;
use url::Url;

use crate::backend::{Backend, ChatStream};
use crate::client_logger::ClientLogger;
use crate::config::OllamaOptions;
use crate::error::{Error, Result};
use crate::ndjson::process_ndjson;
use crate::observability::{
    CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS, STREAM_FRAGMENTS,
};
use crate::types::ChatRequest;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for an Ollama server.
#[derive(Clone)]
pub struct Ollama {
    client: ReqwestClient,
    base_url: Url,
    connect_timeout: Duration,
    logger: Option<Arc<dyn ClientLogger>>,
}

impl Ollama {
    /// Create a new client for the server described by `options`.
    ///
    /// The host may omit the scheme (`127.0.0.1:11434`), in which case `http` is assumed.
    pub fn new(options: &OllamaOptions) -> Result<Self> {
        let base_url = normalize_host(&options.host)?;

        let mut builder = ReqwestClient::builder().connect_timeout(DEFAULT_CONNECT_TIMEOUT);
        if let Some(proxy) = options.proxy.as_deref() {
            let proxy = Proxy::all(proxy).map_err(|e| {
                Error::validation(
                    format!("Invalid proxy {proxy}: {e}"),
                    Some("proxy".to_string()),
                )
            })?;
            builder = builder.proxy(proxy);
        }
        let client = builder.build().map_err(|e| {
            Error::http_client(
                format!("Failed to build HTTP client: {}", e),
                Some(Box::new(e)),
            )
        })?;

        Ok(Self {
            client,
            base_url,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            logger: None,
        })
    }

    /// Attach a logger that observes every request and streamed line.
    pub fn with_logger(mut self, logger: Arc<dyn ClientLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// The URL requests are sent to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Create and return default headers for requests.
    fn default_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/x-ndjson"),
        );
        headers
    }

    /// Process error responses and convert to our Error type
    async fn process_error_response(response: Response, model: &str) -> Error {
        let status_code = response.status().as_u16();

        #[derive(Deserialize)]
        struct ErrorResponse {
            error: Option<String>,
        }

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {}", e),
                    Some(Box::new(e)),
                );
            }
        };

        let error_message = serde_json::from_str::<ErrorResponse>(&error_body)
            .ok()
            .and_then(|e| e.error)
            .unwrap_or(error_body);

        match status_code {
            400 => Error::bad_request(error_message),
            404 => Error::not_found(error_message, Some(model.to_string())),
            408 => Error::timeout(error_message, None),
            _ => Error::api(status_code, error_message),
        }
    }
}

#[async_trait::async_trait]
impl Backend for Ollama {
    async fn chat(&self, mut request: ChatRequest) -> Result<ChatStream> {
        request.stream = true;
        let url = self.base_url.join("api/chat")?;

        if let Some(logger) = &self.logger {
            logger.log_request(&request);
        }
        CLIENT_REQUESTS.click();
        let start = Instant::now();

        let response = self
            .client
            .post(url)
            .headers(Self::default_headers())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                CLIENT_REQUEST_ERRORS.click();
                if e.is_timeout() {
                    Error::timeout(
                        format!("Request timed out: {}", e),
                        Some(self.connect_timeout.as_secs_f64()),
                    )
                } else if e.is_connect() {
                    Error::connection(format!("Connection error: {}", e), Some(Box::new(e)))
                } else {
                    Error::http_client(format!("Request failed: {}", e), Some(Box::new(e)))
                }
            })
            .inspect_err(|e| {
                if let Some(logger) = &self.logger {
                    logger.log_error(e);
                }
            })?;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());

        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            let err = Self::process_error_response(response, &request.model).await;
            if let Some(logger) = &self.logger {
                logger.log_error(&err);
            }
            return Err(err);
        }

        let logger = self.logger.clone();
        let events = process_ndjson(response.bytes_stream()).map(move |event| {
            match &event {
                Ok(event) => {
                    STREAM_FRAGMENTS.click();
                    if let Some(logger) = &logger {
                        logger.log_stream_event(event);
                    }
                }
                Err(err) => {
                    if let Some(logger) = &logger {
                        logger.log_error(err);
                    }
                }
            }
            event
        });

        Ok(ChatStream::new(events))
    }
}

/// Turn a host such as `127.0.0.1:11434` or `https://llm.example.com/` into a base URL
/// that ends in a slash.
fn normalize_host(host: &str) -> Result<Url> {
    let host = host.trim();
    if host.is_empty() {
        return Err(Error::validation(
            "Ollama host must not be empty",
            Some("host".to_string()),
        ));
    }
    let with_scheme = if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    };
    let mut url = Url::parse(&with_scheme)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
