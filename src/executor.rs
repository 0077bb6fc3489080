//! Request execution: the plain transport path and the fault-tolerant
//! wrapper around it.

use async_trait::async_trait;
use gqlclient_core::{
    GraphqlClientError, GraphqlRequest, HttpMethod, RawResponse, RequestOptions, Result,
};
use gqlclient_resilience::BreakerChain;
use gqlclient_telemetry::ClientMetrics;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use url::Url;

/// Executes one request against the remote endpoint.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Execute the request and return the undecoded response.
    async fn execute(
        &self,
        request: &GraphqlRequest,
        options: &RequestOptions,
    ) -> Result<RawResponse>;
}

/// Sends one request over the pooled transport and decodes nothing; no retry
/// logic, no failure classification beyond transport vs. HTTP status.
pub struct PlainExecutor {
    http: reqwest::Client,
    endpoint: Url,
    default_method: HttpMethod,
    metrics: Arc<ClientMetrics>,
    // reqwest only caps idle connections, so the concurrent-connection
    // ceiling is enforced here: callers block on a permit before dialing.
    permits: Arc<Semaphore>,
}

impl PlainExecutor {
    /// Create an executor over the shared pooled client, admitting at most
    /// `max_connections` concurrent transport calls.
    pub fn new(
        http: reqwest::Client,
        endpoint: Url,
        default_method: HttpMethod,
        max_connections: usize,
        metrics: Arc<ClientMetrics>,
    ) -> Self {
        Self {
            http,
            endpoint,
            default_method,
            metrics,
            permits: Arc::new(Semaphore::new(max_connections)),
        }
    }

    /// One transport round trip. With `classify` set (fault-tolerant mode),
    /// 503 and other 5xx statuses and timeouts surface as their own failure
    /// classes; otherwise every non-success status is one undifferentiated
    /// HTTP-status failure.
    pub(crate) async fn transport(
        &self,
        request: &GraphqlRequest,
        options: &RequestOptions,
        classify: bool,
    ) -> Result<RawResponse> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| GraphqlClientError::transport("Connection pool closed"))?;

        let started = Instant::now();
        self.metrics.request_started();
        let result = self.dial(request, options, classify, started).await;
        self.metrics.request_finished();

        match &result {
            Ok(raw) => self.metrics.record_request(raw.duration_ms),
            Err(error) => {
                self.metrics
                    .record_request(started.elapsed().as_millis() as u64);
                self.metrics.record_error(error.status_code());
            }
        }
        result
    }

    async fn dial(
        &self,
        request: &GraphqlRequest,
        options: &RequestOptions,
        classify: bool,
        started: Instant,
    ) -> Result<RawResponse> {
        let method = options.method.unwrap_or(self.default_method);
        let mut builder = match method {
            HttpMethod::Get => {
                let mut params: Vec<(&str, String)> =
                    vec![("query", request.query.clone())];
                if let Some(name) = &request.operation_name {
                    params.push(("operationName", name.clone()));
                }
                if let Some(variables) = &request.variables {
                    let encoded = serde_json::to_string(variables).map_err(|e| {
                        GraphqlClientError::transport(format!("Failed to encode variables: {e}"))
                    })?;
                    params.push(("variables", encoded));
                }
                self.http.get(self.endpoint.clone()).query(&params)
            }
            HttpMethod::Post => self.http.post(self.endpoint.clone()).json(request),
        };

        // Per-request headers override the client's static headers on
        // name conflict.
        for (name, value) in options.headers.iter().flatten() {
            builder = builder.header(name.as_str(), value.as_str());
        }

        debug!(method = ?method, endpoint = %self.endpoint, "Sending GraphQL request");

        let response = builder
            .send()
            .await
            .map_err(|e| map_reqwest_error(&e, classify, started))?;
        let status = response.status().as_u16();

        // The body is consumed on every path so the pooled connection can
        // be returned to the pool.
        let body = response
            .text()
            .await
            .map_err(|e| map_reqwest_error(&e, classify, started))?;
        let duration_ms = started.elapsed().as_millis() as u64;

        if !(200..300).contains(&status) {
            let error = if classify {
                match status {
                    503 => GraphqlClientError::service_unavailable(status, body),
                    500..=599 => GraphqlClientError::server(status, body),
                    _ => GraphqlClientError::http_status(status),
                }
            } else {
                GraphqlClientError::http_status(status)
            };
            warn!(status, duration_ms, "GraphQL request failed");
            return Err(error);
        }

        Ok(RawResponse {
            status,
            body,
            duration_ms,
        })
    }
}

#[async_trait]
impl Executor for PlainExecutor {
    async fn execute(
        &self,
        request: &GraphqlRequest,
        options: &RequestOptions,
    ) -> Result<RawResponse> {
        self.transport(request, options, false).await
    }
}

/// Wraps the plain transport call with the three chained circuit breakers.
/// Any open breaker fails the call fast; the transport is never dialed.
pub struct FaultTolerantExecutor {
    inner: PlainExecutor,
    chain: Arc<BreakerChain>,
}

impl FaultTolerantExecutor {
    /// Wrap the plain executor with the breaker chain.
    pub fn new(inner: PlainExecutor, chain: Arc<BreakerChain>) -> Self {
        Self { inner, chain }
    }
}

#[async_trait]
impl Executor for FaultTolerantExecutor {
    async fn execute(
        &self,
        request: &GraphqlRequest,
        options: &RequestOptions,
    ) -> Result<RawResponse> {
        self.chain.check()?;

        match self.inner.transport(request, options, true).await {
            Ok(raw) => {
                self.chain.on_success();
                Ok(raw)
            }
            Err(error) => {
                self.chain.on_failure(&error);
                Err(error)
            }
        }
    }
}

fn map_reqwest_error(
    error: &reqwest::Error,
    classify: bool,
    started: Instant,
) -> GraphqlClientError {
    if error.is_timeout() {
        if classify {
            GraphqlClientError::timeout(started.elapsed().as_millis() as u64)
        } else {
            GraphqlClientError::transport(format!("Request timed out: {error}"))
        }
    } else {
        GraphqlClientError::transport(error.to_string())
    }
}
