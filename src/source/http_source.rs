//! HTTP source adapter
//!
//! [`HttpSource`] turns a [`SourceConfig`] into a [`PageFetcher`] and a
//! [`FieldDiscovery`], so any API that fits the definition format can be
//! harvested and validated without source-specific code.

use super::extract::{extract_count, extract_path, extract_records, extract_string};
use super::types::{DiscoveryConfig, PaginationConfig, ProbeConfig, RequestStyle, SourceConfig};
use crate::error::{Error, Result};
use crate::http::{HttpClient, HttpClientConfig, RateLimiter, RequestConfig};
use crate::pagination::{Page, PageFetcher, PageRequest, PaginationMode};
use crate::schema::{
    parse_describe_response, parse_probe_message, probe_error_message, FieldDiscovery, FieldKind,
    SourceSchema,
};
use crate::template::{render_map, TemplateContext};
use crate::types::{Method, QueryDescriptor};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Existing `limit N` / `skip N` clauses in DSL query text
static DSL_PAGING_CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s+(limit|skip)\s+\d+").expect("paging clause regex is valid")
});

/// Strip paging clauses from DSL text and append ` limit N skip M`
pub fn dsl_page_query(query: &str, limit: u64, skip: u64) -> String {
    let base = DSL_PAGING_CLAUSE.replace_all(query.trim(), "");
    format!("{} limit {limit} skip {skip}", base.trim_end())
}

/// A data source reached over HTTP, described by a [`SourceConfig`]
#[derive(Debug, Clone)]
pub struct HttpSource {
    config: SourceConfig,
    client: HttpClient,
    default_params: BTreeMap<String, String>,
}

impl HttpSource {
    /// Create a source with default client settings, templates resolved
    /// against the process environment
    pub fn new(config: SourceConfig) -> Result<Self> {
        Self::with_client_config(config, HttpClientConfig::default(), &TemplateContext::from_env())
    }

    /// Create a source with explicit client settings and template context
    ///
    /// The client's base URL and default headers come from the definition.
    pub fn with_client_config(
        config: SourceConfig,
        mut client_config: HttpClientConfig,
        ctx: &TemplateContext,
    ) -> Result<Self> {
        config.validate()?;

        client_config.base_url = Some(config.base_url.clone());
        client_config
            .default_headers
            .extend(render_map(&config.headers, ctx)?);

        let default_params = render_map(&config.default_params, ctx)?;
        let client = HttpClient::with_config(client_config)?;

        Ok(Self {
            config,
            client,
            default_params,
        })
    }

    /// Pace request retries through the run's shared limiter
    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.client = self.client.with_rate_limiter(limiter);
        self
    }

    /// Source name
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Source definition
    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// Pagination mode for the engine
    pub fn pagination_mode(&self) -> PaginationMode {
        self.config.pagination_mode()
    }

    /// Request parameters and body for one page
    pub fn page_request(
        &self,
        descriptor: &QueryDescriptor,
        request: &PageRequest,
    ) -> Result<RequestConfig> {
        let mut req = RequestConfig::new();

        for (key, value) in &self.default_params {
            req = req.query(key, value);
        }

        let style = match &self.config.pagination {
            PaginationConfig::Offset { style, .. } => *style,
            PaginationConfig::Cursor { .. } => RequestStyle::Params,
        };

        if style == RequestStyle::Dsl {
            let query = descriptor.query.as_deref().ok_or_else(|| {
                Error::config(format!("source '{}' needs query text", self.config.name))
            })?;
            let (skip, limit) = match request {
                PageRequest::Offset { skip, limit } => (*skip, *limit),
                PageRequest::Cursor { page_size, .. } => (0, *page_size),
            };
            return Ok(req.text(dsl_page_query(query, limit, skip)));
        }

        let names = &self.config.params;
        let mapped = [
            (&names.query, descriptor.query.clone()),
            (&names.filter, descriptor.filter.clone()),
            (&names.select, descriptor.select.clone()),
            (&names.sort, descriptor.sort.clone()),
            (&names.facet, facet_list(descriptor)),
        ];
        for (name, value) in mapped {
            if let (Some(name), Some(value)) = (name, value) {
                req = req.query(name, value);
            }
        }

        for (key, value) in &descriptor.params {
            req = req.query(key, value);
        }

        match (&self.config.pagination, request) {
            (
                PaginationConfig::Offset {
                    skip_param,
                    limit_param,
                    ..
                },
                PageRequest::Offset { skip, limit },
            ) => {
                req = req
                    .query(skip_param, skip.to_string())
                    .query(limit_param, limit.to_string());
            }
            (
                PaginationConfig::Cursor {
                    cursor_param,
                    size_param,
                    ..
                },
                PageRequest::Cursor { cursor, page_size },
            ) => {
                req = req
                    .query(cursor_param, cursor)
                    .query(size_param, page_size.to_string());
            }
            _ => {
                return Err(Error::config(format!(
                    "source '{}' paginates by {} but got a {} request",
                    self.config.name,
                    self.config.pagination_mode().name(),
                    match request {
                        PageRequest::Offset { .. } => "offset",
                        PageRequest::Cursor { .. } => "cursor",
                    }
                )))
            }
        }

        Ok(req)
    }

    /// Turn a response body into a page
    pub fn decode_page(&self, body: &Value) -> Result<Page> {
        let records = extract_records(body, self.config.records_path.as_deref())?;
        let mut page = Page::new(records);
        if let Some(total) = self
            .config
            .total_path
            .as_deref()
            .and_then(|path| extract_count(body, path))
        {
            page = page.with_total(total);
        }
        if let Some(cursor) = self
            .config
            .cursor_path
            .as_deref()
            .and_then(|path| extract_string(body, path))
        {
            page = page.with_cursor(cursor);
        }
        Ok(page)
    }

    async fn send(&self, endpoint: &str, req: RequestConfig) -> Result<Value> {
        let method: reqwest::Method = self.config.method.into();
        self.client.request_json(method, endpoint, req).await
    }

    async fn describe(
        &self,
        source: &str,
        endpoint: Option<&str>,
        request: Option<&str>,
        fields_path: &str,
        metrics_path: &str,
    ) -> Result<SourceSchema> {
        let endpoint = endpoint.unwrap_or(&self.config.endpoint);
        let mut req = RequestConfig::new();
        for (key, value) in &self.default_params {
            req = req.query(key, value);
        }
        if let Some(text) = request {
            req = req.text(text);
        }

        let body = self
            .send(endpoint, req)
            .await
            .map_err(|e| Error::discovery(source, format!("describe request failed: {e}")))?;

        let fields = extract_path(&body, fields_path).unwrap_or(Value::Null);
        let metrics = extract_path(&body, metrics_path).unwrap_or(Value::Null);
        if fields.is_null() && metrics.is_null() {
            return Err(Error::discovery(
                source,
                "describe response has neither fields nor metrics",
            ));
        }

        Ok(parse_describe_response(source, &fields, &metrics))
    }

    async fn probe(
        &self,
        endpoint: Option<&str>,
        params: &BTreeMap<String, String>,
        probe: &ProbeConfig,
    ) -> Result<Vec<String>> {
        let endpoint = endpoint.unwrap_or(&self.config.endpoint);
        let mut req = RequestConfig::new().retries(0);
        for (key, value) in self.default_params.iter().chain(params) {
            req = req.query(key, value);
        }
        req = req.query(&probe.param, &probe.value);

        let message = match self
            .client
            .request(Method::GET.into(), endpoint, req)
            .await
        {
            Err(Error::HttpStatus { body, .. }) => probe_error_message(&body),
            Err(e) => return Err(e),
            Ok(response) => probe_error_message(&response.text().await?),
        };

        parse_probe_message(&message, &probe.marker).ok_or_else(|| {
            Error::decode(format!(
                "probe of '{}' did not list valid fields: {}",
                probe.param, message
            ))
        })
    }
}

/// Facet references as one comma-separated value
fn facet_list(descriptor: &QueryDescriptor) -> Option<String> {
    let facets = descriptor.references_of(FieldKind::Facet);
    (!facets.is_empty()).then(|| facets.join(","))
}

#[async_trait]
impl PageFetcher for HttpSource {
    async fn fetch_page(&self, descriptor: &QueryDescriptor, request: &PageRequest) -> Result<Page> {
        let req = self.page_request(descriptor, request)?;
        debug!(
            "Fetching {} page ({} records) from {}",
            self.config.name,
            request.size(),
            self.config.endpoint
        );
        let body = self.send(&self.config.endpoint, req).await?;
        self.decode_page(&body)
    }
}

#[async_trait]
impl FieldDiscovery for HttpSource {
    async fn discover(&self, source: &str) -> Result<SourceSchema> {
        match &self.config.discovery {
            None => Err(Error::discovery(source, "source has no discovery configured")),

            Some(DiscoveryConfig::Describe {
                endpoint,
                request,
                fields_path,
                metrics_path,
            }) => {
                self.describe(
                    source,
                    endpoint.as_deref(),
                    request.as_deref(),
                    fields_path,
                    metrics_path,
                )
                .await
            }

            Some(DiscoveryConfig::Probe {
                endpoint,
                params,
                probes,
            }) => {
                let mut schema = SourceSchema::new(source);
                let mut learned = 0;

                for probe in probes {
                    match self.probe(endpoint.as_deref(), params, probe).await {
                        Ok(names) => {
                            debug!(
                                "Probe found {} valid {} for {}",
                                names.len(),
                                probe.kind.plural(),
                                source
                            );
                            schema.insert_all(probe.kind, names);
                            learned += 1;
                        }
                        Err(e) => warn!("{} probe failed for {}: {}", probe.kind, source, e),
                    }
                }

                if learned == 0 {
                    return Err(Error::discovery(source, "no probe returned a field list"));
                }
                Ok(schema)
            }
        }
    }
}
