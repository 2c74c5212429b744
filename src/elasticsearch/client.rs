//! HTTP client wrapper for interacting with Elasticsearch.

use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};

use crate::config::get_config;
use crate::elasticsearch::types::{BulkResponse, ElasticsearchError, IndexCreation, SearchResponse};

const NDJSON: &str = "application/x-ndjson";
const ALREADY_EXISTS: [&str; 2] = [
    "resource_already_exists_exception",
    "index_already_exists_exception",
];

/// Lightweight HTTP client for the index, bulk, and search endpoints.
pub struct ElasticsearchClient {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
}

impl ElasticsearchClient {
    /// Construct a client for an explicit endpoint.
    pub fn new(url: &str, api_key: Option<String>) -> Result<Self, ElasticsearchError> {
        let client = Client::builder()
            .user_agent(concat!("geoscan/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let base_url = normalize_base_url(url).map_err(ElasticsearchError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            has_api_key = api_key.as_deref().is_some_and(|value| !value.is_empty()),
            "Initialized Elasticsearch HTTP client"
        );
        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Construct a client from the global configuration.
    pub fn from_config() -> Result<Self, ElasticsearchError> {
        let config = get_config();
        Self::new(&config.elasticsearch_url, config.elasticsearch_api_key.clone())
    }

    /// Create `index` with the given settings and mappings.
    ///
    /// A cluster answering that the index already exists is reported as
    /// [`IndexCreation::AlreadyExists`]; every other failure is an error.
    pub async fn create_index(
        &self,
        index: &str,
        schema: &Value,
    ) -> Result<IndexCreation, ElasticsearchError> {
        let response = self
            .request(Method::PUT, index)?
            .json(schema)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::info!(index, "Index created");
            return Ok(IndexCreation::Created);
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::BAD_REQUEST
            && ALREADY_EXISTS.iter().any(|marker| body.contains(marker))
        {
            tracing::debug!(index, "Index already exists");
            return Ok(IndexCreation::AlreadyExists);
        }

        let error = ElasticsearchError::UnexpectedStatus { status, body };
        tracing::error!(index, error = %error, "Failed to create index");
        Err(error)
    }

    /// Submit an NDJSON bulk body to `index`.
    ///
    /// Per-document failures are reported through [`BulkResponse::errors`], not as an `Err`.
    pub async fn bulk(
        &self,
        index: &str,
        body: String,
    ) -> Result<BulkResponse, ElasticsearchError> {
        let response = self
            .request(Method::POST, &format!("{index}/_bulk"))?
            .header(reqwest::header::CONTENT_TYPE, NDJSON)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = ElasticsearchError::UnexpectedStatus { status, body };
            tracing::error!(index, error = %error, "Bulk request failed");
            return Err(error);
        }
        Ok(response.json().await?)
    }

    /// Run `query` against `index` and return the `file.path` of each hit.
    pub async fn search_paths(
        &self,
        index: &str,
        query: Value,
        size: usize,
    ) -> Result<Vec<String>, ElasticsearchError> {
        let body = json!({
            "query": query,
            "size": size,
            "_source": ["file.path"],
        });
        let response = self
            .request(Method::POST, &format!("{index}/_search"))?
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = ElasticsearchError::UnexpectedStatus { status, body };
            tracing::error!(index, error = %error, "Search request failed");
            return Err(error);
        }

        let payload: SearchResponse = response.json().await?;
        Ok(payload
            .hits
            .hits
            .into_iter()
            .filter_map(|hit| {
                hit.source
                    .pointer("/file/path")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .collect())
    }

    fn request(
        &self,
        method: Method,
        path: &str,
    ) -> Result<reqwest::RequestBuilder, ElasticsearchError> {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header(reqwest::header::AUTHORIZATION, format!("ApiKey {api_key}"));
        }
        Ok(req)
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{
        Method::{POST, PUT},
        MockServer,
    };

    fn client(server: &MockServer, api_key: Option<&str>) -> ElasticsearchClient {
        ElasticsearchClient::new(&server.base_url(), api_key.map(str::to_string)).expect("client")
    }

    #[tokio::test]
    async fn create_index_reports_created_and_existing() {
        let server = MockServer::start_async().await;
        let created = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/fresh")
                    .header("authorization", "ApiKey secret")
                    .json_body_partial(r#"{"mappings": {}}"#);
                then.status(200).json_body(json!({ "acknowledged": true }));
            })
            .await;
        let existing = server
            .mock_async(|when, then| {
                when.method(PUT).path("/ceda-di");
                then.status(400).json_body(json!({
                    "error": {
                        "type": "resource_already_exists_exception",
                        "reason": "index [ceda-di] already exists"
                    },
                    "status": 400
                }));
            })
            .await;

        let client = client(&server, Some("secret"));
        let schema = json!({ "mappings": {} });
        assert_eq!(
            client.create_index("fresh", &schema).await.expect("create"),
            IndexCreation::Created
        );
        assert_eq!(
            client.create_index("ceda-di", &schema).await.expect("exists"),
            IndexCreation::AlreadyExists
        );
        created.assert_async().await;
        existing.assert_async().await;
    }

    #[tokio::test]
    async fn create_index_fails_on_other_errors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(PUT).path("/broken");
                then.status(400).json_body(json!({
                    "error": { "type": "mapper_parsing_exception", "reason": "bad mapping" }
                }));
            })
            .await;
        let err = client(&server, None)
            .create_index("broken", &json!({}))
            .await
            .expect_err("bad mapping");
        assert!(matches!(
            err,
            ElasticsearchError::UnexpectedStatus { status, .. } if status == StatusCode::BAD_REQUEST
        ));
    }

    #[tokio::test]
    async fn bulk_posts_ndjson_and_decodes_errors_flag() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/ceda-di/_bulk")
                    .header("content-type", NDJSON)
                    .body_contains(r#"{"index":{"_index":"ceda-di","_id":"abc"}}"#);
                then.status(200).json_body(json!({ "took": 2, "errors": true, "items": [] }));
            })
            .await;

        let body = concat!(
            "{\"index\":{\"_index\":\"ceda-di\",\"_id\":\"abc\"}}\n",
            "{\"file\":{}}\n"
        )
        .to_string();
        let response = client(&server, None).bulk("ceda-di", body).await.expect("bulk");
        mock.assert_async().await;
        assert!(response.errors);
        assert_eq!(response.took, 2);
    }

    #[tokio::test]
    async fn search_paths_extracts_file_paths() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/ceda-di/_search")
                    .json_body_partial(r#"{"size": 5}"#);
                then.status(200).json_body(json!({
                    "hits": { "total": 2, "hits": [
                        { "_id": "1", "_source": { "file": { "path": "/badc/a.nc" } } },
                        { "_id": "2", "_source": { "file": { "path": "/badc/b.na" } } }
                    ]}
                }));
            })
            .await;

        let paths = client(&server, None)
            .search_paths("ceda-di", json!({ "match_all": {} }), 5)
            .await
            .expect("search");
        assert_eq!(paths, vec!["/badc/a.nc", "/badc/b.na"]);
    }

    #[test]
    fn endpoint_formatting_handles_slashes() {
        assert_eq!(format_endpoint("http://es:9200/", "/idx/_bulk"), "http://es:9200/idx/_bulk");
        assert!(normalize_base_url("not a url").is_err());
        assert_eq!(
            normalize_base_url("http://es:9200/prefix/").expect("url"),
            "http://es:9200/prefix"
        );
    }
}
