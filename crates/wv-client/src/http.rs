//! REST/GraphQL client for Weaviate.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use wv_core::{
    CollectionConfig, Connection, ConnectionType, ObjectPage, Result, SearchHit, SearchMode,
    SearchQuery, Secret, Tenant, Timeouts, VectorClient, WeaviateConfig, WeaviateError,
};

/// Weaviate client over HTTP.
///
/// Construction does no network I/O; the first request opens a connection.
pub struct WeaviateClient {
    /// HTTP client with auth and provider headers preset.
    http: Client,

    /// Scheme, host and port, without a trailing slash.
    base_url: String,

    connection_type: ConnectionType,
}

#[derive(Deserialize)]
struct SchemaResponse {
    #[serde(default)]
    classes: Vec<CollectionConfig>,
}

#[derive(Deserialize)]
struct ObjectsResponse {
    #[serde(default)]
    objects: Vec<RawObject>,
}

#[derive(Deserialize)]
struct RawObject {
    id: String,
    class: String,
    #[serde(default)]
    properties: Map<String, Value>,
}

#[derive(Deserialize)]
struct GraphQlResponse {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

impl WeaviateClient {
    /// Build a client for the connection described by `config`.
    pub fn connect(config: &WeaviateConfig) -> Result<Self> {
        match &config.connection {
            Connection::Local {
                host,
                port,
                grpc_port,
            } => Self::connect_local(host, *port, *grpc_port, config),
            Connection::Cloud {
                cluster_url,
                api_key,
            } => Self::connect_cloud(cluster_url, api_key, config),
        }
    }

    fn connect_local(host: &str, port: u16, grpc_port: u16, config: &WeaviateConfig) -> Result<Self> {
        let base_url = if host.contains(':') && !host.starts_with('[') {
            format!("http://[{}]:{}", host, port)
        } else {
            format!("http://{}:{}", host, port)
        };
        info!(
            "Connecting to local Weaviate at {} (gRPC: {}:{})",
            base_url, host, grpc_port
        );

        let headers = Self::build_headers(config, None)?;
        Self::build(base_url, headers, &config.timeouts, ConnectionType::Local)
    }

    fn connect_cloud(cluster_url: &str, api_key: &Secret, config: &WeaviateConfig) -> Result<Self> {
        if cluster_url.trim().is_empty() || api_key.expose().is_empty() {
            return Err(WeaviateError::invalid_configuration(
                "cluster_url and api_key are required for cloud connections",
            ));
        }

        let base_url = if cluster_url.contains("://") {
            cluster_url.trim().trim_end_matches('/').to_string()
        } else {
            format!("https://{}", cluster_url.trim().trim_end_matches('/'))
        };
        info!("Connecting to Weaviate Cloud at {}", base_url);

        let headers = Self::build_headers(config, Some(api_key))?;
        Self::build(base_url, headers, &config.timeouts, ConnectionType::Cloud)
    }

    fn build_headers(config: &WeaviateConfig, api_key: Option<&Secret>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        for (name, value) in &config.additional_headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                WeaviateError::invalid_configuration(format!("Invalid header name '{}': {}", name, e))
            })?;
            let mut value = HeaderValue::from_str(value.expose()).map_err(|e| {
                WeaviateError::invalid_configuration(format!("Invalid value for header {}: {}", name, e))
            })?;
            value.set_sensitive(true);
            headers.insert(name, value);
        }

        if let Some(key) = api_key {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", key.expose()))
                .map_err(|e| WeaviateError::invalid_configuration(format!("Invalid api_key: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        Ok(headers)
    }

    fn build(
        base_url: String,
        headers: HeaderMap,
        timeouts: &Timeouts,
        connection_type: ConnectionType,
    ) -> Result<Self> {
        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = timeouts.init_duration() {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = timeouts.query_duration() {
            builder = builder.timeout(timeout);
        }

        let http = builder
            .build()
            .map_err(|e| WeaviateError::connection(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            connection_type,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn connection_type(&self) -> ConnectionType {
        self.connection_type
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Response> {
        debug!("GET {}", path);
        self.http
            .get(self.url(path))
            .query(query)
            .send()
            .await
            .map_err(transport_error)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let response = check_status(self.get(path, query).await?).await?;
        response.json().await.map_err(decode_error)
    }

    /// GET a collection-scoped path, mapping 404 to `CollectionNotFound`.
    async fn get_collection_json<T: DeserializeOwned>(&self, name: &str, path: &str) -> Result<T> {
        let response = self.get(path, &[]).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(WeaviateError::CollectionNotFound {
                name: name.to_string(),
            });
        }
        check_status(response).await?.json().await.map_err(decode_error)
    }

    async fn graphql(&self, query: String) -> Result<Value> {
        debug!("POST /v1/graphql: {}", query);

        let response = self
            .http
            .post(self.url("/v1/graphql"))
            .json(&serde_json::json!({ "query": query }))
            .send()
            .await
            .map_err(transport_error)?;

        let body: GraphQlResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(decode_error)?;

        if !body.errors.is_empty() {
            let message = body
                .errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(WeaviateError::query(message));
        }

        body.data
            .ok_or_else(|| WeaviateError::query("GraphQL response carried no data"))
    }
}

#[async_trait]
impl VectorClient for WeaviateClient {
    async fn is_ready(&self) -> Result<bool> {
        let response = self.get("/v1/.well-known/ready", &[]).await?;
        Ok(response.status().is_success())
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let schema: SchemaResponse = self.get_json("/v1/schema", &[]).await?;
        Ok(schema.classes.into_iter().map(|c| c.name).collect())
    }

    async fn collection_config(&self, name: &str) -> Result<CollectionConfig> {
        let name = collection_name(name)?;
        self.get_collection_json(&name, &format!("/v1/schema/{}", name))
            .await
    }

    async fn tenants(&self, collection: &str) -> Result<Vec<Tenant>> {
        let name = collection_name(collection)?;
        self.get_collection_json(&name, &format!("/v1/schema/{}/tenants", name))
            .await
    }

    async fn search(
        &self,
        collection: &str,
        tenant: Option<&str>,
        query: &SearchQuery,
    ) -> Result<Vec<SearchHit>> {
        let name = collection_name(collection)?;
        let config = self.collection_config(&name).await?;
        let fields = config.selection_fields();
        let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
        let gql = build_get_query(&name, &fields, tenant, query)?;

        let data = self.graphql(gql).await?;
        let rows = data
            .get("Get")
            .and_then(|g| g.get(&name))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        debug!("Search on {} returned {} objects", name, rows.len());
        rows.into_iter().map(|row| parse_hit(&name, row)).collect()
    }

    async fn fetch_objects(
        &self,
        collection: &str,
        tenant: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Result<ObjectPage> {
        let name = collection_name(collection)?;

        let mut query = vec![
            ("class", name.clone()),
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
        ];
        if let Some(tenant) = tenant {
            query.push(("tenant", tenant.to_string()));
        }

        let response: ObjectsResponse = self.get_json("/v1/objects", &query).await?;
        let objects = response
            .objects
            .into_iter()
            .map(|o| SearchHit {
                id: o.id,
                collection: o.class,
                properties: o.properties,
                score: None,
                distance: None,
            })
            .collect();

        Ok(ObjectPage {
            collection: name,
            limit,
            offset,
            objects,
        })
    }

    async fn close(&self) -> Result<()> {
        // reqwest drops pooled connections with the client.
        debug!("Closing Weaviate client for {}", self.base_url);
        Ok(())
    }
}

/// Validate a collection name and capitalize it the way Weaviate stores class names.
fn collection_name(name: &str) -> Result<String> {
    let mut chars = name.chars();
    let first = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => c,
        _ => {
            return Err(WeaviateError::invalid_argument(format!(
                "Invalid collection name '{}': must start with a letter",
                name
            )))
        }
    };
    if !chars.clone().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(WeaviateError::invalid_argument(format!(
            "Invalid collection name '{}': only letters, digits and '_' are allowed",
            name
        )));
    }

    Ok(first.to_ascii_uppercase().to_string() + chars.as_str())
}

fn build_get_query(
    collection: &str,
    fields: &[&str],
    tenant: Option<&str>,
    query: &SearchQuery,
) -> Result<String> {
    let text = serde_json::to_string(&query.text)?;

    let (operator, additional) = match query.mode {
        SearchMode::NearText => (format!("nearText: {{concepts: [{}]}}", text), "id distance"),
        SearchMode::Bm25 => (format!("bm25: {{query: {}}}", text), "id score"),
        SearchMode::Hybrid { alpha } => (
            format!("hybrid: {{query: {}, alpha: {}}}", text, alpha),
            "id score",
        ),
    };

    let mut args = format!("{}, limit: {}", operator, query.limit);
    if let Some(tenant) = tenant {
        args.push_str(&format!(", tenant: {}", serde_json::to_string(tenant)?));
    }

    Ok(format!(
        "{{ Get {{ {}({}) {{ {} _additional {{ {} }} }} }} }}",
        collection,
        args,
        fields.join(" "),
        additional
    ))
}

fn parse_hit(collection: &str, row: Value) -> Result<SearchHit> {
    let mut properties = match row {
        Value::Object(map) => map,
        other => {
            return Err(WeaviateError::query(format!(
                "Unexpected result row: {}",
                other
            )))
        }
    };

    let additional = properties.remove("_additional").unwrap_or(Value::Null);
    let id = additional
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(SearchHit {
        id,
        collection: collection.to_string(),
        properties,
        score: additional.get("score").and_then(number),
        distance: additional.get("distance").and_then(number),
    })
}

/// Weaviate reports `score` as a string and `distance` as a number.
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(WeaviateError::Http {
        status: status.as_u16(),
        body,
    })
}

fn transport_error(e: reqwest::Error) -> WeaviateError {
    WeaviateError::connection(e.to_string())
}

fn decode_error(e: reqwest::Error) -> WeaviateError {
    WeaviateError::internal(format!("Failed to decode response: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn local_config(server: &MockServer) -> WeaviateConfig {
        let addr = server.address();
        WeaviateConfig::local(addr.ip().to_string(), addr.port(), 50051)
    }

    fn article_schema() -> Value {
        json!({
            "class": "Article",
            "properties": [
                {"name": "title", "dataType": ["text"]},
                {"name": "content", "dataType": ["text"]},
                {"name": "author", "dataType": ["Person"]}
            ]
        })
    }

    async fn mount_article_schema(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/v1/schema/Article"))
            .respond_with(ResponseTemplate::new(200).set_body_json(article_schema()))
            .mount(server)
            .await;
    }

    #[test]
    fn test_collection_name_capitalizes() {
        assert_eq!(collection_name("articles").unwrap(), "Articles");
        assert_eq!(collection_name("My_Docs2").unwrap(), "My_Docs2");
        assert!(collection_name("").is_err());
        assert!(collection_name("1abc").is_err());
        assert!(collection_name("Bad Name){").is_err());
    }

    #[test]
    fn test_build_near_text_query() {
        let query = SearchQuery::near_text("say \"hi\"", 3);
        let gql = build_get_query("Article", &["title"], Some("tenantA"), &query).unwrap();
        assert_eq!(
            gql,
            r#"{ Get { Article(nearText: {concepts: ["say \"hi\""]}, limit: 3, tenant: "tenantA") { title _additional { id distance } } } }"#
        );
    }

    #[test]
    fn test_build_hybrid_query() {
        let query = SearchQuery::hybrid("rust", 0.3, 5);
        let gql = build_get_query("Article", &["title", "content"], None, &query).unwrap();
        assert!(gql.contains("hybrid: {query: \"rust\", alpha: 0.3}"));
        assert!(gql.contains("limit: 5"));
        assert!(gql.contains("title content _additional { id score }"));
        assert!(!gql.contains("tenant"));
    }

    #[test]
    fn test_parse_hit_reads_string_score() {
        let hit = parse_hit(
            "Article",
            json!({"title": "A", "_additional": {"id": "uuid-1", "score": "0.87"}}),
        )
        .unwrap();
        assert_eq!(hit.id, "uuid-1");
        assert_eq!(hit.score, Some(0.87));
        assert_eq!(hit.distance, None);
        assert_eq!(hit.properties["title"], json!("A"));
        assert!(!hit.properties.contains_key("_additional"));
    }

    #[test]
    fn test_cloud_requires_credentials() {
        let err = WeaviateClient::connect(&WeaviateConfig::cloud("", "key")).err().unwrap();
        assert!(matches!(err, WeaviateError::InvalidConfiguration { .. }));

        let err = WeaviateClient::connect(&WeaviateConfig::cloud("https://x.weaviate.cloud", ""))
            .err()
            .unwrap();
        assert!(matches!(err, WeaviateError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_cloud_url_gets_https_scheme() {
        let client =
            WeaviateClient::connect(&WeaviateConfig::cloud("my-cluster.weaviate.cloud/", "key"))
                .unwrap();
        assert_eq!(client.base_url(), "https://my-cluster.weaviate.cloud");
        assert_eq!(client.connection_type(), ConnectionType::Cloud);
    }

    #[test]
    fn test_invalid_header_name_is_rejected() {
        let config = WeaviateConfig::default().with_header("bad header", "v");
        let err = WeaviateClient::connect(&config).err().unwrap();
        assert!(matches!(err, WeaviateError::InvalidConfiguration { .. }));
    }

    #[tokio::test]
    async fn test_is_ready() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/.well-known/ready"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = WeaviateClient::connect(&local_config(&server)).unwrap();
        assert!(client.is_ready().await.unwrap());
    }

    #[tokio::test]
    async fn test_not_ready_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/.well-known/ready"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = WeaviateClient::connect(&local_config(&server)).unwrap();
        assert!(!client.is_ready().await.unwrap());
    }

    #[tokio::test]
    async fn test_cloud_sends_bearer_and_provider_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/schema"))
            .and(header("Authorization", "Bearer secret-key"))
            .and(header("X-OpenAI-Api-Key", "sk-test"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"classes": [article_schema()]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let config = WeaviateConfig::cloud(server.uri(), "secret-key").with_openai_api_key("sk-test");
        let client = WeaviateClient::connect(&config).unwrap();
        assert_eq!(client.list_collections().await.unwrap(), vec!["Article"]);
    }

    #[tokio::test]
    async fn test_collection_config_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/schema/Missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = WeaviateClient::connect(&local_config(&server)).unwrap();
        let err = client.collection_config("missing").await.unwrap_err();
        assert!(matches!(err, WeaviateError::CollectionNotFound { name } if name == "Missing"));
    }

    #[tokio::test]
    async fn test_server_error_carries_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/schema"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Access denied"))
            .mount(&server)
            .await;

        let client = WeaviateClient::connect(&local_config(&server)).unwrap();
        let err = client.list_collections().await.unwrap_err();
        assert!(matches!(err, WeaviateError::Http { status: 403, ref body } if body == "Access denied"));
    }

    #[tokio::test]
    async fn test_near_text_search() {
        let server = MockServer::start().await;
        mount_article_schema(&server).await;
        Mock::given(method("POST"))
            .and(path("/v1/graphql"))
            .and(body_string_contains("nearText"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"Get": {"Article": [
                    {"title": "Article 1", "content": "Content 1",
                     "_additional": {"id": "uuid-1", "distance": 0.12}},
                    {"title": "Article 2", "content": "Content 2",
                     "_additional": {"id": "uuid-2", "distance": 0.3}}
                ]}}
            })))
            .mount(&server)
            .await;

        let client = WeaviateClient::connect(&local_config(&server)).unwrap();
        let hits = client
            .search("Article", None, &SearchQuery::near_text("machine learning", 2))
            .await
            .unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "uuid-1");
        assert_eq!(hits[0].collection, "Article");
        assert_eq!(hits[0].distance, Some(0.12));
        assert_eq!(hits[1].properties["title"], json!("Article 2"));
    }

    #[tokio::test]
    async fn test_search_selects_composite_subfields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/schema/Place"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "class": "Place",
                "properties": [
                    {"name": "title", "dataType": ["text"]},
                    {"name": "location", "dataType": ["geoCoordinates"]},
                    {"name": "phone", "dataType": ["phoneNumber"]},
                    {"name": "meta", "dataType": ["object"], "nestedProperties": [
                        {"name": "source", "dataType": ["text"]}
                    ]}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/graphql"))
            .and(body_string_contains("location { latitude longitude }"))
            .and(body_string_contains("phone { input internationalFormatted"))
            .and(body_string_contains("meta { source }"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"Get": {"Place": [
                    {"title": "Harbour",
                     "location": {"latitude": 52.1, "longitude": 4.3},
                     "phone": {"input": "020 555 0100", "valid": true},
                     "meta": {"source": "survey"},
                     "_additional": {"id": "uuid-9", "distance": 0.2}}
                ]}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = WeaviateClient::connect(&local_config(&server)).unwrap();
        let hits = client
            .search("Place", None, &SearchQuery::near_text("x", 1))
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].properties["location"]["latitude"], json!(52.1));
        assert_eq!(hits[0].properties["meta"]["source"], json!("survey"));
    }

    #[test]
    fn test_local_ipv6_host_is_bracketed() {
        let client = WeaviateClient::connect(&WeaviateConfig::local("::1", 8080, 50051)).unwrap();
        assert_eq!(client.base_url(), "http://[::1]:8080");

        let client =
            WeaviateClient::connect(&WeaviateConfig::local("[::1]", 8080, 50051)).unwrap();
        assert_eq!(client.base_url(), "http://[::1]:8080");

        let client =
            WeaviateClient::connect(&WeaviateConfig::local("localhost", 8080, 50051)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[tokio::test]
    async fn test_graphql_errors_become_query_errors() {
        let server = MockServer::start().await;
        mount_article_schema(&server).await;
        Mock::given(method("POST"))
            .and(path("/v1/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"Get": {"Article": null}},
                "errors": [{"message": "no module with name text2vec"}]
            })))
            .mount(&server)
            .await;

        let client = WeaviateClient::connect(&local_config(&server)).unwrap();
        let err = client
            .search("Article", None, &SearchQuery::near_text("x", 1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no module with name text2vec"));
    }

    #[tokio::test]
    async fn test_fetch_objects_passes_paging_and_tenant() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/objects"))
            .and(query_param("class", "Article"))
            .and(query_param("limit", "10"))
            .and(query_param("offset", "20"))
            .and(query_param("tenant", "tenant1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "objects": [
                    {"id": "obj-1", "class": "Article", "properties": {"title": "Object 1"}},
                    {"id": "obj-2", "class": "Article"}
                ],
                "totalResults": 2
            })))
            .mount(&server)
            .await;

        let client = WeaviateClient::connect(&local_config(&server)).unwrap();
        let page = client
            .fetch_objects("Article", Some("tenant1"), 10, 20)
            .await
            .unwrap();

        assert_eq!(page.objects.len(), 2);
        assert_eq!(page.objects[0].properties["title"], json!("Object 1"));
        assert!(page.objects[1].properties.is_empty());
        assert_eq!(page.offset, 20);
    }

    #[tokio::test]
    async fn test_tenants() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/schema/Article/tenants"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"name": "tenant1", "activityStatus": "HOT"},
                {"name": "tenant2"}
            ])))
            .mount(&server)
            .await;

        let client = WeaviateClient::connect(&local_config(&server)).unwrap();
        let tenants = client.tenants("Article").await.unwrap();
        assert_eq!(tenants.len(), 2);
        assert_eq!(tenants[0].activity_status.as_deref(), Some("HOT"));
        assert_eq!(tenants[1].name, "tenant2");
    }
}
