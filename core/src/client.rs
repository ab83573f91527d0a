use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::auth;
use crate::config::SessionConfig;
use crate::credentials::StorageCredentials;
use crate::errors::{TableError, TableResult};
use crate::table::TableService;
use crate::types::{escape_odata_literal, EntityFilter, SessionEntity};

const API_VERSION: &str = "2019-02-02";
const DATA_SERVICE_VERSION: &str = "3.0;NetFx";
const ACCEPT_JSON: &str = "application/json;odata=nometadata";
const NEXT_PARTITION_KEY: &str = "x-ms-continuation-NextPartitionKey";
const NEXT_ROW_KEY: &str = "x-ms-continuation-NextRowKey";

/// Page of entities returned by a query
#[derive(Debug, Deserialize)]
struct QueryPage {
    #[serde(default)]
    value: Vec<SessionEntity>,
}

/// Client for the Azure Table REST API
#[derive(Debug, Clone)]
pub struct TableClient {
    client: Client,
    credentials: StorageCredentials,
    endpoint: String,
}

impl TableClient {
    /// Create a new table client
    pub fn new(credentials: StorageCredentials, timeout: Duration) -> TableResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("x-ms-version", HeaderValue::from_static(API_VERSION));
        headers.insert(
            "DataServiceVersion",
            HeaderValue::from_static(DATA_SERVICE_VERSION),
        );
        headers.insert(
            "MaxDataServiceVersion",
            HeaderValue::from_static(DATA_SERVICE_VERSION),
        );
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_JSON));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        let endpoint = credentials.table_endpoint();
        Ok(Self {
            client,
            credentials,
            endpoint,
        })
    }

    /// Create a client from loaded configuration
    pub fn from_config(config: &SessionConfig) -> TableResult<Self> {
        Self::new(config.credentials()?, config.request_timeout()?)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Resolves a resource path against the endpoint
    fn url_for(&self, path: &str) -> TableResult<Url> {
        Url::parse(&format!("{}{}", self.endpoint, path))
            .map_err(|e| TableError::Config(format!("Invalid table URL for {}: {}", path, e)))
    }

    /// Builds a signed request for `path`
    fn request(&self, method: Method, path: &str) -> TableResult<RequestBuilder> {
        let url = self.url_for(path)?;
        let ms_date = auth::format_ms_date(Utc::now());
        let authorization = auth::authorization_header(
            &self.credentials.account_name,
            &self.credentials.account_key,
            &ms_date,
            url.path(),
        )?;

        debug!("{} {}", method, url);
        Ok(self
            .client
            .request(method, url)
            .header("x-ms-date", ms_date)
            .header("Authorization", authorization))
    }

    async fn send(&self, request: RequestBuilder, resource: &str) -> TableResult<Response> {
        let response = request.send().await?;
        check_status(response, resource).await
    }
}

/// Maps service status codes onto `TableError`
async fn check_status(response: Response, resource: &str) -> TableResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::NOT_FOUND => Err(TableError::not_found(resource)),
        StatusCode::CONFLICT => Err(TableError::conflict(resource)),
        StatusCode::FORBIDDEN => {
            let body = response.text().await.unwrap_or_default();
            Err(TableError::Auth(format!(
                "Request for {} was rejected: {}",
                resource, body
            )))
        }
        _ => {
            let body = response.text().await.map_err(|e| {
                TableError::Parsing(format!("Failed to read error response: {}", e))
            })?;
            Err(TableError::Http {
                status_code: status.as_u16(),
                message: body,
            })
        }
    }
}

fn table_path(table: &str) -> String {
    format!("/Tables('{}')", escape_odata_literal(table))
}

/// `/<table>(PartitionKey='<pk>',RowKey='<rk>')` with keys quoted then percent-encoded
fn entity_path(table: &str, partition_key: &str, row_key: &str) -> String {
    format!(
        "/{}(PartitionKey='{}',RowKey='{}')",
        table,
        urlencoding::encode(&escape_odata_literal(partition_key)),
        urlencoding::encode(&escape_odata_literal(row_key)),
    )
}

/// Continuation token of a query page: next partition key and, if given, next row key
type Continuation = (String, Option<String>);

fn continuation(response: &Response) -> Option<Continuation> {
    let header = |name: &str| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    header(NEXT_PARTITION_KEY).map(|pk| (pk, header(NEXT_ROW_KEY)))
}

/// Query parameters for one page, resuming from `next` when set
fn page_query(odata: &str, next: Option<&Continuation>) -> Vec<(&'static str, String)> {
    let mut query = vec![("$filter", odata.to_string())];
    if let Some((pk, rk)) = next {
        query.push(("NextPartitionKey", pk.clone()));
        if let Some(rk) = rk {
            query.push(("NextRowKey", rk.clone()));
        }
    }
    query
}

#[async_trait]
impl TableService for TableClient {
    async fn get_table(&self, table: &str) -> TableResult<()> {
        let request = self.request(Method::GET, &table_path(table))?;
        self.send(request, table).await?;
        Ok(())
    }

    async fn create_table(&self, table: &str) -> TableResult<()> {
        let request = self
            .request(Method::POST, "/Tables")?
            .header("Prefer", "return-no-content")
            .json(&serde_json::json!({ "TableName": table }));
        self.send(request, table).await?;
        Ok(())
    }

    async fn get_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> TableResult<SessionEntity> {
        let request = self.request(Method::GET, &entity_path(table, partition_key, row_key))?;
        let response = self.send(request, row_key).await?;
        response
            .json::<SessionEntity>()
            .await
            .map_err(|e| TableError::Parsing(format!("Failed to parse entity {}: {}", row_key, e)))
    }

    async fn insert_entity(&self, table: &str, entity: &SessionEntity) -> TableResult<()> {
        let request = self
            .request(Method::POST, &format!("/{}", table))?
            .header("Prefer", "return-no-content")
            .json(entity);
        self.send(request, &entity.row_key).await?;
        Ok(())
    }

    async fn update_entity(&self, table: &str, entity: &SessionEntity) -> TableResult<()> {
        let path = entity_path(table, &entity.partition_key, &entity.row_key);
        let request = self
            .request(Method::PUT, &path)?
            .header("If-Match", "*")
            .json(entity);
        self.send(request, &entity.row_key).await?;
        Ok(())
    }

    async fn insert_or_replace_entity(
        &self,
        table: &str,
        entity: &SessionEntity,
    ) -> TableResult<()> {
        // A PUT without If-Match is insert-or-replace
        let path = entity_path(table, &entity.partition_key, &entity.row_key);
        let request = self.request(Method::PUT, &path)?.json(entity);
        self.send(request, &entity.row_key).await?;
        Ok(())
    }

    async fn delete_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> TableResult<()> {
        let request = self
            .request(Method::DELETE, &entity_path(table, partition_key, row_key))?
            .header("If-Match", "*");
        self.send(request, row_key).await?;
        Ok(())
    }

    async fn query_entities(
        &self,
        table: &str,
        filter: &EntityFilter,
    ) -> TableResult<Vec<SessionEntity>> {
        let path = format!("/{}()", table);
        let odata = filter.to_odata();
        let mut entities = Vec::new();
        let mut next: Option<Continuation> = None;

        loop {
            let query = page_query(&odata, next.as_ref());
            let request = self.request(Method::GET, &path)?.query(&query);
            let response = self.send(request, table).await?;
            next = continuation(&response);

            let page = response
                .json::<QueryPage>()
                .await
                .map_err(|e| TableError::Parsing(format!("Failed to parse query page: {}", e)))?;
            debug!("Query on {} returned {} entities", table, page.value.len());
            entities.extend(page.value);

            if next.is_none() {
                break;
            }
        }

        Ok(entities)
    }
}
