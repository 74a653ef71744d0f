//! Dataverse Web API implementation of the record store contract.
//!
//! Authentication is the OAuth2 client-credentials flow against the Entra
//! token endpoint, one token per configured credential. Listing uses server
//! paging (`Prefer: odata.maxpagesize` plus the `@odata.nextLink` cursor);
//! bulk deletion is one `$batch` request of independent DELETE parts with
//! `Prefer: odata.continue-on-error`, so a faulted record never aborts the
//! rest of the batch.

use super::{Credential, DeleteOutcome, ListPage, RecordId, RecordStore, StoreConnection, StoreError};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;
use uuid::Uuid;

/// Dataverse Web API version used for all calls.
const API_VERSION: &str = "v9.2";

/// Default Entra authority for token requests.
const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Tokens are refreshed this long before their reported expiry.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Connection settings for a Dataverse organization.
#[derive(Debug, Clone)]
pub struct DataverseConfig {
    /// Organization URL, e.g. `https://org.crm.dynamics.com`
    pub endpoint: String,
    /// Entra tenant id used for client-credential token requests
    pub tenant_id: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Token authority override (sovereign clouds, tests); defaults to
    /// `https://login.microsoftonline.com`
    pub authority: Option<String>,
    /// Entity set override when the plural is not `<collection>s`
    pub entity_set: Option<String>,
    /// Primary id attribute override when it is not `<collection>id`
    pub id_attribute: Option<String>,
}

/// Factory for authenticated Dataverse connections.
pub struct DataverseStore {
    http: reqwest::Client,
    config: DataverseConfig,
}

impl DataverseStore {
    pub fn new(config: DataverseConfig) -> Result<Self, StoreError> {
        Url::parse(&config.endpoint)
            .map_err(|e| StoreError::InvalidEndpoint(format!("{}: {}", config.endpoint, e)))?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("bulkpurge/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http, config })
    }

    fn token_url(&self) -> String {
        let authority = self
            .config
            .authority
            .as_deref()
            .unwrap_or(DEFAULT_AUTHORITY)
            .trim_end_matches('/');
        format!("{}/{}/oauth2/v2.0/token", authority, self.config.tenant_id)
    }

    fn scope(&self) -> String {
        format!("{}/.default", self.config.endpoint.trim_end_matches('/'))
    }
}

#[async_trait]
impl RecordStore for DataverseStore {
    async fn connect(&self, credential: &Credential) -> Result<Box<dyn StoreConnection>, StoreError> {
        let token_url = self.token_url();
        let scope = self.scope();
        let token = fetch_token(&self.http, &token_url, &scope, credential).await?;
        debug!(client_id = %credential.client_id, "dataverse connection established");

        Ok(Box::new(DataverseConnection {
            http: self.http.clone(),
            config: self.config.clone(),
            token_url,
            scope,
            credential: credential.clone(),
            token,
        }))
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct BearerToken {
    access_token: String,
    expires_at: Instant,
}

impl BearerToken {
    fn needs_refresh(&self) -> bool {
        Instant::now() + TOKEN_REFRESH_MARGIN >= self.expires_at
    }
}

async fn fetch_token(
    http: &reqwest::Client,
    token_url: &str,
    scope: &str,
    credential: &Credential,
) -> Result<BearerToken, StoreError> {
    let params = [
        ("grant_type", "client_credentials"),
        ("client_id", credential.client_id.as_str()),
        ("client_secret", credential.client_secret.as_str()),
        ("scope", scope),
    ];

    let response = http.post(token_url).form(&params).send().await?;
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(StoreError::Auth(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| StoreError::Malformed(format!("token response: {e}")))?;

    Ok(BearerToken {
        access_token: token.access_token,
        expires_at: Instant::now() + Duration::from_secs(token.expires_in),
    })
}

/// One authenticated session against a Dataverse organization.
pub struct DataverseConnection {
    http: reqwest::Client,
    config: DataverseConfig,
    token_url: String,
    scope: String,
    credential: Credential,
    token: BearerToken,
}

impl DataverseConnection {
    async fn bearer(&mut self) -> Result<String, StoreError> {
        if self.token.needs_refresh() {
            debug!(client_id = %self.credential.client_id, "refreshing access token");
            self.token =
                fetch_token(&self.http, &self.token_url, &self.scope, &self.credential).await?;
        }
        Ok(self.token.access_token.clone())
    }

    fn api_base(&self) -> String {
        format!(
            "{}/api/data/{}",
            self.config.endpoint.trim_end_matches('/'),
            API_VERSION
        )
    }

    /// Entity set name: configured override, or the `<collection>s` plural
    /// the original tooling convention assumes.
    fn entity_set(&self, collection: &str) -> String {
        self.config
            .entity_set
            .clone()
            .unwrap_or_else(|| format!("{collection}s"))
    }

    /// Primary id attribute: configured override, or `<collection>id`.
    fn id_attribute(&self, collection: &str) -> String {
        self.config
            .id_attribute
            .clone()
            .unwrap_or_else(|| format!("{collection}id"))
    }
}

#[async_trait]
impl StoreConnection for DataverseConnection {
    async fn list_page(
        &mut self,
        collection: &str,
        page_size: u32,
        cursor: Option<&str>,
    ) -> Result<ListPage, StoreError> {
        let token = self.bearer().await?;
        let id_attribute = self.id_attribute(collection);

        // The next-link cursor is a complete URL; only the first page is built here.
        let url = match cursor {
            Some(next_link) => next_link.to_string(),
            None => format!(
                "{}/{}?$select={}",
                self.api_base(),
                self.entity_set(collection),
                id_attribute
            ),
        };

        let response = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .header("Prefer", format!("odata.maxpagesize={page_size}"))
            .header("OData-MaxVersion", "4.0")
            .header("OData-Version", "4.0")
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::UnexpectedResponse { status, body });
        }

        let page: ListResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Malformed(format!("list response: {e}")))?;

        let ids = page
            .value
            .iter()
            .filter_map(|row| row.get(&id_attribute).and_then(|v| v.as_str()))
            .filter_map(|s| Uuid::parse_str(s).ok())
            .map(RecordId)
            .collect();

        Ok(ListPage {
            ids,
            next_cursor: page.next_link,
        })
    }

    async fn delete_many(
        &mut self,
        collection: &str,
        ids: &[RecordId],
    ) -> Result<Vec<DeleteOutcome>, StoreError> {
        let token = self.bearer().await?;
        let entity_url = format!("{}/{}", self.api_base(), self.entity_set(collection));
        let boundary = format!("batch_{}", Uuid::new_v4());
        let body = build_batch_body(&boundary, &entity_url, ids);

        let response = self
            .http
            .post(format!("{}/$batch", self.api_base()))
            .bearer_auth(&token)
            .header(
                CONTENT_TYPE,
                format!("multipart/mixed; boundary={boundary}"),
            )
            .header("Prefer", "odata.continue-on-error")
            .header("OData-MaxVersion", "4.0")
            .header("OData-Version", "4.0")
            .header("Accept", "application/json")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::UnexpectedResponse { status, body });
        }

        let response_boundary = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(extract_boundary)
            .ok_or_else(|| {
                StoreError::Malformed("batch response missing multipart boundary".into())
            })?;

        let text = response.text().await?;
        parse_batch_response(&text, &response_boundary, ids)
    }
}

#[derive(Deserialize)]
struct ListResponse {
    value: Vec<serde_json::Map<String, serde_json::Value>>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

/// Build the multipart/mixed body for one batch of independent DELETE parts.
///
/// Parts are deliberately not wrapped in a changeset: independent parts plus
/// `continue-on-error` give per-record isolation instead of all-or-nothing.
fn build_batch_body(boundary: &str, entity_url: &str, ids: &[RecordId]) -> String {
    let mut body = String::new();
    for id in ids {
        body.push_str(&format!("--{boundary}\r\n"));
        body.push_str("Content-Type: application/http\r\n");
        body.push_str("Content-Transfer-Encoding: binary\r\n");
        body.push_str("\r\n");
        body.push_str(&format!("DELETE {entity_url}({id}) HTTP/1.1\r\n"));
        body.push_str("MSCRM.BypassCustomPluginExecution: true\r\n");
        body.push_str("\r\n");
        body.push_str("\r\n");
    }
    body.push_str(&format!("--{boundary}--\r\n"));
    body
}

/// Pull the boundary parameter out of a `multipart/mixed` content type.
fn extract_boundary(content_type: &str) -> Option<String> {
    content_type.split(';').find_map(|part| {
        let part = part.trim();
        part.strip_prefix("boundary=")
            .map(|b| b.trim_matches('"').to_string())
    })
}

/// Map each response part's status line back to the id at the same position.
///
/// Dataverse answers with one part per request part, in request order; a part
/// count that disagrees with the submitted id count is a malformed response.
fn parse_batch_response(
    body: &str,
    boundary: &str,
    ids: &[RecordId],
) -> Result<Vec<DeleteOutcome>, StoreError> {
    let delimiter = format!("--{boundary}");
    let mut outcomes = Vec::with_capacity(ids.len());

    for part in body.split(delimiter.as_str()) {
        let Some(status) = parse_part_status(part) else {
            continue;
        };
        let index = outcomes.len();
        let Some(id) = ids.get(index) else {
            return Err(StoreError::Malformed(format!(
                "batch response has more parts than the {} submitted deletes",
                ids.len()
            )));
        };
        let fault = if (200..300).contains(&status) {
            None
        } else {
            Some(parse_part_fault(part).unwrap_or_else(|| format!("status {status}")))
        };
        outcomes.push(DeleteOutcome { id: *id, fault });
    }

    if outcomes.len() != ids.len() {
        return Err(StoreError::Malformed(format!(
            "batch response carried {} parts for {} submitted deletes",
            outcomes.len(),
            ids.len()
        )));
    }
    Ok(outcomes)
}

/// Status code of an inner `HTTP/1.1 <code> <reason>` response line, if the
/// part contains one.
fn parse_part_status(part: &str) -> Option<u16> {
    part.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("HTTP/1.1 ")?;
        rest.split_whitespace().next()?.parse().ok()
    })
}

/// Fault message from a failed part's JSON error body, when present.
fn parse_part_fault(part: &str) -> Option<String> {
    let start = part.find('{')?;
    let end = part.rfind('}')?;
    let parsed: serde_json::Value = serde_json::from_str(&part[start..=end]).ok()?;
    parsed
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u128) -> RecordId {
        RecordId(Uuid::from_u128(n))
    }

    #[test]
    fn batch_body_has_one_part_per_id_and_a_terminator() {
        let ids = vec![id(1), id(2), id(3)];
        let body = build_batch_body("batch_x", "https://org.example/api/data/v9.2/accounts", &ids);

        assert_eq!(body.matches("--batch_x\r\n").count(), 3);
        assert_eq!(body.matches("DELETE ").count(), 3);
        assert_eq!(body.matches("MSCRM.BypassCustomPluginExecution: true").count(), 3);
        assert!(body.ends_with("--batch_x--\r\n"));
    }

    #[test]
    fn boundary_extraction_handles_quotes_and_extra_params() {
        assert_eq!(
            extract_boundary("multipart/mixed; boundary=batchresponse_abc").as_deref(),
            Some("batchresponse_abc")
        );
        assert_eq!(
            extract_boundary("multipart/mixed; boundary=\"b1\"; charset=utf-8").as_deref(),
            Some("b1")
        );
        assert_eq!(extract_boundary("application/json"), None);
    }

    fn response_part(status_line: &str, body: &str) -> String {
        format!(
            "--respbound\r\nContent-Type: application/http\r\n\r\n{status_line}\r\n\r\n{body}\r\n"
        )
    }

    #[test]
    fn mixed_batch_response_maps_faults_to_positions() {
        let ids = vec![id(1), id(2), id(3)];
        let mut body = String::new();
        body.push_str(&response_part("HTTP/1.1 204 No Content", ""));
        body.push_str(&response_part(
            "HTTP/1.1 404 Not Found",
            r#"{"error":{"code":"0x80040217","message":"record does not exist"}}"#,
        ));
        body.push_str(&response_part("HTTP/1.1 204 No Content", ""));
        body.push_str("--respbound--\r\n");

        let outcomes = parse_batch_response(&body, "respbound", &ids).unwrap();
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].succeeded());
        assert_eq!(outcomes[1].fault.as_deref(), Some("record does not exist"));
        assert!(outcomes[2].succeeded());
        assert_eq!(outcomes[1].id, id(2));
    }

    #[test]
    fn fault_without_json_body_falls_back_to_status() {
        let ids = vec![id(7)];
        let mut body = response_part("HTTP/1.1 429 Too Many Requests", "");
        body.push_str("--respbound--\r\n");

        let outcomes = parse_batch_response(&body, "respbound", &ids).unwrap();
        assert_eq!(outcomes[0].fault.as_deref(), Some("status 429"));
    }

    #[test]
    fn part_count_mismatch_is_malformed() {
        let ids = vec![id(1), id(2)];
        let mut body = response_part("HTTP/1.1 204 No Content", "");
        body.push_str("--respbound--\r\n");

        let err = parse_batch_response(&body, "respbound", &ids).unwrap_err();
        assert!(matches!(err, StoreError::Malformed(_)));
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        let config = DataverseConfig {
            endpoint: "not a url".into(),
            tenant_id: "tenant".into(),
            timeout: Duration::from_secs(5),
            authority: None,
            entity_set: None,
            id_attribute: None,
        };
        assert!(matches!(
            DataverseStore::new(config),
            Err(StoreError::InvalidEndpoint(_))
        ));
    }
}
