//! Wire-level tests for the Dataverse store implementation.

use bulkpurge::store::{Credential, DataverseConfig, DataverseStore, RecordId, RecordStore};
use std::time::Duration;
use uuid::Uuid;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn credential() -> Credential {
    Credential {
        client_id: "app-1".to_string(),
        client_secret: "s3cret".to_string(),
    }
}

fn store_for(server: &MockServer) -> DataverseStore {
    DataverseStore::new(DataverseConfig {
        endpoint: server.uri(),
        tenant_id: "tenant".to_string(),
        timeout: Duration::from_secs(5),
        authority: Some(server.uri()),
        entity_set: None,
        id_attribute: None,
    })
    .unwrap()
}

async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/tenant/oauth2/v2.0/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "token_type": "Bearer",
            "expires_in": 3600,
            "access_token": "tok-123",
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn lists_ids_across_pages_via_next_link() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    let first = Uuid::from_u128(1);
    let second = Uuid::from_u128(2);
    let third = Uuid::from_u128(3);

    let next_link = format!(
        "{}/api/data/v9.2/widgets?$select=widgetid&$skiptoken=page2",
        server.uri()
    );
    Mock::given(method("GET"))
        .and(path("/api/data/v9.2/widgets"))
        .and(query_param("$select", "widgetid"))
        .and(query_param("$skiptoken", "page2"))
        .and(header("Authorization", "Bearer tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [{ "widgetid": third }],
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/data/v9.2/widgets"))
        .and(query_param("$select", "widgetid"))
        .and(header("Prefer", "odata.maxpagesize=2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [{ "widgetid": first }, { "widgetid": second }],
            "@odata.nextLink": next_link,
        })))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let mut connection = store.connect(&credential()).await.unwrap();

    let page = connection.list_page("widget", 2, None).await.unwrap();
    assert_eq!(page.ids, vec![RecordId(first), RecordId(second)]);
    let cursor = page.next_cursor.expect("first page must carry a cursor");

    let page = connection.list_page("widget", 2, Some(&cursor)).await.unwrap();
    assert_eq!(page.ids, vec![RecordId(third)]);
    assert!(page.next_cursor.is_none());
}

#[tokio::test]
async fn delete_many_maps_part_statuses_to_outcomes() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    let ids: Vec<RecordId> = (1..=3).map(|i| RecordId(Uuid::from_u128(i))).collect();

    // Captured shape of a Dataverse $batch response: one part per delete,
    // in request order, terminated by the closing boundary.
    let response_body = concat!(
        "--respbound\r\n",
        "Content-Type: application/http\r\n",
        "\r\n",
        "HTTP/1.1 204 No Content\r\n",
        "\r\n",
        "\r\n",
        "--respbound\r\n",
        "Content-Type: application/http\r\n",
        "\r\n",
        "HTTP/1.1 404 Not Found\r\n",
        "\r\n",
        "{\"error\":{\"code\":\"0x80040217\",\"message\":\"widget does not exist\"}}\r\n",
        "--respbound\r\n",
        "Content-Type: application/http\r\n",
        "\r\n",
        "HTTP/1.1 204 No Content\r\n",
        "\r\n",
        "\r\n",
        "--respbound--\r\n",
    );

    Mock::given(method("POST"))
        .and(path("/api/data/v9.2/$batch"))
        .and(header("Prefer", "odata.continue-on-error"))
        .and(body_string_contains("MSCRM.BypassCustomPluginExecution: true"))
        .and(body_string_contains("DELETE "))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(response_body, "multipart/mixed; boundary=respbound"),
        )
        .mount(&server)
        .await;

    let store = store_for(&server);
    let mut connection = store.connect(&credential()).await.unwrap();

    let outcomes = connection.delete_many("widget", &ids).await.unwrap();
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[0].succeeded());
    assert_eq!(outcomes[1].fault.as_deref(), Some("widget does not exist"));
    assert!(outcomes[2].succeeded());
}

#[tokio::test]
async fn near_expiry_token_is_refreshed_before_the_next_call() {
    let server = MockServer::start().await;

    // The first token expires inside the refresh margin, so the very next
    // store call must go back to the token endpoint before hitting the API.
    Mock::given(method("POST"))
        .and(path("/tenant/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "token_type": "Bearer",
            "expires_in": 30,
            "access_token": "tok-short",
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/tenant/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "token_type": "Bearer",
            "expires_in": 3600,
            "access_token": "tok-fresh",
        })))
        .expect(1)
        .mount(&server)
        .await;

    // Only the refreshed token is accepted by the listing endpoint.
    Mock::given(method("GET"))
        .and(path("/api/data/v9.2/widgets"))
        .and(header("Authorization", "Bearer tok-fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [{ "widgetid": Uuid::from_u128(9) }],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server);
    let mut connection = store.connect(&credential()).await.unwrap();

    let page = connection.list_page("widget", 10, None).await.unwrap();
    assert_eq!(page.ids, vec![RecordId(Uuid::from_u128(9))]);
}

#[tokio::test]
async fn rejected_token_request_fails_the_connect() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tenant/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
        .mount(&server)
        .await;

    let store = store_for(&server);
    let result = store.connect(&credential()).await;
    assert!(result.is_err());
}
