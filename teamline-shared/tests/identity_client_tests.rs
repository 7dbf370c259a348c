/// Identity-provider client tests against a mock HTTP server
///
/// wiremock stands in for the Keycloak admin API; every test exercises
/// the real request/response handling including token acquisition.

use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use teamline_shared::identity::{IdentityError, IdentityProvider, KeycloakClient, KeycloakConfig};

fn client_for(server: &MockServer) -> KeycloakClient {
    KeycloakClient::new(KeycloakConfig {
        base_url: server.uri(),
        realm: "teamline".to_string(),
        client_id: "teamline-admin".to_string(),
        client_secret: "secret".to_string(),
    })
}

async fn mount_token_endpoint(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/realms/master/protocol/openid-connect/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "admin-token",
            "token_type": "Bearer",
            "expires_in": 60
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_invite_user_returns_id_from_location_header() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    let new_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/admin/realms/teamline/users"))
        .respond_with(ResponseTemplate::new(201).insert_header(
            "Location",
            format!("{}/admin/realms/teamline/users/{}", server.uri(), new_id).as_str(),
        ))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/admin/realms/teamline/roles/developer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": Uuid::new_v4(),
            "name": "developer"
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!(
            "/admin/realms/teamline/users/{}/role-mappings/realm",
            new_id
        )))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path(format!(
            "/admin/realms/teamline/users/{}/execute-actions-email",
            new_id
        )))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let id = client_for(&server)
        .invite_user("amira", "amira@example.com", "developer")
        .await
        .unwrap();

    assert_eq!(id, new_id);
}

#[tokio::test]
async fn test_invite_user_email_failure_is_swallowed() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    let new_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/admin/realms/teamline/users"))
        .respond_with(ResponseTemplate::new(201).insert_header(
            "Location",
            format!("{}/admin/realms/teamline/users/{}", server.uri(), new_id).as_str(),
        ))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/admin/realms/teamline/roles/developer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": Uuid::new_v4(),
            "name": "developer"
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!(
            "/admin/realms/teamline/users/{}/role-mappings/realm",
            new_id
        )))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    // The mail server is down; the invite must still succeed.
    Mock::given(method("PUT"))
        .and(path(format!(
            "/admin/realms/teamline/users/{}/execute-actions-email",
            new_id
        )))
        .respond_with(ResponseTemplate::new(500).set_body_string("smtp unreachable"))
        .mount(&server)
        .await;

    let result = client_for(&server)
        .invite_user("amira", "amira@example.com", "developer")
        .await;

    assert_eq!(result.unwrap(), new_id);
}

#[tokio::test]
async fn test_invite_user_conflict_maps_to_conflict_error() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("POST"))
        .and(path("/admin/realms/teamline/users"))
        .respond_with(
            ResponseTemplate::new(409)
                .set_body_string(r#"{"errorMessage":"User exists with same username"}"#),
        )
        .mount(&server)
        .await;

    let result = client_for(&server)
        .invite_user("amira", "amira@example.com", "developer")
        .await;

    match result {
        Err(IdentityError::Conflict(body)) => assert!(body.contains("same username")),
        other => panic!("expected Conflict, got {:?}", other),
    }
}

#[tokio::test]
async fn test_delete_user_not_found() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    let missing = Uuid::new_v4();

    Mock::given(method("DELETE"))
        .and(path(format!("/admin/realms/teamline/users/{}", missing)))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let result = client_for(&server).delete_user(missing).await;
    assert!(matches!(result, Err(IdentityError::NotFound(id)) if id == missing));
}

#[tokio::test]
async fn test_user_exists_by_email() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("GET"))
        .and(path("/admin/realms/teamline/users/count"))
        .and(query_param("email", "amira@example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(1)))
        .mount(&server)
        .await;

    let exists = client_for(&server)
        .user_exists_by_email("amira@example.com")
        .await
        .unwrap();

    assert!(exists);
}
