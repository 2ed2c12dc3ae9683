//! REST data service tests against a mock HTTP server

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rk_config::ServiceConfig;
use rk_provisioning::{
    AccountPatch, AccountQuery, DataService, Error, MembershipChange, NewRole, Provisioning,
    ProvisioningSettings, RestDataService, RetryPolicy, RoleName, RoleQuery, SignUpRequest,
};

fn service_for(server: &MockServer) -> RestDataService {
    let config = ServiceConfig {
        server_url: server.uri(),
        app_id: "test-app".to_string(),
        app_key: "test-key".to_string(),
        timeout_ms: 5_000,
    };
    RestDataService::new(&config).unwrap()
}

async fn signed_in(server: &MockServer) -> RestDataService {
    Mock::given(method("POST"))
        .and(path("/1.1/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "objectId": "u1",
            "username": "alice",
            "verify": true,
            "sessionToken": "tok-1"
        })))
        .mount(server)
        .await;

    let service = service_for(server);
    service.log_in("alice", "secret").await.unwrap();
    service
}

#[tokio::test]
async fn test_requests_carry_application_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/1.1/users"))
        .and(header("X-LC-Id", "test-app"))
        .and(header("X-LC-Key", "test-key"))
        .and(query_param("count", "1"))
        .and(query_param("limit", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [],
            "count": 3
        })))
        .expect(1)
        .mount(&server)
        .await;

    let service = service_for(&server);
    assert_eq!(service.count_accounts().await.unwrap(), 3);
}

#[tokio::test]
async fn test_sign_up_starts_a_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/1.1/users"))
        .and(body_json(json!({
            "username": "alice",
            "password": "secret",
            "email": "alice@example.com"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "objectId": "u1",
            "createdAt": "2026-01-02T03:04:05.000Z",
            "sessionToken": "tok-1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let service = service_for(&server);
    let account = service
        .sign_up(&SignUpRequest::new("alice", "secret").with_email("alice@example.com"))
        .await
        .unwrap();

    assert_eq!(account.id, "u1");
    assert_eq!(account.session_token.as_deref(), Some("tok-1"));
    assert!(account.created_at.is_some());
    assert_eq!(service.current_account().unwrap().id, "u1");
}

#[tokio::test]
async fn test_session_header_follows_log_in_and_log_out() {
    let server = MockServer::start().await;
    let service = signed_in(&server).await;

    Mock::given(method("PUT"))
        .and(path("/1.1/users/u1"))
        .and(header("X-LC-Session", "tok-1"))
        .and(body_json(json!({ "isAdmin": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "updatedAt": "2026-01-02T03:04:05.000Z"
        })))
        .expect(1)
        .mount(&server)
        .await;

    service
        .update_account("u1", &AccountPatch::default().with_admin(true))
        .await
        .unwrap();
    assert!(service.current_account().unwrap().is_admin);

    service.log_out().await.unwrap();
    assert!(service.current_account().is_none());
}

#[tokio::test]
async fn test_become_session_uses_given_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/1.1/users/me"))
        .and(header("X-LC-Session", "tok-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "objectId": "u9",
            "username": "zoe",
            "verify": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let service = service_for(&server);
    let account = service.become_session("tok-9").await.unwrap();

    assert_eq!(account.username, "zoe");
    assert_eq!(account.session_token.as_deref(), Some("tok-9"));
}

#[tokio::test]
async fn test_listing_orders_by_member_index() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/1.1/users"))
        .and(query_param("where", r#"{"verify":true}"#))
        .and(query_param("order", "memberIndex"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                { "objectId": "u1", "username": "alice", "verify": true, "memberIndex": 0 },
                { "objectId": "u2", "username": "bob", "verify": true, "memberIndex": 1 }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let service = service_for(&server);
    let accounts = service
        .query_accounts(&AccountQuery {
            verified_only: true,
        })
        .await
        .unwrap();

    let names: Vec<&str> = accounts.iter().map(|a| a.username.as_str()).collect();
    assert_eq!(names, vec!["alice", "bob"]);
}

#[tokio::test]
async fn test_listing_follows_pages() {
    let server = MockServer::start().await;
    let first_page: Vec<serde_json::Value> = (0..1000)
        .map(|i| {
            json!({
                "objectId": format!("u{}", i),
                "username": format!("user{}", i),
                "memberIndex": i
            })
        })
        .collect();

    Mock::given(method("GET"))
        .and(path("/1.1/users"))
        .and(query_param("skip", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": first_page })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/1.1/users"))
        .and(query_param("skip", "1000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                { "objectId": "u1000", "username": "user1000", "memberIndex": 1000 },
                { "objectId": "u1001", "username": "user1001", "memberIndex": 1001 }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let service = service_for(&server);
    let accounts = service
        .query_accounts(&AccountQuery {
            verified_only: false,
        })
        .await
        .unwrap();

    assert_eq!(accounts.len(), 1002);
    assert_eq!(accounts[1001].username, "user1001");
}

#[tokio::test]
async fn test_role_lookup_and_membership() {
    let server = MockServer::start().await;
    let service = signed_in(&server).await;

    Mock::given(method("GET"))
        .and(path("/1.1/roles"))
        .and(query_param("where", r#"{"name":"normal"}"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{ "objectId": "r2", "name": "normal", "ACL": { "*": { "read": true } } }]
        })))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/1.1/roles/r2"))
        .and(body_json(json!({
            "users": {
                "__op": "AddRelation",
                "objects": [{ "__type": "Pointer", "className": "_User", "objectId": "u2" }]
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let roles = service
        .find_roles(&RoleQuery::by_name(RoleName::Normal))
        .await
        .unwrap();
    assert_eq!(roles.len(), 1);
    assert_eq!(roles[0].name, RoleName::Normal);
    assert!(roles[0].acl.public_read());

    service
        .update_role_membership("r2", MembershipChange::Add, "u2")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_create_role_sends_policy_and_member() {
    let server = MockServer::start().await;
    let service = signed_in(&server).await;

    let new_role = NewRole::new(RoleName::Administrator).with_member("u1");
    let expected_acl = serde_json::to_value(&new_role.acl).unwrap();

    Mock::given(method("POST"))
        .and(path("/1.1/roles"))
        .and(body_json(json!({
            "name": "administrator",
            "ACL": expected_acl,
            "users": {
                "__op": "AddRelation",
                "objects": [{ "__type": "Pointer", "className": "_User", "objectId": "u1" }]
            }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "objectId": "r1",
            "createdAt": "2026-01-02T03:04:05.000Z"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let role = service.create_role(&new_role).await.unwrap();
    assert_eq!(role.id, "r1");
    assert!(role.members.contains("u1"));
}

#[tokio::test]
async fn test_api_errors_are_decoded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/1.1/functions/verifyUser"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": 211,
            "error": "Could not find user."
        })))
        .mount(&server)
        .await;

    let service = service_for(&server);
    let err = service
        .run_function("verifyUser", json!({ "targetUser": "ghost" }))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        Error::Api {
            status: 400,
            code: 211,
            message: "Could not find user.".to_string()
        }
    );
}

#[tokio::test]
async fn test_function_result_is_unwrapped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/1.1/functions/userSignUp"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "ok" })))
        .mount(&server)
        .await;

    let service = service_for(&server);
    let result = service.run_function("userSignUp", json!({})).await.unwrap();
    assert_eq!(result, json!("ok"));
}

#[tokio::test]
async fn test_unverified_account_never_reaches_login_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/1.1/users"))
        .and(query_param("where", r#"{"username":"carol"}"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{ "objectId": "u3", "username": "carol", "verify": false }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/1.1/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let provisioning = Provisioning::new(
        Arc::new(service_for(&server)),
        ProvisioningSettings::default(),
    );
    let err = provisioning.log_in("carol", "pw").await.unwrap_err();

    assert_eq!(err, Error::not_yet_verified("carol"));
}

#[tokio::test]
async fn test_procedure_retries_against_server() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/1.1/functions/deleteUser"))
        .respond_with(ResponseTemplate::new(503))
        .expect(5)
        .mount(&server)
        .await;

    let settings = ProvisioningSettings {
        retry: RetryPolicy::new(5, Duration::from_millis(5)),
        ..ProvisioningSettings::default()
    };
    let provisioning = Provisioning::new(Arc::new(service_for(&server)), settings);

    let err = provisioning.delete_account("u2").await.unwrap_err();
    assert!(matches!(
        err,
        Error::RemoteProcedureExhausted { attempts: 5, .. }
    ));
}
