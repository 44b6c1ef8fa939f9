#![allow(clippy::unwrap_used, clippy::expect_used)]

//! `MetabaseClient` end to end against a mock Metabase server.

use std::time::Duration;

use httpmock::prelude::*;
use metabase_admin::{GraphRetryConfig, MetabaseClient, MetabaseConfig};
use metabase_admin_sdk::{
    AccessSpec, CollectionId, CollectionInput, CollectionsClient, GroupId, MembershipsClient,
    MetabaseError,
    NewMembership, Permission, PermissionGraphClient, PermissionGroupsClient, SessionMode,
    UserInput, UsersClient,
};
use metabase_http::{SESSION_HEADER, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;

fn config(server: &MockServer, session_id: Option<&str>) -> MetabaseConfig {
    MetabaseConfig {
        host: server.base_url(),
        username: "admin@example.com".to_owned(),
        password: SecretString::from("s3cret-pass".to_owned()),
        session_id: session_id.map(|id| SecretString::from(id.to_owned())),
        user_agent: "metabase-admin-tests/1.0".to_owned(),
        timeout: Duration::from_secs(5),
        graph_retry: GraphRetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            jitter: Duration::ZERO,
        },
    }
}

async fn connected(server: &MockServer) -> MetabaseClient {
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/session");
            then.status(200).json_body(json!({"id": "session-xyz"}));
        })
        .await;
    MetabaseClient::connect(&config(server, None)).await.unwrap()
}

#[tokio::test]
async fn connect_reuses_valid_session_id() {
    let server = MockServer::start_async().await;
    let probe = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/user/current")
                .header(SESSION_HEADER, "kept-session")
                .header("user-agent", "metabase-admin-tests/1.0");
            then.status(200).json_body(json!({"id": 1}));
        })
        .await;

    let client = MetabaseClient::connect(&config(&server, Some("kept-session")))
        .await
        .unwrap();

    probe.assert_async().await;
    assert_eq!(client.session().mode(), SessionMode::Reused);
    assert_eq!(client.session().token().expose_secret(), "kept-session");
    assert_eq!(client.session().user_agent(), "metabase-admin-tests/1.0");
}

#[tokio::test]
async fn connect_rejects_invalid_config() {
    let server = MockServer::start_async().await;
    let mut config = config(&server, None);
    config.username = String::new();

    let err = MetabaseClient::connect(&config).await.err().unwrap();

    assert!(matches!(err, MetabaseError::Config(_)));
}

#[tokio::test]
async fn connect_surfaces_login_rejection() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/session");
            then.status(400).json_body(json!({"errors": {"username": "value must be a non-blank string."}}));
        })
        .await;

    let err = MetabaseClient::connect(&config(&server, None))
        .await
        .err()
        .unwrap();

    assert!(matches!(err, MetabaseError::Auth(_)));
}

#[tokio::test]
async fn updates_and_reads_back_collection_access() {
    let server = MockServer::start_async().await;
    let client = connected(&server).await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/collection/graph")
                .header(SESSION_HEADER, "session-xyz");
            then.status(200).json_body(json!({
                "revision": 3,
                "groups": {"1": {"9": "read"}, "5": {"9": "read"}, "6": {"9": "write"}}
            }));
        })
        .await;
    let submit = server
        .mock_async(|when, then| {
            when.method(PUT).path("/api/collection/graph").json_body(json!({
                "revision": 3,
                "groups": {"1": {"9": "read"}, "5": {"9": "write"}, "6": {"9": "none"}}
            }));
            then.status(200).json_body(json!({
                "revision": 4,
                "groups": {"1": {"9": "read"}, "5": {"9": "write"}, "6": {"9": "none"}}
            }));
        })
        .await;

    let access = client
        .collection_access(&CollectionId::from(9))
        .await
        .unwrap();
    assert_eq!(access.groups_with(Permission::Read), vec![GroupId(5)]);
    assert_eq!(access.groups_with(Permission::Write), vec![GroupId(6)]);

    let spec = AccessSpec::from_lists(std::iter::empty(), [GroupId(5)], Permission::Read);
    let stored = client
        .update_collection_access(&CollectionId::from(9), &spec)
        .await
        .unwrap();

    submit.assert_async().await;
    assert_eq!(stored.revision, 4);
}

#[tokio::test]
async fn user_list_is_cached_until_a_user_changes() {
    let server = MockServer::start_async().await;
    let client = connected(&server).await;
    let list = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/user");
            then.status(200).json_body(json!({
                "data": [{"id": 1, "email": "admin@example.com", "first_name": "Ada", "last_name": "Admin"}],
                "total": 1
            }));
        })
        .await;
    let create = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/user")
                .json_body(json!({"email": "new@example.com", "first_name": "New"}));
            then.status(200)
                .json_body(json!({"id": 2, "email": "new@example.com", "first_name": "New", "last_name": null}));
        })
        .await;

    let first = client.list_users().await.unwrap();
    let second = client.list_users().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first[0].first_name.as_deref(), Some("Ada"));
    assert_eq!(list.hits_async().await, 1);

    let created = client
        .create_user(&UserInput {
            email: "new@example.com".to_owned(),
            first_name: Some("New".to_owned()),
            last_name: None,
        })
        .await
        .unwrap();
    assert_eq!(created.id, 2);
    create.assert_async().await;

    client.list_users().await.unwrap();
    assert_eq!(list.hits_async().await, 2);
}

#[tokio::test]
async fn user_list_is_refetched_after_update_and_delete() {
    let server = MockServer::start_async().await;
    let client = connected(&server).await;
    let list = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/user");
            then.status(200).json_body(json!({
                "data": [{"id": 2, "email": "new@example.com", "first_name": "New"}]
            }));
        })
        .await;
    let update = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/api/user/2")
                .json_body(json!({"email": "new@example.com", "first_name": "Renamed"}));
            then.status(200)
                .json_body(json!({"id": 2, "email": "new@example.com", "first_name": "Renamed"}));
        })
        .await;
    let delete = server
        .mock_async(|when, then| {
            when.method(DELETE).path("/api/user/2");
            then.status(204);
        })
        .await;

    client.list_users().await.unwrap();
    client.list_users().await.unwrap();
    assert_eq!(list.hits_async().await, 1);

    let updated = client
        .update_user(
            2,
            &UserInput {
                email: "new@example.com".to_owned(),
                first_name: Some("Renamed".to_owned()),
                last_name: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.first_name.as_deref(), Some("Renamed"));
    client.list_users().await.unwrap();
    assert_eq!(list.hits_async().await, 2);

    client.delete_user(2).await.unwrap();
    client.list_users().await.unwrap();
    assert_eq!(list.hits_async().await, 3);

    update.assert_async().await;
    delete.assert_async().await;
}

#[tokio::test]
async fn collection_list_is_refetched_after_create_and_update() {
    let server = MockServer::start_async().await;
    let client = connected(&server).await;
    let list = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/collection");
            then.status(200)
                .json_body(json!([{"id": "root", "name": "Our analytics"}]));
        })
        .await;
    let create = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/collection")
                .json_body(json!({"name": "Finance", "color": "#509EE3", "archived": false}));
            then.status(200).json_body(json!({
                "id": 8, "name": "Finance", "color": "#509EE3", "archived": false
            }));
        })
        .await;
    let update = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/api/collection/8")
                .json_body(json!({"name": "Finance", "color": "#509EE3", "archived": true}));
            then.status(200).json_body(json!({
                "id": 8, "name": "Finance", "color": "#509EE3", "archived": true
            }));
        })
        .await;
    let mut input = CollectionInput {
        name: "Finance".to_owned(),
        parent_id: None,
        color: Some("#509EE3".to_owned()),
        archived: false,
    };

    client.list_collections().await.unwrap();
    client.list_collections().await.unwrap();
    assert_eq!(list.hits_async().await, 1);

    let created = client.create_collection(&input).await.unwrap();
    assert_eq!(created.graph_id(), CollectionId::from(8));
    client.list_collections().await.unwrap();
    assert_eq!(list.hits_async().await, 2);

    input.archived = true;
    let updated = client
        .update_collection(&created.graph_id(), &input)
        .await
        .unwrap();
    assert!(updated.archived);
    client.list_collections().await.unwrap();
    assert_eq!(list.hits_async().await, 3);

    create.assert_async().await;
    update.assert_async().await;
}

#[tokio::test]
async fn membership_changes_refresh_group_member_counts() {
    let server = MockServer::start_async().await;
    let client = connected(&server).await;
    let groups = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/permissions/group");
            then.status(200)
                .json_body(json!([{"id": 5, "name": "Finance", "member_count": 1}]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/permissions/membership");
            then.status(200)
                .json_body(json!([{"user_id": 12, "membership_id": 41}]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(DELETE).path("/api/permissions/membership/41");
            then.status(204);
        })
        .await;

    client.list_groups().await.unwrap();
    client.list_groups().await.unwrap();
    assert_eq!(groups.hits_async().await, 1);

    let membership = client
        .create_membership(NewMembership {
            user_id: 12,
            group_id: GroupId(5),
        })
        .await
        .unwrap();
    client.list_groups().await.unwrap();
    assert_eq!(groups.hits_async().await, 2);

    client
        .delete_membership(membership.membership_id)
        .await
        .unwrap();
    client.list_groups().await.unwrap();
    assert_eq!(groups.hits_async().await, 3);
}

#[tokio::test]
async fn invalidate_caches_forces_refetch() {
    let server = MockServer::start_async().await;
    let client = connected(&server).await;
    let list = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/collection");
            then.status(200).json_body(json!([
                {"id": "root", "name": "Our analytics"},
                {"id": 7, "name": "Finance", "parent_id": null, "color": "#509EE3", "archived": false}
            ]));
        })
        .await;

    let collections = client.list_collections().await.unwrap();
    client.invalidate_caches();
    client.list_collections().await.unwrap();

    assert_eq!(collections.len(), 2);
    assert_eq!(collections[1].graph_id(), CollectionId::from(7));
    assert_eq!(list.hits_async().await, 2);
}

#[tokio::test]
async fn group_lifecycle() {
    let server = MockServer::start_async().await;
    let client = connected(&server).await;
    let list = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/permissions/group");
            then.status(200).json_body(json!([
                {"id": 1, "name": "All Users", "member_count": 4},
                {"id": 2, "name": "Administrators", "member_count": 1}
            ]));
        })
        .await;
    let create = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/permissions/group")
                .json_body(json!({"name": "Finance"}));
            then.status(200).json_body(json!({"id": 7, "name": "Finance"}));
        })
        .await;
    let delete = server
        .mock_async(|when, then| {
            when.method(DELETE).path("/api/permissions/group/7");
            then.status(204);
        })
        .await;

    assert_eq!(client.list_groups().await.unwrap().len(), 2);
    let group = client.create_group("Finance").await.unwrap();
    assert_eq!(group.id, GroupId(7));
    client.delete_group(group.id).await.unwrap();
    client.list_groups().await.unwrap();

    create.assert_async().await;
    delete.assert_async().await;
    assert_eq!(list.hits_async().await, 2);
}

#[tokio::test]
async fn created_membership_is_picked_from_member_list() {
    let server = MockServer::start_async().await;
    let client = connected(&server).await;
    let create = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/permissions/membership")
                .json_body(json!({"user_id": 12, "group_id": 5}));
            then.status(200).json_body(json!([
                {"user_id": 3, "membership_id": 40},
                {"user_id": 12, "membership_id": 41}
            ]));
        })
        .await;

    let membership = client
        .create_membership(NewMembership {
            user_id: 12,
            group_id: GroupId(5),
        })
        .await
        .unwrap();

    create.assert_async().await;
    assert_eq!(membership.membership_id, 41);
    assert_eq!(membership.group_id, GroupId(5));
    assert_eq!(membership.user_id, 12);
}

#[tokio::test]
async fn membership_missing_from_response_is_an_error() {
    let server = MockServer::start_async().await;
    let client = connected(&server).await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/permissions/membership");
            then.status(200)
                .json_body(json!([{"user_id": 3, "membership_id": 40}]));
        })
        .await;

    let err = client
        .create_membership(NewMembership {
            user_id: 12,
            group_id: GroupId(5),
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        MetabaseError::MembershipNotReturned {
            user_id: 12,
            group_id: GroupId(5)
        }
    ));
}

#[tokio::test]
async fn memberships_are_listed_by_user() {
    let server = MockServer::start_async().await;
    let client = connected(&server).await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/permissions/membership");
            then.status(200).json_body(json!({
                "12": [
                    {"membership_id": 41, "group_id": 5, "user_id": 12},
                    {"membership_id": 2, "group_id": 1, "user_id": 12}
                ]
            }));
        })
        .await;
    let delete = server
        .mock_async(|when, then| {
            when.method(DELETE).path("/api/permissions/membership/41");
            then.status(204);
        })
        .await;

    let memberships = client.list_memberships().await.unwrap();
    client.delete_membership(41).await.unwrap();

    assert_eq!(memberships[&12].len(), 2);
    delete.assert_async().await;
}

#[tokio::test]
async fn entity_failures_propagate_as_transport_errors() {
    let server = MockServer::start_async().await;
    let client = connected(&server).await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/collection/404");
            then.status(404).body("Not found.");
        })
        .await;

    let err = client
        .get_collection(&CollectionId::from(404))
        .await
        .unwrap_err();

    match err {
        MetabaseError::Transport(source) => {
            assert_eq!(source.status(), Some(StatusCode::NOT_FOUND));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
