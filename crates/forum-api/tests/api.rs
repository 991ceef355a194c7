use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use forum_api::{AppState, AppStateInner, router, uploads::MAX_UPLOAD_SIZE};
use forum_db::Database;

struct TestApp {
    state: AppState,
    app: Router,
}

enum Auth<'a> {
    Anonymous,
    Bearer(&'a str),
    Admin { id: &'a str, email: &'a str },
}

fn setup() -> TestApp {
    let upload_dir: PathBuf = std::env::temp_dir().join(format!("forum-test-{}", uuid::Uuid::new_v4()));
    let state: AppState = Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        jwt_secret: "integration-test-secret".into(),
        token_ttl_days: 1,
        upload_dir,
        allow_admin_registration: false,
    });
    TestApp {
        app: router(state.clone()),
        state,
    }
}

impl TestApp {
    async fn call(&self, method: Method, uri: &str, auth: Auth<'_>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        match auth {
            Auth::Anonymous => {}
            Auth::Bearer(token) => {
                builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
            }
            Auth::Admin { id, email } => {
                builder = builder.header("x-admin-id", id).header("x-admin-email", email);
            }
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        (status, value)
    }

    /// Registers a user and returns `(user_id, token)`.
    async fn register(&self, email: &str, username: &str) -> (String, String) {
        let (status, body) = self
            .call(
                Method::POST,
                "/auth/register",
                Auth::Anonymous,
                Some(json!({ "email": email, "username": username, "password": "secret123" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        (
            body["user_id"].as_str().unwrap().to_string(),
            body["token"].as_str().unwrap().to_string(),
        )
    }

    /// Registers an admin account and returns its id.
    async fn register_admin(&self, email: &str) -> String {
        let (status, body) = self
            .call(
                Method::POST,
                "/admin-auth/register",
                Auth::Anonymous,
                Some(json!({ "email": email, "password": "admin-pass", "username": "root" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["admin_id"].as_str().unwrap().to_string()
    }

    async fn create_post(&self, token: &str, title: &str) -> String {
        let (status, body) = self
            .call(
                Method::POST,
                "/posts",
                Auth::Bearer(token),
                Some(json!({ "title": title, "tags": ["rust", " exams "] })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_str().unwrap().to_string()
    }

    async fn points(&self, token: &str) -> i64 {
        let (status, body) = self.call(Method::GET, "/points/profile", Auth::Bearer(token), None).await;
        assert_eq!(status, StatusCode::OK);
        body["total_points"].as_i64().unwrap()
    }
}

#[tokio::test]
async fn health_check() {
    let t = setup();
    let (status, body) = t.call(Method::GET, "/healthz", Auth::Anonymous, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn register_and_login() {
    let t = setup();
    let (user_id, _) = t.register("alice@example.com", "alice").await;

    let (status, body) = t
        .call(
            Method::POST,
            "/auth/register",
            Auth::Anonymous,
            Some(json!({ "email": "alice@example.com", "username": "other", "password": "secret123" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["detail"], "Email already registered");

    let (status, body) = t
        .call(
            Method::POST,
            "/auth/login",
            Auth::Anonymous,
            Some(json!({ "email": "alice@example.com", "password": "wrong-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Invalid email or password");

    let (status, body) = t
        .call(
            Method::POST,
            "/auth/login",
            Auth::Anonymous,
            Some(json!({ "email": "alice@example.com", "password": "secret123" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], user_id);
    assert_eq!(body["username"], "alice");
}

#[tokio::test]
async fn bearer_errors_are_reported() {
    let t = setup();
    let (status, body) = t.call(Method::GET, "/points/profile", Auth::Anonymous, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Missing Authorization header");

    let (status, body) = t.call(Method::GET, "/points/profile", Auth::Bearer("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Invalid or expired token");
}

#[tokio::test]
async fn posting_and_replying_earn_points_and_build_a_tree() {
    let t = setup();
    let (_, alice) = t.register("alice@example.com", "alice").await;
    let (_, bob) = t.register("bob@example.com", "bob").await;

    let post_id = t.create_post(&alice, "  Midterm study plan  ").await;

    let uri = format!("/posts/{}/replies", post_id);
    let (status, top) = t
        .call(Method::POST, &uri, Auth::Bearer(&bob), Some(json!({ "content": "count me in" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let top_id = top["id"].as_str().unwrap().to_string();

    let (status, _) = t
        .call(
            Method::POST,
            &uri,
            Auth::Bearer(&alice),
            Some(json!({ "content": "great", "parent_reply_id": top_id })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, detail) = t
        .call(Method::GET, &format!("/posts/{}", post_id), Auth::Anonymous, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["title"], "Midterm study plan");
    assert_eq!(detail["tags"], json!(["rust", "exams"]));
    assert_eq!(detail["view_count"], 1);
    assert_eq!(detail["reply_count"], 2);
    assert_eq!(detail["replies"].as_array().unwrap().len(), 1);
    assert_eq!(detail["replies"][0]["replies"][0]["content"], "great");

    // daily login + post + reply
    assert_eq!(t.points(&alice).await, 1 + 10 + 5);
    assert_eq!(t.points(&bob).await, 1 + 5);

    let (status, list) = t.call(Method::GET, "/posts?page=0&page_size=0", Auth::Anonymous, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["page"], 1);
    assert_eq!(list["page_size"], 10);
    assert_eq!(list["total"], 1);
    assert_eq!(list["total_pages"], 1);
}

#[tokio::test]
async fn huge_page_numbers_read_past_the_end() {
    let t = setup();
    let (_, alice) = t.register("alice@example.com", "alice").await;
    t.create_post(&alice, "Only post").await;

    let (status, list) = t
        .call(Method::GET, "/posts?page=9223372036854775807", Auth::Anonymous, None)
        .await;
    assert_eq!(status, StatusCode::OK, "{}", list);
    assert_eq!(list["items"], json!([]));
    assert_eq!(list["total"], 1);

    let (status, mine) = t
        .call(
            Method::GET,
            "/posts/my-posts?page=9223372036854775807&page_size=100",
            Auth::Bearer(&alice),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", mine);
    assert_eq!(mine["items"], json!([]));
}

#[tokio::test]
async fn reply_content_is_trimmed() {
    let t = setup();
    let (_, alice) = t.register("alice@example.com", "alice").await;
    let post_id = t.create_post(&alice, "Whitespace").await;
    let uri = format!("/posts/{}/replies", post_id);

    let (status, reply) = t
        .call(Method::POST, &uri, Auth::Bearer(&alice), Some(json!({ "content": "  see you there \n" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(reply["content"], "see you there");

    let (status, body) = t
        .call(Method::POST, &uri, Auth::Bearer(&alice), Some(json!({ "content": "   " })))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{}", body);
}

#[tokio::test]
async fn closed_posts_reject_replies() {
    let t = setup();
    let (_, alice) = t.register("alice@example.com", "alice").await;
    let (_, bob) = t.register("bob@example.com", "bob").await;
    let post_id = t.create_post(&alice, "Closing soon").await;

    let close = format!("/posts/{}/close", post_id);
    let (status, body) = t.call(Method::PATCH, &close, Auth::Bearer(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["detail"], "Only post owner can close it");

    let (status, body) = t.call(Method::PATCH, &close, Auth::Bearer(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_closed"], true);

    let (status, body) = t
        .call(
            Method::POST,
            &format!("/posts/{}/replies", post_id),
            Auth::Bearer(&bob),
            Some(json!({ "content": "too late" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["detail"], "Post is closed");
}

#[tokio::test]
async fn votes_toggle_switch_and_reward_authors() {
    let t = setup();
    let (_, alice) = t.register("alice@example.com", "alice").await;
    let (_, bob) = t.register("bob@example.com", "bob").await;
    let post_id = t.create_post(&alice, "Vote on me").await;
    let uri = format!("/posts/{}/vote", post_id);

    let (status, body) = t
        .call(Method::POST, &uri, Auth::Bearer(&bob), Some(json!({ "vote_type": "upvote" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "upvote_count": 1, "downvote_count": 0, "user_vote": "upvote" }));
    assert_eq!(t.points(&alice).await, 1 + 10 + 2);

    let (_, body) = t
        .call(Method::POST, &uri, Auth::Bearer(&bob), Some(json!({ "vote_type": "upvote" })))
        .await;
    assert_eq!(body, json!({ "upvote_count": 0, "downvote_count": 0, "user_vote": null }));

    let (_, body) = t
        .call(Method::POST, &uri, Auth::Bearer(&bob), Some(json!({ "vote_type": "downvote" })))
        .await;
    assert_eq!(body, json!({ "upvote_count": 0, "downvote_count": 1, "user_vote": "downvote" }));

    // self-votes pay nothing
    let before = t.points(&alice).await;
    t.call(Method::POST, &uri, Auth::Bearer(&alice), Some(json!({ "vote_type": "upvote" })))
        .await;
    assert_eq!(t.points(&alice).await, before);

    let (status, _) = t
        .call(Method::POST, &uri, Auth::Bearer(&bob), Some(json!({ "vote_type": "meh" })))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn pinning_costs_points() {
    let t = setup();
    let (alice_id, alice) = t.register("alice@example.com", "alice").await;
    let post_id = t.create_post(&alice, "Pin me please").await;
    let uri = format!("/posts/{}/pin", post_id);

    let (status, body) = t.call(Method::POST, &uri, Auth::Bearer(&alice), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Insufficient points to pin post. Required: 50, Current: 11");

    t.state.db.award_points(&alice_id, 100, "test top-up").unwrap();
    let (status, body) = t.call(Method::POST, &uri, Auth::Bearer(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_pinned"], true);
    assert_eq!(t.points(&alice).await, 111 - 50);

    let (status, body) = t.call(Method::POST, &uri, Auth::Bearer(&alice), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Post is already pinned and not expired");
}

#[tokio::test]
async fn reports_are_one_per_reporter() {
    let t = setup();
    let (_, alice) = t.register("alice@example.com", "alice").await;
    let (_, bob) = t.register("bob@example.com", "bob").await;
    let post_id = t.create_post(&alice, "Questionable").await;
    let uri = format!("/posts/{}/report", post_id);

    let (status, body) = t
        .call(Method::POST, &uri, Auth::Bearer(&bob), Some(json!({ "reason": "spam" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["reply_id"], Value::Null);

    let (status, body) = t
        .call(Method::POST, &uri, Auth::Bearer(&bob), Some(json!({ "reason": "spam again" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "You have already reported this post");
}

#[tokio::test]
async fn staff_endpoints_accept_admin_headers_and_staff_roles() {
    let t = setup();
    let (alice_id, alice) = t.register("alice@example.com", "alice").await;

    let (status, body) = t.call(Method::GET, "/admin/stats", Auth::Anonymous, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Missing Authorization header or Admin credentials");

    let (status, body) = t.call(Method::GET, "/admin/stats", Auth::Bearer(&alice), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["detail"], "Admin access required");

    let admin_id = t.register_admin("root@example.com").await;
    let admin = Auth::Admin {
        id: &admin_id,
        email: "root@example.com",
    };
    let (status, body) = t.call(Method::GET, "/admin/stats", admin, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_users"], 1);

    t.state.db.set_user_role(&alice_id, "moderator").unwrap();
    let (status, body) = t
        .call(Method::GET, "/admin/stats/weekly?weeks=100", Auth::Bearer(&alice), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["weeks"], 52);
    assert_eq!(body["weekly_data"].as_array().unwrap().len(), 52);
}

#[tokio::test]
async fn admin_registration_closes_after_the_first_account() {
    let t = setup();
    t.register_admin("root@example.com").await;

    let (status, body) = t
        .call(
            Method::POST,
            "/admin-auth/register",
            Auth::Anonymous,
            Some(json!({ "email": "intruder@example.com", "password": "admin-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["detail"], "Admin registration is disabled");

    let (status, _) = t
        .call(
            Method::POST,
            "/admin-auth/login",
            Auth::Anonymous,
            Some(json!({ "email": "intruder@example.com", "password": "admin-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn tag_rename_rewrites_posts() {
    let t = setup();
    let (_, alice) = t.register("alice@example.com", "alice").await;
    let post_id = t.create_post(&alice, "Tagged post").await;
    let admin_id = t.register_admin("root@example.com").await;

    let (status, body) = t
        .call(
            Method::PUT,
            "/admin/tags/rename",
            Auth::Admin {
                id: &admin_id,
                email: "root@example.com",
            },
            Some(json!({ "old_tag": "exams", "new_tag": "rust" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated"], 1);

    let (_, detail) = t
        .call(Method::GET, &format!("/posts/{}", post_id), Auth::Anonymous, None)
        .await;
    assert_eq!(detail["tags"], json!(["rust"]));
}

#[tokio::test]
async fn creation_request_to_membership() {
    let t = setup();
    let (alice_id, alice) = t.register("alice@example.com", "alice").await;
    let (_, bob) = t.register("bob@example.com", "bob").await;
    let admin_id = t.register_admin("root@example.com").await;

    let (status, request) = t
        .call(
            Method::POST,
            "/line-groups/creation-requests",
            Auth::Bearer(&alice),
            Some(json!({ "name": "Calculus crew", "qr_code_url": "https://line.me/qr/calc" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(request["status"], "pending");
    let review = format!(
        "/line-groups/creation-requests/{}/review",
        request["id"].as_str().unwrap()
    );

    let admin = || Auth::Admin {
        id: &admin_id,
        email: "root@example.com",
    };
    let (status, reviewed) = t
        .call(Method::PATCH, &review, admin(), Some(json!({ "status": "approved" })))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", reviewed);
    assert_eq!(reviewed["status"], "approved");
    assert_eq!(t.points(&alice).await, 1 + 20);

    let (status, body) = t
        .call(Method::PATCH, &review, admin(), Some(json!({ "status": "rejected" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Request has already been reviewed");

    let (_, groups) = t.call(Method::GET, "/line-groups", Auth::Anonymous, None).await;
    let groups = groups.as_array().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["manager_id"], alice_id);
    let group_id = groups[0]["id"].as_str().unwrap().to_string();

    let apply = format!("/line-groups/{}/apply", group_id);
    let (status, application) = t
        .call(Method::POST, &apply, Auth::Bearer(&bob), Some(json!({ "group_id": group_id })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(application["status"], "pending");

    let (status, body) = t
        .call(Method::POST, &apply, Auth::Bearer(&bob), Some(json!({ "group_id": group_id })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "You already have a pending application");

    let (status, body) = t
        .call(Method::POST, &apply, Auth::Bearer(&bob), Some(json!({ "group_id": "other" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Group ID mismatch");

    let review = format!(
        "/line-groups/applications/{}/review",
        application["id"].as_str().unwrap()
    );
    let (status, _) = t
        .call(Method::PATCH, &review, Auth::Bearer(&bob), Some(json!({ "status": "approved" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = t
        .call(Method::PATCH, &review, Auth::Bearer(&alice), Some(json!({ "status": "approved" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "approved");

    let (_, group) = t
        .call(Method::GET, &format!("/line-groups/{}", group_id), Auth::Anonymous, None)
        .await;
    assert_eq!(group["member_count"], 1);
}

#[tokio::test]
async fn managers_and_staff_edit_and_delete_groups() {
    let t = setup();
    let (_, alice) = t.register("alice@example.com", "alice").await;
    let (_, bob) = t.register("bob@example.com", "bob").await;
    let admin_id = t.register_admin("root@example.com").await;
    let admin = || Auth::Admin {
        id: &admin_id,
        email: "root@example.com",
    };

    let (_, request) = t
        .call(
            Method::POST,
            "/line-groups/creation-requests",
            Auth::Bearer(&alice),
            Some(json!({ "name": "Physics lab", "qr_code_url": "https://line.me/qr/phys" })),
        )
        .await;
    let review = format!(
        "/line-groups/creation-requests/{}/review",
        request["id"].as_str().unwrap()
    );
    let (status, _) = t
        .call(Method::PATCH, &review, admin(), Some(json!({ "status": "approved" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, groups) = t.call(Method::GET, "/line-groups", Auth::Anonymous, None).await;
    let uri = format!("/line-groups/{}", groups[0]["id"].as_str().unwrap());

    let (status, body) = t
        .call(Method::PATCH, &uri, Auth::Bearer(&bob), Some(json!({ "name": "Hijacked" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["detail"], "Only the group manager or staff can do this");

    let (status, body) = t
        .call(Method::PATCH, &uri, Auth::Bearer(&alice), Some(json!({ "name": "  Physics lab 2 " })))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["name"], "Physics lab 2");

    let (status, body) = t
        .call(Method::PATCH, &uri, admin(), Some(json!({ "description": "Thursday sessions" })))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["name"], "Physics lab 2");
    assert_eq!(body["description"], "Thursday sessions");

    let (status, body) = t.call(Method::PATCH, &uri, Auth::Bearer(&alice), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "No fields to update");

    let (status, _) = t.call(Method::DELETE, &uri, Auth::Bearer(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t.call(Method::DELETE, &uri, admin(), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = t.call(Method::GET, &uri, Auth::Anonymous, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Group not found");
}

#[tokio::test]
async fn announcements_resolve_admin_authors() {
    let t = setup();
    let admin_id = t.register_admin("root@example.com").await;

    let (status, created) = t
        .call(
            Method::POST,
            "/announcements",
            Auth::Admin {
                id: &admin_id,
                email: "root@example.com",
            },
            Some(json!({ "title": "Welcome", "content": "Be kind", "priority": 5 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", created);
    assert_eq!(created["is_active"], true);
    assert_eq!(created["author"]["username"], "root");

    let (_, list) = t.call(Method::GET, "/announcements", Auth::Anonymous, None).await;
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, _) = t
        .call(
            Method::POST,
            "/announcements",
            Auth::Admin {
                id: &admin_id,
                email: "root@example.com",
            },
            Some(json!({ "title": "Loud", "content": "x", "priority": 11 })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn superadmin_guards() {
    let t = setup();
    let (root_id, root) = t.register("root@example.com", "root").await;
    let (bob_id, _) = t.register("bob@example.com", "bob").await;

    let (status, body) = t.call(Method::GET, "/superadmin/stats", Auth::Bearer(&root), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["detail"], "SuperAdmin access required");

    t.state.db.set_user_role(&root_id, "superadmin").unwrap();

    let role_uri = format!("/superadmin/users/{}/role", bob_id);
    let (status, body) = t
        .call(Method::PATCH, &role_uri, Auth::Bearer(&root), Some(json!({ "new_role": "king" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Invalid role");

    let (status, body) = t
        .call(Method::PATCH, &role_uri, Auth::Bearer(&root), Some(json!({ "new_role": "moderator" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "moderator");

    let (status, body) = t
        .call(Method::DELETE, &format!("/superadmin/users/{}", root_id), Auth::Bearer(&root), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Cannot delete your own account");

    let (status, stats) = t.call(Method::GET, "/superadmin/stats", Auth::Bearer(&root), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["role_distribution"]["superadmin"], 1);
    assert_eq!(stats["role_distribution"]["moderator"], 1);
}

#[tokio::test]
async fn image_upload_round_trip() {
    let t = setup();
    let (_, alice) = t.register("alice@example.com", "alice").await;
    let png: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    let request = Request::builder()
        .method(Method::POST)
        .uri("/uploads")
        .header(header::AUTHORIZATION, format!("Bearer {}", alice))
        .header(header::CONTENT_TYPE, "application/pdf")
        .body(Body::from(png.to_vec()))
        .unwrap();
    let (status, _) = t.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/uploads")
        .header(header::AUTHORIZATION, format!("Bearer {}", alice))
        .header(header::CONTENT_TYPE, "image/png")
        .body(Body::from(png.to_vec()))
        .unwrap();
    let (status, body) = t.send(request).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["size"], png.len());
    let url = body["url"].as_str().unwrap().to_string();

    let response = t
        .app
        .clone()
        .oneshot(Request::builder().uri(&url).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], png);

    let (status, _) = t.call(Method::GET, "/uploads/not-a-uuid", Auth::Anonymous, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let _ = std::fs::remove_dir_all(&t.state.upload_dir);
}

#[tokio::test]
async fn oversized_uploads_get_a_json_413() {
    let t = setup();
    let (_, alice) = t.register("alice@example.com", "alice").await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/uploads")
        .header(header::AUTHORIZATION, format!("Bearer {}", alice))
        .header(header::CONTENT_TYPE, "image/png")
        .body(Body::from(vec![0u8; MAX_UPLOAD_SIZE + 1]))
        .unwrap();
    let (status, body) = t.send(request).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["detail"], "File too large");
    assert!(!t.state.upload_dir.exists());
}
