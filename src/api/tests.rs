//! Router-level tests: requests go through the full axum stack against an
//! in-memory database.

use super::*;
use crate::mail::testing::{FailingMailer, RecordingMailer};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

struct TestApp {
    router: Router,
    state: SharedState,
    mail: Arc<RecordingMailer>,
}

fn app() -> TestApp {
    let mail = Arc::new(RecordingMailer::default());
    app_with_mailer(Box::new(mail.clone()), mail)
}

fn app_with_mailer(mailer: Box<dyn Mailer>, mail: Arc<RecordingMailer>) -> TestApp {
    let db = Database::open_in_memory().unwrap();
    db.init().unwrap();
    let state = AppState::new(db, mailer, Config::default());
    TestApp {
        router: create_router(state.clone()),
        state,
        mail,
    }
}

impl TestApp {
    async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Token {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }

    fn last_code(&self) -> String {
        let sent = self.mail.sent.lock().unwrap();
        let text = &sent.last().expect("no mail sent").text;
        text.split("code is: ").nth(1).unwrap()[..6].to_string()
    }

    async fn signup(&self, username: &str) -> i64 {
        let (status, body) = self
            .call(
                "POST",
                "/api/signup",
                None,
                Some(json!({
                    "username": username,
                    "email": format!("{}@example.com", username),
                    "password": "s3cret-pass",
                    "company_name": format!("{} Grooming", username),
                    "phone_number": "555-0100",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["user_id"].as_i64().unwrap()
    }

    async fn login(&self, email: &str, password: &str) -> String {
        let (status, body) = self
            .call(
                "POST",
                "/api/login",
                None,
                Some(json!({ "email": email, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["token"].as_str().unwrap().to_string()
    }

    /// Signs up, confirms and logs in a manager. Returns the token.
    async fn manager(&self, username: &str) -> String {
        let user_id = self.signup(username).await;
        let code = self.last_code();
        let (status, _) = self
            .call(
                "POST",
                "/api/confirm-email",
                None,
                Some(json!({ "user_id": user_id, "code": code })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        self.login(&format!("{}@example.com", username), "s3cret-pass")
            .await
    }

    /// Creates an employee under the manager and logs them in. Returns (id, token).
    async fn employee(&self, manager_token: &str, first_name: &str, email: &str) -> (i64, String) {
        let (status, body) = self
            .call(
                "POST",
                "/api/employees",
                Some(manager_token),
                Some(json!({
                    "first_name": first_name,
                    "last_name": "Worker",
                    "email": email,
                    "role": "Groomer",
                    "phone_number": "555-0199",
                    "password": "staff-pass",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        assert_eq!(body["temporary_password"], "staff-pass");
        let id = body["id"].as_i64().unwrap();
        (id, self.login(email, "staff-pass").await)
    }

    async fn task(&self, manager_token: &str, title: &str, assigned_to: &[i64]) -> i64 {
        self.task_due(manager_token, title, assigned_to, "2030-01-15").await
    }

    async fn task_due(
        &self,
        manager_token: &str,
        title: &str,
        assigned_to: &[i64],
        due_date: &str,
    ) -> i64 {
        let (status, body) = self
            .call(
                "POST",
                "/api/tasks",
                Some(manager_token),
                Some(json!({
                    "title": title,
                    "description": "",
                    "assigned_to": assigned_to,
                    "due_date": due_date,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_i64().unwrap()
    }
}

#[tokio::test]
async fn test_signup_confirm_login_flow() {
    let app = app();
    let user_id = app.signup("boss").await;

    // Unconfirmed accounts cannot log in
    let (status, body) = app
        .call(
            "POST",
            "/api/login",
            None,
            Some(json!({ "email": "boss@example.com", "password": "s3cret-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Account not activated. Please confirm your email.");

    let (status, body) = app
        .call(
            "POST",
            "/api/confirm-email",
            None,
            Some(json!({ "user_id": user_id, "code": "000000" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid or expired code");

    let code = app.last_code();
    let (status, _) = app
        .call(
            "POST",
            "/api/confirm-email",
            None,
            Some(json!({ "user_id": user_id, "code": code })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // A used code is rejected
    let (status, _) = app
        .call(
            "POST",
            "/api/confirm-email",
            None,
            Some(json!({ "user_id": user_id, "code": code })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .call(
            "POST",
            "/api/login",
            None,
            Some(json!({ "email": "boss@example.com", "password": "wrong" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid credentials");

    let token = app.login("boss@example.com", "s3cret-pass").await;
    assert_eq!(token.len(), 40);
    assert_eq!(app.login("boss@example.com", "s3cret-pass").await, token);

    let (status, me) = app.call("GET", "/api/auth/user", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "boss");
    assert_eq!(me["is_manager"], true);
    assert_eq!(me["company_name"], "boss Grooming");

    let (status, _) = app.call("POST", "/api/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.call("GET", "/api/auth/user", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_signup_validation() {
    let app = app();
    app.signup("boss").await;

    let (status, body) = app
        .call(
            "POST",
            "/api/signup",
            None,
            Some(json!({ "username": "other", "email": "boss@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "All fields are required");

    let (status, body) = app
        .call(
            "POST",
            "/api/signup",
            None,
            Some(json!({
                "username": "other",
                "email": "BOSS@example.com",
                "password": "pw",
                "company_name": "Other",
                "phone_number": "1",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "A user with that email already exists.");
}

#[tokio::test]
async fn test_failed_confirmation_mail_leaves_no_account() {
    let app = app_with_mailer(Box::new(FailingMailer), Arc::new(RecordingMailer::default()));

    let (status, body) = app
        .call(
            "POST",
            "/api/signup",
            None,
            Some(json!({
                "username": "boss",
                "email": "boss@example.com",
                "password": "s3cret-pass",
                "company_name": "Groom Co",
                "phone_number": "555",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Failed to send confirmation email: "));

    let db = app.state.db.lock().await;
    assert!(!db.email_taken("boss@example.com").unwrap());
    assert!(!db.username_taken("boss").unwrap());
}

#[tokio::test]
async fn test_authentication_required() {
    let app = app();
    let (status, body) = app.call("GET", "/api/tasks", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Authentication credentials were not provided.");

    let (status, body) = app.call("GET", "/api/tasks", Some("deadbeef"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid token.");

    let (status, body) = app.call("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");
}

#[tokio::test]
async fn test_role_permissions() {
    let app = app();
    let boss = app.manager("boss").await;
    let (ann_id, ann) = app.employee(&boss, "Ann", "ann@groom.co").await;

    let (status, body) = app
        .call(
            "POST",
            "/api/tasks",
            Some(&ann),
            Some(json!({ "title": "x", "assigned_to": [ann_id], "due_date": "2030-01-01" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Only managers can create tasks");

    let (status, _) = app
        .call(
            "POST",
            "/api/announcements",
            Some(&ann),
            Some(json!({ "title": "x", "content": "y" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call("POST", "/api/reports", Some(&boss), Some(json!({ "message": "x" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Only employees can create reports");

    let (status, _) = app
        .call("POST", "/api/suggestions", Some(&boss), Some(json!({ "message": "x" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.call("GET", "/api/employees", Some(&ann), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, me) = app.call("GET", "/api/auth/user", Some(&ann), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["is_employee"], true);
    assert_eq!(me["employee_profile_id"], ann_id);
    assert_eq!(me["company_name"], "boss Grooming");
}

#[tokio::test]
async fn test_employee_task_status_transitions() {
    let app = app();
    let boss = app.manager("boss").await;
    let (ann_id, ann) = app.employee(&boss, "Ann", "ann@groom.co").await;
    let task_id = app.task(&boss, "Wash the van", &[ann_id]).await;
    let uri = format!("/api/tasks/{}", task_id);

    let (status, counts) = app.call("GET", "/api/notifications/count", Some(&ann), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(counts["tasks"], 1);

    let (status, body) = app.call("PATCH", &uri, Some(&ann), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Status is required");

    let (status, body) = app
        .call("PATCH", &uri, Some(&ann), Some(json!({ "status": "COMPLETED" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid status transition from PENDING to COMPLETED");

    let (status, body) = app
        .call("PATCH", &uri, Some(&ann), Some(json!({ "status": "IN_PROGRESS" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status_display"], "In Progress");

    let (status, body) = app
        .call("PATCH", &uri, Some(&ann), Some(json!({ "status": "COMPLETED" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["completed_at"].is_string());

    let (_, counts) = app.call("GET", "/api/notifications/count", Some(&boss), None).await;
    assert_eq!(counts["tasks"], 1);

    let (_, page) = app.call("GET", "/api/tasks/completed", Some(&boss), None).await;
    assert_eq!(page["count"], 1);
    let (_, page) = app.call("GET", "/api/employee-tasks/pending", Some(&ann), None).await;
    assert_eq!(page["count"], 0);

    // Managers are not bound by the transition table
    let (status, body) = app
        .call("PATCH", &uri, Some(&boss), Some(json!({ "status": "PENDING" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["completed_at"].is_null());
}

#[tokio::test]
async fn test_companies_are_isolated() {
    let app = app();
    let boss = app.manager("boss").await;
    let rival = app.manager("rival").await;
    let (ann_id, ann) = app.employee(&boss, "Ann", "ann@groom.co").await;
    let task_id = app.task(&boss, "Wash the van", &[ann_id]).await;

    let (status, _) = app
        .call("GET", &format!("/api/employees/{}", ann_id), Some(&rival), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .call("GET", &format!("/api/tasks/{}", task_id), Some(&rival), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .call(
            "POST",
            "/api/tasks",
            Some(&rival),
            Some(json!({ "title": "Poach", "assigned_to": [ann_id], "due_date": "2030-01-01" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("does not belong"));

    let (_, report) = app
        .call("POST", "/api/reports", Some(&ann), Some(json!({ "message": "Dryer broke" })))
        .await;
    let (status, _) = app
        .call("POST", &format!("/api/reports/{}/attend", report["id"]), Some(&rival), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, reports) = app.call("GET", "/api/reports", Some(&rival), None).await;
    assert_eq!(reports.as_array().unwrap().len(), 0);
    let (_, page) = app.call("GET", "/api/tasks", Some(&rival), None).await;
    assert_eq!(page["count"], 0);
}

#[tokio::test]
async fn test_report_lifecycle_and_seen_counts() {
    let app = app();
    let boss = app.manager("boss").await;
    let (ann_id, ann) = app.employee(&boss, "Ann", "ann@groom.co").await;
    let (_, bob) = app.employee(&boss, "Bob", "bob@groom.co").await;

    let (status, report) = app
        .call(
            "POST",
            "/api/reports",
            Some(&ann),
            Some(json!({ "message": "The dryer in bay two is broken" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(report["status"], "PENDING");
    assert_eq!(report["employee"], ann_id);
    assert_eq!(report["employee_name"], "Ann Worker");
    let id = report["id"].as_i64().unwrap();

    let (_, counts) = app.call("GET", "/api/notifications/count", Some(&boss), None).await;
    assert_eq!(counts["reports"], 1);
    let (_, counts) = app.call("GET", "/api/notifications/count", Some(&bob), None).await;
    assert_eq!(counts["reports"], 1);
    assert_eq!(counts["notifications"], 1);

    let (_, unread) = app.call("GET", "/api/reports/unread", Some(&boss), None).await;
    assert_eq!(unread[0]["report"]["id"], id);

    let (status, _) = app
        .call("POST", &format!("/api/reports/{}/resolve", id), Some(&boss), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .call("POST", &format!("/api/reports/{}/attend", id), Some(&boss), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ATTENDED");
    assert_eq!(body["attended_by_name"], "boss");

    let (status, _) = app
        .call("POST", &format!("/api/reports/{}/attend", id), Some(&bob), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .call("POST", &format!("/api/reports/{}/resolve", id), Some(&bob), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["resolved_at"].is_string());

    // Only the author edits
    let (status, _) = app
        .call("PATCH", &format!("/api/reports/{}", id), Some(&bob), Some(json!({ "message": "x" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Seen markers are per caller and idempotent
    for _ in 0..2 {
        let (status, _) = app
            .call("POST", &format!("/api/reports/{}/seen", id), Some(&bob), None)
            .await;
        assert_eq!(status, StatusCode::OK);
    }
    let (_, counts) = app.call("GET", "/api/notifications/count", Some(&bob), None).await;
    assert_eq!(counts["reports"], 0);
    let (_, counts) = app.call("GET", "/api/notifications/count", Some(&boss), None).await;
    assert_eq!(counts["reports"], 1);

    app.call("GET", "/api/reports", Some(&boss), None).await;
    let (_, counts) = app.call("GET", "/api/notifications/count", Some(&boss), None).await;
    assert_eq!(counts["reports"], 0);
}

#[tokio::test]
async fn test_suggestions_and_announcements() {
    let app = app();
    let boss = app.manager("boss").await;
    let (ann_id, ann) = app.employee(&boss, "Ann", "ann@groom.co").await;

    let (status, suggestion) = app
        .call(
            "POST",
            "/api/suggestions",
            Some(&ann),
            Some(json!({ "message": "Open on Sundays" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let uri = format!("/api/suggestions/{}", suggestion["id"]);

    let (status, body) = app.call("PATCH", &uri, Some(&boss), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Only status can be updated");

    let (status, body) = app
        .call("PATCH", &uri, Some(&boss), Some(json!({ "status": "READ" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "READ");

    let (_, read) = app.call("GET", "/api/suggestions/status/read", Some(&boss), None).await;
    assert_eq!(read.as_array().unwrap().len(), 1);
    let (status, _) = app.call("GET", "/api/suggestions/status/bogus", Some(&boss), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, announcement) = app
        .call(
            "POST",
            "/api/announcements",
            Some(&boss),
            Some(json!({ "title": "Holiday", "content": "Closed Monday" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(announcement["manager"], "boss");
    let noted_uri = format!("/api/announcements/{}/mark_noted", announcement["id"]);

    let (_, counts) = app.call("GET", "/api/notifications/count", Some(&ann), None).await;
    assert_eq!(counts["announcements"], 1);

    let (status, _) = app.call("POST", &noted_uri, Some(&ann), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app.call("POST", &noted_uri, Some(&ann), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Already noted");

    let (_, noted) = app
        .call(
            "GET",
            &format!("/api/announcements/{}/noted_employees", announcement["id"]),
            Some(&boss),
            None,
        )
        .await;
    assert_eq!(noted[0]["id"], ann_id);
}

#[tokio::test]
async fn test_notification_reset() {
    let app = app();
    let boss = app.manager("boss").await;
    let (ann_id, ann) = app.employee(&boss, "Ann", "ann@groom.co").await;
    let task_id = app.task(&boss, "Trim nails", &[ann_id]).await;
    app.call("POST", &format!("/api/tasks/{}/remind", task_id), Some(&boss), None)
        .await;

    let (_, counts) = app.call("GET", "/api/notifications/count", Some(&ann), None).await;
    assert_eq!(counts["tasks"], 2);

    let (status, body) = app
        .call("POST", "/api/notifications/reset", Some(&ann), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Type is required");

    let (status, _) = app
        .call("POST", "/api/notifications/reset", Some(&ann), Some(json!({ "type": "suggestions" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call("POST", "/api/notifications/reset", Some(&ann), Some(json!({ "type": "tasks" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, counts) = app.call("GET", "/api/notifications/count", Some(&ann), None).await;
    assert_eq!(counts["tasks"], 0);

    // The task itself is untouched by the reset
    let (_, task) = app
        .call("GET", &format!("/api/tasks/{}", task_id), Some(&ann), None)
        .await;
    assert_eq!(task["status"], "PENDING");

    let (_, list) = app.call("GET", "/api/employee-notifications", Some(&ann), None).await;
    let first = list[0]["id"].as_i64().unwrap();
    assert!(list[0]["message"]
        .as_str()
        .unwrap()
        .starts_with("Reminder: Task 'Trim nails' is due on 2030-01-15"));
    let (status, body) = app
        .call(
            "PATCH",
            &format!("/api/employee-notifications/{}", first),
            Some(&ann),
            Some(json!({ "is_read": false })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_read"], false);

    let (status, _) = app
        .call("GET", &format!("/api/employee-notifications/{}", first), Some(&boss), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_task_pagination() {
    let app = app();
    let boss = app.manager("boss").await;
    let (ann_id, _) = app.employee(&boss, "Ann", "ann@groom.co").await;
    for i in 0..12 {
        app.task(&boss, &format!("Task {}", i), &[ann_id]).await;
    }

    let (_, first) = app.call("GET", "/api/tasks", Some(&boss), None).await;
    assert_eq!(first["count"], 12);
    assert_eq!(first["results"].as_array().unwrap().len(), 10);
    assert_eq!(first["next"], 2);
    assert!(first["previous"].is_null());
    assert_eq!(first["results"][0]["title"], "Task 11");

    let (_, second) = app.call("GET", "/api/tasks?page=2", Some(&boss), None).await;
    assert_eq!(second["results"].as_array().unwrap().len(), 2);
    assert!(second["next"].is_null());
    assert_eq!(second["previous"], 1);

    let (status, _) = app.call("GET", "/api/tasks?page=3", Some(&boss), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, wide) = app.call("GET", "/api/tasks?page_size=500", Some(&boss), None).await;
    assert_eq!(wide["results"].as_array().unwrap().len(), 12);

    let (status, _) = app.call("GET", "/api/tasks/due/year", Some(&boss), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[test]
fn test_pagination_window() {
    let config = PaginationConfig::default();
    let p = Pagination::new(
        &PageQuery {
            page: Some(3),
            page_size: Some(5),
        },
        &config,
    );
    assert_eq!(p.window().offset, 10);
    assert_eq!(p.window().limit, 5);

    let page = p.page(11, vec![1]).unwrap();
    assert_eq!(page.previous, Some(2));
    assert_eq!(page.next, None);

    let empty = Pagination::new(&PageQuery::default(), &config);
    let page = empty.page(0, Vec::<i64>::new()).unwrap();
    assert_eq!(page.count, 0);
    assert!(page.next.is_none());
}

#[tokio::test]
async fn test_employee_update_and_delete() {
    let app = app();
    let boss = app.manager("boss").await;
    let (ann_id, ann) = app.employee(&boss, "Ann", "ann@groom.co").await;
    app.employee(&boss, "Bob", "bob@groom.co").await;
    let uri = format!("/api/employees/{}", ann_id);

    let (status, body) = app
        .call("PATCH", &uri, Some(&boss), Some(json!({ "role": "Senior Groomer" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "Senior Groomer");
    assert_eq!(body["first_name"], "Ann");

    let (status, body) = app
        .call(
            "PUT",
            &uri,
            Some(&boss),
            Some(json!({ "first_name": "Anna", "email": "anna@groom.co" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["first_name"], "Anna");
    assert_eq!(body["email"], "anna@groom.co");
    app.login("anna@groom.co", "staff-pass").await;

    let (status, body) = app
        .call("PATCH", &uri, Some(&boss), Some(json!({ "email": "BOB@groom.co" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "A user with that email already exists.");

    let (status, _) = app.call("DELETE", &uri, Some(&ann), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.call("DELETE", &uri, Some(&boss), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.call("GET", &uri, Some(&boss), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The login account goes with the employee
    let (status, _) = app.call("GET", "/api/auth/user", Some(&ann), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, body) = app
        .call(
            "POST",
            "/api/login",
            None,
            Some(json!({ "email": "anna@groom.co", "password": "staff-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid credentials");
}

#[tokio::test]
async fn test_employee_email_cannot_reuse_a_username() {
    let app = app();
    let (status, _) = app
        .call(
            "POST",
            "/api/signup",
            None,
            Some(json!({
                "username": "ann@groom.co",
                "email": "owner@example.com",
                "password": "s3cret-pass",
                "company_name": "Owner Co",
                "phone_number": "555",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let boss = app.manager("boss").await;
    let (status, body) = app
        .call(
            "POST",
            "/api/employees",
            Some(&boss),
            Some(json!({ "first_name": "Ann", "last_name": "Worker", "email": "ann@groom.co" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "A user with that email already exists.");

    let (bob_id, _) = app.employee(&boss, "Bob", "bob@groom.co").await;
    let (status, body) = app
        .call(
            "PATCH",
            &format!("/api/employees/{}", bob_id),
            Some(&boss),
            Some(json!({ "email": "ann@groom.co" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "A user with that email already exists.");
}

#[tokio::test]
async fn test_bad_path_and_query_render_json_errors() {
    let app = app();
    let boss = app.manager("boss").await;

    let (status, body) = app.call("GET", "/api/tasks/abc", Some(&boss), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string(), "{}", body);

    let (status, body) = app.call("GET", "/api/tasks?page=x", Some(&boss), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string(), "{}", body);

    let (status, body) = app
        .call("DELETE", "/api/announcements/1.5", Some(&boss), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string(), "{}", body);
}

#[tokio::test]
async fn test_employee_count_total_counts_each_item_once() {
    let app = app();
    let boss = app.manager("boss").await;
    let (ann_id, ann) = app.employee(&boss, "Ann", "ann@groom.co").await;
    let (_, bob) = app.employee(&boss, "Bob", "bob@groom.co").await;
    app.task(&boss, "Wash the van", &[ann_id]).await;

    let (_, counts) = app.call("GET", "/api/notifications/count", Some(&ann), None).await;
    assert_eq!(counts["tasks"], 1);
    assert_eq!(counts["notifications"], 1);
    assert_eq!(counts["total"], 1);

    let (_, report) = app
        .call("POST", "/api/reports", Some(&bob), Some(json!({ "message": "Out of towels" })))
        .await;
    let (_, counts) = app.call("GET", "/api/notifications/count", Some(&ann), None).await;
    assert_eq!(counts["reports"], 1);
    assert_eq!(counts["notifications"], 2);
    assert_eq!(counts["total"], 2);

    // Once seen, the report's unread notification is what remains
    app.call("POST", &format!("/api/reports/{}/seen", report["id"]), Some(&ann), None)
        .await;
    let (_, counts) = app.call("GET", "/api/notifications/count", Some(&ann), None).await;
    assert_eq!(counts["reports"], 0);
    assert_eq!(counts["total"], 2);
}

#[tokio::test]
async fn test_task_reassignment() {
    let app = app();
    let boss = app.manager("boss").await;
    let (ann_id, _) = app.employee(&boss, "Ann", "ann@groom.co").await;
    let (bob_id, bob) = app.employee(&boss, "Bob", "bob@groom.co").await;
    let task_id = app.task(&boss, "Wash the van", &[ann_id]).await;
    let uri = format!("/api/tasks/{}", task_id);

    let (status, body) = app
        .call("PATCH", &uri, Some(&boss), Some(json!({ "assigned_to": [] })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "assigned_to must list at least one employee");

    let (status, body) = app
        .call("PATCH", &uri, Some(&boss), Some(json!({ "assigned_to": [bob_id] })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["assigned_to"], json!([bob_id]));

    let (_, counts) = app.call("GET", "/api/notifications/count", Some(&bob), None).await;
    assert_eq!(counts["tasks"], 1);
    let (_, list) = app.call("GET", "/api/employee-notifications", Some(&bob), None).await;
    assert_eq!(list[0]["message"], "New task assigned: Wash the van");
}

#[tokio::test]
async fn test_report_and_suggestion_deletion() {
    let app = app();
    let boss = app.manager("boss").await;
    let (_, ann) = app.employee(&boss, "Ann", "ann@groom.co").await;
    let (_, bob) = app.employee(&boss, "Bob", "bob@groom.co").await;

    let mut ids = Vec::new();
    for message in ["Leaky tap", "Broken dryer"] {
        let (_, report) = app
            .call("POST", "/api/reports", Some(&ann), Some(json!({ "message": message })))
            .await;
        ids.push(report["id"].as_i64().unwrap());
    }

    let (status, _) = app
        .call("DELETE", &format!("/api/reports/{}", ids[0]), Some(&bob), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .call("DELETE", &format!("/api/reports/{}", ids[0]), Some(&ann), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app
        .call("DELETE", &format!("/api/reports/{}", ids[1]), Some(&boss), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, reports) = app.call("GET", "/api/reports", Some(&boss), None).await;
    assert!(reports.as_array().unwrap().is_empty());

    let (_, suggestion) = app
        .call("POST", "/api/suggestions", Some(&ann), Some(json!({ "message": "More towels" })))
        .await;
    let uri = format!("/api/suggestions/{}", suggestion["id"]);
    let (status, _) = app.call("DELETE", &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.call("DELETE", &uri, Some(&ann), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, list) = app.call("GET", "/api/suggestions", Some(&boss), None).await;
    assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_mark_all_reports_seen() {
    let app = app();
    let boss = app.manager("boss").await;
    let (_, ann) = app.employee(&boss, "Ann", "ann@groom.co").await;
    let (_, bob) = app.employee(&boss, "Bob", "bob@groom.co").await;
    for message in ["Leaky tap", "Broken dryer"] {
        app.call("POST", "/api/reports", Some(&ann), Some(json!({ "message": message })))
            .await;
    }

    let (_, counts) = app.call("GET", "/api/notifications/count", Some(&bob), None).await;
    assert_eq!(counts["reports"], 2);

    let (status, body) = app.call("POST", "/api/reports/seen-all", Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["marked"], 2);
    let (_, counts) = app.call("GET", "/api/notifications/count", Some(&bob), None).await;
    assert_eq!(counts["reports"], 0);

    // Other callers keep their own unseen counts
    let (_, counts) = app.call("GET", "/api/notifications/count", Some(&boss), None).await;
    assert_eq!(counts["reports"], 2);
}

#[tokio::test]
async fn test_announcement_update_and_delete() {
    let app = app();
    let boss = app.manager("boss").await;
    let rival = app.manager("rival").await;
    let (_, ann) = app.employee(&boss, "Ann", "ann@groom.co").await;

    let (_, announcement) = app
        .call(
            "POST",
            "/api/announcements",
            Some(&boss),
            Some(json!({ "title": "Holiday", "content": "Closed Monday" })),
        )
        .await;
    let uri = format!("/api/announcements/{}", announcement["id"]);

    let (status, _) = app
        .call("PATCH", &uri, Some(&ann), Some(json!({ "title": "Party" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = app
        .call("PATCH", &uri, Some(&boss), Some(json!({ "title": "  " })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Title and content cannot be blank");

    let (status, body) = app
        .call("PUT", &uri, Some(&boss), Some(json!({ "content": "Closed Monday and Tuesday" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Holiday");
    assert_eq!(body["content"], "Closed Monday and Tuesday");

    let (status, _) = app.call("DELETE", &uri, Some(&rival), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.call("DELETE", &uri, Some(&boss), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, page) = app.call("GET", "/api/announcements", Some(&ann), None).await;
    assert_eq!(page["count"], 0);
}

#[tokio::test]
async fn test_overdue_and_due_period_views() {
    let app = app();
    let boss = app.manager("boss").await;
    let (ann_id, _) = app.employee(&boss, "Ann", "ann@groom.co").await;
    let today = chrono::Utc::now().date_naive();

    let due = |days: i64| (today + chrono::Duration::days(days)).to_string();
    let late = app.task_due(&boss, "Late", &[ann_id], &due(-40)).await;
    let due_today = app.task_due(&boss, "Today", &[ann_id], &due(0)).await;
    let far = app.task_due(&boss, "Far", &[ann_id], &due(400)).await;

    let ids = |page: &Value| -> Vec<i64> {
        page["results"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["id"].as_i64().unwrap())
            .collect()
    };

    let (status, page) = app.call("GET", "/api/tasks/overdue", Some(&boss), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&page), vec![late]);

    for period in ["day", "week", "month"] {
        let (status, page) = app
            .call("GET", &format!("/api/tasks/due/{}", period), Some(&boss), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        let found = ids(&page);
        assert!(found.contains(&due_today), "{} missing today's task", period);
        assert!(!found.contains(&late) && !found.contains(&far), "{}", period);
    }
}
