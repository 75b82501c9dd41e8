use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use migration::{Migrator, MigratorTrait};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait,
    QueryFilter, Set,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use solarschools::entities::user::Role;
use solarschools::entities::{school, solar_panel, user, Donation, SolarPanel};
use solarschools::grid;
use solarschools::session::Keys;
use solarschools::{create_app, AppState};

const TEST_SECRET: &[u8] = b"test-session-secret";

/// Fresh app over an in-memory database with migrations applied.
async fn setup_app() -> (Router, DatabaseConnection) {
    let mut opts = ConnectOptions::new("sqlite::memory:".to_string());
    // A single pooled connection so every request sees the same in-memory DB
    opts.max_connections(1);
    let db = Database::connect(opts).await.unwrap();
    Migrator::up(&db, None).await.unwrap();

    let state = AppState {
        db: db.clone(),
        keys: Keys::new(TEST_SECRET),
    };
    (create_app(state), db)
}

fn request(method: Method, uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        // The rate limiter keys on client IP; give it one
        .header("x-forwarded-for", "203.0.113.7")
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    request(method, uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Insert a school with its panels materialized from the grid configs.
async fn seed_school(
    db: &DatabaseConnection,
    id: i32,
    goal: f64,
    funded: f64,
    configs: Value,
) -> school::Model {
    let now = Utc::now();
    let created = school::ActiveModel {
        id: Set(id),
        name: Set(format!("School {}", id)),
        address: Set("123 Oak Street, Springfield, IL".to_string()),
        logo: Set(Some("🏫".to_string())),
        description: Set(None),
        goal: Set(goal),
        funded: Set(funded),
        panel_grid_configs: Set(configs),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .unwrap();

    let parsed = grid::parse_grid_configs(&created.panel_grid_configs).unwrap();
    let panels = grid::materialize_panels(created.id, &parsed);
    if !panels.is_empty() {
        SolarPanel::insert_many(panels).exec(db).await.unwrap();
    }
    created
}

/// Register a user through the API and log them in; returns the session
/// cookie pair to send on subsequent requests.
async fn register_and_login(app: &Router, email: &str) -> String {
    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/auth/register",
            json!({ "name": "Jane", "email": email, "password": "hunter2" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/auth/login",
            json!({ "email": email, "password": "hunter2" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("login must set a session cookie")
        .to_str()
        .unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}

#[tokio::test]
async fn test_health_check() {
    let (app, _db) = setup_app().await;
    let response = app
        .oneshot(request(Method::GET, "/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let (app, _db) = setup_app().await;
    let response = app
        .oneshot(
            request(Method::GET, "/not-a-real-route")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_register_and_duplicate_email() {
    let (app, db) = setup_app().await;

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/auth/register",
            json!({ "name": "Jane", "email": "jane@example.com", "password": "hunter2" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["email"], "jane@example.com");
    assert_eq!(body["name"], "Jane");
    assert!(body.get("password").is_none());

    // Same email again: conflict, and no second row
    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/auth/register",
            json!({ "name": "Jane Again", "email": "jane@example.com", "password": "hunter3" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let users = solarschools::entities::User::find()
        .filter(user::Column::Email.eq("jane@example.com"))
        .all(&db)
        .await
        .unwrap();
    assert_eq!(users.len(), 1);
}

#[tokio::test]
async fn test_register_missing_fields() {
    let (app, _db) = setup_app().await;
    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/auth/register",
            json!({ "email": "jane@example.com" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_and_me() {
    let (app, _db) = setup_app().await;
    let cookie = register_and_login(&app, "jane@example.com").await;

    let response = app
        .clone()
        .oneshot(
            request(Method::GET, "/api/auth/me")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["email"], "jane@example.com");
    assert_eq!(body["role"], "USER");

    // Anonymous callers get null
    let response = app
        .clone()
        .oneshot(
            request(Method::GET, "/api/auth/me")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, Value::Null);

    // Wrong password: 401 and no cookie set
    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/auth/login",
            json!({ "email": "jane@example.com", "password": "wrong" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn test_tampered_session_cookie_is_anonymous() {
    let (app, db) = setup_app().await;
    seed_school(
        &db,
        1,
        50_000.0,
        0.0,
        json!([{ "gridId": "section_A", "rows": 2, "cols": 2 }]),
    )
    .await;

    // The old system would trust this JSON blob outright
    let forged = r#"session={"id":"u1","name":"Eve","email":"eve@example.com","role":"ADMIN"}"#;

    let response = app
        .clone()
        .oneshot(
            request(Method::GET, "/api/auth/me")
                .header(header::COOKIE, forged)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(body_json(response).await, Value::Null);

    let response = app
        .clone()
        .oneshot(
            request(Method::POST, "/api/donations")
                .header(header::COOKIE, forged)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::to_vec(&json!({
                        "schoolId": 1,
                        "panelIds": ["s1-section_A-r0c0"],
                        "donationAmount": 100,
                        "donorName": "Eve"
                    }))
                    .unwrap(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_list_schools_with_percentage() {
    let (app, db) = setup_app().await;
    seed_school(&db, 1, 50_000.0, 12_500.0, json!([])).await;
    seed_school(&db, 2, 0.0, 0.0, json!([])).await;

    let response = app
        .oneshot(
            request(Method::GET, "/api/schools")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let schools = body.as_array().unwrap();
    assert_eq!(schools.len(), 2);

    // Ordered by id ascending
    assert_eq!(schools[0]["id"], 1);
    assert_eq!(schools[0]["percentage"], 25);
    // Zero-goal schools report 0, not a division error
    assert_eq!(schools[1]["id"], 2);
    assert_eq!(schools[1]["percentage"], 0);
}

#[tokio::test]
async fn test_get_school_not_found() {
    let (app, _db) = setup_app().await;
    let response = app
        .oneshot(
            request(Method::GET, "/api/schools/999")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_donation_end_to_end() {
    let (app, db) = setup_app().await;
    seed_school(
        &db,
        1,
        50_000.0,
        0.0,
        json!([{ "gridId": "section_A", "rows": 2, "cols": 3 }]),
    )
    .await;
    let cookie = register_and_login(&app, "jane@example.com").await;

    let response = app
        .clone()
        .oneshot(
            request(Method::POST, "/api/donations")
                .header(header::COOKIE, &cookie)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::to_vec(&json!({
                        "schoolId": 1,
                        "panelIds": ["s1-section_A-r0c0", "s1-section_A-r0c1"],
                        "donationAmount": 100,
                        "logo": "☀️",
                        "donorName": "Jane"
                    }))
                    .unwrap(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["amount"], 100.0);
    assert_eq!(body["logo"], "☀️");
    let donation_id = body["id"].as_str().unwrap().to_string();

    // Both panels now belong to the new donation
    for panel_id in ["s1-section_A-r0c0", "s1-section_A-r0c1"] {
        let panel = SolarPanel::find_by_id(panel_id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(panel.donation_id.as_deref(), Some(donation_id.as_str()));
    }

    // The school's funded total grew by exactly the donation amount
    let response = app
        .clone()
        .oneshot(
            request(Method::GET, "/api/schools/1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["funded"], 100.0);

    // The donation belongs to the logged-in user
    let donation = Donation::find_by_id(donation_id.clone())
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    let me = app
        .clone()
        .oneshot(
            request(Method::GET, "/api/auth/me")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let me_body = body_json(me).await;
    assert_eq!(donation.user_id, me_body["id"].as_str().unwrap());
}

#[tokio::test]
async fn test_overlapping_claims_have_single_winner() {
    let (app, db) = setup_app().await;
    seed_school(
        &db,
        1,
        50_000.0,
        0.0,
        json!([{ "gridId": "section_A", "rows": 2, "cols": 3 }]),
    )
    .await;
    let first = register_and_login(&app, "first@example.com").await;
    let second = register_and_login(&app, "second@example.com").await;

    let response = app
        .clone()
        .oneshot(
            request(Method::POST, "/api/donations")
                .header(header::COOKIE, &first)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::to_vec(&json!({
                        "schoolId": 1,
                        "panelIds": ["s1-section_A-r0c0"],
                        "donationAmount": 50,
                        "donorName": "First"
                    }))
                    .unwrap(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // The second request lists the now-claimed panel plus a free one.
    // Policy: the whole claim aborts instead of silently shrinking.
    let response = app
        .clone()
        .oneshot(
            request(Method::POST, "/api/donations")
                .header(header::COOKIE, &second)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::to_vec(&json!({
                        "schoolId": 1,
                        "panelIds": ["s1-section_A-r0c0", "s1-section_A-r0c1"],
                        "donationAmount": 75,
                        "donorName": "Second"
                    }))
                    .unwrap(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Nothing from the losing request persisted: no donation row, the free
    // panel stayed free, and funded only reflects the winning donation
    assert_eq!(Donation::find().all(&db).await.unwrap().len(), 1);
    let free_panel = SolarPanel::find_by_id("s1-section_A-r0c1")
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert!(free_panel.donation_id.is_none());
    let school = solarschools::entities::School::find_by_id(1)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(school.funded, 50.0);

    // Exactly one donation owns the contested panel
    let contested = SolarPanel::find_by_id("s1-section_A-r0c0")
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert!(contested.donation_id.is_some());
}

#[tokio::test]
async fn test_donation_validation_and_auth_errors() {
    let (app, db) = setup_app().await;
    seed_school(
        &db,
        1,
        50_000.0,
        0.0,
        json!([{ "gridId": "section_A", "rows": 1, "cols": 2 }]),
    )
    .await;
    let cookie = register_and_login(&app, "jane@example.com").await;

    // No session
    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/donations",
            json!({
                "schoolId": 1,
                "panelIds": ["s1-section_A-r0c0"],
                "donationAmount": 100,
                "donorName": "Jane"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Empty panel list
    let response = app
        .clone()
        .oneshot(
            request(Method::POST, "/api/donations")
                .header(header::COOKIE, &cookie)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::to_vec(&json!({
                        "schoolId": 1,
                        "panelIds": [],
                        "donationAmount": 100,
                        "donorName": "Jane"
                    }))
                    .unwrap(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Non-positive amount
    let response = app
        .clone()
        .oneshot(
            request(Method::POST, "/api/donations")
                .header(header::COOKIE, &cookie)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::to_vec(&json!({
                        "schoolId": 1,
                        "panelIds": ["s1-section_A-r0c0"],
                        "donationAmount": 0,
                        "donorName": "Jane"
                    }))
                    .unwrap(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Unknown school
    let response = app
        .clone()
        .oneshot(
            request(Method::POST, "/api/donations")
                .header(header::COOKIE, &cookie)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::to_vec(&json!({
                        "schoolId": 999,
                        "panelIds": ["s1-section_A-r0c0"],
                        "donationAmount": 100,
                        "donorName": "Jane"
                    }))
                    .unwrap(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Nothing above left partial state behind
    assert!(Donation::find().all(&db).await.unwrap().is_empty());
    let panel = SolarPanel::find_by_id("s1-section_A-r0c0")
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert!(panel.donation_id.is_none());
}

#[tokio::test]
async fn test_school_panel_grid_view() {
    let (app, db) = setup_app().await;
    seed_school(
        &db,
        1,
        50_000.0,
        0.0,
        json!([
            { "gridId": "section_A", "gridTitle": "Main Array - Section A", "rows": 2, "cols": 3 },
            { "gridId": "roof_top", "rows": 1, "cols": 2 },
        ]),
    )
    .await;
    let cookie = register_and_login(&app, "jane@example.com").await;

    let response = app
        .clone()
        .oneshot(
            request(Method::POST, "/api/donations")
                .header(header::COOKIE, &cookie)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::to_vec(&json!({
                        "schoolId": 1,
                        "panelIds": ["s1-section_A-r1c2"],
                        "donationAmount": 40,
                        "logo": "🌻",
                        "donorName": "Jane"
                    }))
                    .unwrap(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(
            request(Method::GET, "/api/schools/1/panels")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let sections = body.as_array().unwrap();
    assert_eq!(sections.len(), 2);

    assert_eq!(sections[0]["gridId"], "section_A");
    assert_eq!(sections[0]["gridTitle"], "Main Array - Section A");
    assert_eq!(sections[0]["cells"].as_array().unwrap().len(), 2);

    let donated = &sections[0]["cells"][1][2];
    assert_eq!(donated["isDonated"], true);
    assert_eq!(donated["donorName"], "Jane");
    assert_eq!(donated["donationAmount"], 40.0);
    assert_eq!(donated["logo"], "🌻");

    let available = &sections[0]["cells"][0][0];
    assert_eq!(available["isDonated"], false);
    assert!(available.get("donorName").is_none());

    assert_eq!(sections[1]["gridId"], "roof_top");
    assert_eq!(sections[1]["cells"][0].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_admin_users_requires_admin_role() {
    let (app, db) = setup_app().await;

    // No session
    let response = app
        .clone()
        .oneshot(
            request(Method::GET, "/api/admin/users")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Regular user
    let cookie = register_and_login(&app, "jane@example.com").await;
    let response = app
        .clone()
        .oneshot(
            request(Method::GET, "/api/admin/users")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Admin (inserted directly; low cost keeps the test fast)
    let now = Utc::now();
    user::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        email: Set("admin@solarschools.dev".to_string()),
        name: Set(Some("Admin User".to_string())),
        password: Set(bcrypt::hash("s3cret", 4).unwrap()),
        role: Set(Role::Admin),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&db)
    .await
    .unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/auth/login",
            json!({ "email": "admin@solarschools.dev", "password": "s3cret" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let admin_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();

    let response = app
        .clone()
        .oneshot(
            request(Method::GET, "/api/admin/users")
                .header(header::COOKIE, &admin_cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let users = body.as_array().unwrap();
    assert_eq!(users.len(), 2);
    // The password hash never leaves the server
    assert!(users.iter().all(|u| u.get("password").is_none()));
}

#[tokio::test]
async fn test_logout_clears_session() {
    let (app, _db) = setup_app().await;
    let cookie = register_and_login(&app, "jane@example.com").await;

    let response = app
        .clone()
        .oneshot(
            request(Method::POST, "/api/auth/logout")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    // The replacement cookie is empty and expires immediately
    assert!(set_cookie.starts_with("session="));
    assert!(set_cookie.contains("Max-Age=0"));
}

#[test]
fn test_panel_serialization_shape() {
    // Panels serialize camelCase with donationId
    let panel = solar_panel::Model {
        id: "s1-section_A-r0c0".to_string(),
        grid_id: "section_A".to_string(),
        row: 0,
        col: 0,
        school_id: 1,
        donation_id: None,
    };
    let value = serde_json::to_value(&panel).unwrap();
    assert_eq!(value["gridId"], "section_A");
    assert!(value.get("donation_id").is_none());
    assert_eq!(value["donationId"], Value::Null);
}
