use chrono::{Duration, Utc};
use robecop::configuration::{get_configuration, DatabaseSettings};
use robecop::startup::run;
use serde_json::{json, Value};
use sqlx::{Connection, Executor, PgConnection, PgPool};
use std::net::TcpListener;
use uuid::Uuid;

pub struct TestApp {
    pub address: String,
    pub db_pool: PgPool,
}

async fn spawn_app() -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let mut configuration = get_configuration().expect("Failed to read configuration.");
    configuration.database.database_name = Uuid::new_v4().to_string();
    let connection_pool = configure_database(&configuration.database).await;

    let server = run(listener, connection_pool.clone(), configuration).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        db_pool: connection_pool,
    }
}

pub async fn configure_database(config: &DatabaseSettings) -> PgPool {
    let mut connection = PgConnection::connect(&config.connection_string_without_db())
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(&*format!(r#"CREATE DATABASE "{}";"#, config.database_name))
        .await
        .expect("Failed to create database.");

    let connection_pool = PgPool::connect(&config.connection_string())
        .await
        .expect("Failed to connect to Postgres.");
    sqlx::migrate!("./migrations")
        .run(&connection_pool)
        .await
        .expect("Failed to migrate the database.");
    connection_pool
}

async fn role_id(pool: &PgPool, name: &str) -> Uuid {
    sqlx::query_as::<_, (Uuid,)>("SELECT id FROM roles WHERE name = $1")
        .bind(name)
        .fetch_one(pool)
        .await
        .expect("role exists")
        .0
}

async fn insert_ppe(pool: &PgPool, name: &str, sku: &str) -> Uuid {
    sqlx::query_as::<_, (Uuid,)>(
        "INSERT INTO ppe_items (name, sku) VALUES ($1, $2) RETURNING id",
    )
    .bind(name)
    .bind(sku)
    .fetch_one(pool)
    .await
    .expect("insert ppe item")
    .0
}

async fn insert_employee(pool: &PgPool, first: &str, email: &str, role: Uuid) -> Uuid {
    sqlx::query_as::<_, (Uuid,)>(
        "INSERT INTO employees (first_name, last_name, email, role_id)
         VALUES ($1, 'Test', $2, $3) RETURNING id",
    )
    .bind(first)
    .bind(email)
    .bind(role)
    .fetch_one(pool)
    .await
    .expect("insert employee")
    .0
}

async fn assign(pool: &PgPool, ppe: Uuid, employee: Uuid, expires_in_days: Option<i64>) {
    sqlx::query(
        "INSERT INTO ppe_assignments (ppe_id, employee_id, expires_at) VALUES ($1, $2, $3)",
    )
    .bind(ppe)
    .bind(employee)
    .bind(expires_in_days.map(|d| Utc::now() + Duration::days(d)))
    .execute(pool)
    .await
    .expect("insert assignment");
}

async fn recommend(pool: &PgPool, role: Uuid, ppe: Uuid, risk: Option<Uuid>) {
    sqlx::query(
        "INSERT INTO recommended_ppe (role_id, ppe_id, risk_id) VALUES ($1, $2, $3)",
    )
    .bind(role)
    .bind(ppe)
    .bind(risk)
    .execute(pool)
    .await
    .expect("insert recommendation");
}

/// Employees seeded for every dashboard test:
/// - expired@…  (Employee) helmet expired yesterday, ear muffs undated → red
/// - soon@…     (Employee) helmet expiring in 14 days, ear muffs undated → yellow
/// - ok@…       (Employee) helmet in 90 days, ear muffs undated → green
/// - missing@…  (Employee) nothing assigned → red
/// - lead@…     (Supervisor) no recommendations, nothing assigned → green
async fn seed_dashboard_data(pool: &PgPool) {
    let employee_role = role_id(pool, "Employee").await;
    let supervisor_role = role_id(pool, "Supervisor").await;

    let helmet = insert_ppe(pool, "Welding Helmet", "WH-100").await;
    let ear_muffs = insert_ppe(pool, "Ear Muffs", "EM-300").await;

    let noise = sqlx::query_as::<_, (Uuid,)>(
        "INSERT INTO risks (name, note) VALUES ('Noise', 'High decibel environment') RETURNING id",
    )
    .fetch_one(pool)
    .await
    .expect("insert risk")
    .0;

    recommend(pool, employee_role, helmet, None).await;
    recommend(pool, employee_role, ear_muffs, Some(noise)).await;

    let expired = insert_employee(pool, "EExpired", "expired@example.com", employee_role).await;
    assign(pool, helmet, expired, Some(-1)).await;
    assign(pool, ear_muffs, expired, None).await;

    let soon = insert_employee(pool, "ESoon", "soon@example.com", employee_role).await;
    assign(pool, helmet, soon, Some(14)).await;
    assign(pool, ear_muffs, soon, None).await;

    let ok = insert_employee(pool, "EOk", "ok@example.com", employee_role).await;
    assign(pool, helmet, ok, Some(90)).await;
    assign(pool, ear_muffs, ok, None).await;

    insert_employee(pool, "EMissing", "missing@example.com", employee_role).await;

    insert_employee(pool, "Lead", "lead@example.com", supervisor_role).await;
}

async fn admin_token(app: &TestApp, client: &reqwest::Client) -> String {
    let response = client
        .post(&format!("{}/auth/register", &app.address))
        .json(&json!({
            "name": "Admin User",
            "email": "admin@example.com",
            "password": "AdminPass123",
            "role": "Admin"
        }))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(201, response.status().as_u16());

    let body: Value = response.json().await.expect("parse");
    body["access_token"].as_str().expect("access token").to_string()
}

fn result_for<'a>(body: &'a Value, email: &str) -> &'a Value {
    body["results"]
        .as_array()
        .expect("results array")
        .iter()
        .find(|r| r["email"] == email)
        .unwrap_or_else(|| panic!("no result for {}", email))
}

#[tokio::test]
async fn dashboard_requires_authentication() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(&format!("{}/api/dashboard/status", &app.address))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(401, response.status().as_u16());
}

#[tokio::test]
async fn dashboard_derives_counts_and_per_employee_statuses() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    seed_dashboard_data(&app.db_pool).await;
    let token = admin_token(&app, &client).await;

    let response = client
        .get(&format!(
            "{}/api/dashboard/status?threshold_days=30",
            &app.address
        ))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.expect("parse");

    assert_eq!(body["counts"]["red"], 2);
    assert_eq!(body["counts"]["yellow"], 1);
    assert_eq!(body["counts"]["green"], 2);
    assert_eq!(body["threshold_days"], 30);

    let expired = result_for(&body, "expired@example.com");
    assert_eq!(expired["status"], "red");
    assert_eq!(expired["has_expired"], true);
    assert_eq!(expired["missing"].as_array().expect("missing").len(), 0);

    let soon = result_for(&body, "soon@example.com");
    assert_eq!(soon["status"], "yellow");
    assert_eq!(soon["has_expired"], false);
    assert_eq!(soon["has_expiring_soon"], true);
    assert!(soon["nearest_expires"].is_string());

    let ok = result_for(&body, "ok@example.com");
    assert_eq!(ok["status"], "green");

    let missing = result_for(&body, "missing@example.com");
    assert_eq!(missing["status"], "red");
    assert_eq!(missing["missing"].as_array().expect("missing").len(), 2);
    assert!(missing["nearest_expires"].is_null());

    // Display lists are carried per employee
    assert_eq!(ok["assigned"].as_array().expect("assigned").len(), 2);
    assert_eq!(ok["recommended"].as_array().expect("recommended").len(), 2);
}

#[tokio::test]
async fn tighter_threshold_turns_yellow_back_to_green() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    seed_dashboard_data(&app.db_pool).await;
    let token = admin_token(&app, &client).await;

    let response = client
        .get(&format!(
            "{}/api/dashboard/status?threshold_days=10",
            &app.address
        ))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.expect("parse");

    // The 14-day expiry is no longer within the window
    let soon = result_for(&body, "soon@example.com");
    assert_eq!(soon["status"], "green");
    assert_eq!(body["counts"]["yellow"], 0);
}

#[tokio::test]
async fn role_filter_restricts_which_employees_are_considered() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    seed_dashboard_data(&app.db_pool).await;
    let token = admin_token(&app, &client).await;

    let response = client
        .get(&format!(
            "{}/api/dashboard/status?role=Supervisor",
            &app.address
        ))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.expect("parse");

    let results = body["results"].as_array().expect("results array");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["email"], "lead@example.com");
    assert_eq!(results[0]["status"], "green");
}

#[tokio::test]
async fn risk_filter_retains_only_roles_covering_that_risk() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    seed_dashboard_data(&app.db_pool).await;
    let token = admin_token(&app, &client).await;

    let response = client
        .get(&format!(
            "{}/api/dashboard/status?risk=Noise",
            &app.address
        ))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.expect("parse");

    // Only Employee-role recommendations are tagged Noise; the supervisor
    // drops out
    let results = body["results"].as_array().expect("results array");
    assert_eq!(results.len(), 4);
    assert!(results.iter().all(|r| r["role"] == "Employee"));
}

#[tokio::test]
async fn invalid_filters_are_rejected() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let token = admin_token(&app, &client).await;

    for query in ["role=Superuser", "threshold_days=-5"] {
        let response = client
            .get(&format!("{}/api/dashboard/status?{}", &app.address, query))
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await
            .expect("Failed to execute request.");

        assert_eq!(400, response.status().as_u16(), "Should reject: {}", query);
    }
}
