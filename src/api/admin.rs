use crate::api::leave_request::load_request;
use crate::auth::auth::AuthUser;
use crate::auth::password::hash_password;
use crate::errors::ApiError;
use crate::model::leave_request::{LeaveType, RequestStatus};
use crate::model::role::Role;
use crate::model::user::User;
use crate::notify::{Mailer, spawn_mail};
use actix_web::{HttpResponse, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{error, info};
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
#[schema(example = json!({
    "pending_ferie": 2,
    "pending_permessi": 1,
    "pending_malattie": 0,
    "total_pending": 3
}))]
pub struct DashboardStats {
    pub pending_ferie: i64,
    pub pending_permessi: i64,
    pub pending_malattie: i64,
    pub total_pending: i64,
}

#[derive(Deserialize, ToSchema)]
pub struct DecisionPayload {
    /// "approve" or "reject"
    #[schema(example = "approve")]
    pub action: String,
    #[schema(example = "ok")]
    pub notes: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateEmployeeDto {
    #[schema(example = "mrossi")]
    pub username: String,
    #[schema(example = "m.rossi@company.com", format = "email", value_type = String)]
    pub email: String,
    #[schema(example = "secret123")]
    pub password: String,
}

#[derive(Serialize, sqlx::FromRow, ToSchema)]
pub struct EmployeeSummary {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "mrossi")]
    pub username: String,
    #[schema(example = "m.rossi@company.com")]
    pub email: String,
    #[schema(example = "2024-01-01T00:00:00Z", format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct AdminSettingsDto {
    #[schema(example = "hr@company.com", format = "email", value_type = String)]
    pub email: String,
}

/* =========================
Pending counts by type
========================= */
#[utoipa::path(
    get,
    path = "/api/admin/dashboard",
    responses(
        (status = 200, description = "Pending request counts", body = DashboardStats),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn dashboard(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;

    let pending_ferie = count_pending(pool.get_ref(), LeaveType::Ferie).await?;
    let pending_permessi = count_pending(pool.get_ref(), LeaveType::Permesso).await?;
    let pending_malattie = count_pending(pool.get_ref(), LeaveType::Malattia).await?;

    Ok(HttpResponse::Ok().json(DashboardStats {
        pending_ferie,
        pending_permessi,
        pending_malattie,
        total_pending: pending_ferie + pending_permessi + pending_malattie,
    }))
}

async fn count_pending(pool: &MySqlPool, leave_type: LeaveType) -> Result<i64, ApiError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM leave_requests WHERE leave_type = ? AND status = ?",
    )
    .bind(leave_type.as_str())
    .bind(RequestStatus::Pending.as_str())
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/* =========================
Approve / reject a request
========================= */
#[utoipa::path(
    put,
    path = "/api/admin/requests/{id}",
    params(("id" = u64, Path, description = "Leave request id")),
    request_body = DecisionPayload,
    responses(
        (status = 200, description = "Decision recorded", body = Object,
         example = json!({"message": "Request approved successfully"})),
        (status = 400, description = "Unknown action"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Unknown request"),
        (status = 409, description = "Request already processed")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn decide_request(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    mailer: web::Data<Mailer>,
    path: web::Path<u64>,
    payload: web::Json<DecisionPayload>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;

    let status = match payload.action.as_str() {
        "approve" => RequestStatus::Approved,
        "reject" => RequestStatus::Rejected,
        other => {
            return Err(ApiError::Validation(format!(
                "Unknown action: {other}, expected approve or reject"
            )));
        }
    };

    let request_id = path.into_inner();
    let row = load_request(pool.get_ref(), request_id).await?;

    // Conditional transition: under concurrent decisions exactly one
    // UPDATE leaves pending, the loser sees zero rows affected.
    let result = sqlx::query(
        r#"
        UPDATE leave_requests
        SET status = ?, admin_notes = ?, updated_at = ?
        WHERE id = ? AND status = 'pending'
        "#,
    )
    .bind(status.as_str())
    .bind(&payload.notes)
    .bind(Utc::now())
    .bind(request_id)
    .execute(pool.get_ref())
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::Conflict(
            "Request has already been processed".into(),
        ));
    }

    info!(request_id, status = status.as_str(), "request decided");

    // Owner notification, after the transition is committed.
    let owner = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, email, password_hash, role_id, is_active, created_at
        FROM users
        WHERE id = ?
        "#,
    )
    .bind(row.user_id)
    .fetch_optional(pool.get_ref())
    .await?;

    match owner {
        Some(owner) => {
            let mailer = mailer.get_ref().clone();
            let leave_type = row.leave_type.clone();
            let notes = payload.notes.clone();
            let approved = status == RequestStatus::Approved;
            spawn_mail(move || {
                mailer.send_request_decided(
                    &owner.email,
                    &owner.username,
                    &leave_type,
                    approved,
                    notes.as_deref(),
                )
            });
        }
        None => error!(request_id, user_id = row.user_id, "request owner not found"),
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Request {} successfully", status.as_str())
    })))
}

/* =========================
Employee directory
========================= */
#[utoipa::path(
    post,
    path = "/api/admin/employees",
    request_body = CreateEmployeeDto,
    responses(
        (status = 201, description = "Employee created", body = Object,
         example = json!({"message": "Employee created successfully", "employee_id": 3})),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Username or email already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn create_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    mailer: web::Data<Mailer>,
    payload: web::Json<CreateEmployeeDto>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;

    let username = payload.username.trim();
    if username.len() < 3 {
        return Err(ApiError::Validation(
            "Username must be at least 3 characters".into(),
        ));
    }
    if payload.password.len() < 6 {
        return Err(ApiError::Validation(
            "Password must be at least 6 characters".into(),
        ));
    }
    if !payload.email.contains('@') {
        return Err(ApiError::Validation(
            "A valid email address is required".into(),
        ));
    }

    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = ? OR email = ? LIMIT 1)",
    )
    .bind(username)
    .bind(&payload.email)
    .fetch_one(pool.get_ref())
    .await?;

    if exists {
        return Err(ApiError::Conflict(
            "Username or email already exists".into(),
        ));
    }

    let hashed = hash_password(&payload.password);

    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, password_hash, role_id, is_active, created_at)
        VALUES (?, ?, ?, ?, TRUE, ?)
        "#,
    )
    .bind(username)
    .bind(&payload.email)
    .bind(&hashed)
    .bind(Role::Employee.id())
    .bind(Utc::now())
    .execute(pool.get_ref())
    .await;

    let result = match result {
        Ok(r) => r,
        Err(e) => {
            // Unique index race between the existence check and the insert.
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.code().as_deref() == Some("23000") {
                    return Err(ApiError::Conflict(
                        "Username or email already exists".into(),
                    ));
                }
            }
            return Err(e.into());
        }
    };

    let employee_id = result.last_insert_id();
    info!(employee_id, username, "employee created");

    let mailer = mailer.get_ref().clone();
    let email = payload.email.clone();
    let username = username.to_string();
    let password = payload.password.clone();
    spawn_mail(move || mailer.send_employee_credentials(&email, &username, &password));

    Ok(HttpResponse::Created().json(json!({
        "message": "Employee created successfully",
        "employee_id": employee_id
    })))
}

#[utoipa::path(
    get,
    path = "/api/admin/employees",
    responses(
        (status = 200, description = "Employees ordered by creation time", body = [EmployeeSummary]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;

    let employees = sqlx::query_as::<_, EmployeeSummary>(
        r#"
        SELECT id, username, email, created_at, is_active
        FROM users
        WHERE role_id = ?
        ORDER BY created_at ASC
        "#,
    )
    .bind(Role::Employee.id())
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(employees))
}

/* =========================
Admin settings
========================= */
#[utoipa::path(
    put,
    path = "/api/admin/settings",
    request_body = AdminSettingsDto,
    responses(
        (status = 200, description = "Settings updated"),
        (status = 400, description = "Invalid email"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_settings(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<AdminSettingsDto>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;

    if !payload.email.contains('@') {
        return Err(ApiError::Validation(
            "A valid email address is required".into(),
        ));
    }

    sqlx::query("UPDATE users SET email = ? WHERE id = ?")
        .bind(&payload.email)
        .bind(auth.user_id)
        .execute(pool.get_ref())
        .await?;

    info!(user_id = auth.user_id, "admin notification email updated");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Settings updated successfully"
    })))
}
