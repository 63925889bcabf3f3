use crate::{
    auth::{
        auth::AuthUser,
        jwt::generate_access_token,
        password::{hash_password, verify_password},
    },
    config::Config,
    errors::ApiError,
    model::{role::Role, user::User},
    models::{ChangePasswordDto, LoginReqDto, LoginResponse, UserProfile},
};
use actix_web::{HttpResponse, web};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, info, instrument};

/// Credential exchange: returns a bearer token plus the user profile the
/// frontend keeps for display. Deactivated accounts cannot log in.
#[utoipa::path(
    post,
    path = "/api/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Missing username or password"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(username = %user.username)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    info!("Login request received");

    if user.username.trim().is_empty() || user.password.is_empty() {
        return Err(ApiError::Validation("Username or password required".into()));
    }

    debug!("Fetching user from database");

    let db_user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, email, password_hash, role_id, is_active, created_at
        FROM users
        WHERE username = ? AND is_active = TRUE
        "#,
    )
    .bind(&user.username)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| {
        info!("Invalid credentials: user not found");
        ApiError::Unauthorized("Invalid username or password".into())
    })?;

    if let Err(e) = verify_password(&user.password, &db_user.password_hash) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(ApiError::Unauthorized("Invalid username or password".into()));
    }

    let role = Role::from_id(db_user.role_id)
        .ok_or_else(|| ApiError::Internal(format!("unknown role id {}", db_user.role_id)))?;

    let access_token = generate_access_token(
        db_user.id,
        db_user.username.clone(),
        role.id(),
        &config.jwt_secret,
        config.access_token_ttl,
    );

    info!("Login successful");

    Ok(HttpResponse::Ok().json(LoginResponse {
        access_token,
        token_type: "bearer".to_string(),
        user: UserProfile {
            id: db_user.id,
            username: db_user.username,
            email: db_user.email,
            role: role.as_str().to_string(),
        },
    }))
}

/// Verified password rotation for the calling account, admin or employee.
#[utoipa::path(
    put,
    path = "/api/change-password",
    request_body = ChangePasswordDto,
    responses(
        (status = 200, description = "Password changed", body = Object,
         example = json!({"message": "Password changed successfully"})),
        (status = 400, description = "New password too short"),
        (status = 401, description = "Current password is incorrect")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn change_password(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<ChangePasswordDto>,
) -> Result<HttpResponse, ApiError> {
    if payload.new_password.len() < 6 {
        return Err(ApiError::Validation(
            "New password must be at least 6 characters".into(),
        ));
    }

    let stored_hash = sqlx::query_scalar::<_, String>("SELECT password_hash FROM users WHERE id = ?")
        .bind(auth.user_id)
        .fetch_optional(pool.get_ref())
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Account no longer exists".into()))?;

    if verify_password(&payload.current_password, &stored_hash).is_err() {
        return Err(ApiError::Unauthorized(
            "Current password is incorrect".into(),
        ));
    }

    let new_hash = hash_password(&payload.new_password);

    sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
        .bind(&new_hash)
        .bind(auth.user_id)
        .execute(pool.get_ref())
        .await?;

    info!(user_id = auth.user_id, "password changed");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Password changed successfully"
    })))
}
