use crate::auth::auth::AuthUser;
use crate::errors::ApiError;
use crate::model::leave_request::{
    AdminLeaveRequestRow, LeaveKind, LeaveRequestRow, LeaveType, MAX_VACATION_SPAN_DAYS,
    RequestStatus, day_span,
};
use crate::model::role::Role;
use crate::notify::{Mailer, spawn_mail};
use actix_web::{HttpResponse, web};
use chrono::{NaiveDate, NaiveTime, Utc};
use derive_more::Display;
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::ToSchema;

/// Wire payload for create and edit. Flat on purpose: the frontend sends
/// only the group matching `type`, everything else is absent.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct LeaveRequestPayload {
    #[serde(rename = "type")]
    #[schema(example = "ferie")]
    pub leave_type: String,

    // Ferie (vacation)
    #[schema(example = "2024-06-03", format = "date", value_type = Option<String>)]
    pub start_date: Option<NaiveDate>,
    #[schema(example = "2024-06-07", format = "date", value_type = Option<String>)]
    pub end_date: Option<NaiveDate>,

    // Permesso (permit)
    #[schema(example = "2024-06-03", format = "date", value_type = Option<String>)]
    pub permit_date: Option<NaiveDate>,
    #[schema(example = "09:00")]
    pub start_time: Option<String>,
    #[schema(example = "13:00")]
    pub end_time: Option<String>,

    // Malattia (sick leave)
    #[schema(example = "2024-06-03", format = "date", value_type = Option<String>)]
    pub sick_start_date: Option<NaiveDate>,
    #[schema(example = 3)]
    pub sick_days: Option<i32>,
    #[schema(example = "PROT-2024-0042")]
    pub protocol_code: Option<String>,
}

#[derive(Debug, Display, PartialEq, Eq)]
pub enum ValidationError {
    #[display(fmt = "Unknown request type: {}", _0)]
    UnknownType(String),
    #[display(fmt = "Missing required field: {}", _0)]
    Missing(&'static str),
    #[display(fmt = "Invalid time for {}: expected HH:MM", _0)]
    BadTime(&'static str),
    #[display(fmt = "{}", _0)]
    Range(String),
    #[display(fmt = "start_time must be before end_time")]
    TimeRange,
    #[display(fmt = "sick_days must be at least 1")]
    SickDays,
    #[display(fmt = "protocol_code must not be empty")]
    Protocol,
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::Validation(e.to_string())
    }
}

/// Pure validator: normalizes a payload into the tagged `LeaveKind` or
/// explains why it is out of policy. No side effects, deterministic.
pub fn validate(payload: &LeaveRequestPayload) -> Result<LeaveKind, ValidationError> {
    let Some(leave_type) = LeaveType::from_str(&payload.leave_type) else {
        return Err(ValidationError::UnknownType(payload.leave_type.clone()));
    };

    match leave_type {
        LeaveType::Ferie => {
            let start_date = payload.start_date.ok_or(ValidationError::Missing("start_date"))?;
            let end_date = payload.end_date.ok_or(ValidationError::Missing("end_date"))?;
            if end_date < start_date {
                return Err(ValidationError::Range(
                    "end_date must not precede start_date".into(),
                ));
            }
            let span = day_span(start_date, end_date);
            if span > MAX_VACATION_SPAN_DAYS {
                return Err(ValidationError::Range(format!(
                    "vacation span of {span} days exceeds the maximum of {MAX_VACATION_SPAN_DAYS} consecutive days"
                )));
            }
            Ok(LeaveKind::Vacation {
                start_date,
                end_date,
            })
        }
        LeaveType::Permesso => {
            let permit_date = payload
                .permit_date
                .ok_or(ValidationError::Missing("permit_date"))?;
            let start_time = parse_time("start_time", payload.start_time.as_deref())?;
            let end_time = parse_time("end_time", payload.end_time.as_deref())?;
            if start_time >= end_time {
                return Err(ValidationError::TimeRange);
            }
            Ok(LeaveKind::Permit {
                permit_date,
                start_time,
                end_time,
            })
        }
        LeaveType::Malattia => {
            let sick_start_date = payload
                .sick_start_date
                .ok_or(ValidationError::Missing("sick_start_date"))?;
            let sick_days = payload.sick_days.ok_or(ValidationError::Missing("sick_days"))?;
            if sick_days < 1 {
                return Err(ValidationError::SickDays);
            }
            let protocol_code = payload
                .protocol_code
                .as_deref()
                .map(str::trim)
                .unwrap_or_default();
            if protocol_code.is_empty() {
                return Err(ValidationError::Protocol);
            }
            Ok(LeaveKind::Sick {
                sick_start_date,
                sick_days,
                protocol_code: protocol_code.to_string(),
            })
        }
    }
}

fn parse_time(field: &'static str, value: Option<&str>) -> Result<NaiveTime, ValidationError> {
    let raw = value.ok_or(ValidationError::Missing(field))?;
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|_| ValidationError::BadTime(field))
}

/// Employee-side mutation gate: own request, still pending. Cross-owner
/// access is always Forbidden; a decided request is immutable (Conflict).
pub fn ensure_owner_can_modify(auth: &AuthUser, row: &LeaveRequestRow) -> Result<(), ApiError> {
    if row.user_id != auth.user_id {
        return Err(ApiError::Forbidden(
            "You can only modify your own requests".into(),
        ));
    }
    if !row.is_pending() {
        return Err(ApiError::Conflict(
            "Request has already been processed".into(),
        ));
    }
    Ok(())
}

const SELECT_REQUEST: &str = r#"
    SELECT id, user_id, leave_type, start_date, end_date, permit_date,
           start_time, end_time, sick_start_date, sick_days, protocol_code,
           status, admin_notes, created_at, updated_at
    FROM leave_requests
"#;

pub async fn load_request(pool: &MySqlPool, id: u64) -> Result<LeaveRequestRow, ApiError> {
    sqlx::query_as::<_, LeaveRequestRow>(&format!("{SELECT_REQUEST} WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("Leave request not found".into()))
}

/* =========================
Create leave request
========================= */
#[utoipa::path(
    post,
    path = "/api/requests",
    request_body = LeaveRequestPayload,
    responses(
        (status = 200, description = "Request created",
         body = Object,
         example = json!({"message": "Request created successfully", "request_id": 1})),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admins cannot submit leave requests")
    ),
    security(("bearer_auth" = [])),
    tag = "Requests"
)]
pub async fn create_request(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    mailer: web::Data<Mailer>,
    payload: web::Json<LeaveRequestPayload>,
) -> Result<HttpResponse, ApiError> {
    auth.require_employee()?;

    let kind = validate(&payload)?;
    let cols = kind.columns();
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO leave_requests
            (user_id, leave_type, start_date, end_date, permit_date,
             start_time, end_time, sick_start_date, sick_days, protocol_code,
             status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(auth.user_id)
    .bind(kind.leave_type().as_str())
    .bind(cols.start_date)
    .bind(cols.end_date)
    .bind(cols.permit_date)
    .bind(cols.start_time)
    .bind(cols.end_time)
    .bind(cols.sick_start_date)
    .bind(cols.sick_days)
    .bind(cols.protocol_code)
    .bind(RequestStatus::Pending.as_str())
    .bind(now)
    .bind(now)
    .execute(pool.get_ref())
    .await?;

    let request_id = result.last_insert_id();
    info!(request_id, user_id = auth.user_id, leave_type = kind.leave_type().as_str(),
          "leave request created");

    // The admin account's email is the notification target.
    let admin_email = sqlx::query_scalar::<_, String>(
        "SELECT email FROM users WHERE role_id = ? ORDER BY id LIMIT 1",
    )
    .bind(Role::Admin.id())
    .fetch_optional(pool.get_ref())
    .await?;

    if let Some(admin_email) = admin_email {
        let mailer = mailer.get_ref().clone();
        let employee = auth.username.clone();
        let leave_type = kind.leave_type().as_str();
        spawn_mail(move || mailer.send_request_submitted(&admin_email, &employee, leave_type));
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "Request created successfully",
        "request_id": request_id
    })))
}

/* =========================
List requests
========================= */
#[utoipa::path(
    get,
    path = "/api/requests",
    responses(
        (status = 200, description = "Employee: own requests. Admin: all requests with owner info",
         body = [LeaveRequestRow]),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Requests"
)]
pub async fn list_requests(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, ApiError> {
    if auth.is_admin() {
        let rows = sqlx::query_as::<_, AdminLeaveRequestRow>(
            r#"
            SELECT r.id, r.user_id, r.leave_type, r.start_date, r.end_date, r.permit_date,
                   r.start_time, r.end_time, r.sick_start_date, r.sick_days, r.protocol_code,
                   r.status, r.admin_notes, r.created_at, r.updated_at,
                   u.username, u.email AS user_email
            FROM leave_requests r
            JOIN users u ON u.id = r.user_id
            ORDER BY r.created_at DESC
            "#,
        )
        .fetch_all(pool.get_ref())
        .await?;

        return Ok(HttpResponse::Ok().json(rows));
    }

    let rows = sqlx::query_as::<_, LeaveRequestRow>(&format!(
        "{SELECT_REQUEST} WHERE user_id = ? ORDER BY created_at DESC"
    ))
    .bind(auth.user_id)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(rows))
}

/* =========================
Edit a pending request
========================= */
#[utoipa::path(
    put,
    path = "/api/requests/{id}",
    params(("id" = u64, Path, description = "Leave request id")),
    request_body = LeaveRequestPayload,
    responses(
        (status = 200, description = "Request updated"),
        (status = 400, description = "Validation failed or type change attempted"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Unknown request"),
        (status = 409, description = "Request no longer pending")
    ),
    security(("bearer_auth" = [])),
    tag = "Requests"
)]
pub async fn update_request(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<LeaveRequestPayload>,
) -> Result<HttpResponse, ApiError> {
    auth.require_employee()?;

    let request_id = path.into_inner();
    let row = load_request(pool.get_ref(), request_id).await?;
    ensure_owner_can_modify(&auth, &row)?;

    let kind = validate(&payload)?;
    if kind.leave_type().as_str() != row.leave_type {
        return Err(ApiError::Validation(
            "The request type cannot be changed".into(),
        ));
    }

    let cols = kind.columns();
    let result = sqlx::query(
        r#"
        UPDATE leave_requests
        SET start_date = ?, end_date = ?, permit_date = ?,
            start_time = ?, end_time = ?, sick_start_date = ?,
            sick_days = ?, protocol_code = ?, updated_at = ?
        WHERE id = ? AND status = 'pending'
        "#,
    )
    .bind(cols.start_date)
    .bind(cols.end_date)
    .bind(cols.permit_date)
    .bind(cols.start_time)
    .bind(cols.end_time)
    .bind(cols.sick_start_date)
    .bind(cols.sick_days)
    .bind(cols.protocol_code)
    .bind(Utc::now())
    .bind(request_id)
    .execute(pool.get_ref())
    .await?;

    // A concurrent decision between load and update loses the row here.
    if result.rows_affected() == 0 {
        return Err(ApiError::Conflict(
            "Request has already been processed".into(),
        ));
    }

    info!(request_id, user_id = auth.user_id, "leave request updated");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Request updated successfully"
    })))
}

/* =========================
Delete a pending request
========================= */
#[utoipa::path(
    delete,
    path = "/api/requests/{id}",
    params(("id" = u64, Path, description = "Leave request id")),
    responses(
        (status = 200, description = "Request deleted"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Unknown request"),
        (status = 409, description = "Request no longer pending")
    ),
    security(("bearer_auth" = [])),
    tag = "Requests"
)]
pub async fn delete_request(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    auth.require_employee()?;

    let request_id = path.into_inner();
    let row = load_request(pool.get_ref(), request_id).await?;
    ensure_owner_can_modify(&auth, &row)?;

    let result = sqlx::query("DELETE FROM leave_requests WHERE id = ? AND status = 'pending'")
        .bind(request_id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::Conflict(
            "Request has already been processed".into(),
        ));
    }

    info!(request_id, user_id = auth.user_id, "leave request deleted");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Request deleted successfully"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn vacation_payload(start: &str, end: &str) -> LeaveRequestPayload {
        LeaveRequestPayload {
            leave_type: "ferie".into(),
            start_date: Some(start.parse().unwrap()),
            end_date: Some(end.parse().unwrap()),
            ..Default::default()
        }
    }

    fn permit_payload(date: &str, start: &str, end: &str) -> LeaveRequestPayload {
        LeaveRequestPayload {
            leave_type: "permesso".into(),
            permit_date: Some(date.parse().unwrap()),
            start_time: Some(start.into()),
            end_time: Some(end.into()),
            ..Default::default()
        }
    }

    fn sick_payload(start: &str, days: i32, protocol: &str) -> LeaveRequestPayload {
        LeaveRequestPayload {
            leave_type: "malattia".into(),
            sick_start_date: Some(start.parse().unwrap()),
            sick_days: Some(days),
            protocol_code: Some(protocol.into()),
            ..Default::default()
        }
    }

    #[test]
    fn vacation_of_five_days_is_accepted() {
        let kind = validate(&vacation_payload("2024-06-03", "2024-06-07")).unwrap();
        match kind {
            LeaveKind::Vacation {
                start_date,
                end_date,
            } => assert_eq!(day_span(start_date, end_date), 5),
            other => panic!("expected vacation, got {other:?}"),
        }
    }

    #[test]
    fn vacation_span_limit_is_inclusive() {
        // 15 days exactly is the last allowed span.
        assert!(validate(&vacation_payload("2024-06-01", "2024-06-15")).is_ok());
        assert!(matches!(
            validate(&vacation_payload("2024-06-01", "2024-06-16")),
            Err(ValidationError::Range(_))
        ));
    }

    #[test]
    fn vacation_reversed_dates_are_rejected() {
        assert!(matches!(
            validate(&vacation_payload("2024-06-07", "2024-06-03")),
            Err(ValidationError::Range(_))
        ));
    }

    #[test]
    fn vacation_requires_both_dates() {
        let mut payload = vacation_payload("2024-06-03", "2024-06-07");
        payload.end_date = None;
        assert_eq!(
            validate(&payload),
            Err(ValidationError::Missing("end_date"))
        );
    }

    #[test]
    fn permit_accepts_short_and_long_time_forms() {
        assert!(validate(&permit_payload("2024-06-03", "09:00", "13:00")).is_ok());
        assert!(validate(&permit_payload("2024-06-03", "09:00:00", "13:30:00")).is_ok());
    }

    #[test]
    fn permit_inverted_window_is_a_time_range_error() {
        assert_eq!(
            validate(&permit_payload("2024-06-03", "09:00", "08:00")),
            Err(ValidationError::TimeRange)
        );
        // Zero-length windows are rejected too.
        assert_eq!(
            validate(&permit_payload("2024-06-03", "09:00", "09:00")),
            Err(ValidationError::TimeRange)
        );
    }

    #[test]
    fn permit_garbage_time_is_rejected() {
        assert_eq!(
            validate(&permit_payload("2024-06-03", "9 o'clock", "13:00")),
            Err(ValidationError::BadTime("start_time"))
        );
    }

    #[test]
    fn sick_leave_requires_positive_days_and_protocol() {
        assert!(validate(&sick_payload("2024-06-03", 3, "PROT-1")).is_ok());
        assert_eq!(
            validate(&sick_payload("2024-06-03", 0, "PROT-1")),
            Err(ValidationError::SickDays)
        );
        assert_eq!(
            validate(&sick_payload("2024-06-03", -2, "PROT-1")),
            Err(ValidationError::SickDays)
        );
        assert_eq!(
            validate(&sick_payload("2024-06-03", 3, "   ")),
            Err(ValidationError::Protocol)
        );
    }

    #[test]
    fn unknown_type_is_rejected() {
        let payload = LeaveRequestPayload {
            leave_type: "sabbatical".into(),
            ..Default::default()
        };
        assert_eq!(
            validate(&payload),
            Err(ValidationError::UnknownType("sabbatical".into()))
        );
    }

    #[test]
    fn foreign_group_fields_are_ignored() {
        let mut payload = vacation_payload("2024-06-03", "2024-06-07");
        payload.sick_days = Some(99);
        payload.protocol_code = Some("PROT-9".into());
        let kind = validate(&payload).unwrap();
        assert!(matches!(kind, LeaveKind::Vacation { .. }));
        assert!(kind.columns().sick_days.is_none());
    }

    fn row(owner: u64, status: &str) -> LeaveRequestRow {
        let ts = DateTime::parse_from_rfc3339("2024-06-01T08:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        LeaveRequestRow {
            id: 10,
            user_id: owner,
            leave_type: "ferie".into(),
            start_date: Some("2024-06-03".parse().unwrap()),
            end_date: Some("2024-06-07".parse().unwrap()),
            permit_date: None,
            start_time: None,
            end_time: None,
            sick_start_date: None,
            sick_days: None,
            protocol_code: None,
            status: status.into(),
            admin_notes: None,
            created_at: ts,
            updated_at: ts,
        }
    }

    fn employee(id: u64) -> AuthUser {
        AuthUser {
            user_id: id,
            username: format!("user{id}"),
            role: Role::Employee,
        }
    }

    #[test]
    fn cross_owner_modification_is_forbidden() {
        let err = ensure_owner_can_modify(&employee(2), &row(1, "pending")).unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[test]
    fn decided_requests_are_immutable_to_their_owner() {
        for status in ["approved", "rejected"] {
            let err = ensure_owner_can_modify(&employee(1), &row(1, status)).unwrap_err();
            assert!(matches!(err, ApiError::Conflict(_)));
        }
    }

    #[test]
    fn owner_may_modify_while_pending() {
        assert!(ensure_owner_can_modify(&employee(1), &row(1, "pending")).is_ok());
    }
}
