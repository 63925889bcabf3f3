use crate::auth::auth::AuthUser;
use crate::errors::ApiError;
use crate::model::leave_request::{LeaveKind, LeaveRequestRow, day_span};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

/// Per-year totals over the caller's approved requests.
#[derive(Debug, Default, PartialEq, Eq, Serialize, ToSchema)]
#[schema(example = json!({
    "ferie_days": 5,
    "permessi_count": 2,
    "malattie_days": 3,
    "total_requests": 4
}))]
pub struct YearStats {
    /// Sum of inclusive vacation day spans, weekends counted.
    pub ferie_days: i64,
    /// Number of permit requests, not hours.
    pub permessi_count: i64,
    /// Sum of certified sick days.
    pub malattie_days: i64,
    pub total_requests: i64,
}

#[derive(Deserialize, IntoParams)]
pub struct StatsQuery {
    /// Calendar year scoping the statistics.
    pub year: i32,
}

/// Only approved requests anchored in `year` count. Rows whose stored
/// fields disagree with their type tag are skipped.
pub fn aggregate(rows: &[LeaveRequestRow], year: i32) -> YearStats {
    let mut stats = YearStats::default();
    for row in rows {
        if !row.is_approved() {
            continue;
        }
        let Some(kind) = row.kind() else { continue };
        if kind.anchor_year() != year {
            continue;
        }
        match kind {
            LeaveKind::Vacation {
                start_date,
                end_date,
            } => stats.ferie_days += day_span(start_date, end_date),
            LeaveKind::Permit { .. } => stats.permessi_count += 1,
            LeaveKind::Sick { sick_days, .. } => stats.malattie_days += i64::from(sick_days),
        }
        stats.total_requests += 1;
    }
    stats
}

/// Distinct anchor years across all of the caller's requests, newest
/// first, for the year selector. Any status counts here.
pub fn request_years(rows: &[LeaveRequestRow]) -> Vec<i32> {
    let mut years: Vec<i32> = rows
        .iter()
        .filter_map(LeaveRequestRow::kind)
        .map(|kind| kind.anchor_year())
        .collect();
    years.sort_unstable_by(|a, b| b.cmp(a));
    years.dedup();
    years
}

async fn fetch_own_requests(
    pool: &MySqlPool,
    user_id: u64,
) -> Result<Vec<LeaveRequestRow>, ApiError> {
    let rows = sqlx::query_as::<_, LeaveRequestRow>(
        r#"
        SELECT id, user_id, leave_type, start_date, end_date, permit_date,
               start_time, end_time, sick_start_date, sick_days, protocol_code,
               status, admin_notes, created_at, updated_at
        FROM leave_requests
        WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[utoipa::path(
    get,
    path = "/api/years",
    responses(
        (status = 200, description = "Years with at least one request", body = Object,
         example = json!({"years": [2024, 2023]})),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Stats"
)]
pub async fn years(auth: AuthUser, pool: web::Data<MySqlPool>) -> Result<HttpResponse, ApiError> {
    let rows = fetch_own_requests(pool.get_ref(), auth.user_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "years": request_years(&rows) })))
}

#[utoipa::path(
    get,
    path = "/api/stats",
    params(StatsQuery),
    responses(
        (status = 200, description = "Yearly totals over approved requests", body = YearStats),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Stats"
)]
pub async fn stats(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<StatsQuery>,
) -> Result<HttpResponse, ApiError> {
    let rows = fetch_own_requests(pool.get_ref(), auth.user_id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "year": query.year,
        "stats": aggregate(&rows, query.year)
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, Utc};

    fn base_row(id: u64, leave_type: &str, status: &str) -> LeaveRequestRow {
        LeaveRequestRow {
            id,
            user_id: 1,
            leave_type: leave_type.into(),
            start_date: None,
            end_date: None,
            permit_date: None,
            start_time: None,
            end_time: None,
            sick_start_date: None,
            sick_days: None,
            protocol_code: None,
            status: status.into(),
            admin_notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn vacation(id: u64, status: &str, start: &str, end: &str) -> LeaveRequestRow {
        let mut row = base_row(id, "ferie", status);
        row.start_date = Some(start.parse::<NaiveDate>().unwrap());
        row.end_date = Some(end.parse::<NaiveDate>().unwrap());
        row
    }

    fn permit(id: u64, status: &str, date: &str) -> LeaveRequestRow {
        let mut row = base_row(id, "permesso", status);
        row.permit_date = Some(date.parse::<NaiveDate>().unwrap());
        row.start_time = NaiveTime::from_hms_opt(9, 0, 0);
        row.end_time = NaiveTime::from_hms_opt(13, 0, 0);
        row
    }

    fn sick(id: u64, status: &str, start: &str, days: i32) -> LeaveRequestRow {
        let mut row = base_row(id, "malattia", status);
        row.sick_start_date = Some(start.parse::<NaiveDate>().unwrap());
        row.sick_days = Some(days);
        row.protocol_code = Some("PROT-1".into());
        row
    }

    #[test]
    fn only_approved_requests_count() {
        let rows = vec![
            vacation(1, "approved", "2024-06-03", "2024-06-07"),
            vacation(2, "pending", "2024-07-01", "2024-07-05"),
            vacation(3, "pending", "2024-08-01", "2024-08-02"),
        ];
        let stats = aggregate(&rows, 2024);
        assert_eq!(stats.ferie_days, 5);
        assert_eq!(stats.total_requests, 1);
    }

    #[test]
    fn rejected_requests_do_not_count() {
        let rows = vec![vacation(1, "rejected", "2024-06-03", "2024-06-07")];
        assert_eq!(aggregate(&rows, 2024), YearStats::default());
    }

    #[test]
    fn totals_accumulate_across_types() {
        let rows = vec![
            vacation(1, "approved", "2024-06-03", "2024-06-07"),
            permit(2, "approved", "2024-03-01"),
            permit(3, "approved", "2024-04-12"),
            sick(4, "approved", "2024-02-01", 3),
        ];
        let stats = aggregate(&rows, 2024);
        assert_eq!(stats.ferie_days, 5);
        assert_eq!(stats.permessi_count, 2);
        assert_eq!(stats.malattie_days, 3);
        assert_eq!(stats.total_requests, 4);
    }

    #[test]
    fn year_window_uses_the_anchor_date() {
        let rows = vec![
            vacation(1, "approved", "2023-12-27", "2024-01-02"),
            sick(2, "approved", "2024-01-10", 2),
        ];
        // The vacation anchors in 2023 through its start date.
        let y2023 = aggregate(&rows, 2023);
        assert_eq!(y2023.ferie_days, 7);
        assert_eq!(y2023.total_requests, 1);

        let y2024 = aggregate(&rows, 2024);
        assert_eq!(y2024.ferie_days, 0);
        assert_eq!(y2024.malattie_days, 2);
        assert_eq!(y2024.total_requests, 1);
    }

    #[test]
    fn years_are_distinct_and_descending() {
        let rows = vec![
            vacation(1, "pending", "2022-05-01", "2022-05-03"),
            permit(2, "approved", "2024-03-01"),
            sick(3, "rejected", "2022-11-01", 1),
            permit(4, "approved", "2023-01-10"),
        ];
        assert_eq!(request_years(&rows), vec![2024, 2023, 2022]);
    }

    #[test]
    fn no_requests_yield_an_empty_year_list() {
        assert!(request_years(&[]).is_empty());
        assert_eq!(aggregate(&[], 2024), YearStats::default());
    }
}
