use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Vacations may span at most this many consecutive calendar days,
/// weekends included.
pub const MAX_VACATION_SPAN_DAYS: i64 = 15;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LeaveType {
    Ferie,
    Permesso,
    Malattia,
}

impl LeaveType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveType::Ferie => "ferie",
            LeaveType::Permesso => "permesso",
            LeaveType::Malattia => "malattia",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "ferie" => Some(LeaveType::Ferie),
            "permesso" => Some(LeaveType::Permesso),
            "malattia" => Some(LeaveType::Malattia),
            _ => None,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }
}

/// Normalized, validated payload of a leave request. Exactly one field
/// group exists per request because the variant carries it.
#[derive(Debug, Clone, PartialEq)]
pub enum LeaveKind {
    Vacation {
        start_date: NaiveDate,
        end_date: NaiveDate,
    },
    Permit {
        permit_date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
    },
    Sick {
        sick_start_date: NaiveDate,
        sick_days: i32,
        protocol_code: String,
    },
}

impl LeaveKind {
    pub fn leave_type(&self) -> LeaveType {
        match self {
            LeaveKind::Vacation { .. } => LeaveType::Ferie,
            LeaveKind::Permit { .. } => LeaveType::Permesso,
            LeaveKind::Sick { .. } => LeaveType::Malattia,
        }
    }

    /// The date that places a request in a calendar year for statistics.
    pub fn anchor_date(&self) -> NaiveDate {
        match self {
            LeaveKind::Vacation { start_date, .. } => *start_date,
            LeaveKind::Permit { permit_date, .. } => *permit_date,
            LeaveKind::Sick {
                sick_start_date, ..
            } => *sick_start_date,
        }
    }

    pub fn anchor_year(&self) -> i32 {
        self.anchor_date().year()
    }

    /// Projection onto the storage columns: the group that does not belong
    /// to this variant comes out as NULLs, so an edit that re-validates a
    /// request wipes any stale fields.
    pub fn columns(&self) -> LeaveColumns {
        let mut cols = LeaveColumns::default();
        match self {
            LeaveKind::Vacation {
                start_date,
                end_date,
            } => {
                cols.start_date = Some(*start_date);
                cols.end_date = Some(*end_date);
            }
            LeaveKind::Permit {
                permit_date,
                start_time,
                end_time,
            } => {
                cols.permit_date = Some(*permit_date);
                cols.start_time = Some(*start_time);
                cols.end_time = Some(*end_time);
            }
            LeaveKind::Sick {
                sick_start_date,
                sick_days,
                protocol_code,
            } => {
                cols.sick_start_date = Some(*sick_start_date);
                cols.sick_days = Some(*sick_days);
                cols.protocol_code = Some(protocol_code.clone());
            }
        }
        cols
    }
}

#[derive(Debug, Default)]
pub struct LeaveColumns {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub permit_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub sick_start_date: Option<NaiveDate>,
    pub sick_days: Option<i32>,
    pub protocol_code: Option<String>,
}

/// Inclusive day span of a vacation, weekends counted.
pub fn day_span(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days() + 1
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct LeaveRequestRow {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 1000)]
    pub user_id: u64,
    #[serde(rename = "type")]
    #[schema(example = "ferie")]
    pub leave_type: String,
    #[schema(example = "2024-06-03", format = "date", value_type = Option<String>)]
    pub start_date: Option<NaiveDate>,
    #[schema(example = "2024-06-07", format = "date", value_type = Option<String>)]
    pub end_date: Option<NaiveDate>,
    #[schema(example = "2024-06-03", format = "date", value_type = Option<String>)]
    pub permit_date: Option<NaiveDate>,
    #[schema(example = "09:00:00", value_type = Option<String>)]
    pub start_time: Option<NaiveTime>,
    #[schema(example = "13:00:00", value_type = Option<String>)]
    pub end_time: Option<NaiveTime>,
    #[schema(example = "2024-06-03", format = "date", value_type = Option<String>)]
    pub sick_start_date: Option<NaiveDate>,
    #[schema(example = 3)]
    pub sick_days: Option<i32>,
    #[schema(example = "PROT-2024-0042")]
    pub protocol_code: Option<String>,
    #[schema(example = "pending")]
    pub status: String,
    pub admin_notes: Option<String>,
    #[schema(example = "2024-06-01T08:30:00Z", format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
    #[schema(example = "2024-06-01T08:30:00Z", format = "date-time", value_type = String)]
    pub updated_at: DateTime<Utc>,
}

impl LeaveRequestRow {
    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending.as_str()
    }

    pub fn is_approved(&self) -> bool {
        self.status == RequestStatus::Approved.as_str()
    }

    /// Reconstructs the tagged variant from the stored columns. `None` for
    /// rows whose type tag and populated field group disagree; such rows
    /// cannot be produced through the API.
    pub fn kind(&self) -> Option<LeaveKind> {
        match LeaveType::from_str(&self.leave_type)? {
            LeaveType::Ferie => Some(LeaveKind::Vacation {
                start_date: self.start_date?,
                end_date: self.end_date?,
            }),
            LeaveType::Permesso => Some(LeaveKind::Permit {
                permit_date: self.permit_date?,
                start_time: self.start_time?,
                end_time: self.end_time?,
            }),
            LeaveType::Malattia => Some(LeaveKind::Sick {
                sick_start_date: self.sick_start_date?,
                sick_days: self.sick_days?,
                protocol_code: self.protocol_code.clone()?,
            }),
        }
    }
}

/// Admin listing of a request, enriched with the owner for display.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct AdminLeaveRequestRow {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub request: LeaveRequestRow,
    pub username: String,
    pub user_email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn day_span_is_inclusive() {
        assert_eq!(day_span(date(2024, 6, 3), date(2024, 6, 3)), 1);
        assert_eq!(day_span(date(2024, 6, 3), date(2024, 6, 7)), 5);
        // Weekend days count.
        assert_eq!(day_span(date(2024, 6, 7), date(2024, 6, 10)), 4);
    }

    #[test]
    fn leave_type_round_trips_through_wire_values() {
        for t in [LeaveType::Ferie, LeaveType::Permesso, LeaveType::Malattia] {
            assert_eq!(LeaveType::from_str(t.as_str()), Some(t));
        }
        assert_eq!(LeaveType::from_str("holiday"), None);
    }

    #[test]
    fn columns_populate_exactly_one_group() {
        let kind = LeaveKind::Permit {
            permit_date: date(2024, 3, 1),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
        };
        let cols = kind.columns();
        assert!(cols.permit_date.is_some());
        assert!(cols.start_time.is_some());
        assert!(cols.end_time.is_some());
        assert!(cols.start_date.is_none());
        assert!(cols.end_date.is_none());
        assert!(cols.sick_start_date.is_none());
        assert!(cols.sick_days.is_none());
        assert!(cols.protocol_code.is_none());
    }

    #[test]
    fn anchor_date_follows_the_variant() {
        let sick = LeaveKind::Sick {
            sick_start_date: date(2023, 12, 29),
            sick_days: 4,
            protocol_code: "PROT-1".into(),
        };
        assert_eq!(sick.anchor_date(), date(2023, 12, 29));
        assert_eq!(sick.anchor_year(), 2023);
    }

    #[test]
    fn row_kind_rejects_inconsistent_rows() {
        let row = LeaveRequestRow {
            id: 1,
            user_id: 7,
            leave_type: "ferie".into(),
            start_date: Some(date(2024, 6, 3)),
            end_date: None, // tag says vacation but the group is incomplete
            permit_date: None,
            start_time: None,
            end_time: None,
            sick_start_date: None,
            sick_days: None,
            protocol_code: None,
            status: "pending".into(),
            admin_notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(row.kind().is_none());
    }
}
