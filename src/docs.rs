use crate::api::admin::{
    AdminSettingsDto, CreateEmployeeDto, DashboardStats, DecisionPayload, EmployeeSummary,
};
use crate::api::leave_request::LeaveRequestPayload;
use crate::api::stats::YearStats;
use crate::model::leave_request::{LeaveRequestRow, LeaveType, RequestStatus};
use crate::models::{ChangePasswordDto, LoginReqDto, LoginResponse, UserProfile};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Leave Management API",
        version = "1.0.0",
        description = r#"
## Leave Management System

Employees submit vacation (ferie), permit (permesso) and sick-leave
(malattia) requests; an administrator approves or rejects them and
follows aggregate statistics.

### Security
All endpoints except `/login` require a JWT bearer token.
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::change_password,

        crate::api::leave_request::create_request,
        crate::api::leave_request::list_requests,
        crate::api::leave_request::update_request,
        crate::api::leave_request::delete_request,

        crate::api::stats::years,
        crate::api::stats::stats,

        crate::api::admin::dashboard,
        crate::api::admin::decide_request,
        crate::api::admin::create_employee,
        crate::api::admin::list_employees,
        crate::api::admin::update_settings
    ),
    components(
        schemas(
            LoginReqDto,
            LoginResponse,
            UserProfile,
            ChangePasswordDto,
            LeaveRequestPayload,
            LeaveRequestRow,
            LeaveType,
            RequestStatus,
            YearStats,
            DashboardStats,
            DecisionPayload,
            CreateEmployeeDto,
            EmployeeSummary,
            AdminSettingsDto
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login and password management"),
        (name = "Requests", description = "Employee leave request APIs"),
        (name = "Stats", description = "Yearly statistics APIs"),
        (name = "Admin", description = "Administrator APIs"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
