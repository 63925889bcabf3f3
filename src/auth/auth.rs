use crate::config::Config;
use crate::errors::ApiError;
use crate::model::role::Role;
use crate::models::Claims;
use actix_web::{FromRequest, HttpRequest, dev::Payload, error::ErrorUnauthorized, web::Data};
use futures::future::{Ready, ready};
use jsonwebtoken::{DecodingKey, Validation, decode};

/// Authenticated caller identity, extracted from the bearer token.
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let token = match req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
        {
            Some(t) => t,
            None => return ready(Err(ErrorUnauthorized("Missing token"))),
        };

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => {
                return ready(Err(actix_web::error::ErrorInternalServerError(
                    "Config missing",
                )));
            }
        };

        let data = match decode::<Claims>(
            token,
            &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            &Validation::default(),
        ) {
            Ok(d) => d,
            Err(_) => return ready(Err(ErrorUnauthorized("Invalid token"))),
        };

        let role = match Role::from_id(data.claims.role) {
            Some(r) => r,
            None => return ready(Err(ErrorUnauthorized("Invalid role"))),
        };

        ready(Ok(AuthUser {
            user_id: data.claims.sub,
            username: data.claims.username,
            role,
        }))
    }
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Admin only".into()))
        }
    }

    /// Leave requests belong to employees; the admin account never owns one.
    pub fn require_employee(&self) -> Result<(), ApiError> {
        if self.role == Role::Employee {
            Ok(())
        } else {
            Err(ApiError::Forbidden(
                "Only employees can submit leave requests".into(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(role: Role) -> AuthUser {
        AuthUser {
            user_id: 1,
            username: "someone".into(),
            role,
        }
    }

    #[test]
    fn admin_gate() {
        assert!(caller(Role::Admin).require_admin().is_ok());
        assert!(matches!(
            caller(Role::Employee).require_admin(),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn employee_gate_excludes_admin() {
        assert!(caller(Role::Employee).require_employee().is_ok());
        assert!(matches!(
            caller(Role::Admin).require_employee(),
            Err(ApiError::Forbidden(_))
        ));
    }
}
