use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct LoginReqDto {
    #[schema(example = "mrossi")]
    pub username: String,
    #[schema(example = "secret123")]
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct UserProfile {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "mrossi")]
    pub username: String,
    #[schema(example = "m.rossi@company.com")]
    pub email: String,
    #[schema(example = "employee")]
    pub role: String,
}

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    #[schema(example = "bearer")]
    pub token_type: String,
    pub user: UserProfile,
}

#[derive(Deserialize, ToSchema)]
pub struct ChangePasswordDto {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id of the bearer.
    pub sub: u64,
    pub username: String,
    /// Role id, see `model::role::Role`.
    pub role: u8,
    pub exp: usize,
    pub jti: String,
}
