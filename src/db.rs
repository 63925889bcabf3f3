use crate::auth::password::hash_password;
use crate::model::role::Role;
use chrono::Utc;
use sqlx::MySqlPool;
use tracing::warn;

pub async fn init_db(database_url: &str) -> MySqlPool {
    MySqlPool::connect(database_url)
        .await
        .expect("Failed to connect to database")
}

/// Provisions the default admin account on first start so the system is
/// reachable before any employee exists. The default password must be
/// changed through /change-password.
pub async fn ensure_admin_account(pool: &MySqlPool) -> Result<(), sqlx::Error> {
    let admin_exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM users WHERE role_id = ? LIMIT 1)",
    )
    .bind(Role::Admin.id())
    .fetch_one(pool)
    .await?;

    if admin_exists {
        return Ok(());
    }

    sqlx::query(
        r#"
        INSERT INTO users (username, email, password_hash, role_id, is_active, created_at)
        VALUES (?, ?, ?, ?, TRUE, ?)
        "#,
    )
    .bind("admin")
    .bind("admin@company.com")
    .bind(hash_password("admin123"))
    .bind(Role::Admin.id())
    .bind(Utc::now())
    .execute(pool)
    .await?;

    warn!("Admin account created with default credentials (admin/admin123) - change the password");

    Ok(())
}
