//! Startup seeding: makes sure the configured superuser account exists
//! and matches the configured credentials before the server accepts
//! traffic.

use uuid::Uuid;

use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::User;
use crate::db::types::UserRole;
use crate::repositories;

pub(crate) async fn ensure_superuser(state: &AppState) -> anyhow::Result<()> {
    let admin = state.settings().admin();
    if admin.first_superuser_password.is_empty() {
        tracing::warn!("FIRST_SUPERUSER_PASSWORD not configured; skipping superuser creation");
        return Ok(());
    }

    let username = admin.first_superuser_username.clone();
    match repositories::users::find_by_username(state.db(), &username).await? {
        Some(existing) => repair(state, existing, &admin.first_superuser_password).await,
        None => {
            let hashed_password = security::hash_password(&admin.first_superuser_password)?;
            let now = primitive_now_utc();
            repositories::users::create(
                state.db(),
                repositories::users::CreateUser {
                    id: &Uuid::new_v4().to_string(),
                    username: &username,
                    hashed_password,
                    full_name: "Super Admin",
                    role: UserRole::Admin,
                    branch: &admin.first_superuser_branch,
                    is_active: true,
                    created_at: now,
                    updated_at: now,
                },
            )
            .await?;
            tracing::info!("Created default superuser {username}");
            Ok(())
        }
    }
}

/// Brings an existing superuser row back in line with the configured
/// password, admin role, and active flag. No-op when nothing drifted.
async fn repair(state: &AppState, user: User, password: &str) -> anyhow::Result<()> {
    let password_ok =
        security::verify_password(password, &user.hashed_password).unwrap_or(false);
    let drifted = !password_ok || user.role != UserRole::Admin || !user.is_active;

    if !drifted {
        tracing::info!("Default superuser already up to date");
        return Ok(());
    }

    let hashed_password =
        if password_ok { user.hashed_password.clone() } else { security::hash_password(password)? };

    sqlx::query(
        "UPDATE users
         SET hashed_password = $1, role = $2, is_active = TRUE, updated_at = $3
         WHERE id = $4",
    )
    .bind(hashed_password)
    .bind(UserRole::Admin)
    .bind(primitive_now_utc())
    .bind(&user.id)
    .execute(state.db())
    .await?;

    tracing::info!(username = %user.username, "Updated default superuser");
    Ok(())
}
