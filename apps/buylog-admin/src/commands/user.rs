use buylog_storage::{CreateUserParams, StoreError};

use super::Context;

pub async fn cmd_user_add(
    ctx: &Context,
    login: &str,
    credential_hash: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let params = CreateUserParams {
        login: login.to_string(),
        credential_hash: credential_hash.to_string(),
    };
    let id = match ctx.store.create_user(&params).await {
        Ok(id) => id,
        Err(StoreError::AlreadyExists) => {
            return Err(format!("User '{}' already exists", login).into())
        }
        Err(e) => return Err(e.into()),
    };

    println!("✓ User '{}' created (ID: {})", login, id);
    Ok(())
}
