use anyhow::Context;

use crate::config::{AppConfig, StoreBackend};
use crate::handlers::users::{insert_user, UserPayload};
use crate::state::AppState;

pub async fn handle(
    config: AppConfig,
    name: String,
    email: String,
    password: String,
    phone: String,
) -> anyhow::Result<()> {
    if config.database.backend == StoreBackend::Memory {
        anyhow::bail!("an admin created in the memory backend would be lost on exit");
    }

    let state = AppState::from_config(config)
        .await
        .context("failed to initialise storage")?;

    let payload = UserPayload {
        name: Some(name),
        email: Some(email),
        password: Some(password),
        phone: Some(phone),
        is_admin: true,
        ..UserPayload::default()
    };

    let user = insert_user(&state, payload)
        .await
        .context("failed to create admin")?;

    if let Some(database) = &state.database {
        database.close().await;
    }

    println!("Created admin {} <{}>", user.id, user.email);
    Ok(())
}
