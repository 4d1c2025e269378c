use std::collections::HashMap;

pub(crate) const SERVICE_NAME: &str = "keepup-session";

/// A remembered sign-in: enough to refresh without asking for the password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedSession {
    pub email: String,
    pub refresh_token: String,
}

/// Store the refresh token for `backend` in the system keyring via Secret
/// Service.
pub async fn store_session(backend: &str, session: &SavedSession) -> Result<(), String> {
    let keyring = oo7::Keyring::new()
        .await
        .map_err(|e| format!("Failed to connect to keyring: {}", e))?;

    let mut attrs = HashMap::new();
    attrs.insert("service", SERVICE_NAME);
    attrs.insert("backend", backend);

    let secret = format!("{}\n{}", session.email, session.refresh_token);

    keyring
        .create_item(
            &format!("KeepUp session ({})", session.email),
            &attrs,
            secret.as_bytes(),
            true,
        )
        .await
        .map_err(|e| format!("Failed to store session: {}", e))?;

    Ok(())
}

pub async fn load_session(backend: &str) -> Result<Option<SavedSession>, String> {
    let keyring = oo7::Keyring::new()
        .await
        .map_err(|e| format!("Failed to connect to keyring: {}", e))?;

    let mut attrs = HashMap::new();
    attrs.insert("service", SERVICE_NAME);
    attrs.insert("backend", backend);

    let items = keyring
        .search_items(&attrs)
        .await
        .map_err(|e| format!("Failed to search keyring: {}", e))?;

    let Some(item) = items.first() else {
        return Ok(None);
    };
    let secret_bytes = item
        .secret()
        .await
        .map_err(|e| format!("Failed to read secret: {}", e))?;
    let secret = String::from_utf8(secret_bytes.to_vec())
        .map_err(|e| format!("Invalid UTF-8 in secret: {}", e))?;
    Ok(parse_secret(&secret))
}

/// Forget the remembered session, e.g. on sign-out.
pub async fn delete_session(backend: &str) -> Result<(), String> {
    let keyring = oo7::Keyring::new()
        .await
        .map_err(|e| format!("Failed to connect to keyring: {}", e))?;

    let mut attrs = HashMap::new();
    attrs.insert("service", SERVICE_NAME);
    attrs.insert("backend", backend);

    let items = keyring
        .search_items(&attrs)
        .await
        .map_err(|e| format!("Failed to search keyring: {}", e))?;

    for item in items {
        item.delete()
            .await
            .map_err(|e| format!("Failed to delete session: {}", e))?;
    }

    Ok(())
}

fn parse_secret(secret: &str) -> Option<SavedSession> {
    let (email, token) = secret.split_once('\n')?;
    if email.is_empty() || token.is_empty() {
        return None;
    }
    Some(SavedSession {
        email: email.to_string(),
        refresh_token: token.to_string(),
    })
}
