use base64::Engine;
use hmac::{Hmac, Mac};
use rand::distributions::Alphanumeric;
use rand::Rng;
use rusqlite::Connection;
use sha1::Sha1;

use crate::db::queries;
use crate::models::{GuestContact, Role, User};

const CREDENTIAL_LEN: usize = 12;

pub fn generate_credential() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CREDENTIAL_LEN)
        .map(char::from)
        .collect()
}

pub fn credential_digest(salt: &str, credential: &str) -> anyhow::Result<String> {
    let mut mac = Hmac::<Sha1>::new_from_slice(salt.as_bytes())
        .map_err(|_| anyhow::anyhow!("invalid credential salt"))?;
    mac.update(credential.as_bytes());
    Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

/// The account behind a guest booking, plus the one-time credential when it was just created.
pub struct GuestAccount {
    pub user: User,
    pub new_credential: Option<String>,
}

/// Reuses the account registered under the guest's email, otherwise provisions a
/// customer account with a random credential.
pub fn resolve_guest(conn: &Connection, contact: &GuestContact) -> anyhow::Result<GuestAccount> {
    if let Some(user) = queries::find_user_by_email(conn, &contact.email)? {
        return Ok(GuestAccount {
            user,
            new_credential: None,
        });
    }

    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        name: contact.name.trim().to_string(),
        email: Some(contact.email.trim().to_lowercase()),
        phone: Some(contact.phone.trim().to_string()),
        role: Role::Customer,
    };
    let credential = generate_credential();
    let salt = uuid::Uuid::new_v4().simple().to_string();
    let digest = credential_digest(&salt, &credential)?;
    queries::insert_user(conn, &user, Some((salt.as_str(), digest.as_str())))?;

    tracing::info!(user_id = %user.id, "provisioned guest account");
    Ok(GuestAccount {
        user,
        new_credential: Some(credential),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn contact(email: &str) -> GuestContact {
        GuestContact {
            name: "Grace Guest".to_string(),
            email: email.to_string(),
            phone: "+15550001111".to_string(),
        }
    }

    #[test]
    fn test_credential_shape_and_digest() {
        let a = generate_credential();
        let b = generate_credential();
        assert_eq!(a.len(), CREDENTIAL_LEN);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);

        let d1 = credential_digest("salt", &a).unwrap();
        assert_eq!(d1, credential_digest("salt", &a).unwrap());
        assert_ne!(d1, credential_digest("pepper", &a).unwrap());
    }

    #[test]
    fn test_guest_reuses_account_by_email() {
        let conn = db::init_db(":memory:").unwrap();

        let first = resolve_guest(&conn, &contact("grace@example.com")).unwrap();
        assert!(first.new_credential.is_some());

        let second = resolve_guest(&conn, &contact("Grace@Example.com")).unwrap();
        assert!(second.new_credential.is_none());
        assert_eq!(second.user.id, first.user.id);
    }
}
