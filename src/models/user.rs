use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Stylist,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Stylist => "stylist",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "admin" => Role::Admin,
            "stylist" => Role::Stylist,
            _ => Role::Customer,
        }
    }
}

/// Contact details a guest supplies instead of an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuestContact {
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl GuestContact {
    pub fn is_complete(&self) -> bool {
        !self.name.trim().is_empty()
            && self.email.contains('@')
            && !self.phone.trim().is_empty()
    }
}

/// Identity of whoever issued the request, as established upstream.
#[derive(Debug, Clone, Default)]
pub struct Caller {
    pub user_id: Option<String>,
    pub is_admin: bool,
}

impl Caller {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(id: &str) -> Self {
        Self {
            user_id: Some(id.to_string()),
            is_admin: false,
        }
    }

    pub fn admin() -> Self {
        Self {
            user_id: None,
            is_admin: true,
        }
    }

    pub fn is(&self, user_id: Option<&str>) -> bool {
        matches!((self.user_id.as_deref(), user_id), (Some(a), Some(b)) if a == b)
    }
}
