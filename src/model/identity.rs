use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Customer,
    Admin,
    Supervisor,
}

impl Role {
    pub fn is_elevated(self) -> bool {
        matches!(self, Role::Admin | Role::Supervisor)
    }
}

/// Caller identity resolved by the identity backend. Lives for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub customer_id: u64,
    #[serde(default)]
    pub email: String,
    pub role: Role,
}

impl Identity {
    pub fn is_elevated(&self) -> bool {
        self.role.is_elevated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_format() {
        let identity: Identity = serde_json::from_str(
            r#"{"customer_id": 3, "email": "a@b.c", "role": "SUPERVISOR"}"#,
        )
        .unwrap();
        assert_eq!(identity.role, Role::Supervisor);
        assert!(identity.is_elevated());
        assert!(!Role::Customer.is_elevated());
    }
}
