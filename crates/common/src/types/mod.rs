use serde::{Deserialize, Serialize};

/// Liveness payload returned by every `/health` endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Health {
    pub status: String,
    pub service: String,
}

impl Health {
    pub fn healthy(service: &str) -> Self {
        Self { status: "healthy".into(), service: service.into() }
    }
}

/// Failure payload shared by all JSON endpoints: `{success: false, error}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub success: bool,
    pub error: String,
}

impl Failure {
    pub fn new(error: impl Into<String>) -> Self {
        Self { success: false, error: error.into() }
    }
}

/// `/ready` payload when the backing resource is unusable.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct NotReady {
    pub status: String,
    pub error: String,
}

impl NotReady {
    pub fn new(error: impl Into<String>) -> Self {
        Self { status: "not ready".into(), error: error.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_serializes_with_success_false() {
        let v = serde_json::to_value(Failure::new("boom")).unwrap();
        assert_eq!(v, serde_json::json!({"success": false, "error": "boom"}));
    }

    #[test]
    fn health_payload_names_service() {
        let h = Health::healthy("frontend");
        assert_eq!(h.status, "healthy");
        assert_eq!(h.service, "frontend");
    }
}
