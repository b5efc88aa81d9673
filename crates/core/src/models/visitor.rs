use serde::{Deserialize, Serialize};

/// 访问者
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visitor {
    pub client_id: String,
    pub name: String,
    /// 管理员不受租户限制
    pub admin: bool,
}

impl Visitor {
    pub fn tenant(client_id: impl Into<String>) -> Self {
        let client_id = client_id.into();
        Self {
            name: client_id.clone(),
            client_id,
            admin: false,
        }
    }

    pub fn admin() -> Self {
        Self {
            client_id: String::new(),
            name: "admin".to_string(),
            admin: true,
        }
    }

    /// 是否可以访问指定租户的记录
    pub fn can_access(&self, tenant_id: &str) -> bool {
        self.admin || self.client_id == tenant_id
    }
}
