// ABOUTME: Application platform records the migrator knows how to move
// ABOUTME: Each record maps onto one table and derives its primary key from its fields

use super::{BaseModel, Model};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Application delivered by the platform
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Application {
    #[serde(flatten)]
    pub base: BaseModel,
    pub name: String,
    pub alias: String,
    pub project: String,
    pub description: String,
    pub icon: String,
    pub labels: BTreeMap<String, String>,
}

impl Model for Application {
    const TABLE_NAME: &'static str = "vela_application";

    fn key(&self) -> String {
        self.name.clone()
    }
}

/// Component of an application, keyed by the owning application and its own name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplicationComponent {
    #[serde(flatten)]
    pub base: BaseModel,
    pub app_primary_key: String,
    pub name: String,
    pub alias: String,
    pub description: String,
    #[serde(rename = "type")]
    pub component_type: String,
    pub main: bool,
    pub depends_on: Vec<String>,
    pub properties: BTreeMap<String, JsonValue>,
}

impl Model for ApplicationComponent {
    const TABLE_NAME: &'static str = "vela_application_component";

    fn key(&self) -> String {
        format!("{}-{}", self.app_primary_key, self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Project {
    #[serde(flatten)]
    pub base: BaseModel,
    pub name: String,
    pub alias: String,
    pub owner: String,
    pub description: String,
    pub namespace: String,
}

impl Model for Project {
    const TABLE_NAME: &'static str = "vela_project";

    fn key(&self) -> String {
        self.name.clone()
    }
}

/// Deployment environment grouping one or more targets
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Environment {
    #[serde(flatten)]
    pub base: BaseModel,
    pub name: String,
    pub alias: String,
    pub description: String,
    pub project: String,
    pub namespace: String,
    pub targets: Vec<String>,
}

impl Model for Environment {
    const TABLE_NAME: &'static str = "vela_env";

    fn key(&self) -> String {
        self.name.clone()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterTarget {
    pub cluster_name: String,
    pub namespace: String,
}

/// Delivery target, usually a namespace on a cluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Target {
    #[serde(flatten)]
    pub base: BaseModel,
    pub name: String,
    pub alias: String,
    pub description: String,
    pub project: String,
    pub cluster: Option<ClusterTarget>,
}

impl Model for Target {
    const TABLE_NAME: &'static str = "vela_target";

    fn key(&self) -> String {
        self.name.clone()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Cluster {
    #[serde(flatten)]
    pub base: BaseModel,
    pub name: String,
    pub alias: String,
    pub description: String,
    pub icon: String,
    pub labels: BTreeMap<String, String>,
    pub status: String,
    pub reason: String,
    pub provider: String,
    pub api_server_url: String,
}

impl Model for Cluster {
    const TABLE_NAME: &'static str = "vela_cluster";

    fn key(&self) -> String {
        self.name.clone()
    }
}

/// Platform user account
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct User {
    #[serde(flatten)]
    pub base: BaseModel,
    pub name: String,
    pub alias: String,
    pub email: String,
    pub password: String,
    pub disabled: bool,
    pub user_roles: Vec<String>,
    pub last_login_time: Option<DateTime<Utc>>,
}

impl Model for User {
    const TABLE_NAME: &'static str = "vela_user";

    fn key(&self) -> String {
        self.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Entity;

    #[test]
    fn test_component_key_includes_application() {
        let component = ApplicationComponent {
            app_primary_key: "app1".to_string(),
            name: "frontend".to_string(),
            ..Default::default()
        };
        assert_eq!(component.primary_key(), "app1-frontend");
        assert_eq!(component.table_name(), "vela_application_component");
    }

    #[test]
    fn test_component_type_field_name() {
        let component = ApplicationComponent {
            component_type: "webservice".to_string(),
            ..Default::default()
        };
        let document = component.to_document().unwrap();
        assert_eq!(document["type"], "webservice");
        assert!(!document.contains_key("componentType"));
    }

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let document = serde_json::json!({ "name": "user1", "alias": "newUser" });
        let user: User = serde_json::from_value(document).unwrap();
        assert_eq!(user.name, "user1");
        assert!(user.user_roles.is_empty());
        assert!(user.last_login_time.is_none());
    }
}
