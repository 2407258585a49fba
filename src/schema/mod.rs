//! Schema registry.
//!
//! Schemas describe each entity kind (fields, labels, validation). At startup
//! every schema is resolved into an [`EntityPolicy`] holding the behavior the
//! server needs at request time: which fields are secrets, which are
//! required, how ids are minted, and how deletes are applied.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::storage::{validate_collection_name, Record};

/// Collections owned by dedicated modules; schemas may not claim them.
pub const RESERVED_COLLECTIONS: &[&str] = &["data-relations", "relation-types", "schemas"];

const BUILTIN_SCHEMAS: &str = include_str!("builtin.json");

/// File in the data directory that replaces the built-in schemas when present.
pub const SCHEMA_FILE: &str = "all-schemas.json";

/// Role marking a field whose value is a secret.
pub const PASSWORD_ROLE: &str = "password";

/// Shape of one entity kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    pub id: String,
    pub singular_name: String,
    pub plural_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
    #[serde(default)]
    pub delete_policy: DeletePolicy,
    #[serde(default)]
    pub id_strategy: IdStrategy,
}

/// A single field of a schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type", default = "default_field_type")]
    pub field_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

fn default_field_type() -> String {
    "text".to_string()
}

/// Value kinds the server checks; everything else is accepted as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Boolean,
    Email,
    Date,
    Select,
    Password,
    Other,
}

impl FieldDefinition {
    pub fn kind(&self) -> FieldKind {
        match self.field_type.as_str() {
            "text" | "textarea" | "string" => FieldKind::Text,
            "number" | "currency" | "integer" => FieldKind::Number,
            "boolean" | "checkbox" | "switch" => FieldKind::Boolean,
            "email" => FieldKind::Email,
            "date" | "datetime" => FieldKind::Date,
            "select" | "radio" => FieldKind::Select,
            "password" => FieldKind::Password,
            _ => FieldKind::Other,
        }
    }

    pub fn is_password(&self) -> bool {
        self.role.as_deref() == Some(PASSWORD_ROLE) || self.kind() == FieldKind::Password
    }

    fn display_name(&self) -> &str {
        if self.label.is_empty() {
            &self.name
        } else {
            &self.label
        }
    }
}

/// How DELETE is applied to an entity kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum DeletePolicy {
    /// Remove the record from its collection.
    #[default]
    Hard,
    /// Keep the record and set `field` to `value`.
    Soft { field: String, value: String },
}

/// How ids are assigned when a create request carries none.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum IdStrategy {
    #[default]
    Ulid,
    /// `<prefix><n>`, `n` zero-padded to `width` digits.
    Sequential {
        prefix: String,
        #[serde(default)]
        width: usize,
    },
}

/// A schema resolved into typed request-time behavior.
#[derive(Debug, Clone)]
pub struct EntityPolicy {
    pub schema: Schema,
    pub password_fields: Vec<String>,
    pub required_fields: Vec<String>,
}

impl EntityPolicy {
    pub fn resolve(schema: Schema) -> Self {
        let password_fields = schema
            .fields
            .iter()
            .filter(|f| f.is_password())
            .map(|f| f.name.clone())
            .collect();
        let required_fields = schema
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.clone())
            .collect();
        Self {
            schema,
            password_fields,
            required_fields,
        }
    }

    pub fn id(&self) -> &str {
        &self.schema.id
    }

    pub fn singular_name(&self) -> &str {
        &self.schema.singular_name
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.schema.fields.iter().find(|f| f.name == name)
    }

    pub fn is_password_field(&self, name: &str) -> bool {
        self.password_fields.iter().any(|f| f == name)
    }

    pub fn delete_policy(&self) -> &DeletePolicy {
        &self.schema.delete_policy
    }

    pub fn id_strategy(&self) -> &IdStrategy {
        &self.schema.id_strategy
    }

    /// Remove secret fields before a record leaves the server.
    pub fn strip_sensitive(&self, mut record: Record) -> Record {
        for field in &self.password_fields {
            record.remove(field);
        }
        record
    }

    /// Check required fields on a full record (create).
    pub fn validate_required(&self, record: &Record) -> Result<(), AppError> {
        let missing: Vec<&str> = self
            .required_fields
            .iter()
            .filter(|name| is_blank(record.get(name.as_str())))
            .filter_map(|name| self.field(name))
            .map(FieldDefinition::display_name)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )))
        }
    }

    /// Check the values present in `record` against their declared kinds.
    ///
    /// Null or blank values are accepted for optional fields only.
    pub fn validate_types(&self, record: &Record) -> Result<(), AppError> {
        for (name, value) in record {
            let Some(field) = self.field(name) else {
                continue;
            };
            if field.required && is_blank(Some(value)) {
                return Err(AppError::Validation(format!(
                    "{} is required",
                    field.display_name()
                )));
            }
            if value.is_null() {
                continue;
            }
            check_value(field, value)?;
        }
        Ok(())
    }
}

fn is_blank(value: Option<&serde_json::Value>) -> bool {
    match value {
        None | Some(serde_json::Value::Null) => true,
        Some(serde_json::Value::String(s)) => s.trim().is_empty(),
        _ => false,
    }
}

fn check_value(field: &FieldDefinition, value: &serde_json::Value) -> Result<(), AppError> {
    use serde_json::Value;

    let invalid = |expected: &str| {
        Err(AppError::Validation(format!(
            "{} must be {}",
            field.display_name(),
            expected
        )))
    };

    match field.kind() {
        FieldKind::Number => match value {
            Value::Number(_) => Ok(()),
            Value::String(s) if s.trim().parse::<f64>().is_ok() => Ok(()),
            _ => invalid("a number"),
        },
        FieldKind::Boolean => match value {
            Value::Bool(_) => Ok(()),
            _ => invalid("true or false"),
        },
        FieldKind::Email => match value.as_str() {
            Some(s) if is_plausible_email(s) => Ok(()),
            Some(s) if s.is_empty() && !field.required => Ok(()),
            _ => invalid("a valid email address"),
        },
        FieldKind::Date => match value.as_str() {
            Some(s) if crate::service::parse_date_bound(s, false).is_some() => Ok(()),
            Some(s) if s.is_empty() && !field.required => Ok(()),
            _ => invalid("a date"),
        },
        FieldKind::Select => match (&field.options, value.as_str()) {
            (Some(options), Some(s)) if options.iter().any(|o| o == s) => Ok(()),
            (None, Some(_)) => Ok(()),
            (Some(options), _) => invalid(&format!("one of: {}", options.join(", "))),
            (None, None) => invalid("a string"),
        },
        FieldKind::Password => match value.as_str() {
            Some(s) if !s.is_empty() => Ok(()),
            _ => invalid("a non-empty string"),
        },
        FieldKind::Text | FieldKind::Other => Ok(()),
    }
}

fn is_plausible_email(s: &str) -> bool {
    match s.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        }
        None => false,
    }
}

/// All known schemas, keyed by id.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, Arc<EntityPolicy>>,
}

impl SchemaRegistry {
    /// Load `all-schemas.json` from the data directory, or the built-in set when absent.
    pub fn load(data_dir: &Path) -> Result<Self, AppError> {
        let path = data_dir.join(SCHEMA_FILE);
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                tracing::info!("Loading schemas from {:?}", path);
                let schemas: Vec<Schema> = serde_json::from_str(&contents).map_err(|e| {
                    AppError::Storage(format!("Malformed schema file {:?}: {}", path, e))
                })?;
                Self::from_schemas(schemas)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::builtin(),
            Err(e) => Err(e.into()),
        }
    }

    /// The schemas compiled into the binary.
    pub fn builtin() -> Result<Self, AppError> {
        let schemas: Vec<Schema> = serde_json::from_str(BUILTIN_SCHEMAS)?;
        Self::from_schemas(schemas)
    }

    pub fn from_schemas(schemas: Vec<Schema>) -> Result<Self, AppError> {
        let mut map = BTreeMap::new();
        for schema in schemas {
            validate_collection_name(&schema.id)?;
            if RESERVED_COLLECTIONS.contains(&schema.id.as_str()) {
                return Err(AppError::Validation(format!(
                    "Schema id '{}' is reserved",
                    schema.id
                )));
            }
            if let DeletePolicy::Soft { field, .. } = &schema.delete_policy {
                if field == "id" || field == "createdAt" {
                    return Err(AppError::Validation(format!(
                        "Schema '{}' cannot soft-delete through '{}'",
                        schema.id, field
                    )));
                }
            }
            let id = schema.id.clone();
            if map
                .insert(id.clone(), Arc::new(EntityPolicy::resolve(schema)))
                .is_some()
            {
                return Err(AppError::Validation(format!(
                    "Duplicate schema id '{}'",
                    id
                )));
            }
        }
        Ok(Self { schemas: map })
    }

    /// Resolve a schema id, failing with `NotFound` for unknown ids.
    pub fn get(&self, schema_id: &str) -> Result<Arc<EntityPolicy>, AppError> {
        self.schemas
            .get(schema_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Schema '{}' not found", schema_id)))
    }

    pub fn contains(&self, schema_id: &str) -> bool {
        self.schemas.contains_key(schema_id)
    }

    pub fn schemas(&self) -> impl Iterator<Item = &Schema> {
        self.schemas.values().map(|p| &p.schema)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_builtin_schemas_resolve() {
        let registry = SchemaRegistry::builtin().unwrap();
        assert!(registry.contains("vendors"));
        assert!(registry.contains("purchase-orders"));
        assert!(registry.contains("companies"));

        let users = registry.get("users").unwrap();
        assert_eq!(users.password_fields, vec!["password".to_string()]);
        assert!(users.is_password_field("password"));

        let orders = registry.get("purchase-orders").unwrap();
        assert_eq!(
            orders.delete_policy(),
            &DeletePolicy::Soft {
                field: "status".into(),
                value: "cancelled".into()
            }
        );
        assert_eq!(registry.get("vendors").unwrap().delete_policy(), &DeletePolicy::Hard);
    }

    #[test]
    fn test_unknown_schema_is_not_found() {
        let registry = SchemaRegistry::builtin().unwrap();
        assert!(matches!(
            registry.get("spaceships"),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_reserved_and_duplicate_ids_rejected() {
        let schema = |id: &str| Schema {
            id: id.to_string(),
            singular_name: "X".into(),
            plural_name: "Xs".into(),
            description: None,
            fields: vec![],
            delete_policy: DeletePolicy::Hard,
            id_strategy: IdStrategy::Ulid,
        };
        assert!(SchemaRegistry::from_schemas(vec![schema("data-relations")]).is_err());
        assert!(SchemaRegistry::from_schemas(vec![schema("a"), schema("a")]).is_err());
        assert!(SchemaRegistry::from_schemas(vec![schema("a"), schema("b")]).is_ok());
    }

    #[test]
    fn test_required_fields() {
        let registry = SchemaRegistry::builtin().unwrap();
        let vendors = registry.get("vendors").unwrap();

        let err = vendors
            .validate_required(&record(json!({"name": "  "})))
            .unwrap_err();
        assert_eq!(
            err,
            AppError::Validation("Missing required fields: Name, Email".into())
        );
        assert!(vendors
            .validate_required(&record(json!({"name": "Acme", "email": "a@acme.io"})))
            .is_ok());
    }

    #[test]
    fn test_type_checks() {
        let registry = SchemaRegistry::builtin().unwrap();
        let vendors = registry.get("vendors").unwrap();

        assert!(vendors
            .validate_types(&record(json!({"rating": 4, "status": "active"})))
            .is_ok());
        assert!(vendors
            .validate_types(&record(json!({"rating": "lots"})))
            .is_err());
        assert!(vendors
            .validate_types(&record(json!({"status": "archived"})))
            .is_err());
        assert!(vendors
            .validate_types(&record(json!({"email": "not-an-email"})))
            .is_err());
        assert!(vendors
            .validate_types(&record(json!({"email": null})))
            .is_err());
        assert!(vendors
            .validate_types(&record(json!({"phone": null, "unknown": [1, 2]})))
            .is_ok());
    }

    #[test]
    fn test_strip_sensitive() {
        let registry = SchemaRegistry::builtin().unwrap();
        let users = registry.get("users").unwrap();
        let stripped = users.strip_sensitive(record(json!({
            "id": "u1",
            "password": "$argon2id$...",
            "hashType": "argon2"
        })));
        assert!(!stripped.contains_key("password"));
        assert_eq!(stripped["hashType"], "argon2");
    }

    #[test]
    fn test_schema_file_overrides_builtin() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(SCHEMA_FILE),
            json!([{
                "id": "contracts",
                "singularName": "Contract",
                "pluralName": "Contracts",
                "fields": [{"name": "title", "required": true}]
            }])
            .to_string(),
        )
        .unwrap();

        let registry = SchemaRegistry::load(dir.path()).unwrap();
        assert_eq!(registry.len(), 1);
        let contracts = registry.get("contracts").unwrap();
        assert_eq!(contracts.id_strategy(), &IdStrategy::Ulid);
        assert_eq!(contracts.required_fields, vec!["title".to_string()]);
    }
}
