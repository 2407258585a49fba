//! Typed links between entities of (possibly) different schemas.

use serde::{Deserialize, Serialize};

/// A directed, typed link `(sourceSchema, sourceId) -> (targetSchema, targetId)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    pub id: String,
    pub source_schema: String,
    pub source_id: String,
    pub target_schema: String,
    pub target_id: String,
    pub relation_type_id: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Request body for creating a relation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRelationRequest {
    #[serde(default)]
    pub source_schema: Option<String>,
    #[serde(default)]
    pub source_id: Option<String>,
    #[serde(default)]
    pub target_schema: Option<String>,
    #[serde(default)]
    pub target_id: Option<String>,
    #[serde(default)]
    pub relation_type_id: Option<String>,
}

/// Optional equality filters over relation fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationQuery {
    pub source_schema: Option<String>,
    pub source_id: Option<String>,
    pub target_schema: Option<String>,
    pub target_id: Option<String>,
    pub relation_type_id: Option<String>,
}

impl RelationQuery {
    pub fn matches(&self, relation: &Relation) -> bool {
        fn eq(filter: &Option<String>, value: &str) -> bool {
            filter.as_deref().map_or(true, |f| f == value)
        }

        eq(&self.source_schema, &relation.source_schema)
            && eq(&self.source_id, &relation.source_id)
            && eq(&self.target_schema, &relation.target_schema)
            && eq(&self.target_id, &relation.target_id)
            && eq(&self.relation_type_id, &relation.relation_type_id)
    }
}
