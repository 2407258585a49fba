//! Relation type model: the category a relation belongs to.

use serde::{Deserialize, Serialize};

/// Whether a relation reads the same from both ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationDirection {
    /// Source to target only
    #[default]
    Forward,
    Bidirectional,
}

/// A relation category such as `SUPPLIES` or `AWARDED_TO`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationType {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default)]
    pub direction: RelationDirection,
    pub created_at: String,
    pub updated_at: String,
}

/// Request body for creating a relation type.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRelationTypeRequest {
    /// Derived from `label` when omitted
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub direction: Option<RelationDirection>,
}

/// Request body for updating a relation type. `id` and `createdAt` are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRelationTypeRequest {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub direction: Option<RelationDirection>,
}

/// Turn a label like "Supplies to" into an id like `SUPPLIES_TO`.
pub fn relation_type_id_from_label(label: &str) -> String {
    let mut id = String::with_capacity(label.len());
    for c in label.trim().chars() {
        if c.is_ascii_alphanumeric() {
            id.push(c.to_ascii_uppercase());
        } else if !id.ends_with('_') && !id.is_empty() {
            id.push('_');
        }
    }
    id.trim_end_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_from_label() {
        assert_eq!(relation_type_id_from_label("Supplies"), "SUPPLIES");
        assert_eq!(relation_type_id_from_label("  awarded to! "), "AWARDED_TO");
        assert_eq!(relation_type_id_from_label("PO -> Invoice"), "PO_INVOICE");
        assert_eq!(relation_type_id_from_label("!!"), "");
    }
}
