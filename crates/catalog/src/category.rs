use serde::{Deserialize, Serialize};

use hotelmenu_core::{CanonicalId, CategoryId, DomainError, DomainResult, Entity};

use crate::normalize::{is_valid_slug, normalize_name};

/// Menu grouping shared by all hotels (e.g. "breakfast", "suites").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
}

impl Category {
    pub fn create(id: CategoryId, name: &str, slug: &str) -> DomainResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("category name cannot be empty"));
        }
        if !is_valid_slug(slug) {
            return Err(DomainError::validation(format!("invalid slug '{slug}'")));
        }
        Ok(Self {
            id,
            name: name.to_string(),
            slug: slug.to_string(),
        })
    }
}

impl Entity for Category {
    type Id = CategoryId;

    fn id(&self) -> CategoryId {
        self.id
    }
}

/// The hotel-independent identity of a product, used to compare the same dish or
/// room type across hotels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalProduct {
    pub id: CanonicalId,
    pub name: String,
    pub sku: Option<String>,
    pub normalized_name: String,
}

impl CanonicalProduct {
    /// `normalized_name` is derived from `name` unless one is supplied.
    pub fn create(
        id: CanonicalId,
        name: &str,
        sku: Option<String>,
        normalized_name: Option<String>,
    ) -> DomainResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("canonical product name cannot be empty"));
        }
        let normalized_name = normalized_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| normalize_name(name));

        Ok(Self {
            id,
            name: name.to_string(),
            sku: sku.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
            normalized_name,
        })
    }
}

impl Entity for CanonicalProduct {
    type Id = CanonicalId;

    fn id(&self) -> CanonicalId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_derives_normalized_name() {
        let c = CanonicalProduct::create(CanonicalId::new(), "Pilau & Beef!", None, None).unwrap();
        assert_eq!(c.normalized_name, "pilau  beef");
    }

    #[test]
    fn canonical_keeps_explicit_normalized_name() {
        let c = CanonicalProduct::create(
            CanonicalId::new(),
            "Pilau",
            Some(" P-01 ".to_string()),
            Some("pilau rice".to_string()),
        )
        .unwrap();
        assert_eq!(c.normalized_name, "pilau rice");
        assert_eq!(c.sku.as_deref(), Some("P-01"));
    }

    #[test]
    fn category_requires_slug() {
        let err = Category::create(CategoryId::new(), "Breakfast", "").unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
