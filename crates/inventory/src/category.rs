//! Two-level category tree.

use serde::{Deserialize, Serialize};

use stockledger_core::{CategoryId, DomainError, DomainResult, Entity, ItemId};

use crate::registry::normalize_name;

/// Maximum number of root categories.
pub const MAX_ROOT_CATEGORIES: u64 = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    /// `None` for a root category.
    pub parent_id: Option<CategoryId>,
}

impl Category {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

impl Entity for Category {
    const KIND: &'static str = "category";
    type Id = CategoryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub parent_id: Option<CategoryId>,
}

impl NewCategory {
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent_id: None,
        }
    }

    pub fn child(name: impl Into<String>, parent_id: CategoryId) -> Self {
        Self {
            name: name.into(),
            parent_id: Some(parent_id),
        }
    }

    pub fn normalized(mut self) -> DomainResult<Self> {
        self.name = normalize_name(Category::KIND, &self.name)?;
        Ok(self)
    }
}

/// Where a category sits (or would sit) in the tree, as read from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement<'a> {
    Root {
        /// Roots currently stored, not counting the one being checked.
        existing_roots: u64,
        /// Whether the check is for an insert rather than an edit.
        is_new: bool,
    },
    Child {
        /// The resolved parent row.
        parent: &'a Category,
    },
}

/// Validate a category's position in the tree.
///
/// Used by both insert and edit paths so the rules cannot drift apart.
pub fn check_placement(placement: Placement<'_>) -> DomainResult<()> {
    match placement {
        Placement::Root {
            existing_roots,
            is_new,
        } => {
            let total = existing_roots + u64::from(is_new);
            if total > MAX_ROOT_CATEGORIES {
                return Err(DomainError::limit_exceeded(format!(
                    "at most {MAX_ROOT_CATEGORIES} root categories are allowed"
                )));
            }
            Ok(())
        }
        Placement::Child { parent } => {
            if !parent.is_root() {
                return Err(DomainError::invalid_argument(format!(
                    "category '{}' is a sub-category and cannot have children",
                    parent.name
                )));
            }
            Ok(())
        }
    }
}

/// Which categories a listing covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "parent_id", rename_all = "snake_case")]
pub enum CategoryScope {
    #[default]
    All,
    Roots,
    ChildrenOf(CategoryId),
}

/// What deleting a category did to the items filed under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDeletion {
    pub category_id: CategoryId,
    /// Inactive items moved to `archived`, with their category cleared.
    pub archived_items: Vec<ItemId>,
}
