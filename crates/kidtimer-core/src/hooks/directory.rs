use std::collections::HashMap;

use super::traits::ProfileDirectory;
use crate::storage::Config;
use crate::timer::{CategoryId, CategoryRef, ChildId};

/// In-memory directory, filled from the config file or by tests.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    children: HashMap<ChildId, String>,
    categories: HashMap<CategoryId, CategoryRef>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &Config) -> Self {
        let mut directory = Self::new();
        for child in &config.children {
            directory = directory.with_child(child.id, child.name.clone());
        }
        for category in &config.categories {
            directory = directory.with_category(CategoryRef {
                id: category.id,
                name: category.name.clone(),
                icon: category.icon.clone(),
            });
        }
        directory
    }

    pub fn with_child(mut self, id: ChildId, name: impl Into<String>) -> Self {
        self.children.insert(id, name.into());
        self
    }

    pub fn with_category(mut self, category: CategoryRef) -> Self {
        self.categories.insert(category.id, category);
        self
    }
}

impl ProfileDirectory for StaticDirectory {
    fn child_name(&self, child_id: ChildId) -> Option<String> {
        self.children.get(&child_id).cloned()
    }

    fn category(&self, category_id: CategoryId) -> Option<CategoryRef> {
        self.categories.get(&category_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn lookups_hit_and_miss() {
        let child = Uuid::new_v4();
        let category = CategoryRef {
            id: Uuid::new_v4(),
            name: "Homework".into(),
            icon: "pencil".into(),
        };
        let directory = StaticDirectory::new()
            .with_child(child, "Ava")
            .with_category(category.clone());

        assert_eq!(directory.child_name(child).as_deref(), Some("Ava"));
        assert_eq!(directory.category(category.id), Some(category));
        assert!(directory.child_name(Uuid::new_v4()).is_none());
    }
}
