use tracing::{debug, info, warn};

use crate::domain::{Category, default_categories};
use crate::storage::{BlobStore, CATEGORIES_KEY, StorageError, load_or_default, save_json};

/// Resolves weak category references held by slots.
pub trait CategoryLookup {
    fn category(&self, id: &str) -> Option<&Category>;

    fn contains(&self, id: &str) -> bool {
        self.category(id).is_some()
    }
}

impl CategoryLookup for [Category] {
    fn category(&self, id: &str) -> Option<&Category> {
        self.iter().find(|category| category.id == id)
    }
}

impl CategoryLookup for Vec<Category> {
    fn category(&self, id: &str) -> Option<&Category> {
        self.as_slice().category(id)
    }
}

/// The user's category list, written through to the blob store on every change.
pub struct CategoryStore<S: BlobStore> {
    store: S,
    categories: Vec<Category>,
}

impl<S: BlobStore> CategoryStore<S> {
    /// Loads the persisted list, seeding the built-in defaults when there is none.
    pub fn open(store: S) -> Result<Self, StorageError> {
        match load_or_default::<_, Vec<Category>>(&store, CATEGORIES_KEY) {
            Some(categories) => {
                debug!(count = categories.len(), "loaded categories");
                Ok(Self { store, categories })
            }
            None => {
                info!("seeding default categories");
                let mut categories = Self {
                    store,
                    categories: default_categories(),
                };
                categories.persist()?;
                Ok(categories)
            }
        }
    }

    pub fn all(&self) -> &[Category] {
        &self.categories
    }

    pub fn lookup(&self, id: &str) -> Option<&Category> {
        self.categories.category(id)
    }

    pub fn add(&mut self, category: Category) -> Result<(), StorageError> {
        debug!(id = %category.id, name = %category.name, "adding category");
        self.categories.push(category);
        self.persist()
    }

    /// Replaces the category with the same id. Unknown ids are ignored.
    pub fn update(&mut self, category: Category) -> Result<(), StorageError> {
        let Some(existing) = self
            .categories
            .iter_mut()
            .find(|existing| existing.id == category.id)
        else {
            return Ok(());
        };

        *existing = category;
        self.persist()
    }

    /// Removes a custom category. Built-in and unknown ids are ignored.
    pub fn delete(&mut self, id: &str) -> Result<(), StorageError> {
        let Some(category) = self.lookup(id) else {
            return Ok(());
        };

        if category.is_built_in {
            warn!(id, "refusing to delete built-in category");
            return Ok(());
        }

        self.categories.retain(|category| category.id != id);
        self.persist()
    }

    pub fn reset_to_defaults(&mut self) -> Result<(), StorageError> {
        info!("resetting categories to defaults");
        self.categories = default_categories();
        self.persist()
    }

    fn persist(&mut self) -> Result<(), StorageError> {
        save_json(&mut self.store, CATEGORIES_KEY, &self.categories)
    }
}

impl<S: BlobStore> CategoryLookup for CategoryStore<S> {
    fn category(&self, id: &str) -> Option<&Category> {
        self.lookup(id)
    }
}
