use crate::model::{EntityTypeBuilder, EntityTypeRef};
use std::{
    collections::BTreeMap,
    sync::{Arc, RwLock},
};
use thiserror::Error as ThisError;

///
/// RegistryError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum RegistryError {
    #[error("entity type `{0}` is already registered")]
    Duplicate(String),

    #[error("entity type `{0}` is not registered")]
    Unknown(String),
}

///
/// Registry
///
/// Startup-time registry of entity types. Registration runs the type's
/// boot hook exactly once and freezes the resulting descriptor; lookups
/// hand out shared references.
///

#[derive(Default)]
pub struct Registry {
    types: RwLock<BTreeMap<&'static str, EntityTypeRef>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Boot and register one entity type. Duplicate names are rejected.
    pub fn register(&self, mut builder: EntityTypeBuilder) -> Result<EntityTypeRef, RegistryError> {
        if let Some(boot) = builder.boot.take() {
            boot(&mut builder);
        }

        let ty: EntityTypeRef = Arc::new(builder.finish());

        let mut types = self.types.write().expect("registry lock poisoned");
        if types.contains_key(ty.name()) {
            return Err(RegistryError::Duplicate(ty.name().to_string()));
        }
        types.insert(ty.name(), Arc::clone(&ty));

        Ok(ty)
    }

    pub fn get(&self, name: &str) -> Result<EntityTypeRef, RegistryError> {
        self.types
            .read()
            .expect("registry lock poisoned")
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::Unknown(name.to_string()))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.types
            .read()
            .expect("registry lock poisoned")
            .contains_key(name)
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let types = self.types.read().expect("registry lock poisoned");
        f.debug_struct("Registry")
            .field("types", &types.keys().collect::<Vec<_>>())
            .finish()
    }
}
