use std::collections::HashMap;
use std::sync::Arc;

use kiln_classfile::ClassStub;
use parking_lot::Mutex;

use crate::bridge;
use crate::class::{ClassDef, TypeEnv};
use crate::classpath::CatalogError;
use crate::provider::ClassProvider;
use crate::ty::Type;

/// The type catalog.
///
/// Classes compiled in the current batch are registered into an *outgoing*
/// map; [`Classes::clear_cache`] publishes them as *incoming*, which lookups
/// consult before the library provider. Library conversions are memoised, so
/// a catalog that is only read can be shared by reference across threads.
pub struct Classes {
    provider: Arc<dyn ClassProvider>,
    incoming: HashMap<String, Arc<ClassDef>>,
    outgoing: HashMap<String, Arc<ClassDef>>,
    memo: Mutex<HashMap<String, Option<Arc<ClassDef>>>>,
}

impl Classes {
    pub fn new(provider: Arc<dyn ClassProvider>) -> Self {
        Self {
            provider,
            incoming: HashMap::new(),
            outgoing: HashMap::new(),
            memo: Mutex::new(HashMap::new()),
        }
    }

    /// The raw type named by a dotted binary name, if it exists.
    pub fn load_type(&self, name: &str) -> Option<Type> {
        self.class(name).map(|def| Type::Reference(def.name.clone()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.class(name).is_some()
    }

    /// Register compiled class bytes under `name`. Visible after the next
    /// [`Classes::clear_cache`].
    pub fn add_type(&mut self, name: &str, bytes: &[u8]) -> Result<(), CatalogError> {
        let stub = ClassStub::parse(bytes)?;
        let found = stub.internal_name.replace('/', ".");
        if found != name {
            return Err(CatalogError::NameMismatch {
                expected: name.to_string(),
                found,
            });
        }
        tracing::trace!(target: "kiln.catalog", class = name, bytes = bytes.len(), "registered outgoing class");
        self.outgoing
            .insert(name.to_string(), Arc::new(bridge::class_def(&stub)));
        Ok(())
    }

    /// Publish the outgoing registrations and start a fresh outgoing map.
    pub fn clear_cache(&mut self) {
        let published = self.outgoing.len();
        self.incoming.extend(self.outgoing.drain());
        self.memo.lock().clear();
        tracing::debug!(
            target: "kiln.catalog",
            published,
            visible = self.incoming.len(),
            "swapped catalog snapshot"
        );
    }

    /// Classes compiled in this batch that lookups currently see.
    pub fn incoming(&self) -> impl Iterator<Item = &Arc<ClassDef>> {
        self.incoming.values()
    }

    fn library(&self, name: &str) -> Option<Arc<ClassDef>> {
        if let Some(hit) = self.memo.lock().get(name) {
            return hit.clone();
        }
        // Convert outside the lock; a racing duplicate conversion is harmless.
        let def = self
            .provider
            .lookup(name)
            .map(|stub| Arc::new(bridge::class_def(&stub)));
        if def.is_none() {
            tracing::trace!(target: "kiln.catalog", class = name, "library class not found");
        }
        self.memo
            .lock()
            .entry(name.to_string())
            .or_insert(def)
            .clone()
    }
}

impl TypeEnv for Classes {
    fn class(&self, name: &str) -> Option<Arc<ClassDef>> {
        if let Some(def) = self.incoming.get(name) {
            return Some(Arc::clone(def));
        }
        self.library(name)
    }
}

impl std::fmt::Debug for Classes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classes")
            .field("incoming", &self.incoming.len())
            .field("outgoing", &self.outgoing.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jdk::BuiltinJdk;
    use kiln_classfile::{ClassWriter, ACC_PUBLIC, ACC_SUPER};

    fn catalog() -> Classes {
        Classes::new(Arc::new(BuiltinJdk))
    }

    #[test]
    fn added_types_appear_after_clear_cache() {
        let mut classes = catalog();
        let bytes = ClassWriter::new(ACC_PUBLIC | ACC_SUPER, "demo/Point", Some("java/lang/Object".into()))
            .finish()
            .unwrap();
        classes.add_type("demo.Point", &bytes).unwrap();
        assert!(classes.load_type("demo.Point").is_none());

        classes.clear_cache();
        assert_eq!(classes.load_type("demo.Point"), Some(Type::reference("demo.Point")));
        assert!(classes.load_type("java.lang.String").is_some());
        assert!(classes.load_type("demo.Missing").is_none());
    }

    #[test]
    fn mismatched_registration_is_rejected() {
        let mut classes = catalog();
        let bytes = ClassWriter::new(ACC_PUBLIC | ACC_SUPER, "demo/A", Some("java/lang/Object".into()))
            .finish()
            .unwrap();
        let err = classes.add_type("demo.B", &bytes).unwrap_err();
        assert!(matches!(err, CatalogError::NameMismatch { .. }));
    }

    #[test]
    fn catalog_is_shareable() {
        fn assert_sync<T: Send + Sync>() {}
        assert_sync::<Classes>();
    }
}
