use std::sync::Arc;

use kiln_classfile::ClassStub;

/// A source of library class metadata.
///
/// Implementations are queried with dotted binary names
/// (`java.util.Map$Entry`) and must be safe to share across threads.
pub trait ClassProvider: Send + Sync {
    fn lookup(&self, binary_name: &str) -> Option<ClassStub>;
}

impl<P: ClassProvider + ?Sized> ClassProvider for Arc<P> {
    fn lookup(&self, binary_name: &str) -> Option<ClassStub> {
        (**self).lookup(binary_name)
    }
}

/// Consults several providers in order; the first hit wins.
#[derive(Default)]
pub struct ChainProvider {
    providers: Vec<Arc<dyn ClassProvider>>,
}

impl ChainProvider {
    pub fn new(providers: Vec<Arc<dyn ClassProvider>>) -> Self {
        Self { providers }
    }

    pub fn push(&mut self, provider: Arc<dyn ClassProvider>) {
        self.providers.push(provider);
    }
}

impl ClassProvider for ChainProvider {
    fn lookup(&self, binary_name: &str) -> Option<ClassStub> {
        self.providers.iter().find_map(|p| p.lookup(binary_name))
    }
}

/// Provides nothing; for catalogs that only hold compiled classes.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyProvider;

impl ClassProvider for EmptyProvider {
    fn lookup(&self, _binary_name: &str) -> Option<ClassStub> {
        None
    }
}
