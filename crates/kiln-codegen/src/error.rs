use kiln_types::CatalogError;
use thiserror::Error;

/// Failures that are not source diagnostics: a class the writer could not
/// serialize, or class bytes the catalog rejected.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("failed to write class `{class}`")]
    ClassFile {
        class: String,
        #[source]
        source: kiln_classfile::Error,
    },
    #[error("failed to publish class `{class}` to the catalog")]
    Catalog {
        class: String,
        #[source]
        source: CatalogError,
    },
}
