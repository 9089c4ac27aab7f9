use std::collections::HashMap;
use std::ffi::OsStr;
use std::io::Read;
use std::path::{Path, PathBuf};

use kiln_classfile::ClassStub;
use thiserror::Error;

use crate::provider::ClassProvider;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("classfile error: {0}")]
    ClassFile(#[from] kiln_classfile::Error),
    #[error("class file for `{expected}` declares `{found}`")]
    NameMismatch { expected: String, found: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ClasspathEntry {
    ClassDir(PathBuf),
    Jar(PathBuf),
}

impl ClasspathEntry {
    /// `.jar`/`.zip` files are archives, anything else a class directory.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let archive = path
            .extension()
            .and_then(OsStr::to_str)
            .is_some_and(|ext| ext.eq_ignore_ascii_case("jar") || ext.eq_ignore_ascii_case("zip"));
        if archive {
            ClasspathEntry::Jar(path)
        } else {
            ClasspathEntry::ClassDir(path)
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            ClasspathEntry::ClassDir(path) | ClasspathEntry::Jar(path) => path,
        }
    }
}

/// Library classes read from class directories and jars.
///
/// Entries are indexed eagerly on open; earlier entries shadow later ones.
#[derive(Debug, Default)]
pub struct Classpath {
    stubs: HashMap<String, ClassStub>,
}

impl Classpath {
    pub fn open(entries: &[ClasspathEntry]) -> Result<Self, CatalogError> {
        let mut stubs = HashMap::new();
        for entry in entries {
            let indexed = index_entry(entry)?;
            tracing::debug!(
                target: "kiln.catalog",
                entry = %entry.path().display(),
                classes = indexed.len(),
                "indexed classpath entry"
            );
            for stub in indexed {
                let binary_name = stub.internal_name.replace('/', ".");
                stubs.entry(binary_name).or_insert(stub);
            }
        }
        Ok(Self { stubs })
    }

    pub fn len(&self) -> usize {
        self.stubs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stubs.is_empty()
    }

    pub fn binary_names(&self) -> impl Iterator<Item = &str> {
        self.stubs.keys().map(String::as_str)
    }
}

impl ClassProvider for Classpath {
    fn lookup(&self, binary_name: &str) -> Option<ClassStub> {
        self.stubs.get(binary_name).cloned()
    }
}

fn index_entry(entry: &ClasspathEntry) -> Result<Vec<ClassStub>, CatalogError> {
    match entry {
        ClasspathEntry::ClassDir(dir) => index_class_dir(dir),
        ClasspathEntry::Jar(path) => index_jar(path),
    }
}

fn index_class_dir(dir: &Path) -> Result<Vec<ClassStub>, CatalogError> {
    let mut out = Vec::new();
    for entry in walkdir::WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
    {
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension() != Some(OsStr::new("class")) {
            continue;
        }

        let bytes = std::fs::read(entry.path())?;
        let stub = ClassStub::parse(&bytes)?;
        if is_ignored_class(&stub.internal_name) {
            continue;
        }
        out.push(stub);
    }
    Ok(out)
}

fn index_jar(path: &Path) -> Result<Vec<ClassStub>, CatalogError> {
    let file = std::fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)?;

    let mut out = Vec::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if !file.is_file() {
            continue;
        }
        let name = file.name().to_owned();
        if !name.ends_with(".class") || name.starts_with("META-INF/") {
            continue;
        }

        let mut bytes = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut bytes)?;
        let stub = ClassStub::parse(&bytes)?;
        if is_ignored_class(&stub.internal_name) {
            continue;
        }
        out.push(stub);
    }
    Ok(out)
}

fn is_ignored_class(internal_name: &str) -> bool {
    internal_name.ends_with("module-info") || internal_name.ends_with("package-info")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archives_are_recognised_by_extension() {
        assert!(matches!(ClasspathEntry::from_path("lib/dep.jar"), ClasspathEntry::Jar(_)));
        assert!(matches!(ClasspathEntry::from_path("lib/dep.ZIP"), ClasspathEntry::Jar(_)));
        assert!(matches!(ClasspathEntry::from_path("target/classes"), ClasspathEntry::ClassDir(_)));
    }

    #[test]
    fn missing_directory_indexes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cp = Classpath::open(&[ClasspathEntry::ClassDir(dir.path().join("absent"))]).unwrap();
        assert!(cp.is_empty());
    }
}
