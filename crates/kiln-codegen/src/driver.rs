//! Batch compilation: parse every file, then run the three passes over all
//! of them, publishing class shapes to the catalog between passes.

use std::collections::HashSet;
use std::sync::Arc;

use kiln_config::CompilerOptions;
use kiln_core::{Coordinate, Diagnostic, DiagnosticReport};
use kiln_syntax::ast::File;
use kiln_syntax::walk_file;
use kiln_types::Classes;

use crate::codes;
use crate::error::CompileError;
use crate::passes::{ClassOutput, FilePass, Stage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub text: String,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }
}

/// One emitted class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledUnit {
    /// Binary name of the class.
    pub name: String,
    pub bytes: Vec<u8>,
    pub warnings: Vec<Diagnostic>,
}

/// Everything that went wrong in one file.
#[derive(Debug)]
pub struct CompileFailure {
    pub file: String,
    /// Sorted by coordinate, without duplicates.
    pub diagnostics: Vec<Diagnostic>,
    pub errors: Vec<CompileError>,
}

impl CompileFailure {
    /// The file name followed by one `line L:C message.` line per diagnostic.
    pub fn report(&self) -> String {
        let mut out = self.file.clone();
        if !self.diagnostics.is_empty() {
            out.push('\n');
            out.push_str(&DiagnosticReport::render(&self.diagnostics));
        }
        for error in &self.errors {
            out.push('\n');
            out.push_str(&error.to_string());
        }
        out
    }
}

pub type FileOutcome = Result<Vec<CompiledUnit>, CompileFailure>;

/// A file moving through the passes.
struct Unit<'s> {
    source: &'s SourceFile,
    /// `None` when parsing failed outright.
    file: Option<File>,
    diagnostics: Vec<Diagnostic>,
    errors: Vec<CompileError>,
    outputs: Vec<ClassOutput>,
    skipped: HashSet<Coordinate>,
}

impl<'s> Unit<'s> {
    fn parse(source: &'s SourceFile) -> Self {
        let (file, diagnostics) = match kiln_syntax::parse(&source.text) {
            Ok(parsed) => (Some(parsed.file), parsed.diagnostics),
            Err(diagnostics) => {
                tracing::debug!(target: "kiln.driver", file = %source.name, "parse failed");
                (None, diagnostics)
            }
        };
        Self {
            source,
            file,
            diagnostics,
            errors: Vec::new(),
            outputs: Vec::new(),
            skipped: HashSet::new(),
        }
    }

    /// Record this file's classes in `declared`; a name already taken by an
    /// earlier file (or earlier in this one) is a duplicate and is skipped.
    fn claim(&mut self, declared: &mut HashSet<String>) {
        let Some(file) = &self.file else {
            return;
        };
        for class in &file.classes {
            if !declared.insert(class.name.clone()) {
                self.skipped.insert(class.at);
                self.diagnostics.push(Diagnostic::error(
                    codes::DUPLICATE,
                    class.at,
                    format!("Duplicate class '{}'", class.name),
                ));
            }
        }
    }

    fn outcome(self, options: &CompilerOptions) -> FileOutcome {
        let promote = |d: Diagnostic| if options.warnings_as_errors { d.promoted() } else { d };
        let mut diagnostics: Vec<Diagnostic> = self
            .diagnostics
            .into_iter()
            .chain(self.outputs.iter().flat_map(|o| o.diagnostics.iter().cloned()))
            .map(promote)
            .collect();
        diagnostics.sort();
        diagnostics.dedup();

        let incomplete = self.outputs.iter().any(|o| o.bytes.is_none());
        if DiagnosticReport::has_errors(&diagnostics) || !self.errors.is_empty() || incomplete {
            return Err(CompileFailure {
                file: self.source.name.clone(),
                diagnostics,
                errors: self.errors,
            });
        }
        Ok(self
            .outputs
            .into_iter()
            .filter_map(|output| {
                let mut warnings = output.diagnostics;
                warnings.sort();
                warnings.dedup();
                output.bytes.map(|bytes| CompiledUnit {
                    name: output.name,
                    bytes,
                    warnings,
                })
            })
            .collect())
    }
}

/// Compiles source files against a class catalog.
pub struct Compiler {
    classes: Classes,
    options: CompilerOptions,
}

impl Compiler {
    pub fn new(classes: Classes, options: CompilerOptions) -> Self {
        Self { classes, options }
    }

    pub fn classes(&self) -> &Classes {
        &self.classes
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Compile `sources` together, so they may refer to each other's
    /// classes. One outcome per file, in input order.
    pub fn compile_batch(&mut self, sources: &[SourceFile]) -> Vec<FileOutcome> {
        let mut units: Vec<Unit<'_>> = sources.iter().map(Unit::parse).collect();
        let mut declared = HashSet::new();
        for unit in &mut units {
            unit.claim(&mut declared);
        }
        tracing::info!(
            target: "kiln.driver",
            files = units.len(),
            classes = declared.len(),
            "compiling batch"
        );
        self.run_passes(&mut units, &Arc::new(declared));
        units.into_iter().map(|unit| unit.outcome(&self.options)).collect()
    }

    /// Compile each file on its own, in order; a file only sees its own
    /// classes and those of files before it.
    pub fn compile_single_pass(&mut self, sources: &[SourceFile]) -> Vec<FileOutcome> {
        sources
            .iter()
            .map(|source| {
                let mut unit = Unit::parse(source);
                let mut declared = HashSet::new();
                unit.claim(&mut declared);
                let mut units = [unit];
                self.run_passes(&mut units, &Arc::new(declared));
                let [unit] = units;
                unit.outcome(&self.options)
            })
            .collect()
    }

    fn run_passes(&mut self, units: &mut [Unit<'_>], batch: &Arc<HashSet<String>>) {
        for stage in [Stage::Declare, Stage::Signatures, Stage::Lower] {
            self.run(stage, units, batch);
        }
    }

    fn run(&mut self, stage: Stage, units: &mut [Unit<'_>], batch: &Arc<HashSet<String>>) {
        let mut published = 0usize;
        for unit in units.iter_mut() {
            let Some(file) = &unit.file else {
                continue;
            };
            let (diagnostics, outputs, errors) = {
                let mut pass = FilePass::new(
                    stage,
                    &self.classes,
                    &self.options,
                    &unit.source.name,
                    Arc::clone(batch),
                    &unit.skipped,
                );
                walk_file(file, &mut pass);
                (pass.diagnostics, pass.outputs, pass.errors)
            };
            unit.errors.extend(errors);

            if stage == Stage::Lower {
                unit.diagnostics.extend(diagnostics);
                unit.outputs = outputs;
                continue;
            }
            // Catalog writes are staged until `clear_cache`, so every file
            // of this pass saw the same catalog.
            for output in outputs {
                let Some(bytes) = output.bytes else {
                    continue;
                };
                match self.classes.add_type(&output.name, &bytes) {
                    Ok(()) => published += 1,
                    Err(source) => unit.errors.push(CompileError::Catalog {
                        class: output.name,
                        source,
                    }),
                }
            }
        }
        if stage != Stage::Lower {
            self.classes.clear_cache();
        }
        tracing::debug!(target: "kiln.driver", stage = ?stage, published, "pass complete");
    }
}
