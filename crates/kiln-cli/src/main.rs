use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use kiln_codegen::{Compiler, FileOutcome, SourceFile};
use kiln_config::{init_tracing, CompilerOptions, KilnConfig};
use kiln_core::Diagnostic;
use kiln_types::{BuiltinJdk, ChainProvider, ClassProvider, Classes, Classpath, ClasspathEntry};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "kiln", version, about = "Kiln compiler (source files to JVM class files)")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile source files and write one `.class` file per class
    Compile(CompileArgs),
    /// Type-check source files without writing anything
    Check(SourceArgs),
}

#[derive(Args)]
struct SourceArgs {
    /// Source files, compiled together as one batch
    #[arg(required = true)]
    files: Vec<PathBuf>,
    /// Class directory or `.jar` to resolve library classes from (repeatable)
    #[arg(long = "classpath", value_name = "PATH")]
    classpath: Vec<PathBuf>,
    /// Config file (defaults to `kiln.toml` in the current directory)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Fail files that only have warnings
    #[arg(long)]
    warnings_as_errors: bool,
    /// Emit JSON suitable for CI
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct CompileArgs {
    #[command(flatten)]
    sources: SourceArgs,
    /// Output directory (overrides `compiler.output_dir`)
    #[arg(short = 'o', long = "output", value_name = "DIR")]
    output: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            2
        }
    };

    std::process::exit(exit_code);
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Compile(args) => {
            let mut options = load_options(&args.sources)?;
            if let Some(output) = args.output {
                options.output_dir = output;
            }
            build(&args.sources, options, true)
        }
        Command::Check(args) => {
            let options = load_options(&args)?;
            build(&args, options, false)
        }
    }
}

/// Config file settings with the command line layered on top.
fn load_options(args: &SourceArgs) -> Result<CompilerOptions> {
    let config = match &args.config {
        Some(path) => KilnConfig::load_from_path(path)?,
        None => {
            let cwd = std::env::current_dir().context("failed to read the current directory")?;
            KilnConfig::discover(cwd)?
        }
    };
    init_tracing(&config.logging);

    let mut options = config.compiler;
    options.classpath.extend(args.classpath.iter().cloned());
    options.warnings_as_errors |= args.warnings_as_errors;
    Ok(options)
}

/// Library classes first, the built-in JDK subset as the fallback.
fn catalog(options: &CompilerOptions) -> Result<Classes> {
    let entries: Vec<ClasspathEntry> = options.classpath.iter().map(ClasspathEntry::from_path).collect();
    let classpath = Classpath::open(&entries).context("failed to open the class path")?;
    let providers: Vec<Arc<dyn ClassProvider>> = vec![Arc::new(classpath), Arc::new(BuiltinJdk)];
    Ok(Classes::new(Arc::new(ChainProvider::new(providers))))
}

fn read_sources(files: &[PathBuf]) -> Result<Vec<SourceFile>> {
    files
        .iter()
        .map(|path| {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Ok(SourceFile::new(path.display().to_string(), text))
        })
        .collect()
}

#[derive(Serialize)]
struct Report {
    files: Vec<FileReport>,
    summary: Summary,
}

#[derive(Serialize)]
struct FileReport {
    file: String,
    ok: bool,
    classes: Vec<String>,
    diagnostics: Vec<Diagnostic>,
}

#[derive(Serialize, Default)]
struct Summary {
    files: usize,
    failed: usize,
    classes: usize,
    errors: usize,
    warnings: usize,
}

fn build(args: &SourceArgs, options: CompilerOptions, write: bool) -> Result<i32> {
    let sources = read_sources(&args.files)?;
    let output_dir = options.output_dir.clone();
    let mut compiler = Compiler::new(catalog(&options)?, options);
    let outcomes = compiler.compile_batch(&sources);

    let mut report = Report {
        files: Vec::with_capacity(outcomes.len()),
        summary: Summary::default(),
    };
    for (source, outcome) in sources.iter().zip(outcomes) {
        report.files.push(file_report(source, outcome, write.then_some(output_dir.as_path()))?);
    }
    for file in &report.files {
        report.summary.files += 1;
        report.summary.failed += usize::from(!file.ok);
        report.summary.classes += file.classes.len();
        let errors = file.diagnostics.iter().filter(|d| d.is_error()).count();
        report.summary.errors += errors;
        report.summary.warnings += file.diagnostics.len() - errors;
    }
    tracing::info!(
        target: "kiln.cli",
        files = report.summary.files,
        failed = report.summary.failed,
        classes = report.summary.classes,
        "build finished"
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "summary: {} classes, {} of {} files failed, {} errors, {} warnings",
            report.summary.classes,
            report.summary.failed,
            report.summary.files,
            report.summary.errors,
            report.summary.warnings
        );
    }
    Ok(if report.summary.failed > 0 { 1 } else { 0 })
}

/// Writes the classes of a successful file; prints a failing file's report.
fn file_report(source: &SourceFile, outcome: FileOutcome, output_dir: Option<&Path>) -> Result<FileReport> {
    match outcome {
        Ok(units) => {
            let mut classes = Vec::with_capacity(units.len());
            let mut diagnostics = Vec::new();
            for unit in units {
                if let Some(dir) = output_dir {
                    let path = dir.join(format!("{}.class", unit.name.replace('.', "/")));
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)
                            .with_context(|| format!("failed to create {}", parent.display()))?;
                    }
                    std::fs::write(&path, &unit.bytes)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    tracing::debug!(target: "kiln.cli", path = %path.display(), "wrote class");
                }
                for warning in &unit.warnings {
                    eprintln!("{}: warning: {}", source.name, warning);
                }
                diagnostics.extend(unit.warnings);
                classes.push(unit.name);
            }
            Ok(FileReport {
                file: source.name.clone(),
                ok: true,
                classes,
                diagnostics,
            })
        }
        Err(failure) => {
            eprintln!("{}", failure.report());
            Ok(FileReport {
                file: failure.file,
                ok: false,
                classes: Vec::new(),
                diagnostics: failure.diagnostics,
            })
        }
    }
}
