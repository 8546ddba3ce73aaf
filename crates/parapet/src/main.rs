//! Parapet command line.
//!
//! Checks AsyncAPI documents (syntax, structure, references across files) and
//! writes them back out, optionally with references expanded.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use parapet_document::{
    AsyncApiError, Diagnostic, DocumentReader, DocumentWriter, InMemoryWorkspace, OutputFormat,
    ReadResult, ReaderSettings, ReferenceResolution, Resolution, WriterSettings,
};
use parapet_telemetry::{LogFormat, TelemetryConfig};

#[derive(Parser, Debug)]
#[command(name = "parapet", about = "AsyncAPI document checker and formatter", version)]
struct Cli {
    /// Log level or filter directive (overridden by RUST_LOG).
    #[arg(long, global = true, default_value = "warn", env = "PARAPET_LOG_LEVEL")]
    log_level: String,

    /// Log output format.
    #[arg(long, global = true, default_value = "pretty", value_parser = ["pretty", "json"])]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Read documents and report every problem found.
    ///
    /// All files form one workspace: `other.yaml#/components/...` references
    /// resolve against the file of that name.
    Check {
        /// Input document(s) (YAML or JSON).
        #[arg(short, long, required = true, num_args = 1..)]
        spec: Vec<PathBuf>,

        /// Output format (text or json).
        #[arg(long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// Read a document and write it back out.
    Fmt {
        /// Input document (YAML or JSON).
        #[arg(short, long)]
        spec: PathBuf,

        /// Other documents that external references may point into.
        #[arg(short, long, num_args = 1..)]
        workspace: Vec<PathBuf>,

        /// Format of the written document.
        #[arg(long, default_value = "yaml", value_parser = ["yaml", "json"])]
        output_format: String,

        /// Which references to bind before writing (none, local or all).
        #[arg(long, default_value = "all", value_parser = ["none", "local", "all"])]
        resolve: String,

        /// Expand references in place, except where that would recurse.
        #[arg(long)]
        inline: bool,

        /// Write to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(serde::Serialize)]
struct CheckIssue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pointer: Option<String>,
    message: String,
}

impl From<AsyncApiError> for CheckIssue {
    fn from(error: AsyncApiError) -> Self {
        Self {
            pointer: Some(error.pointer),
            message: error.message,
        }
    }
}

#[derive(serde::Serialize)]
struct CheckResult {
    file: String,
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    errors: Vec<CheckIssue>,
    warnings: Vec<CheckIssue>,
}

impl CheckResult {
    fn failed(file: String, message: String) -> Self {
        Self {
            file,
            valid: false,
            version: None,
            errors: vec![CheckIssue {
                pointer: None,
                message,
            }],
            warnings: Vec::new(),
        }
    }

    fn from_diagnostic(file: String, diagnostic: Diagnostic) -> Self {
        Self {
            file,
            valid: diagnostic.is_valid(),
            version: diagnostic.spec_version.map(|v| v.to_string()),
            errors: diagnostic.errors.into_iter().map(CheckIssue::from).collect(),
            warnings: diagnostic.warnings.into_iter().map(CheckIssue::from).collect(),
        }
    }
}

/// Workspace key of a file: its file name, which is how sibling documents
/// refer to it.
fn resource_name(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

fn read_document(path: &Path, reader: &DocumentReader) -> Result<ReadResult> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    let result = reader
        .read(&text)
        .with_context(|| format!("cannot parse {}", path.display()))?;
    parapet_telemetry::log_document_read!(
        file = %path.display(),
        errors = result.diagnostic.errors.len(),
        "document read"
    );
    Ok(result)
}

/// Run the check command.
fn run_check(specs: &[PathBuf], output_format: &str) -> ExitCode {
    // Phase 1: parse every file, leaving references for later.
    let reader = DocumentReader::new(
        ReaderSettings::new().with_reference_resolution(ReferenceResolution::DoNotResolve),
    );
    let mut workspace = InMemoryWorkspace::new();
    let mut parsed: Vec<(String, String, Diagnostic)> = Vec::new();
    let mut results = Vec::new();

    for path in specs {
        let file = path.display().to_string();
        let name = resource_name(path);
        if workspace.get(&name).is_some() {
            results.push(CheckResult::failed(
                file,
                format!("another document is already named '{name}'"),
            ));
            continue;
        }
        match read_document(path, &reader) {
            Ok(ReadResult {
                document,
                diagnostic,
            }) => {
                workspace.insert(name.clone(), document);
                parsed.push((file, name, diagnostic));
            }
            Err(e) => {
                parapet_telemetry::log_document_unreadable!(file = %file, error = %e);
                results.push(CheckResult::failed(file, format!("{e:#}")));
            }
        }
    }

    // Phase 2: resolve against the whole workspace, then bind.
    let resolutions: Vec<Resolution> = parsed
        .iter()
        .map(|(_, name, _)| match workspace.get(name) {
            Some(document) => Resolution::collect(document, Some(&workspace), true),
            None => Resolution::default(),
        })
        .collect();

    for ((file, name, mut diagnostic), resolution) in parsed.into_iter().zip(resolutions) {
        if let Some(document) = workspace.get_mut(&name) {
            let bound = resolution.bind_references(document);
            parapet_telemetry::log_references_resolved!(
                file = %file,
                bound,
                failed = resolution.errors.len()
            );
        }
        diagnostic.errors.extend(resolution.errors);
        results.push(CheckResult::from_diagnostic(file, diagnostic));
    }

    let valid = results.iter().filter(|r| r.valid).count();
    parapet_telemetry::log_check_completed!(
        documents = results.len(),
        valid,
        invalid = results.len() - valid
    );

    if output_format == "json" {
        let output = serde_json::json!({
            "results": results,
            "summary": {
                "total": results.len(),
                "valid": valid,
                "invalid": results.len() - valid,
            }
        });
        match serde_json::to_string_pretty(&output) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::from(1);
            }
        }
    } else {
        for result in &results {
            if result.valid && result.warnings.is_empty() {
                eprintln!("✓ {} is valid", result.file);
            } else if result.valid {
                eprintln!(
                    "✓ {} is valid (with {} warning(s))",
                    result.file,
                    result.warnings.len()
                );
            } else {
                eprintln!("✗ {} has {} error(s)", result.file, result.errors.len());
            }

            for err in &result.errors {
                match &err.pointer {
                    Some(pointer) => eprintln!("  [{}] {}", pointer, err.message),
                    None => eprintln!("  {}", err.message),
                }
            }
            for warn in &result.warnings {
                if let Some(pointer) = &warn.pointer {
                    eprintln!("  [{}] {} (warning)", pointer, warn.message);
                }
            }
        }

        eprintln!();
        eprintln!(
            "checked {} document(s): {} valid, {} invalid",
            results.len(),
            valid,
            results.len() - valid
        );
    }

    if valid == results.len() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

struct FmtOptions<'a> {
    spec: &'a Path,
    workspace: &'a [PathBuf],
    format: OutputFormat,
    resolution: ReferenceResolution,
    inline: bool,
    output: Option<&'a Path>,
}

/// Run the fmt command.
///
/// The document is written even when it has errors; the exit code tells.
fn run_fmt(options: FmtOptions<'_>) -> ExitCode {
    match format_document(&options) {
        Ok(diagnostic) => {
            for error in &diagnostic.errors {
                eprintln!("error: {error}");
            }
            for warning in &diagnostic.warnings {
                eprintln!("warning: {warning}");
            }
            if diagnostic.is_valid() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

fn format_document(options: &FmtOptions<'_>) -> Result<Diagnostic> {
    let local = DocumentReader::default();
    let mut workspace = InMemoryWorkspace::new();
    for path in options.workspace {
        let result = read_document(path, &local)?;
        for error in &result.diagnostic.errors {
            eprintln!("warning: {}: {error}", path.display());
        }
        workspace.insert(resource_name(path), result.document);
    }

    let text = fs::read_to_string(options.spec)
        .with_context(|| format!("cannot read {}", options.spec.display()))?;
    // Unbound references are written back as they were read.
    let reader =
        DocumentReader::new(ReaderSettings::new().with_reference_resolution(options.resolution));
    let ReadResult {
        document,
        diagnostic,
    } = reader
        .read_with(&text, Some(&workspace))
        .with_context(|| format!("cannot parse {}", options.spec.display()))?;

    let settings = WriterSettings::default()
        .with_format(options.format)
        .with_inline_local_references(options.inline)
        .with_inline_external_references(options.inline);
    let rendered = DocumentWriter::new(settings)
        .write(&document, Some(&workspace))
        .context("cannot render document")?;

    match options.output {
        Some(path) => {
            fs::write(path, &rendered)
                .with_context(|| format!("cannot write {}", path.display()))?;
            parapet_telemetry::log_document_written!(
                file = %path.display(),
                bytes = rendered.len(),
                "document written"
            );
        }
        None => print!("{rendered}"),
    }
    Ok(diagnostic)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = TelemetryConfig::new()
        .with_log_level(cli.log_level)
        .with_log_format(LogFormat::parse(&cli.log_format).unwrap_or_default());
    if let Err(e) = parapet_telemetry::init(&config) {
        eprintln!("warning: {e}");
    }

    match cli.command {
        Commands::Check { spec, format } => run_check(&spec, &format),
        Commands::Fmt {
            spec,
            workspace,
            output_format,
            resolve,
            inline,
            output,
        } => run_fmt(FmtOptions {
            spec: &spec,
            workspace: &workspace,
            format: OutputFormat::parse(&output_format).unwrap_or_default(),
            resolution: ReferenceResolution::parse(&resolve)
                .unwrap_or(ReferenceResolution::ResolveAll),
            inline,
            output: output.as_deref(),
        }),
    }
}
