//! Command-line front end: `xlsx-webext list` and `xlsx-webext strip`.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use serde::Serialize;

use crate::{
    analyze, check_consistency, process, ExtractLimits, PackageWorkspace, ProcessRequest,
    RemovalStatus,
};

#[derive(Clone, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(about = "Inspect and remove Office web extensions (add-ins) from XLSX workbooks.")]
pub struct Args {
    #[command(flatten)]
    limits: LimitArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(ClapArgs)]
struct LimitArgs {
    /// Maximum uncompressed size of a single part, in bytes.
    #[arg(long, global = true, default_value_t = crate::archive::DEFAULT_MAX_PART_BYTES)]
    max_part_bytes: u64,

    /// Maximum uncompressed size of the whole package, in bytes.
    #[arg(long, global = true, default_value_t = crate::archive::DEFAULT_MAX_TOTAL_BYTES)]
    max_total_bytes: u64,
}

impl LimitArgs {
    fn limits(&self) -> ExtractLimits {
        ExtractLimits {
            max_part_bytes: self.max_part_bytes,
            max_total_bytes: self.max_total_bytes,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// List the web extensions in a workbook.
    List {
        /// Workbook to inspect.
        input: PathBuf,

        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Remove web extensions from a workbook.
    Strip {
        /// Workbook to edit.
        input: PathBuf,

        /// Identity of a web extension to remove (repeatable).
        #[arg(long = "id", required_unless_present = "all")]
        ids: Vec<String>,

        /// Remove every web extension.
        #[arg(long, conflicts_with = "ids")]
        all: bool,

        /// Output path (default: `processed_<name>` next to the input).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Re-open the output and fail if any web extension reference is left dangling.
        #[arg(long)]
        verify: bool,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonStripReport<'a> {
    output: String,
    removed_parts: &'a [String],
    collateral_parts: &'a [String],
    subtree_removed: bool,
    remaining: usize,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    run_with_args(args)
}

pub fn run_with_args(args: Args) -> Result<()> {
    let limits = args.limits.limits();
    match args.command {
        Command::List { input, format } => list(&input, format, limits),
        Command::Strip {
            input,
            ids,
            all,
            output,
            verify,
        } => strip(&input, ids, all, output, verify, limits),
    }
}

fn list(input: &Path, format: OutputFormat, limits: ExtractLimits) -> Result<()> {
    let (file_name, bytes) = read_input(input)?;
    let report = analyze(&file_name, &bytes, limits)
        .with_context(|| format!("analyze {}", input.display()))?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut out, &report).context("write json report")?;
            writeln!(out)?;
        }
        OutputFormat::Text => {
            if report.addins.is_empty() {
                writeln!(out, "{}: no web extensions", report.file_name)?;
            }
            for addin in &report.addins {
                writeln!(
                    out,
                    "{}\t{}\t{}\t{}/{}",
                    addin.id, addin.reference_name, addin.version, addin.store, addin.store_type
                )?;
            }
        }
    }
    Ok(())
}

fn strip(
    input: &Path,
    ids: Vec<String>,
    all: bool,
    output: Option<PathBuf>,
    verify: bool,
    limits: ExtractLimits,
) -> Result<()> {
    let (file_name, bytes) = read_input(input)?;

    let remove_ids = if all {
        analyze(&file_name, &bytes, limits)
            .with_context(|| format!("analyze {}", input.display()))?
            .addins
            .into_iter()
            .map(|addin| addin.id)
            .collect()
    } else {
        ids
    };

    let request = ProcessRequest {
        file_name,
        bytes,
        remove_ids,
    };
    let processed =
        process(&request, limits).with_context(|| format!("process {}", input.display()))?;

    for event in &processed.removal.diagnostics {
        if event.level <= log::Level::Warn {
            eprintln!("{event}");
        }
    }

    let output = output.unwrap_or_else(|| {
        input
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(&processed.file_name)
    });
    std::fs::write(&output, &processed.bytes)
        .with_context(|| format!("write {}", output.display()))?;

    let report = JsonStripReport {
        output: output.display().to_string(),
        removed_parts: &processed.removal.removed_parts,
        collateral_parts: &processed.removal.collateral_parts,
        subtree_removed: processed.removal.subtree_removed,
        remaining: processed.remaining.len(),
    };
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, &report).context("write json report")?;
    writeln!(out)?;

    if verify {
        let workspace = PackageWorkspace::extract(&processed.bytes, limits)
            .context("re-open processed workbook")?;
        let issues = check_consistency(workspace.root());
        workspace.close();
        let issues = issues.context("check processed workbook")?;
        if !issues.is_empty() {
            for issue in &issues {
                eprintln!("inconsistent: {issue}");
            }
            bail!("{} consistency issue(s) in {}", issues.len(), output.display());
        }
    }

    if processed.removal.status() == RemovalStatus::PartialFailure {
        bail!("some removal steps failed; see diagnostics above");
    }
    Ok(())
}

fn read_input(path: &Path) -> Result<(String, Vec<u8>)> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_string();
    let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
    Ok((file_name, bytes))
}
