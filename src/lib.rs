use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

/// Print a green success/notice line to stdout.
pub fn info(msg: &str) {
    println!("{GREEN}\u{2714} {msg}{RESET}");
}

/// Print a red error line to stderr.
pub fn error(msg: &str) {
    eprintln!("{RED}\u{2718} {msg}{RESET}");
}

#[derive(Parser)]
#[command(
    name = "magento-config-exporter",
    version,
    about = "Export selected Magento configuration values into YAML"
)]
pub struct Cli {
    /// YAML file with list of config path prefixes (key: 'paths')
    #[arg(value_name = "PATHS_FILE")]
    pub paths_file: String,

    /// Path to Magento installation (default: current directory)
    #[arg(short = 'd', long = "magento-dir", default_value = ".")]
    pub magento_dir: String,

    /// Config scope
    #[arg(short = 's', long = "scope", value_enum, default_value_t = Scope::Default)]
    pub scope: Scope,

    /// Optional scope code (e.g. 'english')
    #[arg(short = 'c', long = "scope-code")]
    pub scope_code: Option<String>,

    /// Override output directory (default: {magento-dir}/var/magento-config-exporter/)
    #[arg(short = 'o', long = "output-dir")]
    pub output_dir: Option<String>,

    /// Do not ask for confirmation before exporting
    #[arg(short = 'y', long = "no-interaction")]
    pub no_interaction: bool,

    /// Enable debug output
    #[arg(long = "debug")]
    pub debug: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum)]
pub enum Scope {
    Default,
    Stores,
    Websites,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Scope::Default => "default",
            Scope::Stores => "stores",
            Scope::Websites => "websites",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("No Magento CLI found at {}", .0.display())]
    MissingBinary(PathBuf),
    #[error("Paths file not found: {}", .0.display())]
    PathsFileMissing(PathBuf),
    #[error("No 'paths' key or empty list in paths YAML file")]
    NoPaths,
    #[error("{0}")]
    CommandFailed(String),
    #[error("Aborted by user")]
    Aborted,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl ExportError {
    /// Input errors are followed by the usage help.
    pub fn shows_usage(&self) -> bool {
        matches!(self, ExportError::PathsFileMissing(_) | ExportError::NoPaths)
    }
}

#[derive(Deserialize)]
struct PathsFile {
    #[serde(default)]
    paths: Vec<String>,
}

/// Load the requested path prefixes from a YAML file with a top-level
/// `paths` list. An empty document or an empty list is an input error.
pub fn load_paths(paths_file: &Path) -> Result<Vec<String>, ExportError> {
    let raw = fs::read_to_string(paths_file)?;
    let parsed: Option<PathsFile> = serde_yaml::from_str(&raw)?;
    let paths = parsed.map(|doc| doc.paths).unwrap_or_default();
    if paths.is_empty() {
        return Err(ExportError::NoPaths);
    }
    Ok(paths)
}

fn render_command(magento_bin: &Path, args: &[String]) -> String {
    format!("{} {}", magento_bin.display(), args.join(" "))
}

/// Run `bin/magento config:show` once and return stdout as trimmed,
/// non-empty lines. Any non-zero exit is fatal; Magento's own
/// "doesn't exist" message is surfaced verbatim.
pub fn run_magento(
    magento_bin: &Path,
    magento_dir: &Path,
    scope: Scope,
    scope_code: Option<&str>,
) -> Result<Vec<String>, ExportError> {
    let mut args = vec!["config:show".to_string(), format!("--scope={scope}")];
    if let Some(code) = scope_code {
        args.push(format!("--scope-code={code}"));
    }

    log::debug!("Running: {}", render_command(magento_bin, &args));

    let output = Command::new(magento_bin)
        .args(&args)
        .current_dir(magento_dir)
        .output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let msg = if stderr.contains("doesn't exist") {
            // Magento already gives a clear message
            stderr
        } else {
            format!(
                "Command failed: {}\n{}",
                render_command(magento_bin, &args),
                stderr
            )
        };
        return Err(ExportError::CommandFailed(msg));
    }

    let lines = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect();
    Ok(lines)
}

/// Split each `<key> - <value>` line and keep the keys starting with one of
/// the requested prefixes. Lines without the separator are skipped. The
/// prefix match is a plain string-prefix test, not segment-aware.
pub fn filter_entries(lines: &[String], prefixes: &[String]) -> BTreeMap<String, String> {
    let mut entries = BTreeMap::new();
    for line in lines {
        let Some((key, value)) = line.split_once(" - ") else {
            continue;
        };
        let key = key.trim();
        if prefixes.iter().any(|prefix| key.starts_with(prefix.as_str())) {
            entries.insert(key.to_string(), value.trim().to_string());
        }
    }
    entries
}

fn quote(scalar: &str) -> String {
    let mut out = String::with_capacity(scalar.len() + 2);
    out.push('"');
    for c in scalar.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Render the export document: the scope label mapped to the sorted entries,
/// with every scalar in double-quoted style and non-ASCII kept literal.
pub fn render_export(label: &str, entries: &BTreeMap<String, String>) -> String {
    if entries.is_empty() {
        return format!("{}: {{}}\n", quote(label));
    }
    let mut doc = format!("{}:\n", quote(label));
    for (key, value) in entries {
        doc.push_str(&format!("  {}: {}\n", quote(key), quote(value)));
    }
    doc
}

/// Prompt for confirmation and read one answer line. Only `y`/`yes`
/// (case-insensitive) proceeds.
pub fn confirm(input: &mut impl BufRead) -> io::Result<bool> {
    print!("Continue? [y/N]: ");
    io::stdout().flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

/// Resolve the output directory: explicit override, or the default
/// subdirectory under the Magento root.
pub fn resolve_output_dir(cli: &Cli, magento_dir: &Path) -> PathBuf {
    match &cli.output_dir {
        Some(dir) => expand(dir),
        None => magento_dir.join("var").join("magento-config-exporter"),
    }
}

/// `<scope>.yaml`, or `<scope>-<scope_code>.yaml` when a scope code is given.
pub fn output_filename(scope: Scope, scope_code: Option<&str>) -> String {
    match scope_code {
        Some(code) => format!("{scope}-{code}.yaml"),
        None => format!("{scope}.yaml"),
    }
}

/// Run the whole export pipeline: load prefixes, dump the scope, filter,
/// confirm, write. Every failure is terminal.
pub fn run_export(cli: &Cli) -> Result<(), ExportError> {
    let magento_dir = expand(&cli.magento_dir);
    let magento_dir = magento_dir.canonicalize().unwrap_or(magento_dir);
    let magento_bin = magento_dir.join("bin").join("magento");
    if !magento_bin.exists() {
        return Err(ExportError::MissingBinary(magento_bin));
    }

    let paths_file = expand(&cli.paths_file);
    if !paths_file.exists() {
        return Err(ExportError::PathsFileMissing(paths_file));
    }
    let paths_file = paths_file.canonicalize()?;

    let prefixes = load_paths(&paths_file)?;
    log::debug!("Loaded {} paths", prefixes.len());

    let lines = run_magento(&magento_bin, &magento_dir, cli.scope, cli.scope_code.as_deref())?;
    let entries = filter_entries(&lines, &prefixes);

    let scope_label = match &cli.scope_code {
        Some(code) => code.clone(),
        None => cli.scope.to_string(),
    };

    let output_dir = resolve_output_dir(cli, &magento_dir);
    if !output_dir.exists() {
        fs::create_dir_all(&output_dir)?;
        info(&format!("Created output directory: {}", output_dir.display()));
    }
    let output_file = output_dir.join(output_filename(cli.scope, cli.scope_code.as_deref()));

    println!();
    println!("Using input:   {}", paths_file.display());
    println!("Exporting to:  {}", output_file.display());
    println!();

    if !cli.no_interaction && !confirm(&mut io::stdin().lock())? {
        return Err(ExportError::Aborted);
    }

    fs::write(&output_file, render_export(&scope_label, &entries))?;
    info(&format!(
        "Exported {} values \u{2192} {}",
        entries.len(),
        output_file.display()
    ));

    Ok(())
}
