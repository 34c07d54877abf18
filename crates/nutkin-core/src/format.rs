//! Formatter dispatch.
//!
//! Maps files to formatters by filename fragment (extension or well-known
//! filename), batches them, and invokes each formatter once per batch
//! through the tool prefix. The fragment tables come from the embedded
//! language-extension table; the registry itself is explicit.

use camino::Utf8PathBuf;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::command::{self, CommandError};
use crate::languages;
use crate::prefix::{Prefix, PrefixError};

/// Errors from formatting operations.
#[derive(Error, Debug)]
pub enum FormatError {
    /// A formatter invocation failed (including check-mode findings).
    #[error(transparent)]
    Command(#[from] CommandError),

    /// The prefix could not provide a formatter tool.
    #[error(transparent)]
    Prefix(#[from] PrefixError),
}

/// Result alias for formatting operations.
pub type FormatResult<T> = Result<T, FormatError>;

/// A formatter implementation.
///
/// Each formatter claims a set of filename fragments and formats (or, in
/// check mode, verifies) a whole batch of files in one invocation.
pub trait Formatter {
    /// Display name.
    fn name(&self) -> &'static str;

    /// The filename fragments this formatter claims.
    fn fragments(&self) -> &[String];

    /// Format `files`; with `check`, verify instead of rewriting.
    fn run(&self, prefix: &Prefix, files: &[Utf8PathBuf], check: bool) -> FormatResult<()>;
}

/// Python sources: isort for imports, then black.
struct PythonFormatter {
    fragments: Vec<String>,
}

impl PythonFormatter {
    fn new() -> Self {
        Self {
            fragments: languages::extensions_for("Python").to_vec(),
        }
    }
}

impl Formatter for PythonFormatter {
    fn name(&self) -> &'static str {
        "python"
    }

    fn fragments(&self) -> &[String] {
        &self.fragments
    }

    fn run(&self, prefix: &Prefix, files: &[Utf8PathBuf], check: bool) -> FormatResult<()> {
        for tool in ["isort", "black"] {
            let mut argv = prefix.tool(tool)?;
            if check {
                argv.push("--check".to_string());
            }
            argv.extend(files.iter().map(ToString::to_string));
            let refs: Vec<&str> = argv.iter().map(String::as_str).collect();
            command::run(&refs)?;
        }
        Ok(())
    }
}

/// Languages prettier understands.
const PRETTIER_LANGUAGES: &[&str] = &[
    "CSS",
    "PostCSS",
    "Less",
    "SCSS",
    "GraphQL",
    "Handlebars",
    "HTML",
    "Vue",
    "JavaScript",
    "TypeScript",
    "TSX",
    "JSON",
    "JSON with Comments",
    "JSON5",
    "Markdown",
    "YAML",
];

/// Config-style filenames prettier also handles.
const PRETTIER_EXTRA_FRAGMENTS: &[&str] = &[
    ".babelrc",
    ".jscsrc",
    ".jshintrc",
    ".jslintrc",
    ".swcrc",
    ".prettierrc",
];

/// Web and documentation formats, via prettier.
struct PrettierFormatter {
    fragments: Vec<String>,
}

impl PrettierFormatter {
    fn new() -> Self {
        let mut fragments: Vec<String> = PRETTIER_LANGUAGES
            .iter()
            .flat_map(|language| languages::extensions_for(language).iter().cloned())
            .collect();
        fragments.extend(PRETTIER_EXTRA_FRAGMENTS.iter().map(ToString::to_string));
        Self { fragments }
    }
}

impl Formatter for PrettierFormatter {
    fn name(&self) -> &'static str {
        "prettier"
    }

    fn fragments(&self) -> &[String] {
        &self.fragments
    }

    fn run(&self, prefix: &Prefix, files: &[Utf8PathBuf], check: bool) -> FormatResult<()> {
        let mut argv = prefix.tool("prettier")?;
        argv.push(if check { "--check" } else { "--write" }.to_string());
        argv.extend(files.iter().map(ToString::to_string));
        let refs: Vec<&str> = argv.iter().map(String::as_str).collect();
        command::run(&refs)?;
        Ok(())
    }
}

/// Build the formatter registry. Called once per invocation.
fn registry() -> Vec<Box<dyn Formatter>> {
    vec![
        Box::new(PythonFormatter::new()),
        Box::new(PrettierFormatter::new()),
    ]
}

/// Format `files` in place, dispatching per filename fragment.
///
/// Directories are handed to every formatter (they recurse themselves);
/// files with no claiming formatter are skipped; missing paths are logged
/// and skipped. With `check`, formatters verify instead of rewriting and a
/// finding surfaces as a failed command.
#[instrument(skip(prefix, files), fields(count = files.len(), check))]
pub fn format_files(prefix: &Prefix, files: &[Utf8PathBuf], check: bool) -> FormatResult<()> {
    let formatters = registry();
    let mut batches: Vec<Vec<Utf8PathBuf>> = formatters.iter().map(|_| Vec::new()).collect();

    for file in files {
        if file.is_dir() {
            debug!(%file, "directory goes to every formatter");
            for batch in &mut batches {
                batch.push(file.clone());
            }
        } else if file.is_file() {
            let name = file.file_name().unwrap_or_default();
            match formatter_for(&formatters, name) {
                Some(index) => {
                    debug!(%file, formatter = formatters[index].name(), "dispatching file");
                    batches[index].push(file.clone());
                }
                None => debug!(%file, "no formatter claims this file"),
            }
        } else {
            warn!(%file, "file does not exist");
        }
    }

    for (formatter, batch) in formatters.iter().zip(&batches) {
        if batch.is_empty() {
            continue;
        }
        info!(
            formatter = formatter.name(),
            files = batch.len(),
            "formatting"
        );
        formatter.run(prefix, batch, check)?;
    }

    Ok(())
}

/// Index of the first formatter claiming any fragment of `name`.
///
/// Fragments are tried smallest first: the bare extension, then compound
/// extensions, then the whole filename.
fn formatter_for(formatters: &[Box<dyn Formatter>], name: &str) -> Option<usize> {
    for candidate in fragment_candidates(name) {
        if let Some(index) = formatters
            .iter()
            .position(|f| f.fragments().iter().any(|frag| frag == &candidate))
        {
            return Some(index);
        }
    }
    None
}

/// The fragments a filename can match, smallest suffix first.
///
/// `x.tar.gz` yields `.gz`, `.tar.gz`, `x.tar.gz`; a dotfile like
/// `.prettierrc` yields only itself.
fn fragment_candidates(name: &str) -> Vec<String> {
    let mut candidates: Vec<String> = name
        .match_indices('.')
        .filter(|(index, _)| *index > 0)
        .map(|(index, _)| name[index..].to_string())
        .collect();
    candidates.reverse();
    candidates.push(name.to_string());
    candidates
}
