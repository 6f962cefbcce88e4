use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use tracing::debug;

/// A file selected for ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Path relative to the corpus root, `/`-separated on every platform.
    pub relative: String,
}

/// Compile document patterns such as `**/*.md`. `*` does not cross `/`.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(GlobBuilder::new(pattern).literal_separator(true).build()?);
    }
    builder.build()
}

/// Recursively collect files under `root` whose relative path matches
/// `patterns`, sorted by relative path so runs are reproducible.
///
/// Hidden files and directories are skipped; ignore files are not consulted.
pub fn discover_files(root: &Path, patterns: &GlobSet) -> Result<Vec<SourceFile>, ignore::Error> {
    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .hidden(true)
        .follow_links(false)
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }

        let path = entry.path();
        let Ok(rel) = path.strip_prefix(root) else {
            continue;
        };
        let relative = rel.to_string_lossy().replace('\\', "/");

        if patterns.is_match(&relative) {
            files.push(SourceFile {
                path: path.to_path_buf(),
                relative,
            });
        } else {
            debug!("Skipping non-matching file {relative}");
        }
    }

    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(files)
}
