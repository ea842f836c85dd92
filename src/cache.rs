//! ==============================================================================
//! cache.rs - asset cache for the generated plot document
//! ==============================================================================
//!
//! purpose:
//!     gnuplot's html output pulls in javascript from the system install
//!     (`src="file:///usr/share/gnuplot/.../canvastext.js"`), which browsers
//!     refuse to load from a file:// page and which breaks once the document
//!     is copied elsewhere. after every regeneration we:
//!
//!         1. collect every src reference in the document
//!         2. copy newly referenced assets into the cache directory
//!         3. delete cached copies nothing references anymore
//!         4. point the references at the cached copies and save the document
//!
//!     after a pass, the files in the cache directory are exactly the assets
//!     the document references.
//!
//! relationships:
//!     - used by: scheduler.rs (after the plotter rendered)
//!     - uses: ownership.rs (cached copies and the directory belong to the user)
//!
//! ==============================================================================

use crate::ownership::Ownership;

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// assets the plot spec ships itself and that must stay untouched
pub const EXCLUDED_ASSETS: &[&str] = &["excanvas.js"];

const FILE_PROTOCOL: &str = "file://";

// ==============================================================================
// pure part: parse, plan, rewrite
// ==============================================================================

/// one cached copy of an asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// where the copy lives on disk
    pub file: PathBuf,
    /// what the document's src attribute says after rewriting
    pub reference: String,
}

/// referenced path (as found in the document) -> cached copy
pub type CacheTable = BTreeMap<String, CacheEntry>;

/// what one reconciliation pass has to do
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub copies: Vec<(String, CacheEntry)>,
    pub deletes: Vec<String>,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.copies.is_empty() && self.deletes.is_empty()
    }
}

fn src_pattern() -> &'static Regex {
    static SRC: OnceLock<Regex> = OnceLock::new();
    SRC.get_or_init(|| {
        Regex::new(r#"src=(?:"([^"]+)"|'([^']+)')"#).expect("src pattern is a valid regex")
    })
}

/// every src reference in the document, `file://` stripped, in order of appearance
pub fn asset_references(html: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    src_pattern()
        .captures_iter(html)
        .filter_map(|c| c.get(1).or_else(|| c.get(2)))
        .map(|m| {
            let src = m.as_str();
            src.strip_prefix(FILE_PROTOCOL).unwrap_or(src).to_string()
        })
        .filter(|src| seen.insert(src.clone()))
        .collect()
}

/// flat, url-escaped file name for an asset path
pub fn cached_file_name(reference: &str) -> String {
    urlencoding::encode(reference).replace("%2F", "___")
}

/// where cached copies go and how the document refers to them
#[derive(Debug, Clone)]
pub struct CacheLayout {
    dir: PathBuf,
    /// cache directory as seen from the document
    link_base: String,
}

impl CacheLayout {
    pub fn new(dir: &Path, document: &Path) -> Self {
        let doc_dir = document.parent().unwrap_or(Path::new(""));
        let base = match dir.strip_prefix(doc_dir) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf()),
        };
        Self { dir: dir.to_path_buf(), link_base: base.to_string_lossy().into_owned() }
    }

    fn entry(&self, file_name: &str) -> CacheEntry {
        let reference = if self.link_base.is_empty() {
            file_name.to_string()
        } else {
            format!("{}/{}", self.link_base.trim_end_matches('/'), file_name)
        };
        CacheEntry { file: self.dir.join(file_name), reference }
    }
}

/// the set of original asset paths a document wants cached
///
/// references that already point at a cached copy stand for their original,
/// so a document that was rewritten before reconciles to the same set.
pub fn desired_assets(references: &[String], table: &CacheTable) -> BTreeSet<String> {
    let by_reference: BTreeMap<&str, &str> = table
        .iter()
        .map(|(original, entry)| (entry.reference.as_str(), original.as_str()))
        .collect();

    references
        .iter()
        .map(|r| by_reference.get(r.as_str()).map_or(r.as_str(), |o| *o))
        .filter(|r| !EXCLUDED_ASSETS.contains(r))
        .map(String::from)
        .collect()
}

/// diff the desired set against the current table
pub fn plan(desired: &BTreeSet<String>, table: &CacheTable, layout: &CacheLayout) -> ReconcilePlan {
    let mut used: BTreeSet<PathBuf> = table.values().map(|e| e.file.clone()).collect();

    let copies = desired
        .iter()
        .filter(|asset| !table.contains_key(*asset))
        .map(|asset| {
            let base = cached_file_name(asset);
            let mut entry = layout.entry(&base);
            let mut n = 1;
            while used.contains(&entry.file) {
                entry = layout.entry(&format!("{base}~{n}"));
                n += 1;
            }
            used.insert(entry.file.clone());
            (asset.clone(), entry)
        })
        .collect();

    let deletes = table.keys().filter(|asset| !desired.contains(*asset)).cloned().collect();

    ReconcilePlan { copies, deletes }
}

/// point every reference (either quote style, with or without file://) at its copy
pub fn rewrite(html: &str, table: &CacheTable) -> String {
    let mut html = html.to_string();
    for (asset, entry) in table {
        let target = format!("src=\"{}\"", entry.reference);
        for quote in ['"', '\''] {
            for protocol in [FILE_PROTOCOL, ""] {
                html = html.replace(&format!("src={quote}{protocol}{asset}{quote}"), &target);
            }
        }
    }
    html
}

// ==============================================================================
// effectful part: the cache directory itself
// ==============================================================================

pub struct AssetCache {
    layout: CacheLayout,
    document: PathBuf,
    table: CacheTable,
}

impl AssetCache {
    /// start from an empty cache directory, wiping whatever a previous run left
    pub fn create(dir: impl Into<PathBuf>, document: impl Into<PathBuf>, owner: &dyn Ownership) -> Result<Self> {
        let dir = dir.into();
        let document = document.into();

        match std::fs::remove_dir_all(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e).with_context(|| format!("failed to clear {}", dir.display())),
        }
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        owner.hand_over(&dir)?;

        Ok(Self { layout: CacheLayout::new(&dir, &document), document, table: CacheTable::new() })
    }

    pub fn dir(&self) -> &Path {
        &self.layout.dir
    }

    #[cfg(test)]
    pub fn table(&self) -> &CacheTable {
        &self.table
    }

    /// bring the cache and the document in line with each other
    pub fn reconcile(&mut self, owner: &dyn Ownership) -> Result<()> {
        let html = std::fs::read_to_string(&self.document)
            .with_context(|| format!("failed to read {}", self.document.display()))?;

        let desired = desired_assets(&asset_references(&html), &self.table);
        let plan = plan(&desired, &self.table, &self.layout);
        if !plan.is_empty() {
            tracing::debug!(copies = plan.copies.len(), deletes = plan.deletes.len(), "reconciling asset cache");
        }
        self.apply(plan, owner)?;

        std::fs::write(&self.document, rewrite(&html, &self.table))
            .with_context(|| format!("failed to write {}", self.document.display()))?;

        owner.hand_over(self.dir())
    }

    /// perform a plan; the table only ever lists copies that exist on disk
    fn apply(&mut self, plan: ReconcilePlan, owner: &dyn Ownership) -> Result<()> {
        for (asset, entry) in plan.copies {
            let source = self.source_path(&asset);
            std::fs::copy(&source, &entry.file).with_context(|| {
                format!("failed to cache {} as {}", source.display(), entry.file.display())
            })?;
            let file = entry.file.clone();
            self.table.insert(asset, entry);
            owner.hand_over(&file)?;
        }

        for asset in plan.deletes {
            if let Some(entry) = self.table.get(&asset) {
                match std::fs::remove_file(&entry.file) {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => {
                        return Err(e).with_context(|| format!("failed to remove {}", entry.file.display()))
                    }
                }
                self.table.remove(&asset);
            }
        }
        Ok(())
    }

    /// relative references are relative to the document
    fn source_path(&self, asset: &str) -> PathBuf {
        let path = Path::new(asset);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.document.parent().unwrap_or(Path::new("")).join(path)
        }
    }
}
