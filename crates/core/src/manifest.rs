//! Manifest aggregation.
//!
//! Reads every YAML file directly under a directory at the event's commit
//! and joins them into one multi-document stream. Listing order is kept as
//! the provider returned it: file order expresses layering chosen by the
//! repository author.

use crate::context::CallContext;
use crate::error::{Error, Result};
use crate::event::Event;
use async_trait::async_trait;
use tracing::debug;

/// YAML document separator.
pub const DOCUMENT_SEPARATOR: &str = "---";

const MANIFEST_SUFFIXES: [&str; 2] = [".yaml", ".yml"];

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular file (blob).
    File,
    /// Subdirectory (tree).
    Directory,
    /// Anything else the provider reports (submodule, symlink).
    Other,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Base name.
    pub name: String,
    /// Path from the repository root.
    pub path: String,
    /// Provider handle used to fetch the content (blob SHA or path).
    pub id: String,
    /// Entry kind.
    pub kind: EntryKind,
}

impl DirEntry {
    /// A file entry.
    pub fn file(name: impl Into<String>, path: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            id: id.into(),
            kind: EntryKind::File,
        }
    }

    /// Whether the entry is a file with a recognised manifest suffix.
    #[must_use]
    pub fn is_manifest(&self) -> bool {
        self.kind == EntryKind::File
            && MANIFEST_SUFFIXES
                .iter()
                .any(|suffix| self.name.ends_with(suffix))
    }
}

/// What a path resolves to at a revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    /// Nothing exists at the path.
    Missing,
    /// The path names a single file.
    File(DirEntry),
    /// The path names a directory with these entries.
    Directory(Vec<DirEntry>),
}

/// Provider primitives for reading repository trees.
#[async_trait]
pub trait TreeSource: Send + Sync {
    /// Resolve `path` at `revision` (commit SHA or branch name).
    async fn list_path(
        &self,
        ctx: &CallContext,
        event: &Event,
        path: &str,
        revision: &str,
    ) -> Result<Listing>;

    /// Fetch the content of a file entry returned by [`Self::list_path`].
    async fn read_entry(&self, ctx: &CallContext, event: &Event, entry: &DirEntry)
    -> Result<String>;
}

/// Join document bodies into one multi-document YAML stream.
///
/// A separator is inserted before every body that does not already start
/// with one. Zero bodies give the empty string; a single body that starts
/// with a separator is returned unchanged.
pub fn concat_documents<I, S>(bodies: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::new();
    for body in bodies {
        let body = body.as_ref();
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        if !body.starts_with(DOCUMENT_SEPARATOR) {
            out.push_str(DOCUMENT_SEPARATOR);
            out.push('\n');
        }
        out.push_str(body);
    }
    out
}

/// Aggregate every manifest directly under `path` at `event.sha`.
///
/// A missing directory yields an empty manifest. A path naming a file fails
/// with [`Error::NotADirectory`]. Any fetch failure aborts the whole call.
pub async fn collect_manifest<S>(
    source: &S,
    ctx: &CallContext,
    event: &Event,
    path: &str,
) -> Result<String>
where
    S: TreeSource + ?Sized,
{
    let entries = match source.list_path(ctx, event, path, &event.sha).await? {
        Listing::Missing => {
            debug!(repo = %event.full_name(), path, "No manifest directory");
            return Ok(String::new());
        }
        Listing::File(_) => return Err(Error::not_a_directory(event.full_name(), path)),
        Listing::Directory(entries) => entries,
    };

    let mut bodies = Vec::new();
    for entry in entries.iter().filter(|entry| entry.is_manifest()) {
        debug!(repo = %event.full_name(), file = %entry.path, "Reading manifest file");
        bodies.push(source.read_entry(ctx, event, entry).await?);
    }

    debug!(
        repo = %event.full_name(),
        path,
        files = bodies.len(),
        "Aggregated manifest"
    );
    Ok(concat_documents(bodies))
}

/// Read one file at `event.sha`, or at `event.base_branch` when
/// `use_base_branch` is set.
pub async fn read_file<S>(
    source: &S,
    ctx: &CallContext,
    event: &Event,
    path: &str,
    use_base_branch: bool,
) -> Result<String>
where
    S: TreeSource + ?Sized,
{
    let revision = event.revision(use_base_branch);
    match source.list_path(ctx, event, path, revision).await? {
        Listing::Missing => Err(Error::not_found(event.full_name(), path, revision)),
        Listing::Directory(_) => Err(Error::is_a_directory(event.full_name(), path)),
        Listing::File(entry) => source.read_entry(ctx, event, &entry).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeTree {
        listings: HashMap<(String, String), Listing>,
        blobs: HashMap<String, String>,
        reads: Mutex<Vec<String>>,
    }

    impl FakeTree {
        fn new() -> Self {
            Self {
                listings: HashMap::new(),
                blobs: HashMap::new(),
                reads: Mutex::new(Vec::new()),
            }
        }

        fn listing(mut self, path: &str, revision: &str, listing: Listing) -> Self {
            self.listings
                .insert((path.to_string(), revision.to_string()), listing);
            self
        }

        fn blob(mut self, id: &str, body: &str) -> Self {
            self.blobs.insert(id.to_string(), body.to_string());
            self
        }
    }

    #[async_trait]
    impl TreeSource for FakeTree {
        async fn list_path(
            &self,
            _ctx: &CallContext,
            _event: &Event,
            path: &str,
            revision: &str,
        ) -> Result<Listing> {
            Ok(self
                .listings
                .get(&(path.to_string(), revision.to_string()))
                .cloned()
                .unwrap_or(Listing::Missing))
        }

        async fn read_entry(
            &self,
            _ctx: &CallContext,
            event: &Event,
            entry: &DirEntry,
        ) -> Result<String> {
            self.reads.lock().unwrap().push(entry.name.clone());
            self.blobs
                .get(&entry.id)
                .cloned()
                .ok_or_else(|| Error::transport("fake", event.full_name(), "blob fetch failed"))
        }
    }

    fn event() -> Event {
        Event::new("owner", "repo", "sha1").with_base_branch("main")
    }

    #[test]
    fn test_concat_empty() {
        assert_eq!(concat_documents(Vec::<String>::new()), "");
    }

    #[test]
    fn test_concat_single_with_separator_unchanged() {
        assert_eq!(concat_documents(["---\nbar: 2\n"]), "---\nbar: 2\n");
    }

    #[test]
    fn test_concat_adds_separator_and_newline() {
        assert_eq!(
            concat_documents(["foo: 1", "---\nbar: 2"]),
            "---\nfoo: 1\n---\nbar: 2"
        );
    }

    #[test]
    fn test_is_manifest() {
        assert!(DirEntry::file("a.yaml", "d/a.yaml", "1").is_manifest());
        assert!(DirEntry::file("b.yml", "d/b.yml", "2").is_manifest());
        assert!(!DirEntry::file("readme.md", "d/readme.md", "3").is_manifest());
        assert!(!DirEntry::file("yaml", "d/yaml", "4").is_manifest());

        let dir = DirEntry {
            kind: EntryKind::Directory,
            ..DirEntry::file("nested.yaml", "d/nested.yaml", "5")
        };
        assert!(!dir.is_manifest());
    }

    #[tokio::test]
    async fn test_missing_directory_is_empty_manifest() {
        let tree = FakeTree::new();
        let manifest = collect_manifest(&tree, &CallContext::new(), &event(), ".tekton")
            .await
            .unwrap();
        assert_eq!(manifest, "");
    }

    #[tokio::test]
    async fn test_file_path_is_not_a_directory() {
        let tree = FakeTree::new().listing(
            ".tekton",
            "sha1",
            Listing::File(DirEntry::file(".tekton", ".tekton", "x")),
        );
        let err = collect_manifest(&tree, &CallContext::new(), &event(), ".tekton")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotADirectory { .. }));
    }

    #[tokio::test]
    async fn test_aggregates_in_listing_order() {
        let tree = FakeTree::new()
            .listing(
                ".tekton",
                "sha1",
                Listing::Directory(vec![
                    DirEntry::file("a.yml", ".tekton/a.yml", "blob-a"),
                    DirEntry::file("b.yaml", ".tekton/b.yaml", "blob-b"),
                    DirEntry::file("readme.md", ".tekton/readme.md", "blob-r"),
                ]),
            )
            .blob("blob-a", "foo: 1")
            .blob("blob-b", "---\nbar: 2")
            .blob("blob-r", "# readme");

        let manifest = collect_manifest(&tree, &CallContext::new(), &event(), ".tekton")
            .await
            .unwrap();

        assert_eq!(manifest, "---\nfoo: 1\n---\nbar: 2");
        assert_eq!(*tree.reads.lock().unwrap(), vec!["a.yml", "b.yaml"]);
    }

    #[tokio::test]
    async fn test_blob_failure_aborts() {
        let tree = FakeTree::new()
            .listing(
                ".tekton",
                "sha1",
                Listing::Directory(vec![
                    DirEntry::file("a.yaml", ".tekton/a.yaml", "blob-a"),
                    DirEntry::file("b.yaml", ".tekton/b.yaml", "missing"),
                ]),
            )
            .blob("blob-a", "foo: 1");

        let err = collect_manifest(&tree, &CallContext::new(), &event(), ".tekton")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
    }

    #[tokio::test]
    async fn test_read_file_uses_base_branch() {
        let tree = FakeTree::new()
            .listing(
                "config.yaml",
                "main",
                Listing::File(DirEntry::file("config.yaml", "config.yaml", "base")),
            )
            .listing(
                "config.yaml",
                "sha1",
                Listing::File(DirEntry::file("config.yaml", "config.yaml", "head")),
            )
            .blob("base", "trusted: true")
            .blob("head", "trusted: false");

        let ctx = CallContext::new();
        let from_base = read_file(&tree, &ctx, &event(), "config.yaml", true)
            .await
            .unwrap();
        let from_head = read_file(&tree, &ctx, &event(), "config.yaml", false)
            .await
            .unwrap();

        assert_eq!(from_base, "trusted: true");
        assert_eq!(from_head, "trusted: false");
    }

    #[tokio::test]
    async fn test_read_file_errors() {
        let tree = FakeTree::new().listing(".tekton", "sha1", Listing::Directory(vec![]));
        let ctx = CallContext::new();

        let err = read_file(&tree, &ctx, &event(), "absent.yaml", false)
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let err = read_file(&tree, &ctx, &event(), ".tekton", false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::IsADirectory { .. }));
    }

    proptest! {
        #[test]
        fn prop_every_document_is_separated(
            bodies in prop::collection::vec("[a-z]{1,8}: [0-9]{1,3}", 0..6)
        ) {
            let out = concat_documents(&bodies);
            prop_assert_eq!(out.matches("---").count(), bodies.len());
            for body in &bodies {
                prop_assert!(out.contains(body.as_str()));
            }
        }

        #[test]
        fn prop_existing_separators_are_not_duplicated(
            bodies in prop::collection::vec("---\n[a-z]{1,8}: [0-9]{1,3}\n", 1..6)
        ) {
            let out = concat_documents(&bodies);
            prop_assert_eq!(out, bodies.concat());
        }
    }
}
