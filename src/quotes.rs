use rand::Rng;
use regex::Regex;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tokio::fs;
use tokio::task::JoinSet;
use tracing::debug;

/// Audio formats the index recognizes. Matching is exact, no case folding.
const ALLOWED_EXTENSIONS: [&str; 2] = ["mp3", "ogg"];

#[derive(Debug, thiserror::Error)]
pub enum QuoteError {
    #[error("duplicate quote name: {0}")]
    DuplicateQuote(String),
    #[error("invalid quote filename: {0}")]
    InvalidFilename(String),
    #[error("no such module: {0}")]
    UnknownModule(String),
    #[error("i/o error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("module scan task failed: {0}")]
    Scan(#[from] tokio::task::JoinError),
}

impl QuoteError {
    fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// In-memory catalog of quote sound files, grouped by module.
///
/// Built once at startup by scanning a directory tree laid out as
/// `<root>/<module>/<quote>.<ext>`. The quote name is the filename stem and
/// must be unique across the whole index, not just within its module. After
/// the build the index is read-mostly; the only mutation is
/// [`add_quote_to_module`](Self::add_quote_to_module), which callers must
/// serialize (the bot keeps the index behind a `tokio::sync::RwLock`).
#[derive(Debug)]
pub struct QuoteIndex {
    root: PathBuf,
    quotes: HashMap<String, PathBuf>,
    modules: HashMap<String, Vec<String>>,
}

impl QuoteIndex {
    /// Builds an index from the given root directory.
    ///
    /// Each immediate subdirectory becomes a module and is scanned as its
    /// own task. The merge into the shared tables happens on the awaiting
    /// task, so the duplicate check and insert for one quote can never
    /// interleave with another module's insert. The first duplicate name or
    /// I/O failure aborts the whole build; no partial index is returned.
    ///
    /// A directory listing that never completes stalls the build
    /// indefinitely; there is no timeout here.
    pub async fn index_dir(root: impl AsRef<Path>) -> Result<Self, QuoteError> {
        let root = std::path::absolute(root.as_ref())
            .map_err(|e| QuoteError::io(root.as_ref(), e))?;

        let mut entries = fs::read_dir(&root)
            .await
            .map_err(|e| QuoteError::io(&root, e))?;
        let mut scans = JoinSet::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| QuoteError::io(&root, e))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| QuoteError::io(entry.path(), e))?;
            if !file_type.is_dir() {
                continue;
            }
            let module = entry.file_name().to_string_lossy().into_owned();
            scans.spawn(scan_module(module, entry.path()));
        }

        let mut quotes = HashMap::new();
        let mut modules = HashMap::new();
        while let Some(scanned) = scans.join_next().await {
            let (module, files) = scanned??;
            let mut names = Vec::with_capacity(files.len());
            for (name, path) in files {
                if quotes.contains_key(&name) {
                    return Err(QuoteError::DuplicateQuote(name));
                }
                quotes.insert(name.clone(), path);
                names.push(name);
            }
            modules.insert(module, names);
        }

        Ok(Self {
            root,
            quotes,
            modules,
        })
    }

    /// Exact lookup. Absent is a normal outcome, not an error.
    pub fn get_quote(&self, name: &str) -> Option<PathBuf> {
        self.quotes.get(name).cloned()
    }

    /// Uniform random pick, either within the named module or across every
    /// quote in the index when no (or a blank) module name is given.
    /// Returns `None` for an unknown module or an empty pick scope.
    pub fn get_random_quote(&self, module: Option<&str>) -> Option<PathBuf> {
        match module.map(str::trim).filter(|m| !m.is_empty()) {
            Some(module) => {
                let names = self.modules.get(module)?;
                if names.is_empty() {
                    return None;
                }
                let pick = rand::rng().random_range(0..names.len());
                self.get_quote(&names[pick])
            }
            None => {
                if self.quotes.is_empty() {
                    return None;
                }
                let pick = rand::rng().random_range(0..self.quotes.len());
                self.quotes.values().nth(pick).cloned()
            }
        }
    }

    pub fn get_modules(&self) -> Vec<String> {
        self.modules.keys().cloned().collect()
    }

    /// Quote names of a module in discovery order. Callers sort for display.
    pub fn get_module_quotes(&self, module: &str) -> Option<&[String]> {
        self.modules.get(module).map(Vec::as_slice)
    }

    pub fn quote_count(&self) -> usize {
        self.quotes.len()
    }

    /// A filename is uploadable iff its extension is recognized and it
    /// matches the historical pattern: alphanumeric stem, one separator
    /// character, alphanumeric extension. The dot in the pattern is
    /// intentionally unescaped and uppercase stems pass; this permissive
    /// behavior is load-bearing for existing content.
    pub fn is_valid_quote_file(filename: &str) -> bool {
        has_allowed_extension(Path::new(filename)) && filename_pattern().is_match(filename)
    }

    pub fn allowed_extensions() -> &'static [&'static str] {
        &ALLOWED_EXTENSIONS
    }

    /// Writes a new quote file into a module directory and registers it.
    ///
    /// Preconditions: the filename passes [`Self::is_valid_quote_file`] and
    /// the module already exists. A same-named file on disk is overwritten
    /// silently; guarding against an already-registered quote name is the
    /// caller's job. The in-memory tables are updated only after the write
    /// succeeds, so a failed write leaves the index untouched.
    pub async fn add_quote_to_module(
        &mut self,
        module: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, QuoteError> {
        if !Self::is_valid_quote_file(filename) {
            return Err(QuoteError::InvalidFilename(filename.to_string()));
        }
        let names = self
            .modules
            .get_mut(module)
            .ok_or_else(|| QuoteError::UnknownModule(module.to_string()))?;

        let path = self.root.join(module).join(filename);
        fs::write(&path, bytes)
            .await
            .map_err(|e| QuoteError::io(&path, e))?;

        let name = match Path::new(filename).file_stem().and_then(OsStr::to_str) {
            Some(stem) => stem.to_string(),
            None => return Err(QuoteError::InvalidFilename(filename.to_string())),
        };
        self.quotes.insert(name.clone(), path.clone());
        names.push(name);
        Ok(path)
    }
}

async fn scan_module(
    module: String,
    dir: PathBuf,
) -> Result<(String, Vec<(String, PathBuf)>), QuoteError> {
    let mut entries = fs::read_dir(&dir)
        .await
        .map_err(|e| QuoteError::io(&dir, e))?;
    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| QuoteError::io(&dir, e))?
    {
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| QuoteError::io(entry.path(), e))?;
        if !file_type.is_file() {
            continue;
        }
        let path = entry.path();
        if !has_allowed_extension(&path) {
            continue;
        }
        let Some(name) = path.file_stem().and_then(OsStr::to_str) else {
            continue;
        };
        files.push((name.to_string(), path));
    }
    debug!("Scanned module {}: {} quote(s)", module, files.len());
    Ok((module, files))
}

fn has_allowed_extension(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext))
}

fn filename_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new("^[a-zA-Z0-9]+.[a-zA-Z0-9]+$").expect("valid quote filename pattern")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn fixture_tree(layout: &[(&str, &[&str])]) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (module, files) in layout {
            let module_dir = dir.path().join(module);
            std::fs::create_dir(&module_dir).unwrap();
            for file in *files {
                std::fs::write(module_dir.join(file), b"sound").unwrap();
            }
        }
        dir
    }

    fn stem(path: &Path) -> String {
        path.file_stem().unwrap().to_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn indexes_modules_and_quotes() {
        let dir = fixture_tree(&[
            ("memes", &["foo.mp3", "bar.ogg"]),
            ("misc", &["baz.mp3"]),
        ]);
        let index = QuoteIndex::index_dir(dir.path()).await.unwrap();

        let mut modules = index.get_modules();
        modules.sort();
        assert_eq!(modules, ["memes", "misc"]);
        assert_eq!(index.quote_count(), 3);

        let memes: HashSet<String> = index
            .get_module_quotes("memes")
            .unwrap()
            .iter()
            .cloned()
            .collect();
        assert_eq!(memes, HashSet::from(["foo".to_string(), "bar".to_string()]));
    }

    #[tokio::test]
    async fn filters_out_unrecognized_extensions() {
        let dir = fixture_tree(&[("memes", &["bar.mp3", "readme.txt", "notes.MP3"])]);
        let index = QuoteIndex::index_dir(dir.path()).await.unwrap();

        assert!(index.get_quote("bar").is_some());
        assert!(index.get_quote("readme").is_none());
        // Extension matching is exact, so the uppercase variant is skipped.
        assert!(index.get_quote("notes").is_none());
        assert_eq!(index.quote_count(), 1);
    }

    #[tokio::test]
    async fn ignores_loose_files_next_to_module_dirs() {
        let dir = fixture_tree(&[("memes", &["foo.mp3"])]);
        std::fs::write(dir.path().join("stray.mp3"), b"sound").unwrap();
        let index = QuoteIndex::index_dir(dir.path()).await.unwrap();

        assert_eq!(index.get_modules(), ["memes"]);
        assert!(index.get_quote("stray").is_none());
    }

    #[tokio::test]
    async fn exact_lookup_returns_resolved_path() {
        let dir = fixture_tree(&[("memes", &["bar.ogg"])]);
        let index = QuoteIndex::index_dir(dir.path()).await.unwrap();

        let path = index.get_quote("bar").unwrap();
        assert!(path.is_absolute());
        assert!(path.ends_with("memes/bar.ogg"));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn duplicate_names_across_modules_fail_the_build() {
        let dir = fixture_tree(&[("alpha", &["foo.mp3"]), ("beta", &["foo.ogg"])]);
        let err = QuoteIndex::index_dir(dir.path()).await.unwrap_err();
        match err {
            QuoteError::DuplicateQuote(name) => assert_eq!(name, "foo"),
            other => panic!("expected duplicate error, got {other}"),
        }
    }

    #[tokio::test]
    async fn missing_root_fails_the_build() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("nope");
        let err = QuoteIndex::index_dir(&gone).await.unwrap_err();
        assert!(matches!(err, QuoteError::Io { .. }), "got {err}");
    }

    #[tokio::test]
    async fn module_random_pick_stays_in_module_and_covers_it() {
        let dir = fixture_tree(&[
            ("memes", &["one.mp3", "two.mp3", "three.ogg"]),
            ("misc", &["other.mp3"]),
        ]);
        let index = QuoteIndex::index_dir(dir.path()).await.unwrap();
        let members: HashSet<String> = index
            .get_module_quotes("memes")
            .unwrap()
            .iter()
            .cloned()
            .collect();

        let mut seen = HashSet::new();
        for _ in 0..1000 {
            let path = index.get_random_quote(Some("memes")).unwrap();
            let name = stem(&path);
            assert!(members.contains(&name), "{name} not in module");
            seen.insert(name);
        }
        assert_eq!(seen, members);
    }

    #[tokio::test]
    async fn global_random_pick_spans_modules() {
        let dir = fixture_tree(&[("alpha", &["one.mp3"]), ("beta", &["two.mp3"])]);
        let index = QuoteIndex::index_dir(dir.path()).await.unwrap();

        let mut seen = HashSet::new();
        for _ in 0..1000 {
            seen.insert(stem(&index.get_random_quote(None).unwrap()));
        }
        assert_eq!(
            seen,
            HashSet::from(["one".to_string(), "two".to_string()])
        );
    }

    #[tokio::test]
    async fn unknown_module_and_quote_return_none() {
        let dir = fixture_tree(&[("memes", &["foo.mp3"])]);
        let index = QuoteIndex::index_dir(dir.path()).await.unwrap();

        assert!(index.get_quote("doesNotExist").is_none());
        assert!(index.get_random_quote(Some("doesNotExist")).is_none());
        assert!(index.get_module_quotes("doesNotExist").is_none());
    }

    #[tokio::test]
    async fn blank_module_name_falls_back_to_global_pick() {
        let dir = fixture_tree(&[("memes", &["foo.mp3"])]);
        let index = QuoteIndex::index_dir(dir.path()).await.unwrap();

        assert!(index.get_random_quote(Some("   ")).is_some());
        assert!(index.get_random_quote(Some("")).is_some());
    }

    #[tokio::test]
    async fn empty_index_random_pick_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let index = QuoteIndex::index_dir(dir.path()).await.unwrap();

        assert_eq!(index.quote_count(), 0);
        assert!(index.get_random_quote(None).is_none());
    }

    #[test]
    fn validates_quote_filenames() {
        assert!(QuoteIndex::is_valid_quote_file("track1.mp3"));
        assert!(QuoteIndex::is_valid_quote_file("Intro.ogg"));
        assert!(!QuoteIndex::is_valid_quote_file("track one.mp3"));
        assert!(!QuoteIndex::is_valid_quote_file("track.txt"));
        assert!(!QuoteIndex::is_valid_quote_file("loud.MP3"));
        assert!(!QuoteIndex::is_valid_quote_file(".mp3"));
    }

    #[tokio::test]
    async fn upload_writes_file_then_registers_quote() {
        let dir = fixture_tree(&[("mods", &["old.mp3"])]);
        let mut index = QuoteIndex::index_dir(dir.path()).await.unwrap();

        let path = index
            .add_quote_to_module("mods", "new1.mp3", b"fresh sound")
            .await
            .unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"fresh sound");
        assert!(path.ends_with("mods/new1.mp3"));
        assert_eq!(index.get_quote("new1"), Some(path));
        assert!(index
            .get_module_quotes("mods")
            .unwrap()
            .contains(&"new1".to_string()));
    }

    #[tokio::test]
    async fn upload_overwrites_existing_file_on_disk() {
        let dir = fixture_tree(&[("mods", &["old.mp3"])]);
        let mut index = QuoteIndex::index_dir(dir.path()).await.unwrap();
        std::fs::write(dir.path().join("mods/new1.mp3"), b"stale").unwrap();

        let path = index
            .add_quote_to_module("mods", "new1.mp3", b"replaced")
            .await
            .unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"replaced");
    }

    #[tokio::test]
    async fn upload_to_unknown_module_leaves_index_unchanged() {
        let dir = fixture_tree(&[("mods", &["old.mp3"])]);
        let mut index = QuoteIndex::index_dir(dir.path()).await.unwrap();

        let err = index
            .add_quote_to_module("ghosts", "new1.mp3", b"sound")
            .await
            .unwrap_err();
        assert!(matches!(err, QuoteError::UnknownModule(_)), "got {err}");

        assert_eq!(index.quote_count(), 1);
        assert!(index.get_quote("new1").is_none());
        assert_eq!(index.get_modules(), ["mods"]);
    }

    #[tokio::test]
    async fn upload_with_invalid_filename_is_rejected() {
        let dir = fixture_tree(&[("mods", &["old.mp3"])]);
        let mut index = QuoteIndex::index_dir(dir.path()).await.unwrap();

        let err = index
            .add_quote_to_module("mods", "new 1.mp3", b"sound")
            .await
            .unwrap_err();
        assert!(matches!(err, QuoteError::InvalidFilename(_)), "got {err}");
        assert_eq!(index.quote_count(), 1);
    }

    #[tokio::test]
    async fn failed_write_does_not_register_quote() {
        let dir = fixture_tree(&[("mods", &["old.mp3"])]);
        let mut index = QuoteIndex::index_dir(dir.path()).await.unwrap();
        std::fs::remove_dir_all(dir.path().join("mods")).unwrap();

        let err = index
            .add_quote_to_module("mods", "new1.mp3", b"sound")
            .await
            .unwrap_err();
        assert!(matches!(err, QuoteError::Io { .. }), "got {err}");

        assert!(index.get_quote("new1").is_none());
        assert!(!index
            .get_module_quotes("mods")
            .unwrap()
            .contains(&"new1".to_string()));
    }
}
