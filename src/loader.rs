//! Asynchronous batched asset loading.
//!
//! Scenes declare what they need in a [`Manifest`]; [`ResourceLoader::begin`]
//! fetches and decodes every entry concurrently and hands back a
//! [`LoadBatch`] to poll. A batch resolves only once every entry has
//! completed: all successes yield an [`AssetBundle`], any failure fails the
//! whole batch with no partial payloads delivered.
//!
//! Dropping a batch disconnects its channel, so workers finishing after the
//! batch was superseded deliver nowhere. The scene switcher relies on this.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use image::RgbaImage;

use crate::error::{Error, Result};

/// How a manifest entry should be decoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssetKind {
    /// UTF-8 text (shader sources, OBJ files).
    Text,
    /// An image decoded to RGBA8.
    Image,
    /// Raw bytes, handed over undecoded.
    Binary,
}

/// A declarative list of assets a scene depends on.
///
/// Entry ids are unique within a manifest; inserting an id twice replaces
/// the earlier entry and logs a warning.
#[derive(Default, Clone, Debug)]
pub struct Manifest {
    entries: Vec<(String, PathBuf, AssetKind)>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry, replacing any existing entry with the same id.
    pub fn add(&mut self, id: impl Into<String>, path: impl Into<PathBuf>, kind: AssetKind) {
        let id = id.into();
        if let Some(existing) = self.entries.iter_mut().find(|(eid, _, _)| *eid == id) {
            log::warn!("manifest entry '{}' declared twice, keeping the later one", id);
            existing.1 = path.into();
            existing.2 = kind;
        } else {
            self.entries.push((id, path.into(), kind));
        }
    }

    /// Builder-style [`add`](Self::add).
    pub fn with(mut self, id: impl Into<String>, path: impl Into<PathBuf>, kind: AssetKind) -> Self {
        self.add(id, path, kind);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(id, _, _)| id.as_str())
    }
}

/// A decoded asset.
#[derive(Debug)]
pub enum AssetPayload {
    Text(String),
    Image(RgbaImage),
    Binary(Vec<u8>),
}

/// The resolved contents of a successful batch.
///
/// Getters are typed: asking for the wrong kind or a missing id is an
/// [`Error::AssetLoad`], pointing at the scene's manifest rather than
/// panicking mid-`start`.
#[derive(Default, Debug)]
pub struct AssetBundle {
    assets: HashMap<String, AssetPayload>,
}

impl AssetBundle {
    pub fn text(&self, id: &str) -> Result<&str> {
        match self.assets.get(id) {
            Some(AssetPayload::Text(s)) => Ok(s),
            Some(_) => Err(Error::asset(id, "requested as text but loaded as another kind")),
            None => Err(Error::asset(id, "not present in this bundle")),
        }
    }

    pub fn image(&self, id: &str) -> Result<&RgbaImage> {
        match self.assets.get(id) {
            Some(AssetPayload::Image(img)) => Ok(img),
            Some(_) => Err(Error::asset(id, "requested as image but loaded as another kind")),
            None => Err(Error::asset(id, "not present in this bundle")),
        }
    }

    pub fn binary(&self, id: &str) -> Result<&[u8]> {
        match self.assets.get(id) {
            Some(AssetPayload::Binary(b)) => Ok(b),
            Some(_) => Err(Error::asset(id, "requested as binary but loaded as another kind")),
            None => Err(Error::asset(id, "not present in this bundle")),
        }
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

/// Loads manifest entries from a filesystem root.
pub struct ResourceLoader {
    root: PathBuf,
}

impl ResourceLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Kick off every entry of the manifest on its own worker thread.
    pub fn begin(&self, manifest: &Manifest) -> LoadBatch {
        let (tx, rx) = mpsc::channel();
        let expected = manifest.len();

        for (id, path, kind) in &manifest.entries {
            let tx = tx.clone();
            let id = id.clone();
            let full_path = self.root.join(path);
            let kind = *kind;

            thread::spawn(move || {
                let result = load_entry(&id, &full_path, kind);
                // The receiver is gone when the batch was superseded; the
                // payload is simply discarded.
                let _ = tx.send((id, result));
            });
        }

        LoadBatch {
            rx,
            expected,
            loaded: HashMap::new(),
            first_error: None,
            finished: 0,
        }
    }
}

fn load_entry(id: &str, path: &Path, kind: AssetKind) -> Result<AssetPayload> {
    match kind {
        AssetKind::Text => {
            let text = std::fs::read_to_string(path).map_err(|e| Error::asset(id, e))?;
            Ok(AssetPayload::Text(text))
        }
        AssetKind::Image => {
            let img = image::open(path).map_err(|e| Error::asset(id, e))?;
            Ok(AssetPayload::Image(img.to_rgba8()))
        }
        AssetKind::Binary => {
            let bytes = std::fs::read(path).map_err(|e| Error::asset(id, e))?;
            Ok(AssetPayload::Binary(bytes))
        }
    }
}

/// An in-flight manifest load.
///
/// Poll once per frame; `None` means entries are still outstanding. The
/// batch resolves exactly once.
pub struct LoadBatch {
    rx: Receiver<(String, Result<AssetPayload>)>,
    expected: usize,
    loaded: HashMap<String, AssetPayload>,
    first_error: Option<Error>,
    finished: usize,
}

impl LoadBatch {
    /// Drain completions without blocking.
    ///
    /// Returns `None` while any entry is outstanding. Once all entries have
    /// completed, returns `Some(Ok(bundle))` iff every one succeeded, or
    /// `Some(Err(_))` carrying the first failure with no payloads.
    pub fn poll(&mut self) -> Option<Result<AssetBundle>> {
        loop {
            match self.rx.try_recv() {
                Ok((id, result)) => {
                    self.finished += 1;
                    match result {
                        Ok(payload) => {
                            self.loaded.insert(id, payload);
                        }
                        Err(e) => {
                            if self.first_error.is_none() {
                                self.first_error = Some(e);
                            }
                        }
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    // All senders dropped with entries unaccounted for: a
                    // worker died without reporting.
                    if self.finished < self.expected && self.first_error.is_none() {
                        self.first_error = Some(Error::asset("<batch>", "a loader worker exited without reporting"));
                        self.finished = self.expected;
                    }
                    break;
                }
            }
        }

        if self.finished < self.expected {
            return None;
        }

        match self.first_error.take() {
            Some(e) => {
                self.loaded.clear();
                Some(Err(e))
            }
            None => Some(Ok(AssetBundle {
                assets: std::mem::take(&mut self.loaded),
            })),
        }
    }

    /// Block until the batch resolves.
    pub fn wait(mut self) -> Result<AssetBundle> {
        while self.finished < self.expected {
            match self.rx.recv() {
                Ok((id, result)) => {
                    self.finished += 1;
                    match result {
                        Ok(payload) => {
                            self.loaded.insert(id, payload);
                        }
                        Err(e) => {
                            if self.first_error.is_none() {
                                self.first_error = Some(e);
                            }
                        }
                    }
                }
                Err(_) => {
                    if self.first_error.is_none() {
                        self.first_error = Some(Error::asset("<batch>", "a loader worker exited without reporting"));
                    }
                    break;
                }
            }
        }

        match self.first_error.take() {
            Some(e) => Err(e),
            None => Ok(AssetBundle {
                assets: std::mem::take(&mut self.loaded),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("proscenium-loader-{}-{}", tag, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_file(dir: &Path, name: &str, contents: &[u8]) {
        let mut f = std::fs::File::create(dir.join(name)).unwrap();
        f.write_all(contents).unwrap();
    }

    #[test]
    fn batch_resolves_with_all_payloads() {
        let dir = temp_dir("ok");
        write_file(&dir, "a.txt", b"alpha");
        write_file(&dir, "b.txt", b"beta");
        write_file(&dir, "c.bin", &[1, 2, 3]);

        let manifest = Manifest::new()
            .with("a", "a.txt", AssetKind::Text)
            .with("b", "b.txt", AssetKind::Text)
            .with("c", "c.bin", AssetKind::Binary);

        let loader = ResourceLoader::new(&dir);
        let bundle = loader.begin(&manifest).wait().unwrap();

        assert_eq!(bundle.len(), 3);
        assert_eq!(bundle.text("a").unwrap(), "alpha");
        assert_eq!(bundle.text("b").unwrap(), "beta");
        assert_eq!(bundle.binary("c").unwrap(), &[1, 2, 3]);
    }

    #[test]
    fn one_failure_fails_the_whole_batch() {
        let dir = temp_dir("fail");
        write_file(&dir, "good.txt", b"fine");

        let manifest = Manifest::new()
            .with("good", "good.txt", AssetKind::Text)
            .with("missing", "does-not-exist.txt", AssetKind::Text);

        let loader = ResourceLoader::new(&dir);
        let result = loader.begin(&manifest).wait();

        match result {
            Err(Error::AssetLoad { id, .. }) => assert_eq!(id, "missing"),
            other => panic!("expected AssetLoad error, got {:?}", other.map(|b| b.len())),
        }
    }

    #[test]
    fn poll_reports_pending_then_resolves() {
        let dir = temp_dir("poll");
        write_file(&dir, "a.txt", b"x");

        let manifest = Manifest::new().with("a", "a.txt", AssetKind::Text);
        let loader = ResourceLoader::new(&dir);
        let mut batch = loader.begin(&manifest);

        // Spin until the worker delivers; each intermediate poll must be None
        // or the final resolution, never a partial bundle.
        let bundle = loop {
            match batch.poll() {
                None => std::thread::yield_now(),
                Some(result) => break result.unwrap(),
            }
        };
        assert_eq!(bundle.text("a").unwrap(), "x");
    }

    #[test]
    fn empty_manifest_resolves_immediately() {
        let dir = temp_dir("empty");
        let loader = ResourceLoader::new(&dir);
        let mut batch = loader.begin(&Manifest::new());
        let bundle = batch.poll().expect("empty batch resolves at once").unwrap();
        assert!(bundle.is_empty());
    }

    #[test]
    fn duplicate_id_keeps_the_later_entry() {
        let mut manifest = Manifest::new();
        manifest.add("tex", "first.png", AssetKind::Image);
        manifest.add("tex", "second.txt", AssetKind::Text);
        assert_eq!(manifest.len(), 1);
    }

    #[test]
    fn bundle_kind_mismatch_is_an_error() {
        let dir = temp_dir("kind");
        write_file(&dir, "a.txt", b"text");

        let manifest = Manifest::new().with("a", "a.txt", AssetKind::Text);
        let loader = ResourceLoader::new(&dir);
        let bundle = loader.begin(&manifest).wait().unwrap();

        assert!(bundle.image("a").is_err());
        assert!(bundle.binary("a").is_err());
        assert!(bundle.text("nope").is_err());
    }
}
