use std::collections::BTreeMap;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use crate::error::Error;
use crate::error::Result;
use crate::state::Dream;
use crate::state::User;

pub const DREAMS_KEY: &str = "oneiric_dreams_v2";
pub const USER_KEY: &str = "oneiric_user";

/// Durable string documents under fixed keys. Each `put` replaces the whole value.
pub trait KeyValueStore: Send + fmt::Debug {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn put(&mut self, key: &str, value: &str) -> Result<()>;
}

/// One `<key>.json` file per key inside `dir`.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    dir: PathBuf,
}

impl FileKeyValueStore {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(std::fs::read_to_string(path)?))
    }

    fn put(&mut self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        let tmp = self.dir.join(format!(".{key}.json.tmp"));
        write_private(&tmp, value.as_bytes())?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}

fn write_private(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut opts = OpenOptions::new();
    opts.create(true).write(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o600);
    }
    let mut file = opts.open(path)?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(())
}

/// Shared in-memory backend. Clones see the same documents.
#[derive(Debug, Clone, Default)]
pub struct MemoryKeyValueStore {
    docs: Arc<Mutex<BTreeMap<String, String>>>,
    fail_writes: Arc<Mutex<bool>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(self, key: &str, value: &str) -> Self {
        if let Ok(mut docs) = self.docs.lock() {
            docs.insert(key.to_string(), value.to_string());
        }
        self
    }

    pub fn document(&self, key: &str) -> Option<String> {
        self.docs.lock().ok().and_then(|docs| docs.get(key).cloned())
    }

    /// Makes every subsequent `put` fail; used to exercise save-failure paths.
    pub fn set_fail_writes(&self, fail: bool) {
        if let Ok(mut flag) = self.fail_writes.lock() {
            *flag = fail;
        }
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let docs = self.docs.lock().map_err(|_| Error::Store {
            key: key.to_string(),
            message: "memory store poisoned".to_string(),
        })?;
        Ok(docs.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &str) -> Result<()> {
        let failing = self.fail_writes.lock().map(|flag| *flag).unwrap_or(false);
        if failing {
            return Err(Error::Store {
                key: key.to_string(),
                message: "write refused".to_string(),
            });
        }
        let mut docs = self.docs.lock().map_err(|_| Error::Store {
            key: key.to_string(),
            message: "memory store poisoned".to_string(),
        })?;
        docs.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// The dream list. Sole writer; every mutator rewrites the whole document.
///
/// Mutations are keyed (`append`, `update_by_id`, `remove_by_id`) and always applied to
/// the current list, so updates for different records never overwrite each other.
/// When a save fails the in-memory change stays applied and the error is returned;
/// the next successful save writes the full list again.
pub struct DreamStore {
    backend: Box<dyn KeyValueStore>,
    dreams: Vec<Dream>,
}

impl fmt::Debug for DreamStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DreamStore")
            .field("backend", &self.backend)
            .field("len", &self.dreams.len())
            .finish()
    }
}

impl DreamStore {
    /// Reads the document once. Unparseable content is logged and treated as empty.
    pub fn load(backend: Box<dyn KeyValueStore>) -> Result<Self> {
        let dreams = match backend.get(DREAMS_KEY)? {
            Some(text) => match serde_json::from_str::<Vec<Dream>>(&text) {
                Ok(dreams) => dreams,
                Err(err) => {
                    tracing::warn!(error = %err, "failed to parse stored dreams, starting empty");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        tracing::info!(count = dreams.len(), "dream store loaded");
        Ok(Self { backend, dreams })
    }

    pub fn dreams(&self) -> &[Dream] {
        &self.dreams
    }

    pub fn get(&self, id: &str) -> Option<&Dream> {
        self.dreams.iter().find(|dream| dream.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.dreams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dreams.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.dreams.iter().map(|dream| dream.id.clone()).collect()
    }

    /// Adds a new record. The list is most-recent first, so it goes to the front.
    pub fn append(&mut self, dream: Dream) -> Result<()> {
        self.dreams.insert(0, dream);
        self.save()
    }

    /// Applies `update` to the record with `id`. Returns `Ok(false)` when no such record.
    pub fn update_by_id<F>(&mut self, id: &str, update: F) -> Result<bool>
    where
        F: FnOnce(&mut Dream),
    {
        let Some(dream) = self.dreams.iter_mut().find(|dream| dream.id == id) else {
            return Ok(false);
        };
        update(dream);
        self.save()?;
        Ok(true)
    }

    /// Removes the record with `id`. The removed record comes back even when the save
    /// fails, because the in-memory list no longer holds it either way.
    pub fn remove_by_id(&mut self, id: &str) -> (Option<Dream>, Result<()>) {
        let Some(position) = self.dreams.iter().position(|dream| dream.id == id) else {
            return (None, Ok(()));
        };
        let removed = self.dreams.remove(position);
        (Some(removed), self.save())
    }

    pub fn save(&mut self) -> Result<()> {
        let encoded = serde_json::to_string(&self.dreams)?;
        self.backend.put(DREAMS_KEY, &encoded)?;
        tracing::debug!(count = self.dreams.len(), "dream store saved");
        Ok(())
    }
}

pub struct ProfileStore {
    backend: Box<dyn KeyValueStore>,
    user: User,
}

impl fmt::Debug for ProfileStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfileStore")
            .field("backend", &self.backend)
            .field("user", &self.user)
            .finish()
    }
}

impl ProfileStore {
    /// Reads the profile, falling back to `default_user` when absent or unreadable.
    pub fn load(backend: Box<dyn KeyValueStore>, default_user: User) -> Result<Self> {
        let user = match backend.get(USER_KEY)? {
            Some(text) => match serde_json::from_str::<User>(&text) {
                Ok(user) => user,
                Err(err) => {
                    tracing::warn!(error = %err, "failed to parse stored profile, using defaults");
                    default_user
                }
            },
            None => default_user,
        };
        Ok(Self { backend, user })
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn set_pro(&mut self, is_pro: bool) -> Result<()> {
        self.user.is_pro = is_pro;
        self.save()
    }

    pub fn toggle_pro(&mut self) -> Result<bool> {
        let next = !self.user.is_pro;
        self.set_pro(next)?;
        Ok(next)
    }

    pub fn save(&mut self) -> Result<()> {
        let encoded = serde_json::to_string(&self.user)?;
        self.backend.put(USER_KEY, &encoded)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;
    use crate::state::VideoStatus;

    fn dream(id: &str) -> Dream {
        Dream {
            id: id.to_string(),
            date: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
            audio_url: format!("audio/{id}.webm"),
            image_url: Some("https://img".to_string()),
            video_url: None,
            video_status: VideoStatus::Pending,
            video_prompt: "slow clouds".to_string(),
            title: format!("title {id}"),
            key_points: vec!["飞行".to_string()],
            interpretation: "自由".to_string(),
            mood: Some("喜悦".to_string()),
            color: "#f0f9ff".to_string(),
            elements: vec!["风".to_string()],
            detailed_analysis: None,
        }
    }

    #[test]
    fn file_store_round_trips_documents_across_reopen() {
        let dir = tempdir().expect("tmpdir");
        let backend = FileKeyValueStore::open(dir.path()).expect("open");
        let mut store = DreamStore::load(Box::new(backend.clone())).expect("load");
        store.append(dream("a")).expect("append");
        store.append(dream("b")).expect("append");

        let reopened = DreamStore::load(Box::new(backend.clone())).expect("reload");
        assert_eq!(reopened.ids(), vec!["b".to_string(), "a".to_string()]);
        assert!(backend.path_for(DREAMS_KEY).exists());
        assert!(!dir.path().join(".oneiric_dreams_v2.json.tmp").exists());
    }

    #[test]
    fn remove_by_id_keeps_relative_order_of_others() {
        let backend = MemoryKeyValueStore::new();
        let mut store = DreamStore::load(Box::new(backend.clone())).expect("load");
        for id in ["a", "b", "c", "d"] {
            store.append(dream(id)).expect("append");
        }

        let (removed, saved) = store.remove_by_id("b");
        saved.expect("save");
        assert_eq!(removed.map(|d| d.id), Some("b".to_string()));
        assert_eq!(
            store.ids(),
            vec!["d".to_string(), "c".to_string(), "a".to_string()]
        );
        let (missing, saved) = store.remove_by_id("zzz");
        assert_eq!(missing, None);
        assert!(saved.is_ok());

        let persisted: Vec<Dream> =
            serde_json::from_str(&backend.document(DREAMS_KEY).expect("doc")).expect("parse");
        assert_eq!(persisted.len(), 3);
    }

    #[test]
    fn keyed_updates_for_different_records_commute() {
        let backend = MemoryKeyValueStore::new();
        let mut store = DreamStore::load(Box::new(backend)).expect("load");
        store.append(dream("a")).expect("append");
        store.append(dream("b")).expect("append");

        store
            .update_by_id("a", |d| d.video_status = VideoStatus::Processing)
            .expect("update");
        store
            .update_by_id("b", |d| d.video_status = VideoStatus::Processing)
            .expect("update");
        store
            .update_by_id("a", |d| {
                d.video_status = VideoStatus::Completed;
                d.video_url = Some("https://video".to_string());
            })
            .expect("update");

        assert_eq!(
            store.get("a").map(|d| d.video_status),
            Some(VideoStatus::Completed)
        );
        assert_eq!(
            store.get("b").map(|d| d.video_status),
            Some(VideoStatus::Processing)
        );
        assert!(!store.update_by_id("missing", |_| {}).expect("update"));
    }

    #[test]
    fn unparseable_document_loads_empty() {
        let backend = MemoryKeyValueStore::new().with_document(DREAMS_KEY, "{not json");
        let store = DreamStore::load(Box::new(backend)).expect("load");
        assert!(store.is_empty());
    }

    #[test]
    fn failed_save_keeps_in_memory_change() {
        let backend = MemoryKeyValueStore::new();
        let mut store = DreamStore::load(Box::new(backend.clone())).expect("load");
        backend.set_fail_writes(true);
        assert!(store.append(dream("a")).is_err());
        assert_eq!(store.len(), 1);
        assert_eq!(backend.document(DREAMS_KEY), None);

        backend.set_fail_writes(false);
        store.save().expect("save");
        assert!(backend.document(DREAMS_KEY).is_some());
    }

    #[test]
    fn failed_save_still_hands_back_removed_record() {
        let backend = MemoryKeyValueStore::new();
        let mut store = DreamStore::load(Box::new(backend.clone())).expect("load");
        store.append(dream("a")).expect("append");
        store.append(dream("b")).expect("append");

        backend.set_fail_writes(true);
        let (removed, saved) = store.remove_by_id("a");
        assert!(saved.is_err());
        assert_eq!(removed.map(|d| d.id), Some("a".to_string()));
        assert_eq!(store.ids(), vec!["b".to_string()]);
    }

    #[test]
    fn profile_defaults_then_persists_toggle() {
        let backend = MemoryKeyValueStore::new();
        let mut profile =
            ProfileStore::load(Box::new(backend.clone()), User::default()).expect("load");
        assert!(!profile.user().is_pro);
        assert_eq!(profile.user().name, "造梦者");

        assert!(profile.toggle_pro().expect("toggle"));
        let reloaded = ProfileStore::load(Box::new(backend), User::default()).expect("reload");
        assert!(reloaded.user().is_pro);
    }
}
