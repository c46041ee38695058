use std::fs;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::Weak;

use serde_json::Number;
use serde_json::Value;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::error::BoxError;
use super::error::BoxResult;
use super::lifecycle::LifecycleEvent;
use super::lifecycle::LifecycleHost;
use super::lifecycle::LifecycleListener;
use super::lifecycle::ListenerId;
use crate::codec;
use crate::config_models::box_config::BoxConfig;
use crate::config_models::data_directory::DataDirectory;
use crate::encryption;
use crate::encryption::Algorithm;
use crate::encryption::CipherEngine;
use crate::encryption::CryptoError;
use crate::encryption::KeyDigest;
use crate::models::header::Header;
use crate::models::header::HEADER_KEY;
use crate::models::value;
use crate::models::value::ValueMap;
use crate::models::value::ValueType;

const TEMP_FILE_SUFFIX: &str = ".tmp";

/// Where a box is in its life.
///
/// A box whose construction failed never exists, so there is no state for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum BoxState {
    /// Constructed; nothing read from disk yet.
    Unloaded,
    /// In-memory data reflects the file (or a fresh box).
    Loaded,
    /// Terminal.
    Destroyed,
}

/// What [`CryptBox::load`] found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The file was read and decrypted.
    FromFile,
    /// There was no file; the box starts out empty.
    Fresh,
}

/// Everything mutable about a box. Shared with the lifecycle listener, which
/// may run on a host thread.
#[derive(Debug)]
struct Inner {
    name: String,
    path: PathBuf,
    engine: Box<dyn CipherEngine>,
    key: Option<KeyDigest>,
    data: ValueMap,
    /// `None` while a file that existed at construction has not been loaded;
    /// its header, `created` included, is unknown until then.
    header: Option<Header>,
    state: BoxState,
}

/// A named, encrypted, persistent key-value store backed by one file.
///
/// All methods take `&self`; state lives behind a mutex so host lifecycle
/// events can save from another thread.
#[derive(Debug)]
pub struct CryptBox {
    inner: Arc<Mutex<Inner>>,
    host: Option<Arc<dyn LifecycleHost>>,
    listener_id: Option<ListenerId>,
    name: String,
    path: PathBuf,
    extension: String,
}

impl CryptBox {
    /// Create a box from `config`, without touching its file beyond checking
    /// whether it exists.
    ///
    /// A key given here must be non-empty; a box may also be constructed
    /// without one and unlocked by [`CryptBox::load`].
    pub fn construct(
        config: BoxConfig,
        host: Option<Arc<dyn LifecycleHost>>,
    ) -> BoxResult<Self> {
        Self::validate_name(&config.name).inspect_err(BoxError::report)?;

        let key = match config.key.as_deref() {
            Some(password) => Some(KeyDigest::derive(password).map_err(|e| {
                let e = BoxError::MissingKey(e.to_string());
                e.report();
                e
            })?),
            None => None,
        };

        let engine = config.algorithm.engine();
        if engine.algorithm() != config.algorithm {
            warn!(
                "No cipher backend for {}; box '{}' will be stored unencrypted.",
                config.algorithm, config.name
            );
        } else if engine.requires_key() && key.is_none() {
            debug!("Box '{}' has no key yet; one must be given on load.", config.name);
        }

        let path = config.file_path();
        let header = if path.exists() {
            debug!("Box '{}' has an existing file at {}", config.name, path.display());
            None
        } else {
            debug!("Box '{}' is new; created timestamp set now", config.name);
            Some(Header::new())
        };

        let inner = Arc::new(Mutex::new(Inner {
            name: config.name.clone(),
            path: path.clone(),
            engine,
            key,
            data: ValueMap::new(),
            header,
            state: BoxState::Unloaded,
        }));

        let listener_id = host.as_ref().map(|host| {
            host.subscribe(Arc::new(SaveOnSuspend {
                inner: Arc::downgrade(&inner),
            }))
        });

        info!(
            "Constructed box '{}' at {} ({})",
            config.name,
            path.display(),
            config.algorithm
        );

        Ok(Self {
            inner,
            host,
            listener_id,
            name: config.name,
            path,
            extension: config.extension,
        })
    }

    fn validate_name(name: &str) -> BoxResult<()> {
        if name.trim().is_empty() {
            return Err(BoxError::MissingName);
        }
        if name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(BoxError::InvalidInput(format!(
                "box name '{}' is not a plain file name",
                name
            )));
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The locked state, unless the box is destroyed, in which case
    /// [`BoxError::UseAfterDestroy`] is reported.
    fn lock_alive(&self) -> Option<MutexGuard<'_, Inner>> {
        let inner = self.lock();
        if inner.state == BoxState::Destroyed {
            BoxError::UseAfterDestroy(inner.name.clone()).report();
            return None;
        }
        Some(inner)
    }

    /// Read the box from disk, optionally with a new key.
    ///
    /// Either the whole file is decoded and replaces the in-memory data, or
    /// nothing changes (key included). A missing file is not an error: the
    /// box starts out empty.
    pub fn load(&self, key: Option<&str>) -> BoxResult<LoadOutcome> {
        self.lock().load(key).inspect_err(BoxError::report)
    }

    /// Write the box to disk, replacing the file atomically.
    ///
    /// A box constructed over an existing file must be loaded (or cleared)
    /// first; saving it blind would discard the file's contents.
    pub fn save(&self) -> BoxResult<()> {
        self.lock().save().inspect_err(BoxError::report)
    }

    /// Whether `candidate` opens the file on disk.
    ///
    /// Neither the stored key nor the in-memory data are touched. Any
    /// failure, including a missing file, reads as `false`.
    pub fn verify_key(&self, candidate: &str) -> bool {
        let Ok(candidate) = KeyDigest::derive(candidate) else {
            debug!("verify_key: blank candidate for box '{}'", self.name);
            return false;
        };
        let algorithm = self.lock().engine.algorithm();
        let verified = read_box_file(&self.path, Some(&candidate), algorithm.engine().as_ref())
            .is_ok();
        debug!("verify_key on box '{}': {}", self.name, verified);
        verified
    }

    /// The value under `name`, if set.
    ///
    /// Reading [`HEADER_KEY`] yields the serialized header and is not counted
    /// as an access.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.lock_alive()?.get(name)
    }

    /// Insert or replace the value under `name`.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> BoxResult<()> {
        self.lock()
            .set(name, value.into())
            .inspect_err(BoxError::report)
    }

    /// Remove `name`, returning its previous value.
    pub fn remove(&self, name: &str) -> BoxResult<Option<Value>> {
        self.lock().remove(name).inspect_err(BoxError::report)
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.lock_alive().is_some_and(|inner| inner.is_set(name))
    }

    pub fn get_type(&self, name: &str) -> Option<ValueType> {
        self.lock_alive()?.get_type(name)
    }

    /// User keys in sorted order.
    pub fn keys(&self) -> Vec<String> {
        self.lock_alive()
            .map(|inner| inner.data.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Set `name` only if it is not set yet. Returns whether it was set.
    pub fn set_if_new(&self, name: &str, value: impl Into<Value>) -> BoxResult<bool> {
        self.lock()
            .set_if_new(name, value.into())
            .inspect_err(BoxError::report)
    }

    /// Set `name` if unset or if `value` is greater than the stored number.
    pub fn set_if_higher(&self, name: &str, value: impl Into<Number>) -> BoxResult<bool> {
        self.lock()
            .set_if_ordered(name, value.into(), std::cmp::Ordering::Greater)
            .inspect_err(BoxError::report)
    }

    /// Set `name` if unset or if `value` is less than the stored number.
    pub fn set_if_lower(&self, name: &str, value: impl Into<Number>) -> BoxResult<bool> {
        self.lock()
            .set_if_ordered(name, value.into(), std::cmp::Ordering::Less)
            .inspect_err(BoxError::report)
    }

    /// Add one to the number under `name`.
    pub fn increment(&self, name: &str) -> BoxResult<Number> {
        self.increment_by(name, 1)
    }

    /// Add `amount` to the number under `name`, returning the new value.
    ///
    /// Fails with [`BoxError::NotFound`] if `name` is unset and with
    /// [`BoxError::TypeMismatch`] if it does not hold a number; the stored
    /// value is unchanged in both cases.
    pub fn increment_by(&self, name: &str, amount: impl Into<Number>) -> BoxResult<Number> {
        self.lock()
            .add_to(name, &amount.into())
            .inspect_err(BoxError::report)
    }

    /// Subtract one from the number under `name`.
    pub fn decrement(&self, name: &str) -> BoxResult<Number> {
        self.decrement_by(name, 1)
    }

    /// Subtract `amount` from the number under `name`. See
    /// [`CryptBox::increment_by`].
    pub fn decrement_by(&self, name: &str, amount: impl Into<Number>) -> BoxResult<Number> {
        let amount = amount.into();
        let negated = value::negate_number(&amount).ok_or_else(|| {
            BoxError::InvalidInput(format!("cannot negate {}", amount))
        });
        let mut inner = self.lock();
        negated
            .and_then(|amount| inner.add_to(name, &amount))
            .inspect_err(BoxError::report)
    }

    /// Drop all data and start a fresh header, then save.
    pub fn clear(&self) -> BoxResult<()> {
        self.lock().clear().inspect_err(BoxError::report)
    }

    /// [`CryptBox::clear`], then delete the file.
    ///
    /// The box is left empty and unloaded, so lifecycle events do not write
    /// the file back.
    pub fn wipe(&self) -> BoxResult<()> {
        let mut inner = self.lock();
        inner.ensure_alive().inspect_err(BoxError::report)?;
        let cleared = inner.clear().inspect_err(BoxError::report);

        let removed = match fs::remove_file(&inner.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BoxError::WriteFailure {
                path: inner.path.clone(),
                reason: format!("could not delete: {}", e),
            }),
        }
        .inspect_err(BoxError::report);

        inner.state = BoxState::Unloaded;
        if removed.is_ok() {
            info!("Wiped box '{}'", inner.name);
        }
        cleared.and(removed)
    }

    /// Release the data and key and stop listening to the host. Later calls
    /// fail with [`BoxError::UseAfterDestroy`] or do nothing.
    pub fn destroy(&mut self) {
        self.unsubscribe();

        let mut inner = self.lock();
        if inner.state == BoxState::Destroyed {
            return;
        }
        inner.data.clear();
        inner.key = None;
        inner.state = BoxState::Destroyed;
        info!("Destroyed box '{}'", inner.name);
    }

    fn unsubscribe(&mut self) {
        if let (Some(host), Some(id)) = (&self.host, self.listener_id.take()) {
            host.unsubscribe(id);
        }
    }

    /// Ask the host whether the file should take part in backup/sync.
    /// `None` when there is no host or the host has no such notion.
    pub fn set_sync(&self, enabled: bool) -> Option<bool> {
        self.host
            .as_ref()
            .and_then(|host| host.set_sync(&self.path, enabled))
    }

    /// A copy of the header. `None` until a box constructed over an existing
    /// file has been loaded, and after it is destroyed.
    pub fn header(&self) -> Option<Header> {
        self.lock_alive()?.header
    }

    pub fn state(&self) -> BoxState {
        self.lock().state
    }

    /// The algorithm in effect, which is the identity when no backend for
    /// the configured one is compiled in.
    pub fn algorithm(&self) -> Algorithm {
        self.lock().engine.algorithm()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn filename(&self) -> String {
        DataDirectory::box_file_name(&self.name, &self.extension)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }
}

impl Drop for CryptBox {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl Inner {
    fn ensure_alive(&self) -> BoxResult<()> {
        match self.state {
            BoxState::Destroyed => Err(BoxError::UseAfterDestroy(self.name.clone())),
            _ => Ok(()),
        }
    }

    /// Apply a timestamp bump, if the header is known.
    fn touch(&mut self, mark: fn(&mut Header)) {
        if let Some(header) = self.header.as_mut() {
            mark(header);
        }
    }

    fn load(&mut self, key: Option<&str>) -> BoxResult<LoadOutcome> {
        self.ensure_alive()?;
        let new_key = key.map(KeyDigest::derive).transpose()?;

        if !self.path.exists() {
            warn!(
                "No file for box '{}' at {}; starting empty.",
                self.name,
                self.path.display()
            );
            self.data.clear();
            let mut header = self.header.unwrap_or_default();
            header.mark_loaded();
            self.header = Some(header);
            if new_key.is_some() {
                self.key = new_key;
            }
            self.state = BoxState::Loaded;
            return Ok(LoadOutcome::Fresh);
        }

        let key = new_key.as_ref().or(self.key.as_ref());
        let (data, mut header) = read_box_file(&self.path, key, self.engine.as_ref())?;

        // created comes from the file; nothing else may move backwards
        if let Some(current) = &self.header {
            header.absorb_newer(current);
        }
        header.mark_loaded();
        self.data = data;
        self.header = Some(header);
        if new_key.is_some() {
            self.key = new_key;
        }
        self.state = BoxState::Loaded;

        info!(
            "Loaded box '{}' ({} key(s)) from {}",
            self.name,
            self.data.len(),
            self.path.display()
        );
        Ok(LoadOutcome::FromFile)
    }

    fn save(&mut self) -> BoxResult<()> {
        self.ensure_alive()?;

        let Some(mut header) = self.header else {
            return Err(BoxError::InvalidInput(format!(
                "box '{}' has a file at {} that was not loaded; load it before saving",
                self.name,
                self.path.display()
            )));
        };
        header.mark_saved();

        let payload = codec::encode_with_header(&self.data, &header);
        let text = encryption::seal(&payload, self.key.as_ref(), self.engine.as_ref())
            .map_err(|e| match e {
                CryptoError::MissingKey => BoxError::MissingKey(format!(
                    "box '{}' needs a key before it can be saved",
                    self.name
                )),
                e => BoxError::WriteFailure {
                    path: self.path.clone(),
                    reason: e.to_string(),
                },
            })?;

        write_atomically(&self.path, text.as_bytes())?;

        self.header = Some(header);
        self.state = BoxState::Loaded;
        debug!("Saved box '{}' to {}", self.name, self.path.display());
        Ok(())
    }

    fn get(&mut self, name: &str) -> Option<Value> {
        if name == HEADER_KEY {
            return self.header.as_ref().map(Header::to_value);
        }
        self.touch(Header::mark_accessed);
        self.data.get(name).cloned()
    }

    fn set(&mut self, name: &str, value: Value) -> BoxResult<()> {
        self.ensure_alive()?;
        if name == HEADER_KEY {
            return Err(BoxError::InvalidInput(format!(
                "'{}' is reserved for box metadata",
                HEADER_KEY
            )));
        }
        self.data.insert(name.to_string(), value);
        self.touch(Header::mark_modified);
        Ok(())
    }

    fn remove(&mut self, name: &str) -> BoxResult<Option<Value>> {
        self.ensure_alive()?;
        if name == HEADER_KEY {
            return Err(BoxError::InvalidInput(format!(
                "'{}' is reserved for box metadata",
                HEADER_KEY
            )));
        }
        let previous = self.data.remove(name);
        self.touch(Header::mark_modified);
        Ok(previous)
    }

    fn is_set(&self, name: &str) -> bool {
        if name == HEADER_KEY {
            return self.header.is_some();
        }
        self.data.contains_key(name)
    }

    fn get_type(&self, name: &str) -> Option<ValueType> {
        if name == HEADER_KEY {
            return self.header.map(|_| ValueType::Mapping);
        }
        self.data.get(name).map(ValueType::from)
    }

    fn set_if_new(&mut self, name: &str, value: Value) -> BoxResult<bool> {
        self.ensure_alive()?;
        if self.is_set(name) {
            return Ok(false);
        }
        self.set(name, value)?;
        Ok(true)
    }

    /// Set `name` to `candidate` when unset, or when `candidate` compares as
    /// `wanted` against the stored number.
    fn set_if_ordered(
        &mut self,
        name: &str,
        candidate: Number,
        wanted: std::cmp::Ordering,
    ) -> BoxResult<bool> {
        self.ensure_alive()?;
        if !self.is_set(name) {
            self.set(name, Value::Number(candidate))?;
            return Ok(true);
        }

        let current = self.number_at(name)?;
        if value::compare_numbers(&candidate, &current) == Some(wanted) {
            self.set(name, Value::Number(candidate))?;
            return Ok(true);
        }
        Ok(false)
    }

    fn add_to(&mut self, name: &str, amount: &Number) -> BoxResult<Number> {
        self.ensure_alive()?;
        if !self.is_set(name) {
            return Err(BoxError::NotFound(name.to_string()));
        }

        let current = self.number_at(name)?;
        let sum = value::add_numbers(&current, amount).ok_or_else(|| {
            BoxError::InvalidInput(format!("{} + {} is not a finite number", current, amount))
        })?;
        self.set(name, Value::Number(sum.clone()))?;
        Ok(sum)
    }

    /// The number stored under `name`, read through `get` so it counts as an
    /// access.
    fn number_at(&mut self, name: &str) -> BoxResult<Number> {
        match self.get_type(name) {
            Some(ValueType::Number) => {}
            Some(found) => {
                return Err(BoxError::TypeMismatch {
                    key: name.to_string(),
                    found,
                })
            }
            None => return Err(BoxError::NotFound(name.to_string())),
        }
        match self.get(name) {
            Some(Value::Number(n)) => Ok(n),
            _ => Err(BoxError::NotFound(name.to_string())),
        }
    }

    fn clear(&mut self) -> BoxResult<()> {
        self.ensure_alive()?;
        self.data.clear();
        self.header = Some(Header::new());
        info!("Cleared box '{}'", self.name);
        self.save()
    }
}

/// Saves a loaded box when the host suspends or exits.
struct SaveOnSuspend {
    inner: Weak<Mutex<Inner>>,
}

impl LifecycleListener for SaveOnSuspend {
    fn on_event(&self, event: LifecycleEvent) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        let mut inner = inner.lock().unwrap_or_else(PoisonError::into_inner);

        if !event.triggers_save() {
            debug!("Box '{}' ignores {}", inner.name, event);
            return;
        }
        if inner.state != BoxState::Loaded {
            debug!("Box '{}' is {}; not saving on {}", inner.name, inner.state, event);
            return;
        }

        info!("Saving box '{}' on {}", inner.name, event);
        // reported; a failed save must not take the host down
        let _ = inner.save().inspect_err(BoxError::report);
    }
}

/// Read, decrypt and decode a box file.
///
/// Failures after decryption are reported as the key not verifying, since
/// with a keyed cipher a wrong key and a corrupt payload look alike.
fn read_box_file(
    path: &Path,
    key: Option<&KeyDigest>,
    engine: &dyn CipherEngine,
) -> BoxResult<(ValueMap, Header)> {
    let text = fs::read_to_string(path).map_err(|e| BoxError::ReadFailure {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let plaintext = encryption::open(&text, key, engine)?;

    codec::decode_with_header(&plaintext).map_err(|e| {
        if engine.requires_key() {
            BoxError::DecryptFailure(format!("wrong key or corrupted box ({})", e))
        } else {
            BoxError::DecodeFailure(e.to_string())
        }
    })
}

/// Write `contents` to a sibling temp file, then rename it over `path`.
fn write_atomically(path: &Path, contents: &[u8]) -> BoxResult<()> {
    let write_failure = |reason: String| BoxError::WriteFailure {
        path: path.to_path_buf(),
        reason,
    };

    DataDirectory::ensure_parent_dir_exists(path).map_err(|e| write_failure(format!("{:#}", e)))?;

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(TEMP_FILE_SUFFIX);
    let temp_path = PathBuf::from(temp_name);

    let written = fs::File::create(&temp_path)
        .and_then(|mut file| {
            file.write_all(contents)?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&temp_path, path));

    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(write_failure(e.to_string()));
    }
    Ok(())
}
