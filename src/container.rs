//! Key Container
//!
//! Entry point of the crate. A container owns a namespace and an executor,
//! hands out key objects attached to both, and creates transactions and
//! batches that share them.
//!
//! While tracking is on, the container remembers every key it hands out:
//! asking again for the same name and key type returns the same instance,
//! and `delete_tracked_keys` removes all of them from the store at once.

use crate::config::StoreConfig;
use crate::connection::RedisConnection;
use crate::command::Command;
use crate::error::{Error, Result};
use crate::executor::{ConnectionEvent, Executor};
use crate::keys::RedisKey;
use crate::multi::{Batch, Proxy, Transaction};
use crate::pending::Pending;
use crate::resp::RespValue;
use ahash::AHashMap;
use parking_lot::Mutex;
use std::any::{Any, TypeId};
use std::fmt::{self, Display};
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

type KeyCache = AHashMap<(String, TypeId), Arc<dyn Any + Send + Sync>>;

struct ContainerInner {
    executor: Arc<dyn Executor>,
    namespace: Arc<str>,
    track: bool,
    keys: Mutex<KeyCache>,
}

/// Hands out namespaced key objects. Clones share the same identity cache.
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("namespace", &self.inner.namespace)
            .field("track", &self.inner.track)
            .field("tracked", &self.inner.keys.lock().len())
            .finish()
    }
}

impl Container {
    /// A tracking container over `executor`.
    pub fn new(executor: Arc<dyn Executor>, namespace: impl Into<String>) -> Self {
        Self::build(executor, namespace.into(), true)
    }

    /// A container that records nothing: every `get_key` is a fresh key.
    pub fn untracked(executor: Arc<dyn Executor>, namespace: impl Into<String>) -> Self {
        Self::build(executor, namespace.into(), false)
    }

    /// Namespace and tracking come from `config`.
    pub fn with_config(executor: Arc<dyn Executor>, config: &StoreConfig) -> Self {
        Self::build(executor, config.namespace.clone(), config.track_objects)
    }

    /// A container over the process-wide [`RedisConnection`]. The first
    /// caller's address and timeouts configure the connection; namespace
    /// and tracking still come from each `config`. The socket is opened by
    /// the first command.
    pub fn connect(config: &StoreConfig) -> Self {
        let connection: Arc<dyn Executor> = RedisConnection::shared(config.clone());
        Self::with_config(connection, config)
    }

    pub fn executor(&self) -> &Arc<dyn Executor> {
        &self.inner.executor
    }

    fn build(executor: Arc<dyn Executor>, namespace: String, track: bool) -> Self {
        Container {
            inner: Arc::new(ContainerInner {
                executor,
                namespace: Arc::from(namespace),
                track,
                keys: Mutex::new(KeyCache::default()),
            }),
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.inner.track
    }

    fn attach<K: RedisKey>(&self, mut key: K) -> K {
        key.base_mut()
            .attach(&self.inner.namespace, Arc::clone(&self.inner.executor));
        key
    }

    /// The key named `name` (qualified with the namespace) as a `K`.
    ///
    /// With tracking on, repeated calls with the same name and type return
    /// the same instance. The same name asked for as a different key type
    /// is a separate instance.
    pub fn get_key<K: RedisKey>(&self, name: &str) -> Arc<K> {
        let key = self.attach(K::new(name));
        if !self.inner.track {
            return Arc::new(key);
        }
        let full_name = match key.full_name() {
            Ok(full_name) => full_name.to_string(),
            Err(_) => return Arc::new(key),
        };
        let id = (full_name, TypeId::of::<K>());
        let mut keys = self.inner.keys.lock();
        if let Some(existing) = keys.get(&id) {
            if let Ok(found) = Arc::clone(existing).downcast::<K>() {
                return found;
            }
        }
        trace!(key = %id.0, "tracking key");
        let key = Arc::new(key);
        keys.insert(id, Arc::clone(&key) as Arc<dyn Any + Send + Sync>);
        key
    }

    /// Attaches a caller-built key. With tracking on it replaces any
    /// tracked key of the same name and type.
    pub fn add<K: RedisKey>(&self, key: K) -> Arc<K> {
        let key = Arc::new(self.attach(key));
        if self.inner.track {
            if let Ok(full_name) = key.full_name() {
                let id = (full_name.to_string(), TypeId::of::<K>());
                self.inner
                    .keys
                    .lock()
                    .insert(id, Arc::clone(&key) as Arc<dyn Any + Send + Sync>);
            }
        }
        key
    }

    /// A parameterized key name such as `"user:{0}:posts"`.
    pub fn key_template<K: RedisKey>(&self, pattern: impl Into<String>) -> KeyTemplate<K> {
        KeyTemplate {
            container: self.clone(),
            pattern: pattern.into(),
            _marker: PhantomData,
        }
    }

    pub fn create_transaction(&self) -> Transaction {
        Transaction::new(Arc::clone(&self.inner.executor), Arc::clone(&self.inner.namespace))
    }

    pub fn create_batch(&self) -> Batch {
        Batch::new(Arc::clone(&self.inner.executor), Arc::clone(&self.inner.namespace))
    }

    /// Fully-qualified names of every tracked key, sorted, without repeats.
    pub fn tracked_keys(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.keys.lock().keys().map(|(n, _)| n.clone()).collect();
        names.sort();
        names.dedup();
        names
    }

    pub fn tracked_count(&self) -> usize {
        self.inner.keys.lock().len()
    }

    /// Deletes every tracked key from the store in one `DEL` and forgets
    /// them. Resolves to the number of keys the store actually removed.
    pub async fn delete_tracked_keys(&self) -> Result<u64> {
        let names = self.tracked_keys();
        if names.is_empty() {
            return Ok(0);
        }
        let deleted = self
            .inner
            .executor
            .execute(Command::new("DEL").args_from(&names))
            .await?
            .into_int()?;
        self.inner.keys.lock().clear();
        debug!(namespace = %self.inner.namespace, tracked = names.len(), deleted, "deleted tracked keys");
        Ok(deleted.max(0) as u64)
    }

    /// Connectivity notifications, when the executor has a transport.
    pub fn subscribe(&self) -> Option<broadcast::Receiver<ConnectionEvent>> {
        self.inner.executor.subscribe()
    }
}

impl Proxy for Container {
    fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    fn send_command(&self, cmd: Command) -> Pending<RespValue> {
        let executor = Arc::clone(&self.inner.executor);
        Pending::new(async move { executor.execute(cmd).await })
    }

    fn is_connected(&self) -> bool {
        self.inner.executor.is_connected()
    }
}

// ============================================================================
// KeyTemplate
// ============================================================================

/// Builds keys from a name pattern with positional `{0}`, `{1}`, ...
/// placeholders. `{{` and `}}` are literal braces.
pub struct KeyTemplate<K> {
    container: Container,
    pattern: String,
    _marker: PhantomData<fn() -> K>,
}

impl<K> Clone for KeyTemplate<K> {
    fn clone(&self) -> Self {
        KeyTemplate {
            container: self.container.clone(),
            pattern: self.pattern.clone(),
            _marker: PhantomData,
        }
    }
}

impl<K> fmt::Debug for KeyTemplate<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyTemplate").field("pattern", &self.pattern).finish()
    }
}

impl<K: RedisKey> KeyTemplate<K> {
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The key for `args`, through the container's identity cache.
    pub fn get_key(&self, args: &[&dyn Display]) -> Result<Arc<K>> {
        let name = format_pattern(&self.pattern, args)?;
        Ok(self.container.get_key::<K>(&name))
    }

    pub fn get_key1(&self, arg: impl Display) -> Result<Arc<K>> {
        self.get_key(&[&arg])
    }
}

/// Substitutes positional placeholders in `pattern`.
pub fn format_pattern(pattern: &str, args: &[&dyn Display]) -> Result<String> {
    let bad = |why: &str| Error::invalid_argument(format!("key pattern '{}': {}", pattern, why));
    let mut out = String::with_capacity(pattern.len() + 8 * args.len());
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '{' => {
                let mut digits = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(d) if d.is_ascii_digit() => digits.push(d),
                        _ => return Err(bad("malformed placeholder")),
                    }
                }
                let index: usize = digits.parse().map_err(|_| bad("empty placeholder"))?;
                let arg = args
                    .get(index)
                    .ok_or_else(|| bad(&format!("no argument for placeholder {{{}}}", index)))?;
                out.push_str(&arg.to_string());
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => return Err(bad("unmatched '}'")),
            c => out.push(c),
        }
    }
    Ok(out)
}
