//! Key Objects
//!
//! A key object is a typed handle on one store key. It carries the key's base
//! name, its fully-qualified name (set when a [`Container`](crate::Container)
//! attaches it) and the target its commands go to: the container's executor,
//! a [`Transaction`] or a [`Batch`].
//!
//! Redirecting (`with_tx`, `with_batch`) clones the handle and swaps the
//! target on the clone. The receiver keeps sending to its own target.

mod bitmap;
mod hash;
mod item;
mod list;
mod options;
mod scan;
mod set;
mod sorted_set;

pub use bitmap::Bitmap;
pub use hash::{DtoHash, Hash};
pub use item::Item;
pub use list::List;
pub use options::{Aggregate, Bitwise, Exclude, Order, SetOptions, SortOptions, SortType, When};
pub use set::Set;
pub use sorted_set::SortedSet;

use crate::codec::{decode_all, Codec};
use crate::command::Command;
use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::multi::{Batch, Transaction};
use crate::pending::Pending;
use crate::resp::RespValue;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Element types usable in key objects.
pub trait Element: Codec + Send + 'static {}

impl<T: Codec + Send + 'static> Element for T {}

// ============================================================================
// Execution target
// ============================================================================

#[derive(Clone)]
pub(crate) enum Target {
    Direct(Arc<dyn Executor>),
    Transaction(Transaction),
    Batch(Batch),
}

impl Target {
    pub(crate) fn submit(&self, cmd: Command) -> Pending<RespValue> {
        match self {
            Target::Direct(executor) => {
                let executor = Arc::clone(executor);
                Pending::new(async move { executor.execute(cmd).await })
            }
            Target::Transaction(tx) => tx.submit(cmd),
            Target::Batch(batch) => batch.submit(cmd),
        }
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Direct(_) => f.write_str("Direct"),
            Target::Transaction(_) => f.write_str("Transaction"),
            Target::Batch(_) => f.write_str("Batch"),
        }
    }
}

// ============================================================================
// KeyBase
// ============================================================================

/// Name and routing state shared by every key object.
#[derive(Clone, Debug)]
pub struct KeyBase {
    base_name: Arc<str>,
    full_name: Option<Arc<str>>,
    target: Option<Target>,
}

impl KeyBase {
    pub fn new(name: impl Into<String>) -> Self {
        KeyBase {
            base_name: Arc::from(name.into()),
            full_name: None,
            target: None,
        }
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    pub fn full_name(&self) -> Result<&str> {
        self.full_name.as_deref().ok_or_else(|| self.not_attached())
    }

    pub fn is_attached(&self) -> bool {
        self.full_name.is_some()
    }

    fn not_attached(&self) -> Error {
        Error::NotAttached {
            key: self.base_name.to_string(),
        }
    }

    /// Binds the key to a namespace and its default executor.
    pub(crate) fn attach(&mut self, namespace: &str, executor: Arc<dyn Executor>) {
        self.full_name = Some(Arc::from(qualify(namespace, &self.base_name)));
        self.target = Some(Target::Direct(executor));
    }

    pub(crate) fn retarget(&mut self, target: Target) {
        self.target = Some(target);
    }

    fn target(&self) -> Result<(&str, &Target)> {
        match (self.full_name.as_deref(), self.target.as_ref()) {
            (Some(name), Some(target)) => Ok((name, target)),
            _ => Err(self.not_attached()),
        }
    }

    /// The direct executor, for operations that take several round trips
    /// and cannot be queued.
    pub(crate) fn direct(&self) -> Result<(String, Arc<dyn Executor>)> {
        match self.target()? {
            (name, Target::Direct(executor)) => Ok((name.to_string(), Arc::clone(executor))),
            _ => Err(Error::invalid_argument(format!(
                "'{}' targets a transaction or batch; enumeration needs a direct connection",
                self.base_name
            ))),
        }
    }

    /// Builds one command for this key and sends it to the current target.
    ///
    /// `build` runs now, so a key bound to a transaction or batch queues the
    /// command in call order. Build errors (unattached key, codec failure,
    /// bad argument) come back without anything being queued.
    pub(crate) fn run<R, B, D>(&self, build: B, decode: D) -> Pending<R>
    where
        R: Send + 'static,
        B: FnOnce(&str) -> Result<Command>,
        D: FnOnce(RespValue) -> Result<R> + Send + 'static,
    {
        let (name, target) = match self.target() {
            Ok(found) => found,
            Err(e) => return Pending::failed(e),
        };
        match build(name) {
            Ok(cmd) => target.submit(cmd).map(decode),
            Err(e) => Pending::failed(e),
        }
    }
}

/// `namespace:name`, or just `name` when the namespace is empty.
pub(crate) fn qualify(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{}:{}", namespace, name)
    }
}

// ============================================================================
// Reply decoding
// ============================================================================

pub(crate) fn decode_one<T: Codec>(reply: RespValue) -> Result<T> {
    T::decode(reply.into_value()?)
}

pub(crate) fn decode_many<T: Codec>(reply: RespValue) -> Result<Vec<T>> {
    decode_all(reply.into_values()?)
}

/// Decodes a flat `[member, score, member, score, ...]` reply.
pub(crate) fn decode_scored<T: Codec>(reply: RespValue) -> Result<Vec<(T, f64)>> {
    let values = reply.into_values()?;
    if values.len() % 2 != 0 {
        return Err(Error::protocol("scored reply has an odd number of items"));
    }
    let mut out = Vec::with_capacity(values.len() / 2);
    let mut iter = values.into_iter();
    while let (Some(member), Some(score)) = (iter.next(), iter.next()) {
        out.push((T::decode(member)?, f64::decode(score)?));
    }
    Ok(out)
}

pub(crate) fn decode_unit(reply: RespValue) -> Result<()> {
    reply.into_value().map(|_| ())
}

/// Full names of several keys, failing on the first unattached one.
pub(crate) fn full_names<'a, K, I>(keys: I) -> Result<Vec<String>>
where
    K: RedisKey + 'a,
    I: IntoIterator<Item = &'a K>,
{
    keys.into_iter()
        .map(|k| k.full_name().map(str::to_string))
        .collect()
}

fn millis(d: Duration) -> Result<i64> {
    i64::try_from(d.as_millis()).map_err(|_| Error::invalid_argument("duration too large"))
}

// ============================================================================
// RedisKey
// ============================================================================

/// Behavior shared by every key object.
pub trait RedisKey: Clone + Send + Sync + 'static {
    fn from_base(base: KeyBase) -> Self;
    fn base(&self) -> &KeyBase;
    fn base_mut(&mut self) -> &mut KeyBase;

    /// An unattached key; commands fail with [`Error::NotAttached`] until a
    /// container adopts it.
    fn new(name: impl Into<String>) -> Self {
        Self::from_base(KeyBase::new(name))
    }

    fn base_name(&self) -> &str {
        self.base().base_name()
    }

    fn full_name(&self) -> Result<&str> {
        self.base().full_name()
    }

    /// A copy of this key whose commands are queued on `tx`.
    fn with_tx(&self, tx: &Transaction) -> Self {
        let mut copy = self.clone();
        copy.base_mut().retarget(Target::Transaction(tx.clone()));
        copy
    }

    /// A copy of this key whose commands are queued on `batch`.
    fn with_batch(&self, batch: &Batch) -> Self {
        let mut copy = self.clone();
        copy.base_mut().retarget(Target::Batch(batch.clone()));
        copy
    }

    /// Remaining time to live; `None` if the key is missing or persistent.
    fn time_to_live(&self) -> Pending<Option<Duration>> {
        self.base().run(
            |key| Ok(Command::new("PTTL").arg(key)),
            |reply| {
                let ms = reply.into_int()?;
                Ok((ms >= 0).then(|| Duration::from_millis(ms as u64)))
            },
        )
    }

    fn expire(&self, ttl: Duration) -> Pending<bool> {
        self.base().run(
            |key| Ok(Command::new("PEXPIRE").arg(key).arg_int(millis(ttl)?)),
            RespValue::into_bool,
        )
    }

    fn expire_at(&self, when: DateTime<Utc>) -> Pending<bool> {
        self.base().run(
            |key| Ok(Command::new("PEXPIREAT").arg(key).arg_int(when.timestamp_millis())),
            RespValue::into_bool,
        )
    }

    /// Time since the key was last read or written; `None` if missing.
    fn idle_time(&self) -> Pending<Option<Duration>> {
        self.base().run(
            |key| Ok(Command::new("OBJECT").arg("IDLETIME").arg(key)),
            |reply| match reply {
                RespValue::Integer(secs) if secs >= 0 => Ok(Some(Duration::from_secs(secs as u64))),
                other if other.is_null() => Ok(None),
                other => Err(Error::protocol(format!("unexpected idle time reply: {:?}", other))),
            },
        )
    }

    fn persist(&self) -> Pending<bool> {
        self.base().run(|key| Ok(Command::new("PERSIST").arg(key)), RespValue::into_bool)
    }

    fn exists(&self) -> Pending<bool> {
        self.base().run(|key| Ok(Command::new("EXISTS").arg(key)), RespValue::into_bool)
    }

    fn delete(&self) -> Pending<bool> {
        self.base().run(|key| Ok(Command::new("DEL").arg(key)), RespValue::into_bool)
    }
}

/// Implements [`RedisKey`] and `Clone` for a key struct with `base` and
/// `_marker` fields.
macro_rules! key_object {
    ($name:ident < $($p:ident),+ >) => {
        impl<$($p),+> Clone for $name<$($p),+> {
            fn clone(&self) -> Self {
                $name {
                    base: self.base.clone(),
                    _marker: std::marker::PhantomData,
                }
            }
        }

        impl<$($p: $crate::keys::Element),+> $crate::keys::RedisKey for $name<$($p),+> {
            fn from_base(base: $crate::keys::KeyBase) -> Self {
                $name {
                    base,
                    _marker: std::marker::PhantomData,
                }
            }

            fn base(&self) -> &$crate::keys::KeyBase {
                &self.base
            }

            fn base_mut(&mut self) -> &mut $crate::keys::KeyBase {
                &mut self.base
            }
        }

        impl<$($p),+> std::fmt::Debug for $name<$($p),+> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name)).field("base", &self.base).finish()
            }
        }
    };
}

pub(crate) use key_object;
