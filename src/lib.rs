//! Typed data structures over a Redis-compatible store.
//!
//! A [`Container`] owns a namespace and a connection and hands out key
//! objects ([`Item`], [`Hash`], [`List`], [`Set`], [`SortedSet`],
//! [`Bitmap`]) whose operations encode and decode element values through
//! [`Codec`]. Operations can run directly, inside a conditional
//! [`Transaction`], or pipelined in a [`Batch`].
//!
//! [`MemoryStore`] is an in-process store speaking the same command set,
//! and [`MemoryServer`] serves it over RESP for end-to-end use.

pub mod codec;
pub mod command;
pub mod config;
pub mod connection;
pub mod container;
pub mod dto;
pub mod error;
pub mod executor;
pub mod fault;
pub mod keys;
pub mod memory;
pub mod multi;
pub mod pending;
pub mod resp;
pub mod server;
pub mod telemetry;
pub mod value;

pub use codec::{Codec, Json};
pub use command::{Command, Condition};
pub use config::{LogFormat, StoreConfig};
pub use connection::RedisConnection;
pub use container::{Container, KeyTemplate};
pub use dto::HashDto;
pub use error::{Error, Result};
pub use executor::{ConnectionEvent, Executor};
pub use fault::{FaultConfig, FaultyExecutor};
pub use keys::{
    Aggregate, Bitmap, Bitwise, DtoHash, Exclude, Hash, Item, List, Order, RedisKey, Set,
    SetOptions, SortOptions, SortType, SortedSet, When,
};
pub use memory::MemoryStore;
pub use multi::{Batch, Proxy, Transaction};
pub use pending::Pending;
pub use resp::RespValue;
pub use server::MemoryServer;
pub use value::Value;
