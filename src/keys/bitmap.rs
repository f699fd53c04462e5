//! Bit-level view of a single-value key.

use super::{full_names, Bitwise, Item, KeyBase, RedisKey};
use crate::command::Command;
use crate::error::Error;
use crate::pending::Pending;
use crate::resp::RespValue;
use std::ops::Deref;

/// An [`Item`] of raw bytes with bit operations on top. Every `Item`
/// operation is available through `Deref`.
#[derive(Clone, Debug)]
pub struct Bitmap {
    item: Item<Vec<u8>>,
}

impl RedisKey for Bitmap {
    fn from_base(base: KeyBase) -> Self {
        Bitmap {
            item: Item::from_base(base),
        }
    }

    fn base(&self) -> &KeyBase {
        self.item.base()
    }

    fn base_mut(&mut self) -> &mut KeyBase {
        self.item.base_mut()
    }
}

impl Deref for Bitmap {
    type Target = Item<Vec<u8>>;

    fn deref(&self) -> &Self::Target {
        &self.item
    }
}

fn bit_arg(bit: bool) -> &'static str {
    if bit {
        "1"
    } else {
        "0"
    }
}

impl Bitmap {
    /// Sets the bit at `offset` (bit 0 is the most significant bit of the
    /// first byte); resolves to the previous bit.
    pub fn set_bit(&self, offset: u64, bit: bool) -> Pending<bool> {
        self.base().run(
            |key| Ok(Command::new("SETBIT").arg(key).arg(offset.to_string()).arg(bit_arg(bit))),
            RespValue::into_bool,
        )
    }

    pub fn get_bit(&self, offset: u64) -> Pending<bool> {
        self.base().run(
            |key| Ok(Command::new("GETBIT").arg(key).arg(offset.to_string())),
            RespValue::into_bool,
        )
    }

    /// Set bits within bytes `[start, end]`; `(0, -1)` counts everything.
    pub fn bit_count(&self, start: i64, end: i64) -> Pending<i64> {
        self.base().run(
            |key| Ok(Command::new("BITCOUNT").arg(key).arg_int(start).arg_int(end)),
            RespValue::into_int,
        )
    }

    /// Position of the first `bit` within bytes `[start, end]`, or -1.
    /// An `end` of -1 is left off the command so that looking for a clear
    /// bit in an all-ones value reports the first bit past the end.
    pub fn bit_position(&self, bit: bool, start: i64, end: i64) -> Pending<i64> {
        self.base().run(
            |key| {
                let mut cmd = Command::new("BITPOS").arg(key).arg(bit_arg(bit)).arg_int(start);
                if end != -1 {
                    cmd = cmd.arg_int(end);
                }
                Ok(cmd)
            },
            RespValue::into_int,
        )
    }

    /// Stores `op` applied to `sources` in `dest`; resolves to the length
    /// of the result. `NOT` takes exactly one source.
    pub fn bitwise_op(op: Bitwise, dest: &Bitmap, sources: &[&Bitmap]) -> Pending<i64> {
        if sources.is_empty() {
            return Pending::failed(Error::invalid_argument("bitwise operation needs a source"));
        }
        if op == Bitwise::Not && sources.len() != 1 {
            return Pending::failed(Error::invalid_argument("NOT takes exactly one source"));
        }
        dest.base().run(
            |key| {
                Ok(Command::new("BITOP")
                    .arg(op.as_str())
                    .arg(key)
                    .args_from(full_names(sources.iter().copied())?))
            },
            RespValue::into_int,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::Container;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_bits() {
        let c = Container::new(Arc::new(MemoryStore::new()), "t");
        let bm = c.get_key::<Bitmap>("bits");
        assert!(!bm.set_bit(7, true).await.unwrap());
        assert!(bm.set_bit(7, true).await.unwrap());
        assert!(bm.get_bit(7).await.unwrap());
        assert!(!bm.get_bit(100).await.unwrap());
        assert_eq!(bm.get().await.unwrap(), vec![1u8]);
        assert_eq!(bm.bit_count(0, -1).await.unwrap(), 1);
        assert_eq!(bm.bit_position(true, 0, -1).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_clear_bit_past_end() {
        let c = Container::new(Arc::new(MemoryStore::new()), "t");
        let bm = c.get_key::<Bitmap>("ones");
        bm.set(&vec![0xff, 0xf0, 0x00]).await.unwrap();
        assert_eq!(bm.bit_position(false, 0, -1).await.unwrap(), 12);
        let full = c.get_key::<Bitmap>("full");
        full.set(&vec![0xff]).await.unwrap();
        assert_eq!(full.bit_position(false, 0, -1).await.unwrap(), 8);
        assert_eq!(full.bit_position(false, 0, 0).await.unwrap(), -1);
    }

    #[tokio::test]
    async fn test_bitwise_op() {
        let c = Container::new(Arc::new(MemoryStore::new()), "t");
        let a = c.get_key::<Bitmap>("a");
        let b = c.get_key::<Bitmap>("b");
        let dest = c.get_key::<Bitmap>("dest");
        a.set(&b"abc".to_vec()).await.unwrap();
        b.set(&b"`bc".to_vec()).await.unwrap();
        assert_eq!(Bitmap::bitwise_op(Bitwise::And, &dest, &[&*a, &*b]).await.unwrap(), 3);
        assert_eq!(dest.get().await.unwrap(), b"`bc".to_vec());
        assert!(matches!(
            Bitmap::bitwise_op(Bitwise::Not, &dest, &[&*a, &*b]).await,
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            Bitmap::bitwise_op(Bitwise::Or, &dest, &[]).await,
            Err(Error::InvalidArgument(_))
        ));
    }
}
