//! Hash-of-fields record mapping
//!
//! A record type stored as a hash maps each field to one hash field named by
//! the lower-cased field name. The mapping is declared once per type with
//! [`hash_dto!`](crate::hash_dto) instead of being discovered at runtime.

use crate::error::Result;
use crate::value::Value;

pub trait HashDto: Default + Send + 'static {
    /// Hash field names, lower-cased, in declaration order.
    fn field_names() -> Vec<String>;

    /// Encodes every declared field.
    fn to_fields(&self) -> Result<Vec<(String, Value)>>;

    /// Decodes one field into the record. Unknown names are ignored.
    fn set_field(&mut self, name: &str, value: Value) -> Result<()>;

    /// Builds a record from `(name, value)` pairs; fields not present keep
    /// their zero value.
    fn from_fields<I>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut dto = Self::default();
        for (name, value) in fields {
            dto.set_field(&name, value)?;
        }
        Ok(dto)
    }
}

/// Declares the hash mapping for a struct whose fields all implement
/// [`Codec`](crate::Codec).
///
/// ```rust,ignore
/// #[derive(Default)]
/// struct User { id: i64, user_name: String, signup: DateTime<Utc> }
/// redis_objects::hash_dto!(User { id, user_name, signup });
/// ```
#[macro_export]
macro_rules! hash_dto {
    ($t:ty { $($field:ident),+ $(,)? }) => {
        impl $crate::HashDto for $t {
            fn field_names() -> ::std::vec::Vec<::std::string::String> {
                ::std::vec![$(stringify!($field).to_lowercase()),+]
            }

            fn to_fields(
                &self,
            ) -> $crate::Result<::std::vec::Vec<(::std::string::String, $crate::Value)>> {
                Ok(::std::vec![
                    $((stringify!($field).to_lowercase(), $crate::Codec::encode(&self.$field)?)),+
                ])
            }

            fn set_field(&mut self, name: &str, value: $crate::Value) -> $crate::Result<()> {
                $(
                    if name.eq_ignore_ascii_case(stringify!($field)) {
                        self.$field = $crate::Codec::decode(value)?;
                        return Ok(());
                    }
                )+
                Ok(())
            }
        }
    };
}
