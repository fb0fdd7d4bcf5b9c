pub mod chain;
pub mod dataset;
pub mod table;

use serde::{Deserialize, Deserializer};

/// Decodes `null` as the type's default, the way the registry API leaves
/// unknown fields empty.
pub(crate) fn null_to_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
