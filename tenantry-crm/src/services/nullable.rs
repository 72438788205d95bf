//! Clearable patch fields.
//!
//! Used as `#[serde(default, deserialize_with = "nullable::field")]` on an
//! `Option<Option<T>>`: a missing key stays `None` (leave the value
//! alone), an explicit `null` becomes `Some(None)` (clear it).

use serde::{Deserialize, Deserializer};

pub fn field<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
