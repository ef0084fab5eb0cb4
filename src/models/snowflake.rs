//! Serde helpers for platform ids: written as decimal strings, read from
//! either strings or plain numbers.

use serde::{Deserialize, Deserializer, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum Raw {
    Number(u64),
    Text(String),
}

impl Raw {
    fn into_id<E: serde::de::Error>(self) -> Result<u64, E> {
        match self {
            Raw::Number(n) => Ok(n),
            Raw::Text(s) => s.trim().parse().map_err(E::custom),
        }
    }
}

pub fn serialize<S: Serializer>(id: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(id)
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    Raw::deserialize(deserializer)?.into_id()
}

pub mod option {
    use super::*;

    pub fn serialize<S: Serializer>(id: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error> {
        match id {
            Some(id) => serializer.collect_str(id),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
        match Option::<Raw>::deserialize(deserializer)? {
            Some(raw) => raw.into_id().map(Some),
            None => Ok(None),
        }
    }
}
