//! The lending ledger: positions, collateral debts and the engines that
//! move money between participants, the ledger and vaults.

pub mod debt;
pub mod engine;
pub mod position;
pub mod registry;
pub mod repayment;
pub mod settlement;

use crate::core::account::AccountId;
use crate::core::token::{AssetId, CollateralKind};

/// Map keys written as `"a:b[:c]"` strings so ledger tables serialize as JSON objects.
///
/// Components are percent-escaped (`%` and `:`), and collateral kinds use a
/// tagged form (`native` or `token/<id>`), so every key decodes back to the
/// tuple it came from.
pub(crate) trait KeyString: Sized {
    fn to_key_string(&self) -> String;
    fn from_key_string(s: &str) -> Option<Self>;
}

fn escape(part: &str) -> String {
    part.replace('%', "%25").replace(':', "%3A")
}

fn unescape(part: &str) -> Option<String> {
    let mut out = String::with_capacity(part.len());
    let mut rest = part;
    while let Some(at) = rest.find('%') {
        out.push_str(&rest[..at]);
        match rest.get(at..at + 3)? {
            "%25" => out.push('%'),
            "%3A" => out.push(':'),
            _ => return None,
        }
        rest = &rest[at + 3..];
    }
    out.push_str(rest);
    Some(out)
}

fn kind_key(kind: &CollateralKind) -> String {
    match kind {
        CollateralKind::Native => "native".to_string(),
        CollateralKind::Token(token) => format!("token/{}", escape(token.as_str())),
    }
}

fn parse_kind_key(part: &str) -> Option<CollateralKind> {
    if part == "native" {
        return Some(CollateralKind::Native);
    }
    let token = part.strip_prefix("token/")?;
    Some(CollateralKind::token(unescape(token)?))
}

impl KeyString for (AccountId, AssetId) {
    fn to_key_string(&self) -> String {
        format!("{}:{}", escape(self.0.as_str()), escape(self.1.as_str()))
    }

    fn from_key_string(s: &str) -> Option<Self> {
        let (participant, asset) = s.split_once(':')?;
        if asset.contains(':') {
            return None;
        }
        Some((
            AccountId::new(unescape(participant)?),
            AssetId::new(unescape(asset)?),
        ))
    }
}

impl KeyString for (AccountId, AssetId, CollateralKind) {
    fn to_key_string(&self) -> String {
        format!(
            "{}:{}:{}",
            escape(self.0.as_str()),
            escape(self.1.as_str()),
            kind_key(&self.2)
        )
    }

    fn from_key_string(s: &str) -> Option<Self> {
        let mut parts = s.split(':');
        let participant = unescape(parts.next()?)?;
        let asset = unescape(parts.next()?)?;
        let kind = parse_kind_key(parts.next()?)?;
        if parts.next().is_some() {
            return None;
        }
        Some((AccountId::new(participant), AssetId::new(asset), kind))
    }
}

pub(crate) mod keyed_serde {
    use super::KeyString;
    use serde::de::{self, MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Serialize};
    use std::collections::HashMap;
    use std::hash::Hash;
    use std::marker::PhantomData;

    pub fn serialize<K, V, S>(map: &HashMap<K, V>, serializer: S) -> Result<S::Ok, S::Error>
    where
        K: KeyString,
        V: Serialize,
        S: serde::Serializer,
    {
        let mut out = serializer.serialize_map(Some(map.len()))?;
        for (key, value) in map {
            out.serialize_entry(&key.to_key_string(), value)?;
        }
        out.end()
    }

    pub fn deserialize<'de, K, V, D>(deserializer: D) -> Result<HashMap<K, V>, D::Error>
    where
        K: KeyString + Eq + Hash,
        V: Deserialize<'de>,
        D: serde::Deserializer<'de>,
    {
        struct KeyedVisitor<K, V>(PhantomData<(K, V)>);

        impl<'de, K, V> Visitor<'de> for KeyedVisitor<K, V>
        where
            K: KeyString + Eq + Hash,
            V: Deserialize<'de>,
        {
            type Value = HashMap<K, V>;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a map with colon-separated keys")
            }

            fn visit_map<M: MapAccess<'de>>(self, mut access: M) -> Result<Self::Value, M::Error> {
                let mut map = HashMap::new();
                while let Some((raw, value)) = access.next_entry::<String, V>()? {
                    let key = K::from_key_string(&raw)
                        .ok_or_else(|| de::Error::custom(format!("invalid key: {raw}")))?;
                    map.insert(key, value);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(KeyedVisitor(PhantomData))
    }
}
