//! Values persisted under string keys in a key-value settings store.
//!
//! Two encodings are available. [`SettingsEncoding::Structured`] serializes
//! every value (strings included) into an opaque data blob, which round-trips
//! anything serde can encode. [`SettingsEncoding::Native`] stores the value
//! using the store's own types; values the store cannot represent (null at
//! the top level or inside arrays, integers beyond `i64`) are rejected on
//! write and map fields holding null are omitted.

use std::{collections::BTreeMap, convert::Infallible, fmt, sync::Arc};

use durable_core::{
    codec,
    slot::DurableSlot,
    storage::{SettingsError, SettingsStore, SettingsValue},
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use tracing::{debug, instrument, warn};

use crate::file_settings_store::FileSettingsStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingsEncoding {
    #[default]
    Structured,
    Native,
}

/// Settings backend bound to one store instance.
#[derive(Clone)]
pub struct SettingsBackend {
    store: Arc<dyn SettingsStore>,
    encoding: SettingsEncoding,
}

impl fmt::Debug for SettingsBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsBackend")
            .field("encoding", &self.encoding)
            .finish_non_exhaustive()
    }
}

impl SettingsBackend {
    pub fn new(store: Arc<dyn SettingsStore>, encoding: SettingsEncoding) -> Self {
        Self { store, encoding }
    }

    /// Structured backend over the shared on-disk settings domain.
    pub fn standard() -> Self {
        Self::new(FileSettingsStore::standard(), SettingsEncoding::Structured)
    }

    pub fn encoding(&self) -> SettingsEncoding {
        self.encoding
    }

    /// Load and decode `key`, or return `default` when absent or undecodable.
    #[instrument(skip_all, fields(key = %key))]
    pub fn read<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let stored = match self.store.object(key) {
            Ok(Some(stored)) => stored,
            Ok(None) => return default,
            Err(err) => {
                warn!("settings lookup failed, using default: {err}");
                return default;
            }
        };

        let decoded = match self.encoding {
            SettingsEncoding::Structured => match stored.as_data() {
                Some(bytes) => codec::decode(bytes).map_err(|err| err.to_string()),
                None => Err("stored value is not a data blob".to_string()),
            },
            SettingsEncoding::Native => {
                serde_json::from_value(from_native(stored)).map_err(|err| err.to_string())
            }
        };
        decoded.unwrap_or_else(|reason| {
            warn!("settings value undecodable, using default: {reason}");
            default
        })
    }

    /// Encode and store `value`, then synchronize. Failures are logged only.
    #[instrument(skip_all, fields(key = %key))]
    pub fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        match self.try_write(key, value) {
            Ok(()) => debug!("settings value persisted"),
            Err(err) => warn!("failed persisting settings value: {err}"),
        }
    }

    /// Clear `key` and synchronize. Failures are logged only.
    #[instrument(skip_all, fields(key = %key))]
    pub fn remove(&self, key: &str) {
        let result = self
            .store
            .remove(key)
            .and_then(|()| self.store.synchronize());
        if let Err(err) = result {
            warn!("failed removing settings value: {err}");
        }
    }

    fn try_write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), SettingsError> {
        let stored = match self.encoding {
            SettingsEncoding::Structured => SettingsValue::Data(
                codec::encode(value).map_err(|err| SettingsError::Unrepresentable {
                    reason: err.to_string(),
                })?,
            ),
            SettingsEncoding::Native => to_native(serde_json::to_value(value)?)?,
        };
        self.store.set(key, stored)?;
        self.store.synchronize()
    }
}

fn to_native(value: Value) -> Result<SettingsValue, SettingsError> {
    match value {
        Value::Null => Err(unrepresentable("null")),
        Value::Bool(b) => Ok(SettingsValue::Bool(b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(SettingsValue::Integer(i))
            } else if n.is_u64() {
                Err(unrepresentable("integer beyond i64 range"))
            } else {
                n.as_f64()
                    .map(SettingsValue::Float)
                    .ok_or_else(|| unrepresentable("non-finite number"))
            }
        }
        Value::String(s) => Ok(SettingsValue::String(s)),
        Value::Array(items) => items
            .into_iter()
            .map(to_native)
            .collect::<Result<Vec<_>, _>>()
            .map(SettingsValue::Array),
        Value::Object(fields) => {
            let mut dict = BTreeMap::new();
            for (name, field) in fields {
                if field.is_null() {
                    continue;
                }
                dict.insert(name, to_native(field)?);
            }
            Ok(SettingsValue::Dictionary(dict))
        }
    }
}

fn from_native(value: SettingsValue) -> Value {
    match value {
        SettingsValue::Data(bytes) => Value::Array(bytes.into_iter().map(Value::from).collect()),
        SettingsValue::String(s) => Value::String(s),
        SettingsValue::Integer(i) => Value::from(i),
        SettingsValue::Float(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        SettingsValue::Bool(b) => Value::Bool(b),
        SettingsValue::Array(items) => Value::Array(items.into_iter().map(from_native).collect()),
        SettingsValue::Dictionary(dict) => Value::Object(
            dict.into_iter()
                .map(|(name, field)| (name, from_native(field)))
                .collect::<Map<_, _>>(),
        ),
    }
}

fn unrepresentable(reason: &str) -> SettingsError {
    SettingsError::Unrepresentable {
        reason: reason.to_string(),
    }
}

/// Typed handle binding a key and default to a settings backend.
#[derive(Debug, Clone)]
pub struct UserDefaultsItem<T> {
    key: String,
    default: T,
    backend: SettingsBackend,
}

impl<T> UserDefaultsItem<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    pub fn new(key: impl Into<String>, default: T, backend: SettingsBackend) -> Self {
        Self {
            key: key.into(),
            default,
            backend,
        }
    }

    /// Bind to the shared on-disk settings domain.
    pub fn standard(key: impl Into<String>, default: T) -> Self {
        Self::new(key, default, SettingsBackend::standard())
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn get(&self) -> T {
        self.backend.read(&self.key, self.default.clone())
    }

    pub fn set(&self, value: &T) {
        self.backend.write(&self.key, value)
    }

    /// Reset to the default by clearing the stored value.
    pub fn remove(&self) {
        self.backend.remove(&self.key)
    }
}

impl<T> DurableSlot for UserDefaultsItem<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    type Value = T;
    type Error = Infallible;

    fn read(&self) -> Result<T, Infallible> {
        Ok(self.get())
    }

    fn write(&self, value: T) -> Result<(), Infallible> {
        self.set(&value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use durable_core::storage::InMemorySettingsStore;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct CodableStruct {
        str: String,
        int: i64,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
        nickname: Option<String>,
        ratio: f64,
        avatar: Vec<u8>,
        history: Vec<CodableStruct>,
    }

    fn struct1() -> CodableStruct {
        CodableStruct {
            str: "str".into(),
            int: 123,
        }
    }

    fn struct2() -> CodableStruct {
        CodableStruct {
            str: "rts".into(),
            int: 321,
        }
    }

    fn make_backend(encoding: SettingsEncoding) -> (Arc<InMemorySettingsStore>, SettingsBackend) {
        let store = InMemorySettingsStore::shared();
        let backend = SettingsBackend::new(store.clone(), encoding);
        (store, backend)
    }

    #[test]
    fn unset_keys_yield_defaults() {
        for encoding in [SettingsEncoding::Structured, SettingsEncoding::Native] {
            let (_, backend) = make_backend(encoding);
            let username = UserDefaultsItem::new("username", "defaultName".to_string(), backend.clone());
            let record = UserDefaultsItem::new("struct", struct1(), backend);
            assert_eq!(username.get(), "defaultName");
            assert_eq!(record.get(), struct1());
        }
    }

    #[test]
    fn structured_writes_store_opaque_data_and_synchronize() {
        let (store, backend) = make_backend(SettingsEncoding::Structured);
        let username = UserDefaultsItem::new("username", "defaultName".to_string(), backend.clone());
        let record = UserDefaultsItem::new("struct", struct1(), backend.clone());

        username.set(&"new name".to_string());
        assert_eq!(store.synchronize_count(), 1);
        record.set(&struct2());
        assert_eq!(store.synchronize_count(), 2);

        assert_eq!(
            store.object("username").expect("object"),
            Some(SettingsValue::Data(b"\"new name\"".to_vec()))
        );
        // A fresh handle re-reads the store.
        assert_eq!(backend.read("username", String::new()), "new name");
        assert_eq!(UserDefaultsItem::new("struct", struct1(), backend).get(), struct2());
    }

    #[test]
    fn native_writes_use_store_types() {
        let (store, backend) = make_backend(SettingsEncoding::Native);
        backend.write("username", "new name");
        backend.write("struct", &struct2());

        assert_eq!(
            store.object("username").expect("object"),
            Some(SettingsValue::String("new name".into()))
        );
        let mut expected = BTreeMap::new();
        expected.insert("str".to_string(), SettingsValue::String("rts".into()));
        expected.insert("int".to_string(), SettingsValue::Integer(321));
        assert_eq!(
            store.object("struct").expect("object"),
            Some(SettingsValue::Dictionary(expected))
        );
        assert_eq!(backend.read("username", String::new()), "new name");
        assert_eq!(backend.read("struct", struct1()), struct2());
        assert_eq!(store.synchronize_count(), 2);
    }

    #[test]
    fn nested_records_round_trip_in_both_encodings() {
        let profile = Profile {
            name: "Sam".into(),
            nickname: None,
            ratio: 0.25,
            avatar: vec![0, 1, 254, 255],
            history: vec![struct1(), struct2()],
        };
        let fallback = Profile {
            name: String::new(),
            nickname: Some("x".into()),
            ratio: 0.0,
            avatar: Vec::new(),
            history: Vec::new(),
        };

        for encoding in [SettingsEncoding::Structured, SettingsEncoding::Native] {
            let (_, backend) = make_backend(encoding);
            backend.write("profile", &profile);
            assert_eq!(backend.read("profile", fallback.clone()), profile, "{encoding:?}");
        }
    }

    #[test]
    fn native_rejects_unrepresentable_values() {
        let (store, backend) = make_backend(SettingsEncoding::Native);
        backend.write("big", &u64::MAX);
        backend.write("nothing", &Option::<String>::None);
        backend.write("holes", &vec![Some(1), None]);

        assert_eq!(store.synchronize_count(), 0);
        assert_eq!(backend.read("big", 7u64), 7);
        assert_eq!(backend.read("nothing", Some("d".to_string())), Some("d".to_string()));
        assert_eq!(backend.read("holes", Vec::<Option<i32>>::new()), Vec::new());

        // The same values round-trip when serialized.
        let (_, structured) = make_backend(SettingsEncoding::Structured);
        structured.write("big", &u64::MAX);
        assert_eq!(structured.read("big", 7u64), u64::MAX);
    }

    #[test]
    fn mismatched_payloads_fall_back_to_default() {
        let (store, backend) = make_backend(SettingsEncoding::Structured);
        store
            .set("username", SettingsValue::String("raw".into()))
            .expect("set");
        store
            .set("struct", SettingsValue::Data(b"{garbage".to_vec()))
            .expect("set");

        assert_eq!(backend.read("username", "default".to_string()), "default");
        assert_eq!(backend.read("struct", struct1()), struct1());
    }

    #[test]
    fn synchronize_failures_are_absorbed() {
        let (store, backend) = make_backend(SettingsEncoding::Structured);
        store.fail_synchronize(true);

        let item = UserDefaultsItem::new("k", 1u32, backend);
        item.set(&5);
        assert_eq!(store.synchronize_count(), 0);
    }

    #[test]
    fn remove_resets_to_default() {
        let (store, backend) = make_backend(SettingsEncoding::Structured);
        let item = UserDefaultsItem::new("k", struct1(), backend);
        item.set(&struct2());
        assert_eq!(item.get(), struct2());

        item.remove();
        assert_eq!(item.get(), struct1());
        assert_eq!(store.object("k").expect("object"), None);
        assert_eq!(store.synchronize_count(), 2);
    }

    #[test]
    fn durable_slot_reads_back_writes() {
        let (_, backend) = make_backend(SettingsEncoding::Native);
        let item = UserDefaultsItem::new("slot", struct1(), backend);
        item.write(struct2()).expect("infallible");
        assert_eq!(item.read().expect("infallible"), struct2());
    }
}
