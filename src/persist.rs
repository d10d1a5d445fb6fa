//! 配置表和 NVS 之间的读写
//!
//! 每个条目一条记录，键名就是条目 id：布尔存成 u8，整数存成 i32，字符串存成 str。

use crate::registry::{EntryKind, Registry};
use crate::store::{KeyValueStore, StoreBackend, StoreError};

/// 默认的 NVS 命名空间
pub const DEFAULT_NAMESPACE: &str = "easy_config";

/// 从存储中读出所有条目
///
/// 返回 `Ok(false)` 表示某个键不存在：在它之前读到的条目已经写入配置表，
/// 之后的条目保持原值。其它存储错误通过 `Err` 返回。
pub fn load<B: StoreBackend>(
    registry: &mut Registry,
    backend: &B,
    namespace: &str,
) -> Result<bool, StoreError> {
    let store = backend.open(namespace)?;

    for index in 0..registry.len() {
        let Some(info) = registry.info(index) else {
            break;
        };

        let found = match info.kind {
            EntryKind::Bool => store
                .get_u8(info.id)?
                .map(|v| registry.set_bool(index, v != 0))
                .is_some(),
            EntryKind::Int => store
                .get_i32(info.id)?
                .map(|v| registry.set_int(index, v))
                .is_some(),
            EntryKind::String => match store.str_len(info.id)? {
                Some(len) => {
                    let mut buf = vec![0u8; len];
                    let value = store.get_str(info.id, &mut buf)?.map(str::to_owned);
                    match value {
                        Some(value) => {
                            registry.set_string(index, Some(&value));
                            true
                        }
                        None => false,
                    }
                }
                None => false,
            },
        };

        if !found {
            log::warn!("config '{}' not found in nvs", info.id);
            return Ok(false);
        }
    }

    log::info!("loaded {} config entries from nvs", registry.len());
    Ok(true)
}

/// 把所有条目写入存储，未设置的字符串写成空字符串
pub fn save<B: StoreBackend>(
    registry: &Registry,
    backend: &B,
    namespace: &str,
) -> Result<(), StoreError> {
    let mut store = backend.open(namespace)?;

    for (index, info) in registry.schema().iter().enumerate() {
        match info.kind {
            EntryKind::Bool => store.set_u8(info.id, registry.get_bool(index) as u8)?,
            EntryKind::Int => store.set_i32(info.id, registry.get_int(index))?,
            EntryKind::String => {
                store.set_str(info.id, registry.get_string(index).unwrap_or_default())?
            }
        }
    }

    log::info!("saved {} config entries to nvs", registry.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::EntryInfo;
    use crate::store::{MemoryStore, Record};

    const NS: &str = DEFAULT_NAMESPACE;

    static SCHEMA: [EntryInfo; 5] = [
        EntryInfo::string("SSID", "ssid"),
        EntryInfo::boolean("Enabled", "enabled"),
        EntryInfo::integer("Port", "port"),
        EntryInfo::string("Password", "pass"),
        EntryInfo::integer("Retries", "retries"),
    ];

    #[test]
    fn test_save_then_load() {
        let store = MemoryStore::new();
        let mut registry = Registry::new(&SCHEMA).unwrap();
        registry.set_string(0, Some("home"));
        registry.set_bool(1, true);
        registry.set_int(2, 8080);
        registry.set_string(3, Some("s3cret"));
        registry.set_int(4, -1);

        save(&registry, &store, NS).unwrap();
        assert_eq!(store.open_handles(), 0);
        assert_eq!(store.record(NS, "enabled"), Some(Record::U8(1)));

        let mut loaded = Registry::new(&SCHEMA).unwrap();
        assert!(load(&mut loaded, &store, NS).unwrap());
        assert_eq!(loaded.get_string(0), Some("home"));
        assert!(loaded.get_bool(1));
        assert_eq!(loaded.get_int(2), 8080);
        assert_eq!(loaded.get_string(3), Some("s3cret"));
        assert_eq!(loaded.get_int(4), -1);
        assert_eq!(store.open_handles(), 0);
    }

    #[test]
    fn test_absent_string_saved_as_empty() {
        let store = MemoryStore::new();
        let registry = Registry::new(&SCHEMA).unwrap();
        save(&registry, &store, NS).unwrap();

        assert_eq!(store.record(NS, "ssid"), Some(Record::Str(String::new())));

        let mut loaded = Registry::new(&SCHEMA).unwrap();
        assert!(load(&mut loaded, &store, NS).unwrap());
        assert_eq!(loaded.get_string(0), Some(""));
    }

    #[test]
    fn test_partial_load_keeps_earlier_entries() {
        let store = MemoryStore::new();
        store.insert(NS, "ssid", Record::Str("home".to_string()));
        store.insert(NS, "enabled", Record::U8(1));
        store.insert(NS, "port", Record::I32(80));
        // pass (entry 3) missing
        store.insert(NS, "retries", Record::I32(3));

        let mut registry = Registry::new(&SCHEMA).unwrap();
        registry.set_int(4, 9);

        assert!(!load(&mut registry, &store, NS).unwrap());
        assert_eq!(registry.get_string(0), Some("home"));
        assert!(registry.get_bool(1));
        assert_eq!(registry.get_int(2), 80);
        assert_eq!(registry.get_string(3), None);
        assert_eq!(registry.get_int(4), 9);
        assert_eq!(store.open_handles(), 0);
    }

    #[test]
    fn test_load_empty_store() {
        let store = MemoryStore::new();
        let mut registry = Registry::new(&SCHEMA).unwrap();
        assert!(!load(&mut registry, &store, NS).unwrap());
        assert_eq!(registry.get_string(0), None);
    }

    #[test]
    fn test_backend_error_is_reported() {
        let store = MemoryStore::new();
        let registry = Registry::new(&SCHEMA).unwrap();
        save(&registry, &store, NS).unwrap();

        store.fail_on("port");
        let mut loaded = Registry::new(&SCHEMA).unwrap();
        assert!(matches!(
            load(&mut loaded, &store, NS),
            Err(StoreError::Backend { ref key, .. }) if key == "port"
        ));
        assert!(save(&registry, &store, NS).is_err());
        assert_eq!(store.open_handles(), 0);
    }

    #[test]
    fn test_nonzero_u8_is_true() {
        let store = MemoryStore::new();
        store.insert(NS, "ssid", Record::Str(String::new()));
        store.insert(NS, "enabled", Record::U8(7));

        let mut registry = Registry::new(&SCHEMA).unwrap();
        assert!(!load(&mut registry, &store, NS).unwrap());
        assert!(registry.get_bool(1));
    }
}
