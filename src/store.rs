//! 键值存储抽象
//!
//! 接口照着 `EspNvs` 的读写方法来定义：读不到键时返回 `Ok(None)`，
//! 其它错误一律归为 [`StoreError::Backend`]。

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// 打开命名空间失败
    Open(String),
    /// 读写过程中的底层错误
    Backend { key: String, msg: String },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Open(msg) => write!(f, "failed to open store: {}", msg),
            StoreError::Backend { key, msg } => write!(f, "store error on '{}': {}", key, msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// 已打开的存储句柄，drop 时关闭
pub trait KeyValueStore {
    fn get_u8(&self, key: &str) -> Result<Option<u8>, StoreError>;
    fn get_i32(&self, key: &str) -> Result<Option<i32>, StoreError>;
    /// 字符串所需的缓冲区长度，包含结尾的 NUL
    fn str_len(&self, key: &str) -> Result<Option<usize>, StoreError>;
    fn get_str<'a>(&self, key: &str, buf: &'a mut [u8]) -> Result<Option<&'a str>, StoreError>;

    fn set_u8(&mut self, key: &str, value: u8) -> Result<(), StoreError>;
    fn set_i32(&mut self, key: &str, value: i32) -> Result<(), StoreError>;
    fn set_str(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// 能按命名空间打开存储的后端
pub trait StoreBackend {
    type Handle: KeyValueStore;

    fn open(&self, namespace: &str) -> Result<Self::Handle, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    U8(u8),
    I32(i32),
    Str(String),
}

#[derive(Debug, Default)]
struct MemoryInner {
    records: BTreeMap<(String, String), Record>,
    fail_key: Option<String>,
    open_handles: usize,
}

/// 内存中的存储后端，供主机端测试和模拟使用
///
/// 克隆出来的实例共享同一份数据。
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn insert(&self, namespace: &str, key: &str, record: Record) {
        self.lock()
            .records
            .insert((namespace.to_string(), key.to_string()), record);
    }

    pub fn record(&self, namespace: &str, key: &str) -> Option<Record> {
        self.lock()
            .records
            .get(&(namespace.to_string(), key.to_string()))
            .cloned()
    }

    /// 之后对该键的任何读写都返回底层错误
    pub fn fail_on(&self, key: &str) {
        self.lock().fail_key = Some(key.to_string());
    }

    pub fn clear_failure(&self) {
        self.lock().fail_key = None;
    }

    /// 当前未关闭的句柄数
    pub fn open_handles(&self) -> usize {
        self.lock().open_handles
    }
}

impl StoreBackend for MemoryStore {
    type Handle = MemoryHandle;

    fn open(&self, namespace: &str) -> Result<MemoryHandle, StoreError> {
        self.lock().open_handles += 1;
        Ok(MemoryHandle {
            store: self.clone(),
            namespace: namespace.to_string(),
        })
    }
}

pub struct MemoryHandle {
    store: MemoryStore,
    namespace: String,
}

impl MemoryHandle {
    fn read(&self, key: &str) -> Result<Option<Record>, StoreError> {
        let inner = self.store.lock();
        if inner.fail_key.as_deref() == Some(key) {
            return Err(StoreError::Backend {
                key: key.to_string(),
                msg: "simulated failure".to_string(),
            });
        }
        Ok(inner
            .records
            .get(&(self.namespace.clone(), key.to_string()))
            .cloned())
    }

    fn write(&mut self, key: &str, record: Record) -> Result<(), StoreError> {
        let mut inner = self.store.lock();
        if inner.fail_key.as_deref() == Some(key) {
            return Err(StoreError::Backend {
                key: key.to_string(),
                msg: "simulated failure".to_string(),
            });
        }
        inner
            .records
            .insert((self.namespace.clone(), key.to_string()), record);
        Ok(())
    }
}

fn type_mismatch(key: &str) -> StoreError {
    StoreError::Backend {
        key: key.to_string(),
        msg: "type mismatch".to_string(),
    }
}

impl KeyValueStore for MemoryHandle {
    fn get_u8(&self, key: &str) -> Result<Option<u8>, StoreError> {
        match self.read(key)? {
            None => Ok(None),
            Some(Record::U8(v)) => Ok(Some(v)),
            Some(_) => Err(type_mismatch(key)),
        }
    }

    fn get_i32(&self, key: &str) -> Result<Option<i32>, StoreError> {
        match self.read(key)? {
            None => Ok(None),
            Some(Record::I32(v)) => Ok(Some(v)),
            Some(_) => Err(type_mismatch(key)),
        }
    }

    fn str_len(&self, key: &str) -> Result<Option<usize>, StoreError> {
        match self.read(key)? {
            None => Ok(None),
            Some(Record::Str(s)) => Ok(Some(s.len() + 1)),
            Some(_) => Err(type_mismatch(key)),
        }
    }

    fn get_str<'a>(&self, key: &str, buf: &'a mut [u8]) -> Result<Option<&'a str>, StoreError> {
        let s = match self.read(key)? {
            None => return Ok(None),
            Some(Record::Str(s)) => s,
            Some(_) => return Err(type_mismatch(key)),
        };
        if buf.len() <= s.len() {
            return Err(StoreError::Backend {
                key: key.to_string(),
                msg: format!("buffer of {} bytes too small", buf.len()),
            });
        }
        buf[..s.len()].copy_from_slice(s.as_bytes());
        buf[s.len()] = 0;
        std::str::from_utf8(&buf[..s.len()])
            .map(Some)
            .map_err(|e| StoreError::Backend {
                key: key.to_string(),
                msg: e.to_string(),
            })
    }

    fn set_u8(&mut self, key: &str, value: u8) -> Result<(), StoreError> {
        self.write(key, Record::U8(value))
    }

    fn set_i32(&mut self, key: &str, value: i32) -> Result<(), StoreError> {
        self.write(key, Record::I32(value))
    }

    fn set_str(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        // 和 NVS 一样按 C 字符串保存
        if value.contains('\0') {
            return Err(StoreError::Backend {
                key: key.to_string(),
                msg: "string contains an interior NUL byte".to_string(),
            });
        }
        self.write(key, Record::Str(value.to_string()))
    }
}

impl Drop for MemoryHandle {
    fn drop(&mut self) {
        let mut inner = self.store.lock();
        inner.open_handles = inner.open_handles.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        {
            let mut handle = store.open("ns").unwrap();
            handle.set_u8("flag", 1).unwrap();
            handle.set_i32("num", -7).unwrap();
            handle.set_str("text", "héllo").unwrap();
            assert_eq!(store.open_handles(), 1);
        }
        assert_eq!(store.open_handles(), 0);

        let handle = store.open("ns").unwrap();
        assert_eq!(handle.get_u8("flag").unwrap(), Some(1));
        assert_eq!(handle.get_i32("num").unwrap(), Some(-7));

        let len = handle.str_len("text").unwrap().unwrap();
        assert_eq!(len, "héllo".len() + 1);
        let mut buf = vec![0u8; len];
        assert_eq!(handle.get_str("text", &mut buf).unwrap(), Some("héllo"));
    }

    #[test]
    fn test_memory_store_namespaces_and_missing() {
        let store = MemoryStore::new();
        store.insert("a", "key", Record::I32(1));

        let other = store.open("b").unwrap();
        assert_eq!(other.get_i32("key").unwrap(), None);
        assert_eq!(other.str_len("key").unwrap(), None);
    }

    #[test]
    fn test_memory_store_errors() {
        let store = MemoryStore::new();
        store.insert("ns", "num", Record::I32(3));
        let handle = store.open("ns").unwrap();

        assert!(matches!(handle.get_u8("num"), Err(StoreError::Backend { .. })));

        store.fail_on("num");
        assert!(handle.get_i32("num").is_err());
        store.clear_failure();
        assert_eq!(handle.get_i32("num").unwrap(), Some(3));
    }

    #[test]
    fn test_memory_store_rejects_interior_nul() {
        let store = MemoryStore::new();
        let mut handle = store.open("ns").unwrap();

        assert!(matches!(
            handle.set_str("text", "x\0y"),
            Err(StoreError::Backend { .. })
        ));
        assert_eq!(store.record("ns", "text"), None);
    }
}
