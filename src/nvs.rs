//! 基于 ESP-IDF NVS 的存储后端

use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
use esp_idf_svc::sys::EspError;

use crate::store::{KeyValueStore, StoreBackend, StoreError};

#[derive(Clone)]
pub struct NvsBackend {
    partition: EspDefaultNvsPartition,
}

impl NvsBackend {
    pub fn new(partition: EspDefaultNvsPartition) -> Self {
        Self { partition }
    }

    /// 取默认分区，分区满或版本变化时由 esp-idf-svc 负责擦除重建
    pub fn take() -> anyhow::Result<Self> {
        Ok(Self::new(EspDefaultNvsPartition::take()?))
    }
}

impl StoreBackend for NvsBackend {
    type Handle = NvsStore;

    fn open(&self, namespace: &str) -> Result<NvsStore, StoreError> {
        let nvs = EspNvs::new(self.partition.clone(), namespace, true)
            .map_err(|e| StoreError::Open(format!("{}: {:?}", namespace, e)))?;
        Ok(NvsStore { nvs })
    }
}

/// 打开的 NVS 命名空间，drop 时由 `EspNvs` 关闭句柄
pub struct NvsStore {
    nvs: EspNvs<NvsDefault>,
}

fn backend_err(key: &str) -> impl FnOnce(EspError) -> StoreError + '_ {
    move |e| StoreError::Backend {
        key: key.to_string(),
        msg: format!("{:?}", e),
    }
}

impl KeyValueStore for NvsStore {
    fn get_u8(&self, key: &str) -> Result<Option<u8>, StoreError> {
        self.nvs.get_u8(key).map_err(backend_err(key))
    }

    fn get_i32(&self, key: &str) -> Result<Option<i32>, StoreError> {
        self.nvs.get_i32(key).map_err(backend_err(key))
    }

    fn str_len(&self, key: &str) -> Result<Option<usize>, StoreError> {
        self.nvs.str_len(key).map_err(backend_err(key))
    }

    fn get_str<'a>(&self, key: &str, buf: &'a mut [u8]) -> Result<Option<&'a str>, StoreError> {
        self.nvs.get_str(key, buf).map_err(backend_err(key))
    }

    fn set_u8(&mut self, key: &str, value: u8) -> Result<(), StoreError> {
        self.nvs.set_u8(key, value).map_err(backend_err(key))
    }

    fn set_i32(&mut self, key: &str, value: i32) -> Result<(), StoreError> {
        self.nvs.set_i32(key, value).map_err(backend_err(key))
    }

    fn set_str(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.nvs.set_str(key, value).map_err(backend_err(key))
    }
}
