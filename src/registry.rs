//! 类型化配置表
//!
//! 固定的条目定义（名称、id、类型）加上每个条目的当前值。
//! 条目按下标访问，类型不匹配或下标越界属于调用方的编程错误。

use serde::Serialize;

/// NVS 键名最大长度（不含结尾的 NUL）
pub const MAX_ID_LEN: usize = 15;

/// 条目类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    String,
    Bool,
    Int,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKind::String => write!(f, "string"),
            EntryKind::Bool => write!(f, "bool"),
            EntryKind::Int => write!(f, "int"),
        }
    }
}

/// 单个条目的定义
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EntryInfo {
    /// 表单上显示的名称
    pub name: &'static str,
    /// 表单字段名，同时也是 NVS 键名
    pub id: &'static str,
    pub kind: EntryKind,
}

impl EntryInfo {
    pub const fn string(name: &'static str, id: &'static str) -> Self {
        Self {
            name,
            id,
            kind: EntryKind::String,
        }
    }

    pub const fn boolean(name: &'static str, id: &'static str) -> Self {
        Self {
            name,
            id,
            kind: EntryKind::Bool,
        }
    }

    pub const fn integer(name: &'static str, id: &'static str) -> Self {
        Self {
            name,
            id,
            kind: EntryKind::Int,
        }
    }
}

/// 条目的当前值，标签总是和对应定义的 `kind` 一致
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// `None` 表示从未设置过，和空字符串不同
    Str(Option<String>),
    Bool(bool),
    Int(i32),
}

impl Value {
    fn zeroed(kind: EntryKind) -> Self {
        match kind {
            EntryKind::String => Value::Str(None),
            EntryKind::Bool => Value::Bool(false),
            EntryKind::Int => Value::Int(0),
        }
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            Value::Str(_) => EntryKind::String,
            Value::Bool(_) => EntryKind::Bool,
            Value::Int(_) => EntryKind::Int,
        }
    }
}

/// 配置表错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// 条目定义本身有问题
    InvalidSchema(String),
    /// 下标越界
    IndexOutOfRange { index: usize, len: usize },
    /// 访问类型和定义不一致
    KindMismatch {
        index: usize,
        expected: EntryKind,
        actual: EntryKind,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidSchema(msg) => write!(f, "invalid schema: {}", msg),
            ConfigError::IndexOutOfRange { index, len } => {
                write!(f, "entry index {} out of range (len {})", index, len)
            }
            ConfigError::KindMismatch {
                index,
                expected,
                actual,
            } => write!(
                f,
                "entry {} is {}, accessed as {}",
                index, actual, expected
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

pub struct Registry {
    schema: &'static [EntryInfo],
    values: Vec<Value>,
}

impl Registry {
    /// 校验条目定义并分配初始值（字符串为空值，布尔为 false，整数为 0）
    pub fn new(schema: &'static [EntryInfo]) -> Result<Self, ConfigError> {
        if schema.is_empty() {
            return Err(ConfigError::InvalidSchema("schema is empty".to_string()));
        }

        for (i, info) in schema.iter().enumerate() {
            if info.id.is_empty() || info.id.len() > MAX_ID_LEN {
                return Err(ConfigError::InvalidSchema(format!(
                    "id {:?} must be 1..={} bytes",
                    info.id, MAX_ID_LEN
                )));
            }
            if schema[..i].iter().any(|other| other.id == info.id) {
                return Err(ConfigError::InvalidSchema(format!(
                    "duplicate id {:?}",
                    info.id
                )));
            }
        }

        let values = schema.iter().map(|info| Value::zeroed(info.kind)).collect();
        log::debug!("registry set up with {} entries", schema.len());

        Ok(Self { schema, values })
    }

    pub fn len(&self) -> usize {
        self.schema.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schema.is_empty()
    }

    pub fn schema(&self) -> &'static [EntryInfo] {
        self.schema
    }

    pub fn info(&self, index: usize) -> Option<&'static EntryInfo> {
        self.schema.get(index)
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// 按 id 查找下标，线性扫描，第一个匹配的生效
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.schema.iter().position(|info| info.id == id)
    }

    fn slot(&self, index: usize, expected: EntryKind) -> Result<&Value, ConfigError> {
        self.check(index, expected)?;
        Ok(&self.values[index])
    }

    fn slot_mut(&mut self, index: usize, expected: EntryKind) -> Result<&mut Value, ConfigError> {
        self.check(index, expected)?;
        Ok(&mut self.values[index])
    }

    fn check(&self, index: usize, expected: EntryKind) -> Result<(), ConfigError> {
        let info = self.schema.get(index).ok_or(ConfigError::IndexOutOfRange {
            index,
            len: self.schema.len(),
        })?;
        if info.kind != expected {
            return Err(ConfigError::KindMismatch {
                index,
                expected,
                actual: info.kind,
            });
        }
        Ok(())
    }

    pub fn try_get_bool(&self, index: usize) -> Result<bool, ConfigError> {
        match self.slot(index, EntryKind::Bool)? {
            Value::Bool(v) => Ok(*v),
            other => Err(self.tag_mismatch(index, other)),
        }
    }

    pub fn try_get_int(&self, index: usize) -> Result<i32, ConfigError> {
        match self.slot(index, EntryKind::Int)? {
            Value::Int(v) => Ok(*v),
            other => Err(self.tag_mismatch(index, other)),
        }
    }

    pub fn try_get_string(&self, index: usize) -> Result<Option<&str>, ConfigError> {
        match self.slot(index, EntryKind::String)? {
            Value::Str(v) => Ok(v.as_deref()),
            other => Err(self.tag_mismatch(index, other)),
        }
    }

    pub fn try_set_bool(&mut self, index: usize, value: bool) -> Result<(), ConfigError> {
        *self.slot_mut(index, EntryKind::Bool)? = Value::Bool(value);
        Ok(())
    }

    pub fn try_set_int(&mut self, index: usize, value: i32) -> Result<(), ConfigError> {
        *self.slot_mut(index, EntryKind::Int)? = Value::Int(value);
        Ok(())
    }

    /// 复制一份字符串保存，旧值随之释放
    pub fn try_set_string(&mut self, index: usize, value: Option<&str>) -> Result<(), ConfigError> {
        *self.slot_mut(index, EntryKind::String)? = Value::Str(value.map(str::to_owned));
        Ok(())
    }

    // values 只会按 schema 的类型写入，走到这里说明内部状态被破坏
    fn tag_mismatch(&self, index: usize, value: &Value) -> ConfigError {
        ConfigError::KindMismatch {
            index,
            expected: self.schema[index].kind,
            actual: value.kind(),
        }
    }

    /// # Panics
    /// 下标越界或条目不是布尔类型时
    pub fn get_bool(&self, index: usize) -> bool {
        self.try_get_bool(index).unwrap_or_else(|e| contract_violation(e))
    }

    /// # Panics
    /// 下标越界或条目不是整数类型时
    pub fn get_int(&self, index: usize) -> i32 {
        self.try_get_int(index).unwrap_or_else(|e| contract_violation(e))
    }

    /// # Panics
    /// 下标越界或条目不是字符串类型时
    pub fn get_string(&self, index: usize) -> Option<&str> {
        self.try_get_string(index)
            .unwrap_or_else(|e| contract_violation(e))
    }

    pub fn set_bool(&mut self, index: usize, value: bool) {
        self.try_set_bool(index, value)
            .unwrap_or_else(|e| contract_violation(e))
    }

    pub fn set_int(&mut self, index: usize, value: i32) {
        self.try_set_int(index, value)
            .unwrap_or_else(|e| contract_violation(e))
    }

    pub fn set_string(&mut self, index: usize, value: Option<&str>) {
        self.try_set_string(index, value)
            .unwrap_or_else(|e| contract_violation(e))
    }

    /// 当前所有值的 JSON 视图，`{id: value}`，未设置的字符串为 `null`
    pub fn snapshot(&self) -> serde_json::Value {
        let map = self
            .schema
            .iter()
            .zip(&self.values)
            .map(|(info, value)| {
                let json = match value {
                    Value::Str(s) => serde_json::json!(s),
                    Value::Bool(b) => serde_json::json!(b),
                    Value::Int(i) => serde_json::json!(i),
                };
                (info.id.to_string(), json)
            })
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}

#[cold]
#[track_caller]
fn contract_violation(e: ConfigError) -> ! {
    log::error!("config contract violation: {}", e);
    panic!("config contract violation: {}", e)
}

#[cfg(test)]
mod tests {
    use super::*;

    static SCHEMA: [EntryInfo; 3] = [
        EntryInfo::string("Name", "name"),
        EntryInfo::boolean("Enabled", "enabled"),
        EntryInfo::integer("Count", "count"),
    ];

    #[test]
    fn test_zeroed_on_setup() {
        let registry = Registry::new(&SCHEMA).unwrap();
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.get_string(0), None);
        assert!(!registry.get_bool(1));
        assert_eq!(registry.get_int(2), 0);
    }

    #[test]
    fn test_set_and_get() {
        let mut registry = Registry::new(&SCHEMA).unwrap();
        registry.set_string(0, Some("device"));
        registry.set_bool(1, true);
        registry.set_int(2, -42);

        assert_eq!(registry.get_string(0), Some("device"));
        assert!(registry.get_bool(1));
        assert_eq!(registry.get_int(2), -42);
    }

    #[test]
    fn test_set_string_replaces_and_clears() {
        let mut registry = Registry::new(&SCHEMA).unwrap();
        let first = String::from("first");
        registry.set_string(0, Some(&first));
        drop(first);
        assert_eq!(registry.get_string(0), Some("first"));

        registry.set_string(0, Some("second"));
        assert_eq!(registry.get_string(0), Some("second"));

        registry.set_string(0, Some(""));
        assert_eq!(registry.get_string(0), Some(""));

        registry.set_string(0, None);
        assert_eq!(registry.get_string(0), None);
    }

    #[test]
    fn test_index_of() {
        let registry = Registry::new(&SCHEMA).unwrap();
        assert_eq!(registry.index_of("enabled"), Some(1));
        assert_eq!(registry.index_of("count"), Some(2));
        assert_eq!(registry.index_of("Count"), None);
        assert_eq!(registry.index_of(""), None);
    }

    #[test]
    fn test_invalid_schema() {
        static EMPTY: [EntryInfo; 0] = [];
        static DUPLICATE: [EntryInfo; 2] = [
            EntryInfo::string("A", "same"),
            EntryInfo::integer("B", "same"),
        ];
        static LONG_ID: [EntryInfo; 1] = [EntryInfo::string("A", "sixteen_bytes_id")];

        assert!(matches!(
            Registry::new(&EMPTY),
            Err(ConfigError::InvalidSchema(_))
        ));
        assert!(matches!(
            Registry::new(&DUPLICATE),
            Err(ConfigError::InvalidSchema(_))
        ));
        assert!(matches!(
            Registry::new(&LONG_ID),
            Err(ConfigError::InvalidSchema(_))
        ));
    }

    #[test]
    fn test_try_accessors_report_mismatch() {
        let mut registry = Registry::new(&SCHEMA).unwrap();

        // 每个类型组合都要报错
        for index in 0..SCHEMA.len() {
            let kind = SCHEMA[index].kind;
            assert_eq!(registry.try_get_bool(index).is_ok(), kind == EntryKind::Bool);
            assert_eq!(registry.try_get_int(index).is_ok(), kind == EntryKind::Int);
            assert_eq!(
                registry.try_get_string(index).is_ok(),
                kind == EntryKind::String
            );
            assert_eq!(
                registry.try_set_bool(index, true).is_ok(),
                kind == EntryKind::Bool
            );
            assert_eq!(registry.try_set_int(index, 1).is_ok(), kind == EntryKind::Int);
            assert_eq!(
                registry.try_set_string(index, Some("x")).is_ok(),
                kind == EntryKind::String
            );
        }

        assert_eq!(
            registry.try_get_int(0),
            Err(ConfigError::KindMismatch {
                index: 0,
                expected: EntryKind::Int,
                actual: EntryKind::String,
            })
        );
        assert_eq!(
            registry.try_get_bool(3),
            Err(ConfigError::IndexOutOfRange { index: 3, len: 3 })
        );
    }

    #[test]
    #[should_panic(expected = "contract violation")]
    fn test_get_bool_on_string_panics() {
        Registry::new(&SCHEMA).unwrap().get_bool(0);
    }

    #[test]
    #[should_panic(expected = "contract violation")]
    fn test_get_int_on_bool_panics() {
        Registry::new(&SCHEMA).unwrap().get_int(1);
    }

    #[test]
    #[should_panic(expected = "contract violation")]
    fn test_get_string_on_int_panics() {
        Registry::new(&SCHEMA).unwrap().get_string(2);
    }

    #[test]
    #[should_panic(expected = "contract violation")]
    fn test_set_bool_on_int_panics() {
        Registry::new(&SCHEMA).unwrap().set_bool(2, true);
    }

    #[test]
    #[should_panic(expected = "contract violation")]
    fn test_set_int_on_string_panics() {
        Registry::new(&SCHEMA).unwrap().set_int(0, 1);
    }

    #[test]
    #[should_panic(expected = "contract violation")]
    fn test_set_string_on_bool_panics() {
        Registry::new(&SCHEMA).unwrap().set_string(1, Some("on"));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_out_of_range_panics() {
        Registry::new(&SCHEMA).unwrap().get_int(7);
    }

    #[test]
    fn test_snapshot() {
        let mut registry = Registry::new(&SCHEMA).unwrap();
        assert_eq!(
            registry.snapshot(),
            serde_json::json!({"name": null, "enabled": false, "count": 0})
        );

        registry.set_string(0, Some("Ann"));
        registry.set_int(2, 9);
        assert_eq!(
            registry.snapshot(),
            serde_json::json!({"name": "Ann", "enabled": false, "count": 9})
        );
    }
}
