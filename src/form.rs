//! `application/x-www-form-urlencoded` 表单解析
//!
//! 只处理 `%XX` 转义，`+` 不当作空格。

use crate::registry::{EntryKind, Registry};

/// 表单中的一个字段，没有 `=` 时 value 为 `None`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormField<'a> {
    pub key: &'a str,
    pub value: Option<&'a str>,
}

/// 按 `&` 拆分字段，空段（比如结尾多出的 `&`）直接跳过
pub fn parse_form(body: &str) -> impl Iterator<Item = FormField<'_>> {
    body.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => FormField {
                key,
                value: Some(value),
            },
            None => FormField {
                key: pair,
                value: None,
            },
        })
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

// 和 strtol(.., 16) 一样只取开头的十六进制数字，一个都没有时得到 0
fn decode_escape(pair: &[u8]) -> u8 {
    let mut value = 0u8;
    let mut digits = 0;
    for d in pair.iter().map_while(|&b| hex_digit(b)) {
        value = value << 4 | d;
        digits += 1;
    }
    if digits != 2 {
        log::warn!(
            "invalid hex '{}' when decoding form value",
            String::from_utf8_lossy(pair)
        );
    }
    value
}

/// 解码 `%XX` 转义，每个转义固定消耗三个输入字节，其余字节原样输出
pub fn percent_decode(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        if input[i] == b'%' {
            let end = (i + 3).min(input.len());
            out.push(decode_escape(&input[i + 1..end]));
            i += 3;
        } else {
            out.push(input[i]);
            i += 1;
        }
    }
    out
}

/// 除字母数字和 `-_.~` 外的字节都编码成 `%XX`
pub fn percent_encode(input: &[u8]) -> String {
    urlencoding::encode_binary(input).into_owned()
}

// 解码出的 0 字节当作字符串结尾，NVS 存不了内部带 NUL 的字符串
fn decode_value(value: &str) -> String {
    let mut bytes = percent_decode(value.as_bytes());
    if let Some(nul) = bytes.iter().position(|&b| b == 0) {
        log::warn!("form value truncated at decoded NUL byte {}", nul);
        bytes.truncate(nul);
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// 把一次表单提交应用到配置表上
///
/// 未知字段忽略；提交里没有出现的布尔条目（浏览器不会提交未勾选的复选框）
/// 一律设为 false。整数解析失败时保留原值。不负责保存。
pub fn apply_form_body(registry: &mut Registry, body: &[u8]) {
    let body = String::from_utf8_lossy(body);
    let mut seen = vec![false; registry.len()];

    for field in parse_form(&body) {
        let Some(index) = registry.index_of(field.key) else {
            log::debug!("ignoring unknown form key '{}'", field.key);
            continue;
        };
        let Some(info) = registry.info(index) else {
            continue;
        };
        seen[index] = true;

        match info.kind {
            EntryKind::Bool => {
                let value = field.value == Some("on");
                log::info!("setting config '{}' = {}", field.key, value);
                registry.set_bool(index, value);
            }
            EntryKind::Int => {
                let text = field.value.map(decode_value).unwrap_or_default();
                match text.trim().parse::<i32>() {
                    Ok(value) => {
                        log::info!("setting config '{}' = {}", field.key, value);
                        registry.set_int(index, value);
                    }
                    Err(e) => {
                        log::warn!(
                            "got invalid integer '{}' for key '{}': {}",
                            text,
                            field.key,
                            e
                        );
                    }
                }
            }
            EntryKind::String => {
                let value = field.value.map(decode_value);
                log::info!("setting config '{}' = {:?}", field.key, value);
                registry.set_string(index, value.as_deref());
            }
        }
    }

    for (index, info) in registry.schema().iter().enumerate() {
        if info.kind == EntryKind::Bool && !seen[index] {
            registry.set_bool(index, false);
        }
    }
}
