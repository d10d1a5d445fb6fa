//! 配置表单渲染
//!
//! 先对一个只计数的 sink 跑一遍格式化得到精确长度，再按这个长度分配
//! 缓冲区写第二遍，输出既不浪费也不会截断。

use std::fmt::{self, Write};

use crate::html;
use crate::registry::{Registry, Value};

/// 只累计长度的写入端
#[derive(Debug, Default)]
struct CountingSink {
    len: usize,
}

impl Write for CountingSink {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.len += s.len();
        Ok(())
    }
}

/// HTML 属性/文本转义
struct Escaped<'a>(&'a str);

impl fmt::Display for Escaped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rest = self.0;
        while let Some(pos) = rest.find(['&', '<', '>', '"', '\'']) {
            f.write_str(&rest[..pos])?;
            let entity = match rest.as_bytes()[pos] {
                b'&' => "&amp;",
                b'<' => "&lt;",
                b'>' => "&gt;",
                b'"' => "&quot;",
                _ => "&#39;",
            };
            f.write_str(entity)?;
            rest = &rest[pos + 1..];
        }
        f.write_str(rest)
    }
}

fn write_form<W: Write>(out: &mut W, registry: &Registry) -> fmt::Result {
    out.write_str(html::HEADER_HTML)?;

    for (index, info) in registry.schema().iter().enumerate() {
        write!(out, "<label>{} ", Escaped(info.name))?;
        match registry.value(index) {
            Some(Value::Bool(checked)) => write!(
                out,
                r#"<input name="{}" type="checkbox" {}/><br/>"#,
                Escaped(info.id),
                if *checked { "checked " } else { "" }
            )?,
            Some(Value::Int(value)) => write!(
                out,
                r#"<input name="{}" type="number" value="{}" /><br/>"#,
                Escaped(info.id),
                value
            )?,
            Some(Value::Str(value)) => write!(
                out,
                r#"<input name="{}" type="text" value="{}" /><br/>"#,
                Escaped(info.id),
                Escaped(value.as_deref().unwrap_or_default())
            )?,
            None => {}
        }
        out.write_str("</label>")?;
    }

    out.write_str(html::SUBMIT_HTML)?;
    out.write_str(html::FOOTER_HTML)
}

/// 渲染完整的配置页面
pub fn render(registry: &Registry) -> String {
    let mut sink = CountingSink::default();
    // 写入 CountingSink 和 String 都不会失败
    let _ = write_form(&mut sink, registry);

    let mut page = String::with_capacity(sink.len);
    let _ = write_form(&mut page, registry);
    debug_assert_eq!(page.len(), sink.len);

    log::debug!("rendered config page: {} bytes", page.len());
    page
}
