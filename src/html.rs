//! 内嵌 HTML 静态资源

/// 表单页面的头部，结尾停在 `<form>` 标签内
pub const HEADER_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Device Configuration</title>
    <style>
        * { box-sizing: border-box; }
        body {
            font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
            background: #1a1a2e;
            color: #eee;
            padding: 20px;
        }
        form {
            max-width: 400px;
            margin: 0 auto;
        }
        h1 {
            text-align: center;
            font-size: 24px;
            color: #00d4ff;
        }
        label {
            display: block;
            margin-bottom: 12px;
            font-size: 14px;
            color: #aaa;
        }
        input[type="text"], input[type="number"] {
            width: 100%;
            padding: 12px;
            border: 1px solid #333;
            border-radius: 8px;
            background: #16213e;
            color: #fff;
            font-size: 16px;
        }
        input[type="submit"] {
            width: 100%;
            padding: 14px;
            border: none;
            border-radius: 8px;
            background: #00d4ff;
            color: #1a1a2e;
            font-size: 16px;
            font-weight: bold;
        }
    </style>
</head>
<body>
<h1>Device Configuration</h1>
<form method="post" action="/config">
"#;

pub const SUBMIT_HTML: &str = r#"<input type="submit" value="Save" />"#;

pub const FOOTER_HTML: &str = "</form></body></html>";
