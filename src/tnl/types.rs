//! TNL 类型定义

use std::fmt;

use serde::{Deserialize, Serialize};

/// 保序标记字段名
pub const PRESERVE_ORDER_KEY: &str = "preserve_order";
/// 显式字段顺序字段名
pub const FIELD_ORDER_KEY: &str = "field_order";

/// 字段值
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenValue {
    /// 叶子值（引号内原文，转义保持原样）
    Leaf(String),
    /// 嵌套 token（如 `measure { cardinal { ... } }`）
    Nested(Token),
    /// 布尔标记（如 `preserve_order: true`）
    Flag(bool),
}

/// 语义 token：有序的 (字段名, 值) 列表
///
/// 解析后不可变。顶层 token 形如 `tokens { <class> { ... } }`，
/// 即只有一个名为 `tokens` 的嵌套字段。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Token {
    fields: Vec<(String, TokenValue)>,
}

/// 一句话的 token 序列
pub type TokenSequence = Vec<Token>;

impl Token {
    pub fn new(fields: Vec<(String, TokenValue)>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[(String, TokenValue)] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// 按字段名查找（返回第一个同名字段）
    pub fn get(&self, name: &str) -> Option<&TokenValue> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// 是否带有 `preserve_order: true`
    pub fn preserves_order(&self) -> bool {
        matches!(self.get(PRESERVE_ORDER_KEY), Some(TokenValue::Flag(true)))
    }

    /// `field_order` 给出的字段名列表
    pub fn field_order(&self) -> Option<Vec<&str>> {
        match self.get(FIELD_ORDER_KEY) {
            Some(TokenValue::Leaf(order)) => Some(order.split_whitespace().collect()),
            _ => None,
        }
    }

    /// 字段顺序是否固定（不参与排列）
    pub fn is_order_fixed(&self) -> bool {
        self.preserves_order() || self.field_order().is_some()
    }

    /// 语义类别名
    ///
    /// 对顶层 token 返回 `tokens { ... }` 内第一个字段名（如 `cardinal`、`name`）
    pub fn semiotic_class(&self) -> Option<&str> {
        match self.fields.first() {
            Some((_, TokenValue::Nested(inner))) => inner.fields.first().map(|(key, _)| key.as_str()),
            Some((key, _)) => Some(key.as_str()),
            None => None,
        }
    }
}

/// 写出单个字段
///
/// 叶子 `key: "value"`，标记 `key: true`，嵌套 `key { ... }` 的内部交给 `write_inner` 展开
pub(crate) fn write_field<F>(out: &mut String, key: &str, value: &TokenValue, write_inner: F)
where
    F: FnOnce(&mut String, &Token),
{
    out.push_str(key);
    match value {
        TokenValue::Leaf(text) => {
            out.push_str(": \"");
            out.push_str(text);
            out.push('"');
        }
        TokenValue::Flag(flag) => out.push_str(if *flag { ": true" } else { ": false" }),
        TokenValue::Nested(inner) => {
            out.push_str(" {");
            if !inner.is_empty() {
                out.push(' ');
                write_inner(out, inner);
            }
            out.push_str(" }");
        }
    }
}

fn write_source_order(out: &mut String, token: &Token) {
    for (idx, (key, value)) in token.fields.iter().enumerate() {
        if idx > 0 {
            out.push(' ');
        }
        write_field(out, key, value, write_source_order);
    }
}

/// 按源顺序序列化
impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        write_source_order(&mut out, self);
        f.write_str(&out)
    }
}

/// 规范化结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizationResult {
    /// 规范化后的文本
    pub text: String,
    /// 是否有改动
    pub changed: bool,
    /// 标注文本（最短路径）
    pub tagged: Option<String>,
    /// 拆分后的块数
    pub chunks: usize,
    /// 是否回退为原文
    pub fell_back: bool,
    /// 处理耗时（微秒）
    pub elapsed_us: u64,
}

impl NormalizationResult {
    /// 创建无修改的结果
    pub fn unchanged(text: String, elapsed_us: u64) -> Self {
        Self {
            text,
            changed: false,
            tagged: None,
            chunks: 0,
            fell_back: false,
            elapsed_us,
        }
    }

    /// 创建回退原文的结果
    pub fn fallback(text: String, elapsed_us: u64) -> Self {
        Self {
            fell_back: true,
            ..Self::unchanged(text, elapsed_us)
        }
    }
}
