//! TNL 字段排列生成
//!
//! 标注语法输出的字段顺序不一定与转写语法期望的一致，因此需要枚举字段顺序的所有排列，
//! 逐个交给转写语法尝试。
//!
//! 每个序列化结果都对应一个整数下标：token 自身的字段顺序用 Lehmer 码编号，
//! 嵌套 token 的下标按混合进制拼接。迭代器只保存当前下标，按需生成字符串。
//! 下标 0 恒为源顺序。

use crate::tnl::types::{write_field, Token, TokenValue};

/// 阶乘（溢出时饱和）
pub fn factorial(n: u64) -> u64 {
    (1..=n).fold(1u64, |acc, k| acc.saturating_mul(k))
}

/// token 自身的字段顺序数量
fn own_orderings(token: &Token) -> u64 {
    if token.is_order_fixed() {
        1
    } else {
        factorial(token.len() as u64)
    }
}

/// 单个 token（含嵌套）的序列化数量
///
/// 保序 token 在自身层级只贡献 1，嵌套 token 仍可各自排列。
pub fn serialization_count(token: &Token) -> u64 {
    token
        .fields()
        .iter()
        .fold(own_orderings(token), |acc, (_, value)| match value {
            TokenValue::Nested(inner) => acc.saturating_mul(serialization_count(inner)),
            _ => acc,
        })
}

/// 第 `index` 个字段排列（Lehmer 码解码）
fn nth_permutation(len: usize, mut index: u64) -> Vec<usize> {
    let mut remaining: Vec<usize> = (0..len).collect();
    let mut order = Vec::with_capacity(len);

    for slot in (0..len).rev() {
        let block = factorial(slot as u64);
        let pick = ((index / block) as usize).min(remaining.len() - 1);
        index %= block;
        order.push(remaining.remove(pick));
    }

    order
}

/// `field_order` 指定的顺序：列出的字段在前，其余字段按源顺序在后
fn explicit_order(token: &Token, listed: &[&str]) -> Vec<usize> {
    let mut order = Vec::with_capacity(token.len());
    for name in listed {
        let found = token
            .fields()
            .iter()
            .enumerate()
            .find(|(idx, (key, _))| key.as_str() == *name && !order.contains(idx))
            .map(|(idx, _)| idx);
        if let Some(idx) = found {
            order.push(idx);
        }
    }
    for idx in 0..token.len() {
        if !order.contains(&idx) {
            order.push(idx);
        }
    }
    order
}

fn field_ordering(token: &Token, order_index: u64) -> Vec<usize> {
    if let Some(listed) = token.field_order() {
        explicit_order(token, &listed)
    } else if token.preserves_order() {
        (0..token.len()).collect()
    } else {
        nth_permutation(token.len(), order_index)
    }
}

/// 写出 token 的第 `index` 个序列化结果
fn write_nth(out: &mut String, token: &Token, index: u64) {
    let orderings = own_orderings(token);
    let order = field_ordering(token, index % orderings);
    let mut rest = index / orderings;

    // 嵌套下标按源字段顺序分配，与字段排列无关
    let mut nested_index = vec![0u64; token.len()];
    for (idx, (_, value)) in token.fields().iter().enumerate() {
        if let TokenValue::Nested(inner) = value {
            let count = serialization_count(inner).max(1);
            nested_index[idx] = rest % count;
            rest /= count;
        }
    }

    for (pos, &idx) in order.iter().enumerate() {
        if pos > 0 {
            out.push(' ');
        }
        let (key, value) = &token.fields()[idx];
        write_field(out, key, value, |out, inner| {
            write_nth(out, inner, nested_index[idx])
        });
    }
}

/// 一组 token 的排列迭代器
///
/// 有限、惰性、不可重启：每个序列化结果只生成一次。
pub struct Permutations<'a> {
    tokens: &'a [Token],
    counts: Vec<u64>,
    next: u64,
    total: u64,
}

impl<'a> Permutations<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        let counts: Vec<u64> = tokens.iter().map(serialization_count).collect();
        let total = if tokens.is_empty() {
            0
        } else {
            counts.iter().fold(1u64, |acc, c| acc.saturating_mul(*c))
        };

        Self {
            tokens,
            counts,
            next: 0,
            total,
        }
    }

    /// 序列化结果总数
    pub fn total(&self) -> u64 {
        self.total
    }
}

impl Iterator for Permutations<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.next >= self.total {
            return None;
        }

        // 笛卡尔积：最后一个 token 变化最快
        let mut rest = self.next;
        let mut indices = vec![0u64; self.tokens.len()];
        for (slot, count) in self.counts.iter().enumerate().rev() {
            let count = (*count).max(1);
            indices[slot] = rest % count;
            rest /= count;
        }
        self.next += 1;

        let mut out = String::new();
        for (slot, token) in self.tokens.iter().enumerate() {
            if slot > 0 {
                out.push(' ');
            }
            write_nth(&mut out, token, indices[slot]);
        }
        Some(out)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.total - self.next).ok();
        (remaining.unwrap_or(usize::MAX), remaining)
    }
}

/// 一个块（连续 token）的所有序列化结果
pub fn chunk_permutations(tokens: &[Token]) -> Permutations<'_> {
    Permutations::new(tokens)
}

impl Token {
    /// 单个 token 的所有序列化结果
    pub fn permutations(&self) -> Permutations<'_> {
        Permutations::new(std::slice::from_ref(self))
    }
}
