// 词级对齐
//
// 功能：对齐两个序列（通常是词序列），提取差异区域
// 使用 LCS（最长公共子序列）算法

/// 最大处理长度（超过此长度使用快速对齐）
const MAX_WORDS: usize = 2048;

/// Diff 操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffOp {
    Equal,
    /// 仅出现在 b 中
    Insert,
    /// 仅出现在 a 中
    Delete,
}

/// 差异区域（半开区间）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeRegion {
    pub a_start: usize,
    pub a_end: usize,
    pub b_start: usize,
    pub b_end: usize,
}

/// 对齐两个序列
///
/// 返回的操作序列按顺序消费 a（Equal / Delete）与 b（Equal / Insert）
pub fn align_words<T: PartialEq>(a: &[T], b: &[T]) -> Vec<DiffOp> {
    if a.len() > MAX_WORDS || b.len() > MAX_WORDS {
        tracing::debug!(
            "对齐序列过长 (a={}, b={}), 使用快速对齐",
            a.len(),
            b.len()
        );
        return quick_ops(a, b);
    }

    let table = lcs_table(a, b);
    build_ops(a, b, &table)
}

fn lcs_table<T: PartialEq>(a: &[T], b: &[T]) -> Vec<Vec<usize>> {
    let mut table = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for i in 0..a.len() {
        for j in 0..b.len() {
            if a[i] == b[j] {
                table[i + 1][j + 1] = table[i][j] + 1;
            } else {
                table[i + 1][j + 1] = table[i + 1][j].max(table[i][j + 1]);
            }
        }
    }
    table
}

fn build_ops<T: PartialEq>(a: &[T], b: &[T], table: &[Vec<usize>]) -> Vec<DiffOp> {
    let mut ops = Vec::new();
    let mut i = a.len();
    let mut j = b.len();
    while i > 0 || j > 0 {
        if i > 0 && j > 0 && a[i - 1] == b[j - 1] {
            ops.push(DiffOp::Equal);
            i -= 1;
            j -= 1;
        } else if j > 0 && (i == 0 || table[i][j - 1] >= table[i - 1][j]) {
            ops.push(DiffOp::Insert);
            j -= 1;
        } else {
            ops.push(DiffOp::Delete);
            i -= 1;
        }
    }
    ops.reverse();
    ops
}

/// 快速对齐（用于超长序列）
///
/// 只比较首尾相同部分，中间视为一个大变更
fn quick_ops<T: PartialEq>(a: &[T], b: &[T]) -> Vec<DiffOp> {
    let prefix_len = a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count();

    let suffix_len = a[prefix_len..]
        .iter()
        .rev()
        .zip(b[prefix_len..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();

    let mut ops = vec![DiffOp::Equal; prefix_len];
    ops.extend(std::iter::repeat(DiffOp::Delete).take(a.len() - prefix_len - suffix_len));
    ops.extend(std::iter::repeat(DiffOp::Insert).take(b.len() - prefix_len - suffix_len));
    ops.extend(std::iter::repeat(DiffOp::Equal).take(suffix_len));
    ops
}

/// 提取连续的非 Equal 区域
pub fn change_regions(ops: &[DiffOp]) -> Vec<ChangeRegion> {
    let mut regions = Vec::new();
    let mut a_idx = 0usize;
    let mut b_idx = 0usize;
    let mut current: Option<ChangeRegion> = None;

    for op in ops {
        match op {
            DiffOp::Equal => {
                if let Some(region) = current.take() {
                    regions.push(region);
                }
                a_idx += 1;
                b_idx += 1;
            }
            DiffOp::Delete | DiffOp::Insert => {
                let region = current.get_or_insert(ChangeRegion {
                    a_start: a_idx,
                    a_end: a_idx,
                    b_start: b_idx,
                    b_end: b_idx,
                });
                if *op == DiffOp::Delete {
                    a_idx += 1;
                    region.a_end = a_idx;
                } else {
                    b_idx += 1;
                    region.b_end = b_idx;
                }
            }
        }
    }

    if let Some(region) = current {
        regions.push(region);
    }
    regions
}

/// 合并间隔不超过 `max_gap` 个相同元素的区域
pub fn merge_regions(regions: Vec<ChangeRegion>, max_gap: usize) -> Vec<ChangeRegion> {
    let mut merged: Vec<ChangeRegion> = Vec::with_capacity(regions.len());
    for next in regions {
        match merged.last_mut() {
            Some(prev) if next.a_start - prev.a_end <= max_gap => {
                prev.a_end = next.a_end;
                prev.b_end = next.b_end;
            }
            _ => merged.push(next),
        }
    }
    merged
}

/// a 的位置 → b 的位置
///
/// 返回长度为 `a_len + 1` 的表：`map[i]` 为处理 a[i] 之前 b 已消费的元素数。
/// 夹在两个 a 元素之间的插入归前一个元素，开头的插入归 a[0]。
pub fn position_map(ops: &[DiffOp], a_len: usize) -> Vec<usize> {
    let mut map = vec![0usize; a_len + 1];
    let mut a_idx = 0usize;
    let mut b_idx = 0usize;

    for op in ops {
        match op {
            DiffOp::Equal => {
                if a_idx > 0 {
                    map[a_idx] = b_idx;
                }
                a_idx += 1;
                b_idx += 1;
            }
            DiffOp::Delete => {
                if a_idx > 0 {
                    map[a_idx] = b_idx;
                }
                a_idx += 1;
            }
            DiffOp::Insert => b_idx += 1,
        }
    }

    map[a_len] = b_idx;
    map
}

/// 相似度：`2·LCS / (|a| + |b|)`（按字符）
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }

    let matches = align_words(&a, &b)
        .iter()
        .filter(|op| **op == DiffOp::Equal)
        .count();
    2.0 * matches as f64 / (a.len() + b.len()) as f64
}

/// 字符错误率：编辑距离 / 参考串长度
pub fn character_error_rate(hypothesis: &str, reference: &str) -> f64 {
    let reference_len = reference.chars().count();
    let distance = strsim::levenshtein(hypothesis, reference);
    if reference_len == 0 {
        return if distance == 0 { 0.0 } else { 1.0 };
    }
    distance as f64 / reference_len as f64
}
