//! 语法接口与格（lattice）类型

use std::collections::HashSet;

use crate::error::GrammarError;

/// 加权路径
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedPath {
    /// 输出串
    pub text: String,
    /// 路径总权重（越小越好）
    pub weight: f32,
}

/// 语法作用于输入后得到的格
///
/// 只保留输出串与权重，按权重升序排列
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Lattice {
    paths: Vec<WeightedPath>,
}

impl Lattice {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_paths(mut paths: Vec<WeightedPath>) -> Self {
        paths.sort_by(|a, b| a.weight.total_cmp(&b.weight));
        Self { paths }
    }

    /// 单路径格
    pub fn single(text: impl Into<String>, weight: f32) -> Self {
        Self {
            paths: vec![WeightedPath {
                text: text.into(),
                weight,
            }],
        }
    }

    /// 没有可接受路径
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn paths(&self) -> &[WeightedPath] {
        &self.paths
    }

    /// 最短路径输出
    pub fn shortest_path(&self) -> Option<&str> {
        self.paths.first().map(|p| p.text.as_str())
    }

    /// 前 n 个互不相同的输出（最优在前）
    pub fn n_best(&self, n: usize) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.paths
            .iter()
            .map(|p| p.text.as_str())
            .filter(|text| seen.insert(*text))
            .take(n)
            .collect()
    }
}

/// 语法（外部 FST 或任意等价实现）
pub trait Grammar: Send + Sync {
    /// 作用于输入串，返回至多 `nshortest` 条最优路径
    fn apply(&self, input: &str, nshortest: usize) -> Result<Lattice, GrammarError>;
}

/// 语法阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// 标注（tokenize and classify）
    Tokenize,
    /// 转写
    Verbalize,
    /// 后处理（仅 TN）
    PostProcess,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Tokenize => "tokenize",
            Stage::Verbalize => "verbalize",
            Stage::PostProcess => "post_process",
        }
    }
}
