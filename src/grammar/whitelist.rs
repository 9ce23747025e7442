//! 白名单
//!
//! TSV 文件，每行 `书面形式<TAB>口语形式`。TN 把书面形式替换为口语形式，ITN 反之。
//! 命中的词组（整词匹配，最长优先）直接标为 `tokens { name: "..." }`，
//! 其余片段交给原标注语法。

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::config::Direction;
use crate::error::GrammarError;
use crate::grammar::types::{Grammar, Lattice, WeightedPath};

/// 白名单词表
#[derive(Debug, Clone, Default)]
pub struct Whitelist {
    entries: HashMap<String, String>,
    /// 最长词组的词数
    max_words: usize,
}

/// 切分后的片段
#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Plain(String),
    Listed(String),
}

impl Whitelist {
    /// 读取白名单文件
    pub fn load(path: &Path, direction: Direction) -> Result<Self, GrammarError> {
        let content = fs::read_to_string(path).map_err(|e| GrammarError::io(path, e))?;
        let whitelist = Self::parse(&content, direction)
            .map_err(|line| GrammarError::InvalidWhitelist {
                path: path.to_path_buf(),
                line,
            })?;

        tracing::info!("加载白名单: {} 条 ({})", whitelist.len(), path.display());
        Ok(whitelist)
    }

    /// 解析 TSV 内容，出错时返回行号
    pub fn parse(content: &str, direction: Direction) -> Result<Self, usize> {
        let mut whitelist = Self::default();

        for (idx, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            let mut columns = line.split('\t').map(str::trim);
            let (written, spoken) = match (columns.next(), columns.next()) {
                (Some(w), Some(s)) if !w.is_empty() && !s.is_empty() => (w, s),
                _ => return Err(idx + 1),
            };

            let (from, to) = match direction {
                Direction::Normalize => (written, spoken),
                Direction::InverseNormalize => (spoken, written),
            };
            whitelist.insert(from, to);
        }

        Ok(whitelist)
    }

    /// 插入词条（词组内空白折叠为单个空格，先出现者优先）
    pub fn insert(&mut self, from: &str, to: &str) {
        let words: Vec<&str> = from.split_whitespace().collect();
        if words.is_empty() {
            return;
        }
        self.max_words = self.max_words.max(words.len());
        self.entries
            .entry(words.join(" "))
            .or_insert_with(|| to.to_string());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, phrase: &str) -> Option<&str> {
        self.entries.get(phrase).map(String::as_str)
    }

    fn segments(&self, input: &str) -> Vec<Segment> {
        let words: Vec<&str> = input.split_whitespace().collect();
        let mut segments = Vec::new();
        let mut plain: Vec<&str> = Vec::new();
        let mut idx = 0;

        while idx < words.len() {
            let longest = self.max_words.min(words.len() - idx);
            let matched = (1..=longest).rev().find_map(|len| {
                self.get(&words[idx..idx + len].join(" "))
                    .map(|replacement| (len, replacement))
            });

            match matched {
                Some((len, replacement)) => {
                    if !plain.is_empty() {
                        segments.push(Segment::Plain(plain.join(" ")));
                        plain.clear();
                    }
                    segments.push(Segment::Listed(replacement.to_string()));
                    idx += len;
                }
                None => {
                    plain.push(words[idx]);
                    idx += 1;
                }
            }
        }

        if !plain.is_empty() {
            segments.push(Segment::Plain(plain.join(" ")));
        }
        segments
    }
}

fn name_token(text: &str) -> String {
    let escaped = text.replace('\\', "\\\\").replace('"', "\\\"");
    format!("tokens {{ name: \"{}\" }}", escaped)
}

/// 带白名单的标注语法
pub struct WhitelistTagger {
    inner: Arc<dyn Grammar>,
    whitelist: Whitelist,
}

impl WhitelistTagger {
    pub fn new(inner: Arc<dyn Grammar>, whitelist: Whitelist) -> Self {
        Self { inner, whitelist }
    }
}

impl Grammar for WhitelistTagger {
    fn apply(&self, input: &str, nshortest: usize) -> Result<Lattice, GrammarError> {
        let segments = self.whitelist.segments(input);
        if !segments.iter().any(|s| matches!(s, Segment::Listed(_))) {
            return self.inner.apply(input, nshortest);
        }

        let mut parts = Vec::with_capacity(segments.len());
        for segment in &segments {
            let lattice = match segment {
                Segment::Plain(text) => self.inner.apply(text, nshortest)?,
                Segment::Listed(replacement) => Lattice::single(name_token(replacement), 0.0),
            };
            if lattice.is_empty() {
                return Ok(Lattice::empty());
            }
            parts.push(lattice);
        }

        Ok(combine(&parts, nshortest.max(1)))
    }
}

/// 拼接各片段的格
///
/// 最优路径为各片段最优路径之和；其余候选每次只替换一个片段的路径
fn combine(parts: &[Lattice], n: usize) -> Lattice {
    let best: Vec<&WeightedPath> = parts.iter().filter_map(|l| l.paths().first()).collect();
    let total: f32 = best.iter().map(|p| p.weight).sum();

    let join = |replaced: Option<(usize, &WeightedPath)>| -> WeightedPath {
        let mut weight = total;
        let texts: Vec<&str> = best
            .iter()
            .enumerate()
            .map(|(idx, path)| match replaced {
                Some((at, alt)) if at == idx => {
                    weight += alt.weight - path.weight;
                    alt.text.as_str()
                }
                _ => path.text.as_str(),
            })
            .collect();
        WeightedPath {
            text: texts.join(" "),
            weight,
        }
    };

    let mut paths = vec![join(None)];
    for (idx, lattice) in parts.iter().enumerate() {
        for alt in lattice.paths().iter().skip(1) {
            paths.push(join(Some((idx, alt))));
        }
    }

    paths.sort_by(|a, b| a.weight.total_cmp(&b.weight));
    paths.truncate(n);
    Lattice::from_paths(paths)
}
