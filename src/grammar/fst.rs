//! 基于 rustfst 的语法
//!
//! 语法按字节编码（标签 = UTF-8 字节值，0 为 epsilon），与 pynini 的 byte 模式一致。
//! 作用于输入时：构造线性字节接受器 → 与语法组合 → 投影到输出并确定化
//! （输出相同的路径合并为一条）→ 取 n 条最短路径 → 解码标签。

use std::path::Path;
use std::sync::Arc;

use rustfst::algorithms::compose::compose;
use rustfst::algorithms::determinize::determinize;
use rustfst::algorithms::rm_epsilon::rm_epsilon;
use rustfst::algorithms::tr_compares::ILabelCompare;
use rustfst::algorithms::{
    project, shortest_path_with_config, tr_sort, ProjectType, ShortestPathConfig,
};
use rustfst::prelude::*;
use rustfst::utils::acceptor;

use crate::error::GrammarError;
use crate::grammar::types::{Grammar, Lattice, WeightedPath};

type StdFst = VectorFst<TropicalWeight>;

/// rustfst 语法
#[derive(Debug, Clone)]
pub struct FstGrammar {
    fst: Arc<StdFst>,
}

impl FstGrammar {
    /// 包装已有 FST（按输入标签排序，便于组合）
    pub fn from_fst(mut fst: StdFst) -> Self {
        tr_sort(&mut fst, ILabelCompare {});
        Self { fst: Arc::new(fst) }
    }

    /// 读取 OpenFst 二进制格式
    pub fn read(path: &Path) -> Result<Self, GrammarError> {
        let fst = StdFst::read(path).map_err(|e| GrammarError::engine("read", e))?;
        Ok(Self::from_fst(fst))
    }

    /// 读取 AT&T 文本格式（`*.fst.txt`）
    pub fn read_text(path: &Path) -> Result<Self, GrammarError> {
        let fst = StdFst::read_text(path).map_err(|e| GrammarError::engine("read_text", e))?;
        Ok(Self::from_fst(fst))
    }

    /// 按扩展名选择读取方式
    pub fn compile(source: &Path) -> Result<Self, GrammarError> {
        let is_text = source
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("txt"))
            .unwrap_or(false);

        if is_text {
            Self::read_text(source)
        } else {
            Self::read(source)
        }
    }

    /// 写出 OpenFst 二进制格式
    pub fn write(&self, path: &Path) -> Result<(), GrammarError> {
        self.fst
            .write(path)
            .map_err(|e| GrammarError::engine("write", e))
    }

    pub fn num_states(&self) -> usize {
        self.fst.num_states()
    }

    fn encode(input: &str) -> Vec<Label> {
        input.bytes().map(Label::from).collect()
    }

    fn decode(olabels: &[Label]) -> Result<String, GrammarError> {
        let bytes = olabels
            .iter()
            .filter(|&&label| label != EPS_LABEL)
            .map(|&label| u8::try_from(label).map_err(|_| GrammarError::InvalidOutput))
            .collect::<Result<Vec<u8>, _>>()?;
        String::from_utf8(bytes).map_err(|_| GrammarError::InvalidOutput)
    }
}

impl Grammar for FstGrammar {
    fn apply(&self, input: &str, nshortest: usize) -> Result<Lattice, GrammarError> {
        let input_fst: StdFst = acceptor(&Self::encode(input), TropicalWeight::one());

        let mut composed: StdFst = compose::<TropicalWeight, StdFst, StdFst, StdFst, _, _>(
            input_fst,
            Arc::clone(&self.fst),
        )
        .map_err(|e| GrammarError::engine("compose", e))?;

        if composed.start().is_none() {
            return Ok(Lattice::empty());
        }

        project(&mut composed, ProjectType::ProjectOutput);
        rm_epsilon(&mut composed).map_err(|e| GrammarError::engine("rm_epsilon", e))?;
        if composed.start().is_none() {
            return Ok(Lattice::empty());
        }
        let outputs: StdFst =
            determinize(&composed).map_err(|e| GrammarError::engine("determinize", e))?;

        let config = ShortestPathConfig::default().with_nshortest(nshortest.max(1));
        let best: StdFst = shortest_path_with_config(&outputs, config)
            .map_err(|e| GrammarError::engine("shortest_path", e))?;

        if best.start().is_none() {
            return Ok(Lattice::empty());
        }

        let mut paths = Vec::new();
        for path in best.paths_iter() {
            paths.push(WeightedPath {
                text: Self::decode(&path.olabels)?,
                weight: *path.weight.value(),
            });
        }

        Ok(Lattice::from_paths(paths))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 以文本格式构造一个把 "ab" 改写为 "xy" 的单路径 FST
    fn rewrite_ab_to_xy() -> StdFst {
        let text = format!(
            "0\t1\t{}\t{}\n1\t2\t{}\t{}\n2\n",
            b'a', b'x', b'b', b'y'
        );
        StdFst::from_text_string(&text).unwrap()
    }

    #[test]
    fn test_apply_rewrites_bytes() {
        let grammar = FstGrammar::from_fst(rewrite_ab_to_xy());
        let lattice = grammar.apply("ab", 1).unwrap();
        assert_eq!(lattice.shortest_path(), Some("xy"));
    }

    #[test]
    fn test_apply_without_accepting_path() {
        let grammar = FstGrammar::from_fst(rewrite_ab_to_xy());
        let lattice = grammar.apply("abc", 1).unwrap();
        assert!(lattice.is_empty());
    }

    #[test]
    fn test_weighted_alternatives() {
        // a → x（权重 1.0）或 a → z（权重 0.5）
        let text = format!(
            "0\t1\t{a}\t{x}\t1.0\n0\t1\t{a}\t{z}\t0.5\n1\n",
            a = b'a',
            x = b'x',
            z = b'z'
        );
        let grammar = FstGrammar::from_fst(StdFst::from_text_string(&text).unwrap());

        let lattice = grammar.apply("a", 2).unwrap();
        assert_eq!(lattice.n_best(2), vec!["z", "x"]);
        assert_eq!(grammar.apply("a", 1).unwrap().paths().len(), 1);
    }

    #[test]
    fn test_binary_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rewrite.fst");

        FstGrammar::from_fst(rewrite_ab_to_xy()).write(&path).unwrap();
        let loaded = FstGrammar::compile(&path).unwrap();
        assert_eq!(loaded.apply("ab", 1).unwrap().shortest_path(), Some("xy"));
    }

    #[test]
    fn test_paths_with_same_output_merged() {
        // a → x（0.1）、a → ε → x（0.2）、a → y（0.3）
        let text = format!(
            "0\t1\t{a}\t{x}\t0.1\n0\t2\t{a}\t0\t0.2\n2\t1\t0\t{x}\n0\t1\t{a}\t{y}\t0.3\n1\n",
            a = b'a',
            x = b'x',
            y = b'y'
        );
        let grammar = FstGrammar::from_fst(StdFst::from_text_string(&text).unwrap());

        let lattice = grammar.apply("a", 2).unwrap();
        assert_eq!(lattice.n_best(2), vec!["x", "y"]);
        assert_eq!(lattice.paths().len(), 2);
        assert!((lattice.paths()[0].weight - 0.1).abs() < 1e-6);
    }
}
