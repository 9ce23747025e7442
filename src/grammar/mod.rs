//! 语法层
//!
//! 各语言的标注 / 转写 / 后处理语法都是外部数据（FST），这里只负责加载、缓存、
//! 以及把 FST 引擎包装成统一的 `Grammar` 接口。白名单在标注语法外层生效。

mod cache;
mod fst;
mod registry;
mod types;
mod whitelist;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::GrammarCache;
pub use fst::FstGrammar;
pub use registry::{GrammarFactory, GrammarKey, GrammarRegistry, GrammarSet, SUPPORTED_LANGUAGES};
pub use types::{Grammar, Lattice, Stage, WeightedPath};
pub use whitelist::{Whitelist, WhitelistTagger};
