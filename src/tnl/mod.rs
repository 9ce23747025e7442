//! TNL (Text Normalization Layer) - 文本规范化编排层
//!
//! 语言相关的部分全部在语法（FST）里，这里只负责语言无关的编排。
//!
//! ## 处理流程
//! 1. Unicode 归一化 + 空白折叠（可选：方括号补空格）
//! 2. 标注语法取最短路径，得到标注文本
//! 3. 解析为 token 序列
//! 4. 按排列预算拆分为块
//! 5. 逐块枚举字段排列，第一个能被转写的胜出
//! 6. 拼接 → 后处理语法（TN）→ 标点后处理（可选）

mod engine;
mod permutation;
mod rules;
mod split;
mod tokenizer;
mod types;

pub use engine::Normalizer;
pub use permutation::{chunk_permutations, factorial, serialization_count, Permutations};
pub use rules::{collapse_spaces, pre_process, restore_punctuation_spacing, Detokenizer};
pub use split::{SplitPlanner, DEFAULT_MAX_PERMUTATIONS};
pub use tokenizer::TokenParser;
pub use types::{
    NormalizationResult, Token, TokenSequence, TokenValue, FIELD_ORDER_KEY, PRESERVE_ORDER_KEY,
};
