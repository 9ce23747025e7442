// 文本规范化（TN）/ 逆文本规范化（ITN）编排库
//
// 语言相关的知识全部在外部语法（FST）中，本库负责：
// - 加载 / 缓存语法（grammar）
// - 标注 → 解析 → 拆分 → 排列转写的驱动流程（tnl）
// - 结合 ASR 预测文本的候选选择（audio）
// - 批处理与 manifest 读写（batch / manifest）

pub mod audio;
pub mod batch;
pub mod config;
pub mod error;
pub mod grammar;
pub mod manifest;
pub mod tnl;

pub use audio::AudioSelector;
pub use config::{Direction, InputCase, NormalizerConfig};
pub use error::{ConfigurationError, GrammarError, NormalizationError, ParseError};
pub use grammar::{Grammar, GrammarRegistry, GrammarSet};
pub use tnl::{NormalizationResult, Normalizer, Token, TokenParser};
