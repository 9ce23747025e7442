//! 错误类型定义
//!
//! - `ParseError`: 标注文本格式错误（可恢复，整句回退原文）
//! - `ConfigurationError`: 排列预算等配置错误（不可恢复）
//! - `GrammarError`: 语法加载 / FST 引擎错误
//! - `NormalizationError`: 驱动层统一错误

use std::path::PathBuf;

use thiserror::Error;

/// 标注文本解析错误
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("标注文本在位置 {position} 处意外结束，期望 {expected}")]
    UnexpectedEnd {
        position: usize,
        expected: &'static str,
    },
    #[error("标注文本在位置 {position} 处出现意外字符 {found:?}，期望 {expected}")]
    UnexpectedChar {
        position: usize,
        found: char,
        expected: &'static str,
    },
    #[error("标注文本在位置 {position} 处缺少字段名")]
    EmptyKey { position: usize },
    #[error("无法识别的字段值 {value:?}（位置 {position}）")]
    InvalidValue { position: usize, value: String },
}

/// 配置错误
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error(
        "单个 token 的排列数 {estimate} 超过上限 {budget}，无法继续拆分，请调大 max_number_of_permutations_per_split（token: {token}）"
    )]
    PermutationBudgetExceeded {
        estimate: u64,
        budget: u64,
        token: String,
    },
    #[error("max_number_of_permutations_per_split 必须大于 0")]
    InvalidBudget,
    #[error("batch_size 必须大于 0")]
    InvalidBatchSize,
}

/// 语法（FST）错误
#[derive(Debug, Error)]
pub enum GrammarError {
    #[error("不支持的语言: {0}")]
    UnsupportedLanguage(String),
    #[error("缺少语法文件: {0}")]
    MissingGrammar(PathBuf),
    #[error("读写语法文件 {path} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("FST 引擎在 {context} 阶段出错: {message}")]
    Engine {
        context: &'static str,
        message: String,
    },
    #[error("FST 输出不是合法的 UTF-8")]
    InvalidOutput,
    #[error("白名单 {path} 第 {line} 行格式错误，应为 `书面形式<TAB>口语形式`")]
    InvalidWhitelist { path: PathBuf, line: usize },
}

impl GrammarError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn engine(context: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Engine {
            context,
            message: err.to_string(),
        }
    }
}

/// 规范化驱动错误
#[derive(Debug, Error)]
pub enum NormalizationError {
    #[error("标注失败（{text:?}）: {source}")]
    Tagging {
        text: String,
        #[source]
        source: GrammarError,
    },
    #[error("标注语法对 {text:?} 没有可接受路径")]
    NoTaggingPath { text: String },
    #[error("解析标注文本失败（{tagged:?}）: {source}")]
    Parse {
        tagged: String,
        #[source]
        source: ParseError,
    },
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("所有排列均无法转写（{chunk:?}）")]
    VerbalizationExhausted { chunk: String },
    #[error("转写失败（{serialized:?}）: {source}")]
    Verbalization {
        serialized: String,
        #[source]
        source: GrammarError,
    },
    #[error(transparent)]
    Grammar(#[from] GrammarError),
}

impl NormalizationError {
    /// 是否可按整句回退原文处理
    ///
    /// 解析失败与转写阶段的失败可恢复；标注失败、配置错误与语法加载错误向上传递。
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Parse { .. } | Self::VerbalizationExhausted { .. } | Self::Verbalization { .. }
        )
    }
}
