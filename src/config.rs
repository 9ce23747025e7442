// src/config.rs

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigurationError;
use crate::tnl::DEFAULT_MAX_PERMUTATIONS;

// ============================================================================
// 规范化方向
// ============================================================================

/// 规范化方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// 书面 → 口语（TN）
    #[default]
    Normalize,
    /// 口语 → 书面（ITN）
    InverseNormalize,
}

impl Direction {
    /// 语法目录 / 缓存文件名中的组件名
    pub fn component(&self) -> &'static str {
        match self {
            Direction::Normalize => "tn",
            Direction::InverseNormalize => "itn",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Direction::Normalize => "文本规范化",
            Direction::InverseNormalize => "逆文本规范化",
        }
    }
}

// ============================================================================
// 输入大小写
// ============================================================================

/// 输入文本的大小写形式（决定选用的语法）
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum InputCase {
    #[default]
    #[value(name = "cased")]
    Cased,
    #[value(name = "lower_cased")]
    LowerCased,
}

impl InputCase {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputCase::Cased => "cased",
            InputCase::LowerCased => "lower_cased",
        }
    }
}

// ============================================================================
// 规范化配置
// ============================================================================

/// 规范化配置
///
/// 启动时构造一次，显式传入各构造函数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// 语言标签（如 en、de、hi）
    pub language: String,
    pub input_case: InputCase,
    /// 确定性模式（非确定性模式用于音频辅助选择）
    pub deterministic: bool,
    /// 语法源目录
    pub grammar_dir: PathBuf,
    /// 编译后语法缓存目录（None 表示不缓存）
    pub cache_dir: Option<PathBuf>,
    /// 强制重建缓存
    pub overwrite_cache: bool,
    /// 白名单 TSV（`书面形式<TAB>口语形式`），同时参与缓存文件命名
    pub whitelist: Option<PathBuf>,
    /// 方括号两侧补空格
    pub punct_pre_process: bool,
    /// 反分词并按原文恢复标点空格
    pub punct_post_process: bool,
    /// 每块最大排列数
    pub max_number_of_permutations_per_split: u64,
    /// 音频辅助模式下的标注候选数
    pub n_tagged: usize,
    /// 最佳候选 CER 超过该值时保留原文片段
    pub cer_threshold: Option<f64>,
    /// 工作线程数（0 = CPU 核数）
    pub n_jobs: usize,
    pub batch_size: usize,
    /// manifest 输入字段
    pub text_field: String,
    /// manifest 输出字段
    pub output_field: String,
    /// manifest 中 ASR 预测文本字段
    pub pred_text_field: String,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            input_case: InputCase::Cased,
            deterministic: true,
            grammar_dir: Self::default_grammar_dir(),
            cache_dir: None,
            overwrite_cache: false,
            whitelist: None,
            punct_pre_process: false,
            punct_post_process: false,
            max_number_of_permutations_per_split: DEFAULT_MAX_PERMUTATIONS,
            n_tagged: 30,
            cer_threshold: None,
            n_jobs: 1,
            batch_size: 200,
            text_field: "text".to_string(),
            output_field: "normalized".to_string(),
            pred_text_field: "pred_text".to_string(),
        }
    }
}

impl NormalizerConfig {
    /// 默认语法目录：<data_dir>/speech-tn/grammars
    pub fn default_grammar_dir() -> PathBuf {
        dirs::data_dir()
            .map(|dir| dir.join("speech-tn").join("grammars"))
            .unwrap_or_else(|| PathBuf::from("grammars"))
    }

    /// 默认配置文件路径：<config_dir>/speech-tn/config.json
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("speech-tn").join("config.json"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        tracing::info!("加载配置: {:?}", path);
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
        let config: NormalizerConfig = serde_json::from_str(&content)
            .with_context(|| format!("解析配置文件失败: {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        tracing::info!("保存配置到: {:?}", path);

        // 原子写入：先写临时文件，再替换
        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, &content).map_err(|e| {
            tracing::error!("写入临时文件失败: {}", e);
            e
        })?;
        std::fs::rename(&temp_path, path)
            .with_context(|| format!("替换配置文件失败: {}", path.display()))?;
        Ok(())
    }

    /// 校验数值参数
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_number_of_permutations_per_split == 0 {
            return Err(ConfigurationError::InvalidBudget);
        }
        if self.batch_size == 0 {
            return Err(ConfigurationError::InvalidBatchSize);
        }
        Ok(())
    }
}
