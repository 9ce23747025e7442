//! TNL 主引擎
//!
//! 标注 → 解析 → 拆分 → 排列转写 → 拼接 → 后处理。
//! 可恢复的失败（解析失败、所有排列都无法转写）整句回退原文。

use std::time::Instant;

use unicode_normalization::UnicodeNormalization;

use crate::config::{Direction, NormalizerConfig};
use crate::error::{ConfigurationError, NormalizationError};
use crate::grammar::{GrammarKey, GrammarRegistry, GrammarSet, Lattice};
use crate::tnl::permutation::chunk_permutations;
use crate::tnl::rules::{collapse_spaces, pre_process, restore_punctuation_spacing, Detokenizer};
use crate::tnl::split::SplitPlanner;
use crate::tnl::tokenizer::TokenParser;
use crate::tnl::types::{NormalizationResult, Token};

/// 规范化器（构造后只读，可跨线程共享）
#[derive(Debug)]
pub struct Normalizer {
    config: NormalizerConfig,
    direction: Direction,
    grammars: GrammarSet,
    planner: SplitPlanner,
    detokenizer: Detokenizer,
}

/// 一次成功的规范化
struct Verbalized {
    text: String,
    tagged: String,
    chunks: usize,
}

impl Normalizer {
    /// 文本规范化（TN）
    pub fn new(
        config: &NormalizerConfig,
        registry: &GrammarRegistry,
    ) -> Result<Self, NormalizationError> {
        Self::with_direction(config, Direction::Normalize, registry)
    }

    /// 逆文本规范化（ITN）
    pub fn inverse(
        config: &NormalizerConfig,
        registry: &GrammarRegistry,
    ) -> Result<Self, NormalizationError> {
        Self::with_direction(config, Direction::InverseNormalize, registry)
    }

    pub fn with_direction(
        config: &NormalizerConfig,
        direction: Direction,
        registry: &GrammarRegistry,
    ) -> Result<Self, NormalizationError> {
        config.validate()?;
        let key = GrammarKey::from_config(config, direction);
        let grammars = registry.build(&key, config)?;
        Ok(Self::from_grammars(config, direction, grammars)?)
    }

    /// 使用已构造好的语法
    pub fn from_grammars(
        config: &NormalizerConfig,
        direction: Direction,
        mut grammars: GrammarSet,
    ) -> Result<Self, ConfigurationError> {
        let planner = SplitPlanner::new(config.max_number_of_permutations_per_split)?;

        if direction == Direction::InverseNormalize && grammars.post_processor.take().is_some() {
            tracing::debug!("ITN 不使用后处理语法，已忽略");
        }

        tracing::info!(
            "{}初始化完成: language={}, budget={}",
            direction.display_name(),
            config.language,
            planner.budget()
        );

        Ok(Self {
            config: config.clone(),
            direction,
            grammars,
            planner,
            detokenizer: Detokenizer::new(),
        })
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// 规范化文本
    ///
    /// 可恢复的错误返回原文（记录警告），标注失败和配置错误向上传递
    pub fn normalize(&self, text: &str) -> Result<String, NormalizationError> {
        self.normalize_detailed(text).map(|result| result.text)
    }

    /// 规范化文本，不做回退
    pub fn try_normalize(&self, text: &str) -> Result<String, NormalizationError> {
        let prepared = prepare_input(text);
        if prepared.is_empty() {
            return Ok(text.to_string());
        }
        self.run(&prepared).map(|verbalized| verbalized.text)
    }

    /// 规范化文本，附带标注结果与耗时
    pub fn normalize_detailed(&self, text: &str) -> Result<NormalizationResult, NormalizationError> {
        let start = Instant::now();

        let prepared = prepare_input(text);
        if prepared.is_empty() {
            return Ok(NormalizationResult::unchanged(text.to_string(), 0));
        }

        match self.run(&prepared) {
            Ok(verbalized) => {
                let elapsed_us = start.elapsed().as_micros() as u64;
                tracing::debug!(
                    "[{}] 规范化完成: {} 个块, 耗时 {}us",
                    short_hash(&prepared),
                    verbalized.chunks,
                    elapsed_us
                );
                Ok(NormalizationResult {
                    changed: verbalized.text != text,
                    text: verbalized.text,
                    tagged: Some(verbalized.tagged),
                    chunks: verbalized.chunks,
                    fell_back: false,
                    elapsed_us,
                })
            }
            Err(e) if e.is_recoverable() => {
                tracing::warn!("规范化失败，返回原文: {} (text={:?})", e, text);
                let elapsed_us = start.elapsed().as_micros() as u64;
                Ok(NormalizationResult::fallback(text.to_string(), elapsed_us))
            }
            Err(e) => Err(e),
        }
    }

    /// 前 `n_tagged` 条标注路径各自的规范化结果（去重，最优在前）
    ///
    /// 单条路径转写失败时跳过；没有任何结果时返回空列表
    pub fn normalize_options(
        &self,
        text: &str,
        n_tagged: usize,
    ) -> Result<Vec<String>, NormalizationError> {
        let prepared = prepare_input(text);
        if prepared.is_empty() {
            return Ok(Vec::new());
        }

        let n_tagged = n_tagged.max(1);
        let input = self.pre_process(&prepared);
        let lattice = self.tag(&input, n_tagged)?;

        let mut options: Vec<String> = Vec::new();
        for tagged in lattice.n_best(n_tagged) {
            match self.verbalize_tagged(tagged) {
                Ok((text, _)) => {
                    let text = self.post_process(text, &prepared);
                    if !options.contains(&text) {
                        options.push(text);
                    }
                }
                Err(e) if e.is_recoverable() => {
                    tracing::debug!("候选标注无法转写，跳过: {}", e);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(options)
    }

    fn run(&self, prepared: &str) -> Result<Verbalized, NormalizationError> {
        let input = self.pre_process(prepared);
        let lattice = self.tag(&input, 1)?;
        let tagged = lattice
            .shortest_path()
            .ok_or_else(|| NormalizationError::NoTaggingPath {
                text: input.clone(),
            })?
            .to_string();

        tracing::debug!("[{}] 标注结果: {}", short_hash(prepared), tagged);

        let (text, chunks) = self.verbalize_tagged(&tagged)?;
        Ok(Verbalized {
            text: self.post_process(text, prepared),
            tagged,
            chunks,
        })
    }

    fn pre_process(&self, prepared: &str) -> String {
        if self.config.punct_pre_process {
            pre_process(prepared)
        } else {
            prepared.to_string()
        }
    }

    fn tag(&self, input: &str, nshortest: usize) -> Result<Lattice, NormalizationError> {
        let lattice = self
            .grammars
            .tagger
            .apply(input, nshortest)
            .map_err(|source| NormalizationError::Tagging {
                text: input.to_string(),
                source,
            })?;

        if lattice.is_empty() {
            return Err(NormalizationError::NoTaggingPath {
                text: input.to_string(),
            });
        }
        Ok(lattice)
    }

    /// 解析标注文本并逐块转写，返回 (文本, 块数)
    fn verbalize_tagged(&self, tagged: &str) -> Result<(String, usize), NormalizationError> {
        let tokens = TokenParser::parse(tagged).map_err(|source| NormalizationError::Parse {
            tagged: tagged.to_string(),
            source,
        })?;
        if tokens.is_empty() {
            return Err(NormalizationError::VerbalizationExhausted {
                chunk: tagged.to_string(),
            });
        }

        let chunks = self.planner.split(&tokens)?;
        let mut outputs = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            outputs.push(self.verbalize_chunk(chunk)?);
        }

        Ok((collapse_spaces(&outputs.join(" ")), chunks.len()))
    }

    /// 依次尝试块的各个排列，第一个能被转写的胜出
    fn verbalize_chunk(&self, chunk: &[Token]) -> Result<String, NormalizationError> {
        for (attempt, serialized) in chunk_permutations(chunk).enumerate() {
            let lattice = self
                .grammars
                .verbalizer
                .apply(&serialized, 1)
                .map_err(|source| NormalizationError::Verbalization {
                    serialized: serialized.clone(),
                    source,
                })?;

            if let Some(best) = lattice.shortest_path() {
                if attempt > 0 {
                    tracing::debug!("第 {} 个排列转写成功: {}", attempt + 1, serialized);
                }
                return Ok(best.to_string());
            }
        }

        let chunk = chunk
            .iter()
            .map(Token::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        Err(NormalizationError::VerbalizationExhausted { chunk })
    }

    /// 后处理语法（TN）+ 标点后处理
    fn post_process(&self, mut text: String, original: &str) -> String {
        if let Some(post_processor) = &self.grammars.post_processor {
            match post_processor.apply(&text, 1) {
                Ok(lattice) => match lattice.shortest_path() {
                    Some(best) => text = best.to_string(),
                    None => tracing::warn!("后处理语法没有可接受路径，保留原结果: {:?}", text),
                },
                Err(e) => tracing::warn!("后处理失败，保留原结果: {}", e),
            }
        }

        if self.config.punct_post_process {
            let detokenized = self.detokenizer.detokenize(&text);
            text = restore_punctuation_spacing(original, &detokenized);
        }

        text
    }
}

/// Unicode 归一化 (NFC) + 空白折叠
fn prepare_input(text: &str) -> String {
    let nfc: String = text.nfc().collect();

    let mut result = String::with_capacity(nfc.len());
    let mut prev_whitespace = false;

    for ch in nfc.chars() {
        if ch.is_whitespace() {
            if !prev_whitespace {
                result.push(' ');
                prev_whitespace = true;
            }
        } else {
            result.push(ch);
            prev_whitespace = false;
        }
    }

    result.trim().to_string()
}

/// 日志关联用的文本摘要
fn short_hash(text: &str) -> String {
    let digest = format!("{:x}", md5::compute(text.as_bytes()));
    digest[..8].to_string()
}
