//! 音频辅助选择
//!
//! 以确定性规范化结果为枢轴，先与原文对齐找出被规范化改写的片段（semiotic span），
//! 再与 ASR 预测文本对齐得到每个片段对应的预测词。对预测不一致的片段，
//! 在 N-best 规范化候选中选出与预测最相似的一个。

use lazy_static::lazy_static;
use regex::Regex;

use crate::audio::alignment::{
    align_words, change_regions, character_error_rate, merge_regions, position_map,
    similarity_ratio,
};
use crate::error::NormalizationError;
use crate::tnl::{collapse_spaces, Normalizer};

lazy_static! {
    static ref PUNCTUATION: Regex = Regex::new(r"[\p{P}\p{S}]").unwrap();
}

/// 片段与预测是否一致
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanStatus {
    Match,
    NonMatch,
}

/// 对齐后的句子片段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemioticSpan {
    /// 原文片段
    pub raw: String,
    /// 确定性规范化结果片段
    pub normalized: String,
    /// 预测文本片段（已预处理）
    pub predicted: String,
    pub status: SpanStatus,
}

/// 预测文本预处理：小写、去标点、折叠空白
pub fn prepare_prediction(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped = PUNCTUATION.replace_all(&lowered, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 把句子切分为有序片段
///
/// 原文与规范化结果不同的区域（间隔不超过一个相同词时合并）各成一个片段，
/// 其余部分按区域间隔切分，状态为 `Match`
pub fn semiotic_spans(raw: &str, normalized: &str, predicted: &str) -> Vec<SemioticSpan> {
    let raw_words: Vec<&str> = raw.split_whitespace().collect();
    let norm_words: Vec<&str> = normalized.split_whitespace().collect();

    let prediction = prepare_prediction(predicted);
    let pred_words: Vec<&str> = prediction.split_whitespace().collect();
    let norm_keys: Vec<String> = norm_words.iter().map(|w| prepare_prediction(w)).collect();
    let key_refs: Vec<&str> = norm_keys.iter().map(String::as_str).collect();

    let regions = merge_regions(change_regions(&align_words(&norm_words, &raw_words)), 1);
    let pred_map = position_map(&align_words(&key_refs, &pred_words), norm_words.len());

    let mut spans = Vec::with_capacity(regions.len() * 2 + 1);
    let mut norm_pos = 0usize;

    let pred_slice = |start: usize, end: usize| pred_words[pred_map[start]..pred_map[end]].join(" ");

    for region in &regions {
        if region.a_start > norm_pos {
            let text = norm_words[norm_pos..region.a_start].join(" ");
            spans.push(SemioticSpan {
                raw: text.clone(),
                normalized: text,
                predicted: pred_slice(norm_pos, region.a_start),
                status: SpanStatus::Match,
            });
        }

        let normalized = norm_words[region.a_start..region.a_end].join(" ");
        let predicted = pred_slice(region.a_start, region.a_end);
        let expected = norm_keys[region.a_start..region.a_end]
            .iter()
            .filter(|key| !key.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(" ");

        spans.push(SemioticSpan {
            raw: raw_words[region.b_start..region.b_end].join(" "),
            normalized,
            status: if predicted == expected {
                SpanStatus::Match
            } else {
                SpanStatus::NonMatch
            },
            predicted,
        });
        norm_pos = region.a_end;
    }

    if norm_pos < norm_words.len() {
        let text = norm_words[norm_pos..].join(" ");
        spans.push(SemioticSpan {
            raw: text.clone(),
            normalized: text,
            predicted: pred_slice(norm_pos, norm_words.len()),
            status: SpanStatus::Match,
        });
    }

    spans
}

/// 音频辅助选择器
pub struct AudioSelector<'a> {
    normalizer: &'a Normalizer,
    n_tagged: usize,
    cer_threshold: Option<f64>,
}

impl<'a> AudioSelector<'a> {
    pub fn new(normalizer: &'a Normalizer, n_tagged: usize, cer_threshold: Option<f64>) -> Self {
        Self {
            normalizer,
            n_tagged: n_tagged.max(1),
            cer_threshold,
        }
    }

    /// 使用规范化器自身配置中的 n_tagged / cer_threshold
    pub fn from_config(normalizer: &'a Normalizer) -> Self {
        let config = normalizer.config();
        Self::new(normalizer, config.n_tagged, config.cer_threshold)
    }

    /// 先做确定性规范化，再按预测文本逐片段选择
    pub fn normalize_with_audio(
        &self,
        text: &str,
        predicted: &str,
    ) -> Result<String, NormalizationError> {
        let normalized = self.normalizer.normalize(text)?;
        self.select(text, &normalized, predicted)
    }

    /// 逐片段选择，按句子顺序拼接
    pub fn select(
        &self,
        raw: &str,
        normalized: &str,
        predicted: &str,
    ) -> Result<String, NormalizationError> {
        let spans = semiotic_spans(raw, normalized, predicted);
        let mut pieces = Vec::with_capacity(spans.len());

        for span in &spans {
            match span.status {
                SpanStatus::Match => pieces.push(span.normalized.clone()),
                SpanStatus::NonMatch => pieces.push(self.select_span(span)),
            }
        }

        Ok(collapse_spaces(&pieces.join(" ")))
    }

    fn select_span(&self, span: &SemioticSpan) -> String {
        if span.predicted.is_empty() {
            return span.normalized.clone();
        }

        // 片段单独标注可能失败（脱离上下文），此时只保留确定性结果
        let alternatives = match self.normalizer.normalize_options(&span.raw, self.n_tagged) {
            Ok(alternatives) => alternatives,
            Err(e) => {
                tracing::debug!("片段 {:?} 无法生成候选: {}", span.raw, e);
                Vec::new()
            }
        };

        let mut options = vec![span.normalized.clone()];
        for option in alternatives {
            if !options.contains(&option) {
                options.push(option);
            }
        }

        let mut best = &options[0];
        let mut best_score = f64::MIN;
        for option in &options {
            let score = similarity_ratio(&prepare_prediction(option), &span.predicted);
            if score > best_score {
                best = option;
                best_score = score;
            }
        }

        if let Some(threshold) = self.cer_threshold {
            let cer = character_error_rate(&prepare_prediction(best), &span.predicted);
            if cer > threshold {
                tracing::debug!(
                    "最佳候选 CER {:.3} 超过阈值 {:.3}，保留原文片段: {:?}",
                    cer,
                    threshold,
                    span.raw
                );
                return span.raw.clone();
            }
        }

        tracing::debug!(
            "片段 {:?} 选择 {:?}（相似度 {:.3}，候选 {} 个）",
            span.raw,
            best,
            best_score,
            options.len()
        );
        best.clone()
    }
}
