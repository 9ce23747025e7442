//! 音频辅助规范化
//!
//! 结合 ASR 预测文本，在多个规范化候选中选择与实际发音最接近的一个。

mod alignment;
mod selector;

pub use alignment::{
    align_words, change_regions, character_error_rate, merge_regions, position_map,
    similarity_ratio, ChangeRegion, DiffOp,
};
pub use selector::{prepare_prediction, semiotic_spans, AudioSelector, SemioticSpan, SpanStatus};
