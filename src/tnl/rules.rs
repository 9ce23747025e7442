//! TNL 标点规则
//!
//! 包含输入预处理（方括号两侧补空格）、Moses 风格反分词、
//! 以及按原文恢复标点两侧空格

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref MULTI_SPACE: Regex = Regex::new(r" {2,}").unwrap();
    /// 英文缩写后缀（'s, n't, 're ...），附着到前一个词
    static ref CONTRACTION: Regex = Regex::new(r"^(?:'[a-zA-Z]{1,2}|n't)$").unwrap();
}

/// 需要两侧补空格的符号
const SPACE_BOTH: [char; 2] = ['[', ']'];

/// 恢复空格时考虑的标点
const RESTORE_MARKS: [char; 12] = ['.', ',', '!', '?', ';', ':', '"', '(', ')', '[', ']', '…'];

/// 折叠连续空格
pub fn collapse_spaces(text: &str) -> String {
    MULTI_SPACE.replace_all(text, " ").trim().to_string()
}

/// 输入预处理：方括号两侧补空格，使括号内内容可以被规范化
pub fn pre_process(text: &str) -> String {
    let mut result = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        if SPACE_BOTH.contains(&ch) {
            result.push(' ');
            result.push(ch);
            result.push(' ');
        } else {
            result.push(ch);
        }
    }
    collapse_spaces(&result)
}

/// Moses 风格反分词器
#[derive(Debug, Clone)]
pub struct Detokenizer {
    /// 附着到前一个词的符号
    attach_left: HashSet<&'static str>,
    /// 附着到后一个词的符号
    attach_right: HashSet<&'static str>,
}

impl Detokenizer {
    pub fn new() -> Self {
        let attach_left: HashSet<&'static str> = [
            ".", ",", "!", "?", ";", ":", "%", ")", "]", "}", "…", "»", "。", "，", "！", "？",
            "；", "：", "）", "」",
        ]
        .into_iter()
        .collect();

        let attach_right: HashSet<&'static str> = ["(", "[", "{", "¿", "¡", "«", "$", "£", "€", "¥", "（", "「"]
            .into_iter()
            .collect();

        Self {
            attach_left,
            attach_right,
        }
    }

    /// 合并分词后的空格
    ///
    /// 成对的 `"` 交替作为开引号（附着后词）和闭引号（附着前词）
    pub fn detokenize(&self, text: &str) -> String {
        let mut result = String::with_capacity(text.len());
        let mut glue_next = true;
        let mut quote_open = false;

        for word in text.split_whitespace() {
            let mut glue_prev = glue_next;
            glue_next = false;

            if self.attach_left.contains(word) || CONTRACTION.is_match(word) {
                glue_prev = true;
            } else if self.attach_right.contains(word) {
                glue_next = true;
            } else if word == "\"" {
                if quote_open {
                    glue_prev = true;
                } else {
                    glue_next = true;
                }
                quote_open = !quote_open;
            }

            if !glue_prev && !result.is_empty() {
                result.push(' ');
            }
            result.push_str(word);
        }

        result
    }
}

impl Default for Detokenizer {
    fn default() -> Self {
        Self::new()
    }
}

fn positions(chars: &[char], mark: char) -> Vec<usize> {
    chars
        .iter()
        .enumerate()
        .filter(|&(_, &c)| c == mark)
        .map(|(idx, _)| idx)
        .collect()
}

/// 按原文恢复标点两侧的空格
///
/// 某个标点在原文与输出中出现次数相同时，逐个对齐并复制原文的前后空格
pub fn restore_punctuation_spacing(original: &str, normalized: &str) -> String {
    let original: Vec<char> = original.chars().collect();
    let mut output: Vec<char> = normalized.chars().collect();

    for mark in RESTORE_MARKS {
        let orig_positions = positions(&original, mark);
        let out_positions = positions(&output, mark);
        if orig_positions.is_empty() || orig_positions.len() != out_positions.len() {
            continue;
        }

        // 从后往前处理，前面的下标不受插入/删除影响
        for (&orig, &out) in orig_positions.iter().zip(out_positions.iter()).rev() {
            let want_after = original.get(orig + 1) == Some(&' ');
            let has_after = output.get(out + 1) == Some(&' ');
            if want_after && !has_after && out + 1 < output.len() {
                output.insert(out + 1, ' ');
            } else if !want_after && has_after {
                output.remove(out + 1);
            }

            let want_before = orig > 0 && original[orig - 1] == ' ';
            let has_before = out > 0 && output[out - 1] == ' ';
            if want_before && !has_before && out > 0 {
                output.insert(out, ' ');
            } else if !want_before && has_before {
                output.remove(out - 1);
            }
        }
    }

    output.into_iter().collect()
}
