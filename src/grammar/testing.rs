//! 测试用语法
//!
//! 用极小的词表模拟各语言的标注 / 转写语法，覆盖驱动层的完整流程。

use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;

use crate::config::Direction;
use crate::error::GrammarError;
use crate::grammar::registry::{GrammarKey, GrammarRegistry, GrammarSet};
use crate::grammar::types::{Grammar, Lattice, WeightedPath};
use crate::tnl::TokenParser;

/// 闭包语法
pub struct FnGrammar<F>(pub F);

impl<F> Grammar for FnGrammar<F>
where
    F: Fn(&str, usize) -> Result<Lattice, GrammarError> + Send + Sync,
{
    fn apply(&self, input: &str, nshortest: usize) -> Result<Lattice, GrammarError> {
        (self.0)(input, nshortest)
    }
}

/// 不接受任何输入
pub fn rejecting() -> Arc<dyn Grammar> {
    Arc::new(FnGrammar(
        |_: &str, _: usize| -> Result<Lattice, GrammarError> { Ok(Lattice::empty()) },
    ))
}

/// 总是报错
pub fn failing() -> Arc<dyn Grammar> {
    Arc::new(FnGrammar(
        |_: &str, _: usize| -> Result<Lattice, GrammarError> {
            Err(GrammarError::engine("compose", "toy failure"))
        },
    ))
}

/// 无论输入是什么都输出同一串
pub fn fixed(output: &str) -> Arc<dyn Grammar> {
    let output = output.to_string();
    Arc::new(FnGrammar(
        move |_: &str, _: usize| -> Result<Lattice, GrammarError> {
            Ok(Lattice::single(output.clone(), 0.0))
        },
    ))
}

/// 首字母大写（模拟 TN 后处理语法）
pub fn capitalizing() -> Arc<dyn Grammar> {
    Arc::new(FnGrammar(
        |input: &str, _: usize| -> Result<Lattice, GrammarError> {
            let mut chars = input.chars();
            let text = match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            };
            Ok(Lattice::single(text, 0.0))
        },
    ))
}

#[derive(Debug, Clone, Copy)]
enum Lexicon {
    EnglishItn,
    EnglishTn,
    GermanItn,
    HindiItn,
}

const EN_ONES: [&str; 20] = [
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
    "eleven", "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen", "eighteen",
    "nineteen",
];
const EN_TENS: [&str; 10] = [
    "", "", "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
];

fn en_ones(word: &str) -> Option<u64> {
    EN_ONES.iter().position(|w| *w == word).map(|n| n as u64)
}

fn en_tens(word: &str) -> Option<u64> {
    EN_TENS
        .iter()
        .position(|w| !w.is_empty() && *w == word)
        .map(|n| n as u64 * 10)
}

fn english_words_to_number(words: &[&str]) -> Option<String> {
    let value = match words {
        [word] => en_ones(word).or_else(|| en_tens(word))?,
        [tens, ones] => {
            let ones = en_ones(ones).filter(|n| (1..=9).contains(n))?;
            en_tens(tens)? + ones
        }
        _ => return None,
    };
    Some(value.to_string())
}

fn english_number_to_words(words: &[&str]) -> Option<String> {
    let [word] = words else { return None };
    let value: usize = word.parse().ok()?;
    match value {
        0..=19 => Some(EN_ONES[value].to_string()),
        20..=99 if value % 10 == 0 => Some(EN_TENS[value / 10].to_string()),
        20..=99 => Some(format!("{} {}", EN_TENS[value / 10], EN_ONES[value % 10])),
        _ => None,
    }
}

fn german_small(word: &str) -> Option<u64> {
    let units = |w: &str| match w {
        "ein" | "eine" | "eins" => Some(1),
        "zwei" => Some(2),
        "drei" => Some(3),
        "vier" => Some(4),
        "fünf" => Some(5),
        "sechs" => Some(6),
        "sieben" => Some(7),
        "acht" => Some(8),
        "neun" => Some(9),
        "zehn" => Some(10),
        "elf" => Some(11),
        "zwölf" => Some(12),
        _ => None,
    };
    let tens = |w: &str| match w {
        "zwanzig" => Some(20),
        "dreißig" => Some(30),
        "vierzig" => Some(40),
        "fünfzig" => Some(50),
        "sechzig" => Some(60),
        "siebzig" => Some(70),
        "achtzig" => Some(80),
        "neunzig" => Some(90),
        _ => None,
    };

    if let Some(value) = units(word).or_else(|| tens(word)) {
        return Some(value);
    }
    // fünfundsechzig = fünf + und + sechzig
    let (ones, rest) = word.split_once("und")?;
    Some(units(ones)? + tens(rest)?)
}

fn german_scale(word: &str) -> Option<u64> {
    match word {
        "tausend" => Some(1_000),
        "million" | "millionen" => Some(1_000_000),
        "milliarde" | "milliarden" => Some(1_000_000_000),
        "billion" | "billionen" => Some(1_000_000_000_000),
        _ => None,
    }
}

fn group_thousands(value: u64, separator: char) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(separator);
        }
        out.push(ch);
    }
    out
}

fn german_words_to_number(words: &[&str]) -> Option<String> {
    let (negative, words) = match words.split_first() {
        Some((&"minus", rest)) => (true, rest),
        _ => (false, words),
    };
    if words.is_empty() {
        return None;
    }

    let mut total = 0u64;
    let mut current = 0u64;
    for word in words {
        if let Some(scale) = german_scale(word) {
            total += current.max(1) * scale;
            current = 0;
        } else {
            current += german_small(word)?;
        }
    }
    total += current;

    let digits = group_thousands(total, '.');
    Some(if negative { format!("-{digits}") } else { digits })
}

fn hindi_words_to_number(words: &[&str]) -> Option<String> {
    let (negative, words) = match words.split_first() {
        Some((&"ऋण", rest)) => (true, rest),
        _ => (false, words),
    };
    let [word] = words else { return None };
    let value = match *word {
        "शून्य" => 0,
        "एक" => 1,
        "दो" => 2,
        "तीन" => 3,
        "चार" => 4,
        "पाँच" => 5,
        "दस" => 10,
        "बीस" => 20,
        "इक्कीस" => 21,
        "बाईस" => 22,
        "तेईस" => 23,
        _ => return None,
    };
    Some(if negative {
        format!("\u{2212}{value}")
    } else {
        value.to_string()
    })
}

impl Lexicon {
    fn for_key(key: &GrammarKey) -> Self {
        match (key.language.as_str(), key.direction) {
            ("de", _) => Lexicon::GermanItn,
            ("hi", _) => Lexicon::HindiItn,
            (_, Direction::Normalize) => Lexicon::EnglishTn,
            (_, Direction::InverseNormalize) => Lexicon::EnglishItn,
        }
    }

    fn number(&self, words: &[&str]) -> Option<String> {
        match self {
            Lexicon::EnglishItn => english_words_to_number(words),
            Lexicon::EnglishTn => english_number_to_words(words),
            Lexicon::GermanItn => german_words_to_number(words),
            Lexicon::HindiItn => hindi_words_to_number(words),
        }
    }

    fn unit(&self, word: &str) -> Option<&'static str> {
        match (self, word) {
            (Lexicon::EnglishItn, "kilograms" | "kilogram") => Some("kg"),
            (Lexicon::EnglishItn, "meters" | "meter") => Some("m"),
            (Lexicon::EnglishItn | Lexicon::GermanItn, "ohm") => Some("Ω"),
            (Lexicon::EnglishTn, "kg") => Some("kilograms"),
            (Lexicon::EnglishTn, "m") => Some("meters"),
            (Lexicon::GermanItn, "kilogramm") => Some("kg"),
            (Lexicon::HindiItn, "किलोग्राम") => Some("kg"),
            _ => None,
        }
    }

    /// TN 标注把单位放在前面，转写时需要排列搜索
    fn units_first(&self) -> bool {
        matches!(self, Lexicon::EnglishTn)
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

fn name_token(word: &str) -> String {
    format!("tokens {{ name: \"{}\" }}", escape(word))
}

/// 按空白切词，句末标点单独成词
fn split_punctuation(input: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    for word in input.split_whitespace() {
        let body = word.trim_end_matches(['.', ',', '!', '?', ';', ':']);
        if !body.is_empty() {
            pieces.push(body.to_string());
        }
        pieces.extend(word[body.len()..].chars().map(String::from));
    }
    pieces
}

/// 词表标注语法
struct ToyTagger {
    lexicon: Lexicon,
}

impl ToyTagger {
    fn tag(&self, pieces: &[&str]) -> String {
        let mut tokens = Vec::new();
        let mut idx = 0;

        while idx < pieces.len() {
            let matched = (idx + 1..=pieces.len())
                .rev()
                .find_map(|end| self.lexicon.number(&pieces[idx..end]).map(|n| (end, n)));

            match matched {
                Some((end, number)) => {
                    let unit = pieces.get(end).and_then(|w| self.lexicon.unit(w));
                    match unit {
                        Some(unit) if self.lexicon.units_first() => {
                            tokens.push(format!(
                                "tokens {{ measure {{ units: \"{unit}\" cardinal {{ integer: \"{number}\" }} }} }}"
                            ));
                            idx = end + 1;
                        }
                        Some(unit) => {
                            tokens.push(format!(
                                "tokens {{ measure {{ cardinal {{ integer: \"{number}\" }} units: \"{unit}\" }} }}"
                            ));
                            idx = end + 1;
                        }
                        None => {
                            tokens.push(format!(
                                "tokens {{ cardinal {{ integer: \"{number}\" }} }}"
                            ));
                            idx = end;
                        }
                    }
                }
                None => {
                    tokens.push(name_token(pieces[idx]));
                    idx += 1;
                }
            }
        }

        tokens.join(" ")
    }
}

impl Grammar for ToyTagger {
    fn apply(&self, input: &str, nshortest: usize) -> Result<Lattice, GrammarError> {
        let pieces = split_punctuation(input);
        if pieces.is_empty() {
            return Ok(Lattice::empty());
        }
        let pieces: Vec<&str> = pieces.iter().map(String::as_str).collect();

        let mut paths = vec![WeightedPath {
            text: self.tag(&pieces),
            weight: 0.0,
        }];
        if nshortest > 1 {
            // 次优路径：全部标为 name
            let names: Vec<String> = pieces.iter().map(|w| name_token(w)).collect();
            paths.push(WeightedPath {
                text: names.join(" "),
                weight: 1.0,
            });
        }
        Ok(Lattice::from_paths(paths))
    }
}

lazy_static! {
    static ref NAME: Regex = Regex::new(r#"^tokens \{ name: "((?:[^"\\]|\\.)*)" \}$"#).unwrap();
    static ref CARDINAL: Regex =
        Regex::new(r#"^tokens \{ cardinal \{ integer: "([^"]*)" \} \}$"#).unwrap();
    static ref MEASURE: Regex = Regex::new(
        r#"^tokens \{ measure \{ cardinal \{ integer: "([^"]*)" \} units: "([^"]*)" \} \}$"#
    )
    .unwrap();
    static ref DATE: Regex = Regex::new(
        r#"^tokens \{ date \{ day: "([^"]*)" month: "([^"]*)" year: "([^"]*)" preserve_order: true \} \}$"#
    )
    .unwrap();
}

/// 转写语法：只接受固定字段顺序
struct ToyVerbalizer;

impl ToyVerbalizer {
    fn verbalize_token(serialized: &str) -> Option<String> {
        if let Some(caps) = NAME.captures(serialized) {
            return Some(caps[1].replace("\\\"", "\"").replace("\\\\", "\\"));
        }
        if let Some(caps) = CARDINAL.captures(serialized) {
            return Some(caps[1].to_string());
        }
        if let Some(caps) = MEASURE.captures(serialized) {
            return Some(format!("{} {}", &caps[1], &caps[2]));
        }
        DATE.captures(serialized)
            .map(|caps| format!("{} {} {}", &caps[1], &caps[2], &caps[3]))
    }
}

impl Grammar for ToyVerbalizer {
    fn apply(&self, input: &str, _nshortest: usize) -> Result<Lattice, GrammarError> {
        let Ok(tokens) = TokenParser::parse(input) else {
            return Ok(Lattice::empty());
        };

        let mut words = Vec::with_capacity(tokens.len());
        for token in &tokens {
            match Self::verbalize_token(&token.to_string()) {
                Some(word) => words.push(word),
                None => return Ok(Lattice::empty()),
            }
        }
        Ok(Lattice::single(words.join(" "), 0.0))
    }
}

/// 测试语言的语法
pub fn toy_grammars(key: &GrammarKey) -> GrammarSet {
    GrammarSet {
        tagger: Arc::new(ToyTagger {
            lexicon: Lexicon::for_key(key),
        }),
        verbalizer: Arc::new(ToyVerbalizer),
        post_processor: None,
    }
}

/// 注册 en / de / hi 测试语法
pub fn toy_registry() -> GrammarRegistry {
    let mut registry = GrammarRegistry::new();
    for language in ["en", "de", "hi"] {
        registry.register(language, |key, _| Ok(toy_grammars(key)));
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InputCase;

    fn key(language: &str, direction: Direction) -> GrammarKey {
        GrammarKey {
            language: language.to_string(),
            direction,
            input_case: InputCase::Cased,
            deterministic: true,
            whitelist: None,
        }
    }

    #[test]
    fn test_german_tagging() {
        let grammars = toy_grammars(&key("de", Direction::InverseNormalize));
        let lattice = grammars
            .tagger
            .apply("minus eine billion fünfundsechzig milliarden vier millionen sechs", 1)
            .unwrap();
        assert_eq!(
            lattice.shortest_path(),
            Some(r#"tokens { cardinal { integer: "-1.065.004.000.006" } }"#)
        );
    }

    #[test]
    fn test_split_punctuation() {
        assert_eq!(split_punctuation("12 kg."), vec!["12", "kg", "."]);
        assert_eq!(split_punctuation("wait?!"), vec!["wait", "?", "!"]);
    }

    #[test]
    fn test_verbalizer_rejects_wrong_order() {
        let lattice = ToyVerbalizer
            .apply(
                r#"tokens { measure { units: "kg" cardinal { integer: "12" } } }"#,
                1,
            )
            .unwrap();
        assert!(lattice.is_empty());
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(1_065_004_000_006, '.'), "1.065.004.000.006");
        assert_eq!(group_thousands(999, '.'), "999");
    }
}
