//! speech-tn 命令行
//!
//! 对单句（--text）或文件（--input_file，纯文本或 .json manifest）做 TN / ITN。
//! 规范化失败的句子原样输出；只有配置错误和语法加载失败会以非零状态退出。

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use speech_tn_lib::audio::AudioSelector;
use speech_tn_lib::batch::parallel_map;
use speech_tn_lib::config::{Direction, InputCase, NormalizerConfig};
use speech_tn_lib::error::NormalizationError;
use speech_tn_lib::grammar::GrammarRegistry;
use speech_tn_lib::manifest::{self, InputFormat};
use speech_tn_lib::tnl::Normalizer;

/// 文本规范化 / 逆文本规范化
#[derive(Parser, Debug)]
#[command(name = "speech-tn")]
#[command(version, about, long_about = None)]
struct Cli {
    /// 待规范化的单句文本
    #[arg(long)]
    text: Option<String>,

    /// 输入文件（纯文本每行一句，或 .json manifest）
    #[arg(long = "input_file")]
    input_file: Option<PathBuf>,

    /// 输出文件（缺省时打印到标准输出）
    #[arg(long = "output_file")]
    output_file: Option<PathBuf>,

    /// 语言
    #[arg(long)]
    language: Option<String>,

    /// 输入大小写
    #[arg(long = "input_case", value_enum)]
    input_case: Option<InputCase>,

    /// 白名单文件
    #[arg(long)]
    whitelist: Option<PathBuf>,

    /// 编译后语法的缓存目录
    #[arg(long = "cache_dir")]
    cache_dir: Option<PathBuf>,

    /// 强制重建语法缓存
    #[arg(long = "overwrite_cache")]
    overwrite_cache: bool,

    /// 方括号两侧补空格
    #[arg(long = "punct_pre_process")]
    punct_pre_process: bool,

    /// 反分词并按原文恢复标点空格
    #[arg(long = "punct_post_process")]
    punct_post_process: bool,

    /// 工作线程数（0 = CPU 核数）
    #[arg(long = "n_jobs")]
    n_jobs: Option<usize>,

    #[arg(long = "batch_size")]
    batch_size: Option<usize>,

    /// 每块最大排列数（默认 729）
    #[arg(long = "max_number_of_permutations_per_split")]
    max_number_of_permutations_per_split: Option<u64>,

    /// 输出调试日志
    #[arg(long)]
    verbose: bool,

    /// 逆文本规范化（口语 → 书面）
    #[arg(long)]
    inverse: bool,

    /// 语法源目录
    #[arg(long = "grammar_dir")]
    grammar_dir: Option<PathBuf>,

    /// JSON 配置文件
    #[arg(long)]
    config: Option<PathBuf>,

    /// 使用非确定性语法
    #[arg(long = "non_deterministic")]
    non_deterministic: bool,

    /// 音频辅助模式：使用 ASR 预测文本选择候选
    #[arg(long = "audio_based")]
    audio_based: bool,

    /// 音频辅助模式下单句的 ASR 预测文本
    #[arg(long = "pred_text")]
    pred_text: Option<String>,

    /// 标注候选数
    #[arg(long = "n_tagged")]
    n_tagged: Option<usize>,

    /// 最佳候选 CER 超过该值时保留原文片段
    #[arg(long = "cer_threshold")]
    cer_threshold: Option<f64>,

    /// manifest 输入字段
    #[arg(long = "text_field")]
    text_field: Option<String>,

    /// manifest 输出字段
    #[arg(long = "output_field")]
    output_field: Option<String>,

    /// manifest 中 ASR 预测文本字段
    #[arg(long = "pred_text_field")]
    pred_text_field: Option<String>,
}

impl Cli {
    fn direction(&self) -> Direction {
        if self.inverse {
            Direction::InverseNormalize
        } else {
            Direction::Normalize
        }
    }

    /// 配置文件 + 命令行覆盖
    fn resolve_config(&self) -> Result<NormalizerConfig> {
        self.resolve_config_with(NormalizerConfig::default_path())
    }

    /// 未指定 `--config` 时使用 `default_path`（文件存在时）
    fn resolve_config_with(&self, default_path: Option<PathBuf>) -> Result<NormalizerConfig> {
        let mut config = match &self.config {
            Some(path) => NormalizerConfig::load(path)?,
            None => match default_path.filter(|path| path.is_file()) {
                Some(path) => NormalizerConfig::load(&path)?,
                None => NormalizerConfig::default(),
            },
        };

        if let Some(language) = &self.language {
            config.language = language.clone();
        }
        if let Some(input_case) = self.input_case {
            config.input_case = input_case;
        }
        if let Some(whitelist) = &self.whitelist {
            config.whitelist = Some(whitelist.clone());
        }
        if let Some(cache_dir) = &self.cache_dir {
            config.cache_dir = Some(cache_dir.clone());
        }
        if let Some(grammar_dir) = &self.grammar_dir {
            config.grammar_dir = grammar_dir.clone();
        }
        if let Some(n_jobs) = self.n_jobs {
            config.n_jobs = n_jobs;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(budget) = self.max_number_of_permutations_per_split {
            config.max_number_of_permutations_per_split = budget;
        }
        if let Some(n_tagged) = self.n_tagged {
            config.n_tagged = n_tagged;
        }
        if let Some(threshold) = self.cer_threshold {
            config.cer_threshold = Some(threshold);
        }
        if let Some(field) = &self.text_field {
            config.text_field = field.clone();
        }
        if let Some(field) = &self.output_field {
            config.output_field = field.clone();
        }
        if let Some(field) = &self.pred_text_field {
            config.pred_text_field = field.clone();
        }

        config.overwrite_cache |= self.overwrite_cache;
        config.punct_pre_process |= self.punct_pre_process;
        config.punct_post_process |= self.punct_post_process;
        if self.non_deterministic || self.audio_based {
            config.deterministic = false;
        }

        config.validate()?;
        Ok(config)
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("初始化日志失败")?;
    Ok(())
}

/// 单句失败时输出原文，只有配置错误向上传递
fn or_passthrough(
    result: Result<String, NormalizationError>,
    text: &str,
) -> Result<String, NormalizationError> {
    match result {
        Err(e @ NormalizationError::Configuration(_)) => Err(e),
        Err(e) => {
            error!("规范化失败，输出原文: {}", e);
            Ok(text.to_string())
        }
        ok => ok,
    }
}

struct Runner<'a> {
    normalizer: &'a Normalizer,
    config: &'a NormalizerConfig,
    audio_based: bool,
}

impl Runner<'_> {
    fn normalize_one(&self, text: &str, predicted: Option<&str>) -> Result<String, NormalizationError> {
        let result = match predicted {
            Some(predicted) if self.audio_based => {
                AudioSelector::from_config(self.normalizer).normalize_with_audio(text, predicted)
            }
            _ => self.normalizer.normalize(text),
        };
        or_passthrough(result, text)
    }

    fn normalize_all(
        &self,
        texts: &[String],
        predictions: Option<&[String]>,
    ) -> Result<Vec<String>, NormalizationError> {
        let indices: Vec<usize> = (0..texts.len()).collect();
        parallel_map(&indices, self.config.n_jobs, self.config.batch_size, |&idx| {
            let predicted = predictions.and_then(|preds| preds.get(idx)).map(String::as_str);
            self.normalize_one(&texts[idx], predicted)
        })
    }
}

fn emit_lines(output_file: Option<&PathBuf>, lines: &[String]) -> Result<()> {
    match output_file {
        Some(path) => manifest::write_lines(path, lines),
        None => {
            for line in lines {
                println!("{line}");
            }
            Ok(())
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = cli.resolve_config()?;
    let direction = cli.direction();

    let registry = GrammarRegistry::with_defaults();
    let normalizer = Normalizer::with_direction(&config, direction, &registry)
        .with_context(|| format!("初始化{}失败 (language={})", direction.display_name(), config.language))?;

    let runner = Runner {
        normalizer: &normalizer,
        config: &config,
        audio_based: cli.audio_based,
    };

    if let Some(text) = &cli.text {
        if cli.audio_based && cli.pred_text.is_none() {
            bail!("--audio_based 需要同时提供 --pred_text");
        }
        let output = runner.normalize_one(text, cli.pred_text.as_deref())?;
        return emit_lines(cli.output_file.as_ref(), &[output]);
    }

    let Some(input) = &cli.input_file else {
        bail!("需要 --text 或 --input_file");
    };

    let start = Instant::now();
    match manifest::detect_format(input) {
        InputFormat::PlainText => {
            if cli.audio_based {
                bail!("音频辅助模式需要 .json manifest 输入（包含 {} 字段）", config.pred_text_field);
            }
            let lines = manifest::read_lines(input)?;
            let outputs = runner.normalize_all(&lines, None)?;
            emit_lines(cli.output_file.as_ref(), &outputs)?;
            info!("处理完成: {} 行, 耗时 {:?}", lines.len(), start.elapsed());
        }
        InputFormat::JsonManifest => {
            let mut entries = manifest::read_manifest(input)?;
            let texts = manifest::manifest_texts(&entries, &config.text_field)?;
            let predictions = if cli.audio_based {
                Some(manifest::manifest_texts(&entries, &config.pred_text_field)?)
            } else {
                None
            };

            let outputs = runner.normalize_all(&texts, predictions.as_deref())?;
            manifest::set_field(&mut entries, &config.output_field, outputs);

            match &cli.output_file {
                Some(path) => manifest::write_manifest(path, &entries)?,
                None => {
                    for entry in &entries {
                        println!("{}", serde_json::to_string(entry)?);
                    }
                }
            }
            info!("处理完成: {} 条记录, 耗时 {:?}", entries.len(), start.elapsed());
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;
    run(&cli)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_snake_case_flags() {
        let cli = Cli::try_parse_from([
            "speech-tn",
            "--text",
            "twelve kilograms",
            "--input_case",
            "lower_cased",
            "--max_number_of_permutations_per_split",
            "27",
            "--inverse",
            "--punct_post_process",
        ])
        .unwrap();

        assert_eq!(cli.direction(), Direction::InverseNormalize);
        let config = cli.resolve_config_with(None).unwrap();
        assert_eq!(config.input_case, InputCase::LowerCased);
        assert_eq!(config.max_number_of_permutations_per_split, 27);
        assert!(config.punct_post_process);
    }

    #[test]
    fn test_config_file_overridden_by_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        NormalizerConfig {
            language: "de".to_string(),
            n_jobs: 4,
            ..Default::default()
        }
        .save(&path)
        .unwrap();

        let cli = Cli::try_parse_from([
            "speech-tn",
            "--config",
            path.to_str().unwrap(),
            "--n_jobs",
            "2",
            "--audio_based",
        ])
        .unwrap();
        let config = cli.resolve_config_with(None).unwrap();
        assert_eq!(config.language, "de");
        assert_eq!(config.n_jobs, 2);
        assert!(!config.deterministic);
    }

    #[test]
    fn test_zero_budget_rejected() {
        let cli = Cli::try_parse_from([
            "speech-tn",
            "--text",
            "x",
            "--max_number_of_permutations_per_split",
            "0",
        ])
        .unwrap();
        assert!(cli.resolve_config_with(None).is_err());
    }

    #[test]
    fn test_default_config_file_used_without_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        NormalizerConfig {
            language: "hi".to_string(),
            ..Default::default()
        }
        .save(&path)
        .unwrap();

        let cli = Cli::try_parse_from(["speech-tn", "--text", "x"]).unwrap();
        assert_eq!(cli.resolve_config_with(Some(path)).unwrap().language, "hi");

        let missing = dir.path().join("missing.json");
        assert_eq!(cli.resolve_config_with(Some(missing)).unwrap().language, "en");
    }

    #[test]
    fn test_passthrough_policy() {
        let exhausted = Err(NormalizationError::VerbalizationExhausted {
            chunk: "tokens { }".to_string(),
        });
        assert_eq!(or_passthrough(exhausted, "abc").unwrap(), "abc");

        let tagging = Err(NormalizationError::NoTaggingPath {
            text: "abc".to_string(),
        });
        assert_eq!(or_passthrough(tagging, "abc").unwrap(), "abc");

        let budget = Err(NormalizationError::Configuration(
            speech_tn_lib::error::ConfigurationError::InvalidBudget,
        ));
        assert!(or_passthrough(budget, "abc").is_err());
    }
}
