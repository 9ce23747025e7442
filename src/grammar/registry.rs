//! 语法注册表
//!
//! 语言标签 → 语法工厂。构造规范化器时一次性解析，未知语言在此处直接失败。

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{Direction, InputCase, NormalizerConfig};
use crate::error::GrammarError;
use crate::grammar::cache::GrammarCache;
use crate::grammar::types::{Grammar, Stage};
use crate::grammar::whitelist::{Whitelist, WhitelistTagger};

/// 默认注册 FST 语法加载器的语言
pub const SUPPORTED_LANGUAGES: &[&str] = &[
    "ar", "de", "en", "es", "fr", "hi", "hu", "hy", "it", "ja", "pt", "ru", "sv", "vi", "zh",
];

/// 一组语法的标识
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GrammarKey {
    pub language: String,
    pub direction: Direction,
    pub input_case: InputCase,
    pub deterministic: bool,
    pub whitelist: Option<PathBuf>,
}

impl GrammarKey {
    pub fn from_config(config: &NormalizerConfig, direction: Direction) -> Self {
        Self {
            language: config.language.clone(),
            direction,
            input_case: config.input_case,
            deterministic: config.deterministic,
            whitelist: config.whitelist.clone(),
        }
    }

    /// 缓存文件名
    ///
    /// `<lang>_<tn|itn>_<deterministic>_<input_case>[_<whitelist>]_<stage>.fst`
    pub fn cache_file_name(&self, stage: Stage) -> String {
        let mut name = format!(
            "{}_{}_{}_{}",
            self.language,
            self.direction.component(),
            self.deterministic,
            self.input_case.as_str()
        );

        if let Some(stem) = self
            .whitelist
            .as_ref()
            .and_then(|path| path.file_stem())
            .and_then(|stem| stem.to_str())
        {
            name.push('_');
            name.push_str(stem);
        }

        name.push('_');
        name.push_str(stage.as_str());
        name.push_str(".fst");
        name
    }
}

/// 规范化所需的语法
#[derive(Clone)]
pub struct GrammarSet {
    pub tagger: Arc<dyn Grammar>,
    pub verbalizer: Arc<dyn Grammar>,
    /// 仅 TN 使用
    pub post_processor: Option<Arc<dyn Grammar>>,
}

impl fmt::Debug for GrammarSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrammarSet")
            .field("post_processor", &self.post_processor.is_some())
            .finish_non_exhaustive()
    }
}

/// 语法工厂
pub type GrammarFactory =
    Arc<dyn Fn(&GrammarKey, &NormalizerConfig) -> Result<GrammarSet, GrammarError> + Send + Sync>;

/// 语法注册表
#[derive(Clone, Default)]
pub struct GrammarRegistry {
    factories: HashMap<String, GrammarFactory>,
}

impl GrammarRegistry {
    /// 空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 为支持的语言注册 FST 语法加载器
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let loader: GrammarFactory = Arc::new(load_fst_grammars);
        for language in SUPPORTED_LANGUAGES {
            registry.factories.insert(language.to_string(), Arc::clone(&loader));
        }
        registry
    }

    /// 注册（或覆盖）某语言的工厂
    pub fn register<F>(&mut self, language: &str, factory: F)
    where
        F: Fn(&GrammarKey, &NormalizerConfig) -> Result<GrammarSet, GrammarError>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(language.to_string(), Arc::new(factory));
    }

    pub fn supports(&self, language: &str) -> bool {
        self.factories.contains_key(language)
    }

    pub fn languages(&self) -> Vec<&str> {
        let mut languages: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        languages.sort_unstable();
        languages
    }

    /// 构造语法（配置了白名单时包装标注语法）
    pub fn build(
        &self,
        key: &GrammarKey,
        config: &NormalizerConfig,
    ) -> Result<GrammarSet, GrammarError> {
        let factory = self
            .factories
            .get(&key.language)
            .ok_or_else(|| GrammarError::UnsupportedLanguage(key.language.clone()))?;

        tracing::info!(
            "加载语法: language={}, direction={}, input_case={}, deterministic={}",
            key.language,
            key.direction.component(),
            key.input_case.as_str(),
            key.deterministic
        );
        let mut grammars = factory(key, config)?;

        if let Some(path) = &key.whitelist {
            let whitelist = Whitelist::load(path, key.direction)?;
            grammars.tagger = Arc::new(WhitelistTagger::new(grammars.tagger, whitelist));
        }
        Ok(grammars)
    }
}

impl fmt::Debug for GrammarRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrammarRegistry")
            .field("languages", &self.languages())
            .finish()
    }
}

/// 从语法目录 / 缓存目录加载 FST 语法
fn load_fst_grammars(
    key: &GrammarKey,
    config: &NormalizerConfig,
) -> Result<GrammarSet, GrammarError> {
    let cache = GrammarCache::from_config(config);

    let require = |stage: Stage| -> Result<Arc<dyn Grammar>, GrammarError> {
        match cache.load(key, stage)? {
            Some(grammar) => Ok(Arc::new(grammar)),
            None => Err(GrammarError::MissingGrammar(cache.expected_source(key, stage))),
        }
    };

    let tagger = require(Stage::Tokenize)?;
    let verbalizer = require(Stage::Verbalize)?;

    let post_processor = match key.direction {
        Direction::Normalize => cache
            .load(key, Stage::PostProcess)?
            .map(|grammar| Arc::new(grammar) as Arc<dyn Grammar>),
        Direction::InverseNormalize => None,
    };

    Ok(GrammarSet {
        tagger,
        verbalizer,
        post_processor,
    })
}
