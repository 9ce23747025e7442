//! 语法缓存
//!
//! 源语法位于 `<grammar_dir>/<lang>/<tn|itn>/<stage>[_non_deterministic].fst`
//! （或 AT&T 文本格式 `.fst.txt`）。编译后的语法按 `GrammarKey::cache_file_name`
//! 写入缓存目录，同名 `.md5` 文件记录源文件摘要，摘要不一致时重建。

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::NormalizerConfig;
use crate::error::GrammarError;
use crate::grammar::fst::FstGrammar;
use crate::grammar::registry::GrammarKey;
use crate::grammar::types::Stage;

/// 语法缓存
#[derive(Debug, Clone)]
pub struct GrammarCache {
    grammar_dir: PathBuf,
    cache_dir: Option<PathBuf>,
    overwrite: bool,
}

impl GrammarCache {
    pub fn new(grammar_dir: PathBuf, cache_dir: Option<PathBuf>, overwrite: bool) -> Self {
        Self {
            grammar_dir,
            cache_dir,
            overwrite,
        }
    }

    pub fn from_config(config: &NormalizerConfig) -> Self {
        Self::new(
            config.grammar_dir.clone(),
            config.cache_dir.clone(),
            config.overwrite_cache,
        )
    }

    fn stage_dir(&self, key: &GrammarKey) -> PathBuf {
        self.grammar_dir
            .join(&key.language)
            .join(key.direction.component())
    }

    /// 首选的源文件路径（用于错误提示）
    pub fn expected_source(&self, key: &GrammarKey, stage: Stage) -> PathBuf {
        self.stage_dir(key).join(format!("{}.fst", stage.as_str()))
    }

    /// 按优先级列出候选源文件
    fn source_candidates(&self, key: &GrammarKey, stage: Stage) -> Vec<PathBuf> {
        let dir = self.stage_dir(key);
        let mut stems = Vec::with_capacity(2);
        if !key.deterministic {
            stems.push(format!("{}_non_deterministic", stage.as_str()));
        }
        stems.push(stage.as_str().to_string());

        stems
            .iter()
            .flat_map(|stem| {
                [
                    dir.join(format!("{stem}.fst")),
                    dir.join(format!("{stem}.fst.txt")),
                ]
            })
            .collect()
    }

    /// 存在的源文件
    pub fn find_source(&self, key: &GrammarKey, stage: Stage) -> Option<PathBuf> {
        self.source_candidates(key, stage)
            .into_iter()
            .find(|path| path.is_file())
    }

    /// 缓存文件路径（未配置缓存目录时为 None）
    pub fn cached_path(&self, key: &GrammarKey, stage: Stage) -> Option<PathBuf> {
        self.cache_dir
            .as_ref()
            .map(|dir| dir.join(key.cache_file_name(stage)))
    }

    /// 加载某阶段的语法
    ///
    /// 源文件与缓存都不存在时返回 `Ok(None)`
    pub fn load(&self, key: &GrammarKey, stage: Stage) -> Result<Option<FstGrammar>, GrammarError> {
        let source = self.find_source(key, stage);
        let cached = self.cached_path(key, stage);

        let Some(source) = source else {
            // 只有缓存（例如只分发了编译产物）
            return match cached {
                Some(path) if path.is_file() && !self.overwrite => {
                    tracing::debug!("使用缓存语法（无源文件）: {:?}", path);
                    FstGrammar::read(&path).map(Some)
                }
                _ => Ok(None),
            };
        };

        let bytes = fs::read(&source).map_err(|e| GrammarError::io(&source, e))?;
        let digest = format!("{:x}", md5::compute(&bytes));

        if let Some(path) = &cached {
            if !self.overwrite && read_stamp(path).as_deref() == Some(digest.as_str()) {
                match FstGrammar::read(path) {
                    Ok(grammar) => {
                        tracing::debug!("命中语法缓存: {:?}", path);
                        return Ok(Some(grammar));
                    }
                    Err(e) => tracing::warn!("语法缓存损坏，重新编译: {:?} ({})", path, e),
                }
            }
        }

        tracing::info!("编译语法: {:?}", source);
        let grammar = FstGrammar::compile(&source)?;

        if let Some(path) = &cached {
            if let Err(e) = store(&grammar, path, &digest) {
                // 缓存只是加速，写入失败不影响使用
                tracing::warn!("写入语法缓存失败: {:?} ({})", path, e);
            }
        }

        Ok(Some(grammar))
    }
}

fn stamp_path(cached: &Path) -> PathBuf {
    cached.with_extension("fst.md5")
}

fn read_stamp(cached: &Path) -> Option<String> {
    if !cached.is_file() {
        return None;
    }
    fs::read_to_string(stamp_path(cached))
        .ok()
        .map(|stamp| stamp.trim().to_string())
}

/// 原子写入：先写临时文件，再替换（多进程并发时后写者胜出）
fn store(grammar: &FstGrammar, cached: &Path, digest: &str) -> Result<(), GrammarError> {
    if let Some(parent) = cached.parent() {
        fs::create_dir_all(parent).map_err(|e| GrammarError::io(parent, e))?;
    }

    let temp = cached.with_extension(format!("fst.{}.tmp", std::process::id()));
    grammar.write(&temp)?;
    fs::rename(&temp, cached).map_err(|e| GrammarError::io(cached, e))?;

    let stamp = stamp_path(cached);
    fs::write(&stamp, digest).map_err(|e| GrammarError::io(&stamp, e))?;

    tracing::info!("语法已缓存: {:?}", cached);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Direction, InputCase};
    use crate::grammar::types::Grammar;

    fn key(deterministic: bool) -> GrammarKey {
        GrammarKey {
            language: "en".to_string(),
            direction: Direction::InverseNormalize,
            input_case: InputCase::Cased,
            deterministic,
            whitelist: None,
        }
    }

    /// 单弧文本 FST：`from` → `to`
    fn write_text_grammar(path: &Path, from: u8, to: u8) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, format!("0\t1\t{from}\t{to}\n1\n")).unwrap();
    }

    fn setup() -> (tempfile::TempDir, GrammarCache) {
        let dir = tempfile::tempdir().unwrap();
        let cache = GrammarCache::new(
            dir.path().join("grammars"),
            Some(dir.path().join("cache")),
            false,
        );
        (dir, cache)
    }

    #[test]
    fn test_missing_source_and_cache() {
        let (_dir, cache) = setup();
        assert!(cache.load(&key(true), Stage::Tokenize).unwrap().is_none());
    }

    #[test]
    fn test_compile_and_populate_cache() {
        let (dir, cache) = setup();
        let source = dir.path().join("grammars/en/itn/tokenize.fst.txt");
        write_text_grammar(&source, b'a', b'b');

        let grammar = cache.load(&key(true), Stage::Tokenize).unwrap().unwrap();
        assert_eq!(grammar.apply("a", 1).unwrap().shortest_path(), Some("b"));

        let cached = dir.path().join("cache/en_itn_true_cased_tokenize.fst");
        assert!(cached.is_file());
        let stamp = fs::read_to_string(stamp_path(&cached)).unwrap();
        assert_eq!(stamp, format!("{:x}", md5::compute(fs::read(&source).unwrap())));
    }

    #[test]
    fn test_changed_source_rebuilds_cache() {
        let (dir, cache) = setup();
        let source = dir.path().join("grammars/en/itn/tokenize.fst.txt");
        write_text_grammar(&source, b'a', b'b');
        cache.load(&key(true), Stage::Tokenize).unwrap();

        write_text_grammar(&source, b'a', b'c');
        let grammar = cache.load(&key(true), Stage::Tokenize).unwrap().unwrap();
        assert_eq!(grammar.apply("a", 1).unwrap().shortest_path(), Some("c"));
    }

    #[test]
    fn test_cache_used_without_source() {
        let (dir, cache) = setup();
        let source = dir.path().join("grammars/en/itn/verbalize.fst.txt");
        write_text_grammar(&source, b'x', b'y');
        cache.load(&key(true), Stage::Verbalize).unwrap();

        fs::remove_file(&source).unwrap();
        let grammar = cache.load(&key(true), Stage::Verbalize).unwrap().unwrap();
        assert_eq!(grammar.apply("x", 1).unwrap().shortest_path(), Some("y"));

        let overwrite = GrammarCache::new(
            dir.path().join("grammars"),
            Some(dir.path().join("cache")),
            true,
        );
        assert!(overwrite.load(&key(true), Stage::Verbalize).unwrap().is_none());
    }

    #[test]
    fn test_non_deterministic_source_preferred() {
        let (dir, cache) = setup();
        write_text_grammar(&dir.path().join("grammars/en/itn/tokenize.fst.txt"), b'a', b'd');
        write_text_grammar(
            &dir.path().join("grammars/en/itn/tokenize_non_deterministic.fst.txt"),
            b'a',
            b'n',
        );

        let det = cache.load(&key(true), Stage::Tokenize).unwrap().unwrap();
        let non_det = cache.load(&key(false), Stage::Tokenize).unwrap().unwrap();
        assert_eq!(det.apply("a", 1).unwrap().shortest_path(), Some("d"));
        assert_eq!(non_det.apply("a", 1).unwrap().shortest_path(), Some("n"));
    }

    #[test]
    fn test_without_cache_dir() {
        let dir = tempfile::tempdir().unwrap();
        let cache = GrammarCache::new(dir.path().to_path_buf(), None, false);
        write_text_grammar(&dir.path().join("en/itn/tokenize.fst.txt"), b'a', b'b');

        assert!(cache.cached_path(&key(true), Stage::Tokenize).is_none());
        assert!(cache.load(&key(true), Stage::Tokenize).unwrap().is_some());
    }
}
