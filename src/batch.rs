// 批量规范化
//
// 句子之间相互独立：按 batch_size 分批放入任务队列，n_jobs 个工作线程各自取批处理，
// 结果按批次下标还原为输入顺序。规范化器构造后只读，直接在线程间共享引用。

use std::thread;

use crossbeam_channel::unbounded;

use crate::audio::AudioSelector;
use crate::error::NormalizationError;
use crate::tnl::Normalizer;

/// 实际工作线程数（0 = CPU 核数）
pub fn resolve_jobs(n_jobs: usize) -> usize {
    if n_jobs > 0 {
        return n_jobs;
    }
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// 并行 map，保持输入顺序
///
/// 任一元素出错时返回该错误（其余批次的结果丢弃）
pub fn parallel_map<T, R, E, F>(
    items: &[T],
    n_jobs: usize,
    batch_size: usize,
    f: F,
) -> Result<Vec<R>, E>
where
    T: Sync,
    R: Send,
    E: Send,
    F: Fn(&T) -> Result<R, E> + Sync,
{
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let batch_size = batch_size.max(1);
    let n_batches = items.len().div_ceil(batch_size);
    let workers = resolve_jobs(n_jobs).min(n_batches);

    if workers <= 1 {
        return items.iter().map(&f).collect();
    }

    tracing::debug!(
        "并行处理: {} 条, {} 批, {} 个线程",
        items.len(),
        n_batches,
        workers
    );

    let (job_tx, job_rx) = unbounded::<(usize, &[T])>();
    for job in items.chunks(batch_size).enumerate() {
        if job_tx.send(job).is_err() {
            break;
        }
    }
    drop(job_tx);

    let (result_tx, result_rx) = unbounded::<(usize, Result<Vec<R>, E>)>();
    let f = &f;

    thread::scope(|scope| {
        for worker in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move || {
                for (idx, batch) in job_rx.iter() {
                    let result: Result<Vec<R>, E> = batch.iter().map(f).collect();
                    let failed = result.is_err();
                    if result_tx.send((idx, result)).is_err() || failed {
                        break;
                    }
                }
                tracing::trace!("worker {} 退出", worker);
            });
        }
    });
    drop(result_tx);

    let mut batches: Vec<Option<Vec<R>>> = (0..n_batches).map(|_| None).collect();
    for (idx, result) in result_rx.iter() {
        batches[idx] = Some(result?);
    }

    Ok(batches.into_iter().flatten().flatten().collect())
}

/// 批量规范化
///
/// 单句失败按回退原文处理，标注失败等不可恢复错误中止整批
pub fn normalize_batch(
    normalizer: &Normalizer,
    texts: &[String],
    n_jobs: usize,
    batch_size: usize,
) -> Result<Vec<String>, NormalizationError> {
    tracing::info!(
        "批量规范化: {} 条, n_jobs={}, batch_size={}",
        texts.len(),
        n_jobs,
        batch_size
    );
    parallel_map(texts, n_jobs, batch_size, |text| normalizer.normalize(text))
}

/// 批量音频辅助规范化，`items` 为 (原文, ASR 预测文本)
pub fn normalize_batch_with_audio(
    normalizer: &Normalizer,
    items: &[(String, String)],
    n_jobs: usize,
    batch_size: usize,
) -> Result<Vec<String>, NormalizationError> {
    tracing::info!(
        "批量音频辅助规范化: {} 条, n_jobs={}, batch_size={}",
        items.len(),
        n_jobs,
        batch_size
    );
    let selector = AudioSelector::from_config(normalizer);
    parallel_map(items, n_jobs, batch_size, |(text, predicted)| {
        selector.normalize_with_audio(text, predicted)
    })
}
