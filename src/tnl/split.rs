//! TNL 拆分规划
//!
//! 一个块的排列数是其中各 token 排列数的乘积，句子稍长就会组合爆炸。
//! 从左到右扫描 token，保持块内排列数乘积不超过预算。

use crate::error::ConfigurationError;
use crate::tnl::permutation::serialization_count;
use crate::tnl::types::Token;

/// 默认每块排列数上限（3^6）
pub const DEFAULT_MAX_PERMUTATIONS: u64 = 729;

/// 拆分规划器
#[derive(Debug, Clone, Copy)]
pub struct SplitPlanner {
    budget: u64,
}

impl SplitPlanner {
    pub fn new(budget: u64) -> Result<Self, ConfigurationError> {
        if budget == 0 {
            return Err(ConfigurationError::InvalidBudget);
        }
        Ok(Self { budget })
    }

    pub fn budget(&self) -> u64 {
        self.budget
    }

    /// 单个 token 的排列数估计
    ///
    /// 各层 `factorial(字段数)` 的乘积，保序 token 的自身层级记为 1，
    /// 与排列生成器实际产生的数量一致。
    pub fn estimate(token: &Token) -> u64 {
        serialization_count(token)
    }

    /// 拆分 token 序列
    ///
    /// 返回的块按顺序拼接后与输入完全一致，且每块的排列数乘积不超过预算。
    /// 单个 token 已超预算时无法拆分，返回配置错误。
    pub fn split<'a>(&self, tokens: &'a [Token]) -> Result<Vec<&'a [Token]>, ConfigurationError> {
        let mut chunks = Vec::new();
        let mut chunk_start = 0;
        let mut running = 1u64;

        for (idx, token) in tokens.iter().enumerate() {
            let estimate = Self::estimate(token);
            if estimate > self.budget {
                return Err(ConfigurationError::PermutationBudgetExceeded {
                    estimate,
                    budget: self.budget,
                    token: token.to_string(),
                });
            }

            if idx > chunk_start && running.saturating_mul(estimate) > self.budget {
                chunks.push(&tokens[chunk_start..idx]);
                chunk_start = idx;
                running = 1;
            }
            running = running.saturating_mul(estimate);
        }

        if chunk_start < tokens.len() {
            chunks.push(&tokens[chunk_start..]);
        }

        tracing::debug!(
            "拆分规划: {} 个 token -> {} 个块 (budget={})",
            tokens.len(),
            chunks.len(),
            self.budget
        );

        Ok(chunks)
    }
}

impl Default for SplitPlanner {
    fn default() -> Self {
        Self {
            budget: DEFAULT_MAX_PERMUTATIONS,
        }
    }
}
