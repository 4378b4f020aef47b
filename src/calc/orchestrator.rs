//! # 批量计算调度
//!
//! 对一批命名结构依次：推导计算配置 -> 交给后端计算 -> 写入结果表。
//! 单个结构失败不会中止批量；只有调用前的检查失败（重名、缺少输入路径）
//! 才会返回错误。
//!
//! 默认顺序执行。`with_jobs(n)` (n > 1) 时使用 rayon 线程池并行计算，
//! 每个任务独立推导自己的配置，结果顺序仍与提交顺序一致。
//!
//! ## 依赖关系
//! - 被 `commands/run.rs`, `commands/atomize.rs` 使用
//! - 使用 `calc/policy.rs`, `calc/backend/`
//! - 使用 `utils/progress.rs` 显示进度

use super::backend::CalculationBackend;
use super::policy::CalculatorPolicy;
use crate::error::{DftBatchError, Result};
use crate::models::{CalculationResult, Relaxation, ResultRecord, ResultsTable, Structure};
use crate::utils::progress;

use log::{info, warn};
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::Path;

/// 批量计算调度器
pub struct BatchOrchestrator<'a> {
    backend: &'a dyn CalculationBackend,
    policy: CalculatorPolicy,
    jobs: usize,
    show_progress: bool,
}

impl<'a> BatchOrchestrator<'a> {
    pub fn new(backend: &'a dyn CalculationBackend, policy: CalculatorPolicy) -> Self {
        Self {
            backend,
            policy,
            jobs: 1,
            show_progress: true,
        }
    }

    /// 并行作业数；0 表示使用全部 CPU 核心
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = if jobs == 0 { num_cpus::get() } else { jobs };
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// 调用前检查：名称唯一、所需的输入路径已提供
    fn preflight(&self, structures: &[(String, Structure)], input_path: Option<&Path>) -> Result<()> {
        let mut seen = HashSet::new();
        for (name, _) in structures {
            if !seen.insert(name.as_str()) {
                return Err(DftBatchError::DuplicateStructure(name.clone()));
            }
        }

        if let Some(what) = self.backend.required_input() {
            match input_path {
                None => {
                    return Err(DftBatchError::MissingInputPath {
                        backend: self.backend.kind().to_string(),
                        what: what.to_string(),
                    })
                }
                Some(path) if !path.is_dir() => {
                    return Err(DftBatchError::DirectoryNotFound {
                        path: path.display().to_string(),
                    })
                }
                Some(_) => {}
            }
        }

        if let Err(reason) = self.backend.availability() {
            warn!(
                "Backend '{}' is unavailable ({}); every structure will be reported as such",
                self.backend.kind(),
                reason
            );
        }
        Ok(())
    }

    fn compute_one(
        &self,
        name: &str,
        structure: &Structure,
        relaxation: Relaxation,
        input_path: Option<&Path>,
    ) -> ResultRecord {
        let config = self.policy.derive(name, structure.num_sites());
        let outcome = self
            .backend
            .compute(name, structure, &config, relaxation, input_path);

        match &outcome {
            CalculationResult::Success(e) => {
                info!("{}: total energy {} eV", name, e.total_energy)
            }
            other => info!(
                "{}: {} ({})",
                name,
                other.status(),
                other.error_message().unwrap_or_default()
            ),
        }

        let formula = (structure.num_sites() > 0).then(|| structure.formula());
        ResultRecord::new(outcome, formula)
    }

    /// 计算整批结构
    pub fn run(
        &self,
        structures: &[(String, Structure)],
        relaxation: Relaxation,
        input_path: Option<&Path>,
    ) -> Result<ResultsTable> {
        self.preflight(structures, input_path)?;

        let pb = progress::create_batch_bar(structures.len() as u64, self.show_progress);
        pb.set_message("calculating");

        let records: Vec<ResultRecord> = if self.jobs > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.jobs)
                .build()
                .map_err(|e| DftBatchError::ConfigError(format!("thread pool: {}", e)))?;

            pool.install(|| {
                structures
                    .par_iter()
                    .map(|(name, structure)| {
                        let record = self.compute_one(name, structure, relaxation, input_path);
                        pb.inc(1);
                        record
                    })
                    .collect()
            })
        } else {
            structures
                .iter()
                .map(|(name, structure)| {
                    pb.set_message(name.clone());
                    let record = self.compute_one(name, structure, relaxation, input_path);
                    pb.inc(1);
                    record
                })
                .collect()
        };

        pb.finish_and_clear();

        let mut table = ResultsTable::new();
        for ((name, _), record) in structures.iter().zip(records) {
            table.insert(name.clone(), record);
        }
        Ok(table)
    }
}
