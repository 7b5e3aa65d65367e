//! 汎用的なバッチ処理エンジン
//!
//! 入力をチャンクに分け、チャンクごとに `before_batch` → `process_batch` → `after_batch` を呼ぶ。
//! 進捗は呼び出し側が渡すコールバックで通知する（CLI では標準エラーへのログ出力に使う）。
//!
//! ```ignore
//! let runner = BatchRunner::new(OrderFetchTask::new(), 50, 0);
//! let result = runner
//!     .run(message_ids, &context, || false, |event| log::info!("{}", event.status_message))
//!     .await?;
//! ```

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tokio::time::sleep;

/// バッチ処理の1タスクを定義するトレイト
///
/// # フック
/// - `before_batch`: チャンク処理前
/// - `process_batch`: チャンク単位での処理（デフォルトは1件ずつ `process` を呼び出す）
/// - `after_batch`: チャンク処理後（一括DB保存等）
#[async_trait]
pub trait BatchTask: Send + Sync {
    /// 入力データの型
    type Input: Send + Clone;
    /// 出力データの型
    type Output: Send;
    /// コンテキスト（メールソースやリポジトリなど）の型
    type Context: Send + Sync;

    /// タスク名（ログ・進捗表示用）
    fn name(&self) -> &str;

    /// 1件分の処理を実行
    async fn process(
        &self,
        input: Self::Input,
        context: &Self::Context,
    ) -> Result<Self::Output, String>;

    /// チャンク処理前のフック。デフォルトは何もしない
    async fn before_batch(
        &self,
        _inputs: &[Self::Input],
        _context: &Self::Context,
    ) -> Result<(), String> {
        Ok(())
    }

    /// チャンク単位での処理
    ///
    /// 戻り値は入力と同じ順序で並べること。
    async fn process_batch(
        &self,
        inputs: Vec<Self::Input>,
        context: &Self::Context,
    ) -> Vec<Result<Self::Output, String>> {
        let mut results = Vec::with_capacity(inputs.len());
        for input in inputs {
            results.push(self.process(input, context).await);
        }
        results
    }

    /// チャンク処理後のフック。ここで Err を返すとバッチ全体を中断する
    async fn after_batch(
        &self,
        _batch_number: usize,
        _results: &[Result<Self::Output, String>],
        _context: &Self::Context,
    ) -> Result<(), String> {
        Ok(())
    }
}

/// バッチ処理の進捗イベント
#[derive(Debug, Clone, Serialize)]
pub struct BatchProgressEvent {
    pub task_name: String,
    /// 現在のバッチ番号（1から開始）
    pub batch_number: usize,
    pub batch_size: usize,
    pub total_items: usize,
    pub processed_count: usize,
    pub success_count: usize,
    pub failed_count: usize,
    /// 進捗率（0.0 ~ 100.0）
    pub progress_percent: f32,
    pub status_message: String,
    pub is_complete: bool,
    /// エラーメッセージ（エラー・キャンセル時のみ）
    pub error: Option<String>,
}

fn percent(processed_count: usize, total_items: usize) -> f32 {
    if total_items > 0 {
        (processed_count as f32 / total_items as f32) * 100.0
    } else {
        0.0
    }
}

impl BatchProgressEvent {
    /// 進捗イベントを作成
    #[allow(clippy::too_many_arguments)]
    pub fn progress(
        task_name: &str,
        batch_number: usize,
        batch_size: usize,
        total_items: usize,
        processed_count: usize,
        success_count: usize,
        failed_count: usize,
        status_message: String,
    ) -> Self {
        Self {
            task_name: task_name.to_string(),
            batch_number,
            batch_size,
            total_items,
            processed_count,
            success_count,
            failed_count,
            progress_percent: percent(processed_count, total_items),
            status_message,
            is_complete: false,
            error: None,
        }
    }

    /// 完了イベントを作成
    pub fn complete(
        task_name: &str,
        total_items: usize,
        success_count: usize,
        failed_count: usize,
        status_message: String,
    ) -> Self {
        Self {
            task_name: task_name.to_string(),
            batch_number: 0,
            batch_size: 0,
            total_items,
            processed_count: total_items,
            success_count,
            failed_count,
            progress_percent: 100.0,
            status_message,
            is_complete: true,
            error: None,
        }
    }

    /// エラーイベントを作成
    pub fn error(
        task_name: &str,
        total_items: usize,
        processed_count: usize,
        success_count: usize,
        failed_count: usize,
        error_message: String,
    ) -> Self {
        Self {
            task_name: task_name.to_string(),
            batch_number: 0,
            batch_size: 0,
            total_items,
            processed_count,
            success_count,
            failed_count,
            progress_percent: percent(processed_count, total_items),
            status_message: error_message.clone(),
            is_complete: true,
            error: Some(error_message),
        }
    }

    /// キャンセルイベントを作成
    pub fn cancelled(
        task_name: &str,
        total_items: usize,
        processed_count: usize,
        success_count: usize,
        failed_count: usize,
    ) -> Self {
        Self {
            task_name: task_name.to_string(),
            batch_number: 0,
            batch_size: 0,
            total_items,
            processed_count,
            success_count,
            failed_count,
            progress_percent: percent(processed_count, total_items),
            status_message: "Processing cancelled".to_string(),
            is_complete: true,
            error: Some("Cancelled".to_string()),
        }
    }
}

/// バッチ処理の結果
#[derive(Debug, Clone)]
pub struct BatchResult<O> {
    /// 成功した出力（入力順）
    pub outputs: Vec<O>,
    pub success_count: usize,
    pub failed_count: usize,
}

/// バッチ処理エンジン
pub struct BatchRunner<T: BatchTask> {
    task: T,
    batch_size: usize,
    delay_ms: u64,
}

impl<T: BatchTask> BatchRunner<T> {
    /// # Arguments
    /// * `batch_size` - 1バッチあたりの処理件数（0 は 1 として扱う）
    /// * `delay_ms` - バッチ間のディレイ（ミリ秒）
    pub fn new(task: T, batch_size: usize, delay_ms: u64) -> Self {
        Self {
            task,
            batch_size: batch_size.max(1),
            delay_ms,
        }
    }

    pub fn task(&self) -> &T {
        &self.task
    }

    /// バッチ処理を実行
    ///
    /// # Arguments
    /// * `should_cancel` - チャンクの開始前に確認する。true なら処理済み分を返して終了
    /// * `on_progress` - 進捗イベントの通知先
    pub async fn run(
        &self,
        inputs: Vec<T::Input>,
        context: &T::Context,
        should_cancel: impl Fn() -> bool,
        on_progress: impl Fn(&BatchProgressEvent),
    ) -> Result<BatchResult<T::Output>, String> {
        let total_items = inputs.len();
        let task_name = self.task.name();

        log::info!(
            "[{}] Starting batch processing: {} items, batch_size={}, delay={}ms",
            task_name,
            total_items,
            self.batch_size,
            self.delay_ms
        );

        if total_items == 0 {
            on_progress(&BatchProgressEvent::complete(
                task_name,
                0,
                0,
                0,
                "Nothing to process".to_string(),
            ));
            return Ok(BatchResult {
                outputs: Vec::new(),
                success_count: 0,
                failed_count: 0,
            });
        }

        let mut outputs: Vec<T::Output> = Vec::with_capacity(total_items);
        let mut success_count: usize = 0;
        let mut failed_count: usize = 0;
        let mut processed_count: usize = 0;
        let mut batch_number: usize = 0;

        for chunk in inputs.chunks(self.batch_size) {
            if should_cancel() {
                log::info!("[{}] Processing cancelled", task_name);
                on_progress(&BatchProgressEvent::cancelled(
                    task_name,
                    total_items,
                    processed_count,
                    success_count,
                    failed_count,
                ));
                return Ok(BatchResult {
                    outputs,
                    success_count,
                    failed_count,
                });
            }

            batch_number += 1;

            if batch_number > 1 && self.delay_ms > 0 {
                log::debug!(
                    "[{}] Waiting {}ms before batch {}",
                    task_name,
                    self.delay_ms,
                    batch_number
                );
                sleep(Duration::from_millis(self.delay_ms)).await;
            }

            log::info!(
                "[{}] Processing batch {}: {} items",
                task_name,
                batch_number,
                chunk.len()
            );

            let batch_size = chunk.len();

            if let Err(e) = self.task.before_batch(chunk, context).await {
                log::error!("[{}] before_batch failed: {}", task_name, e);
                on_progress(&BatchProgressEvent::error(
                    task_name,
                    total_items,
                    processed_count,
                    success_count,
                    failed_count,
                    format!("before_batch failed: {e}"),
                ));
                return Err(e);
            }

            let batch_results = self.task.process_batch(chunk.to_vec(), context).await;

            let mut batch_success = 0;
            let mut batch_failed = 0;
            for result in &batch_results {
                match result {
                    Ok(_) => {
                        success_count += 1;
                        batch_success += 1;
                    }
                    Err(e) => {
                        log::warn!("[{}] Item processing failed: {}", task_name, e);
                        failed_count += 1;
                        batch_failed += 1;
                    }
                }
                processed_count += 1;
            }

            if let Err(e) = self
                .task
                .after_batch(batch_number, &batch_results, context)
                .await
            {
                log::error!("[{}] after_batch failed: {}", task_name, e);
                on_progress(&BatchProgressEvent::error(
                    task_name,
                    total_items,
                    processed_count,
                    success_count,
                    failed_count,
                    format!("after_batch failed: {e}"),
                ));
                return Err(e);
            }

            outputs.extend(batch_results.into_iter().flatten());

            on_progress(&BatchProgressEvent::progress(
                task_name,
                batch_number,
                batch_size,
                total_items,
                processed_count,
                success_count,
                failed_count,
                format!(
                    "Batch {batch_number} done: {batch_success} succeeded, {batch_failed} failed"
                ),
            ));

            log::info!(
                "[{}] Batch {} complete: {} success, {} failed",
                task_name,
                batch_number,
                batch_success,
                batch_failed
            );
        }

        on_progress(&BatchProgressEvent::complete(
            task_name,
            total_items,
            success_count,
            failed_count,
            format!("Done: {success_count} succeeded, {failed_count} failed"),
        ));

        log::info!(
            "[{}] Batch processing complete: {} success, {} failed",
            task_name,
            success_count,
            failed_count
        );

        Ok(BatchResult {
            outputs,
            success_count,
            failed_count,
        })
    }
}
