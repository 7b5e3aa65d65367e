//! 注文メール取得・パース用 BatchTask 実装
//!
//! 1 通ごとの処理は [`process_message`]（MIME 走査 → HTML 正規化 → 注文抽出）。
//! [`OrderFetchTask`] はこれを `BatchRunner` に載せ、メッセージ取得と保存を受け持つ。
//!
//! # フック活用
//! - `process_batch`: 1 バッチ内のメッセージを `concurrency` 件まで並行処理（結果は入力順）
//! - `after_batch`: 抽出できた注文を一括 upsert

use crate::batch_runner::{BatchResult, BatchRunner, BatchTask};
use crate::config::{FetchConfig, ParseConfig};
use crate::logic::fetch_logic::{
    combine_body, dedupe_message_ids, has_enough_body, resolve_message_date,
};
use crate::mail::{extract_all_parts_with_limits, MailSource, RawMessage};
use crate::parsers::{extract_order, OrderRecord};
use crate::repository::{OrderRepository, StoredOrder};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// タスク名
pub const ORDER_FETCH_TASK_NAME: &str = "order-fetch";

/// 1 通のメッセージから注文レコードを抽出する
///
/// 本文が短すぎる場合と、金額が取れなかった場合は Err（失敗として数える）。
pub fn process_message(
    message: &RawMessage,
    config: &ParseConfig,
    now: DateTime<Utc>,
) -> Result<OrderRecord, String> {
    process_message_until(message, config, now, None)
}

/// [`process_message`] に期限を付けたもの
///
/// 期限は MIME 走査・正規化の後、注文抽出の前に確認する。
/// 抽出中の正規表現の走査そのものは中断できない。
pub fn process_message_until(
    message: &RawMessage,
    config: &ParseConfig,
    now: DateTime<Utc>,
    deadline: Option<Instant>,
) -> Result<OrderRecord, String> {
    let extracted = extract_all_parts_with_limits(&message.payload, &config.walk_limits());
    let body = combine_body(&extracted);

    if !has_enough_body(&body, config.min_body_chars) {
        return Err(format!("Skipping email {}: no body extracted", message.id));
    }

    if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
        return Err(format!(
            "Abandoned email {} before extraction: deadline passed",
            message.id
        ));
    }

    let date = resolve_message_date(message.date_header(), now);
    let record = extract_order(&body, date);

    if !record.is_valid() {
        return Err(format!(
            "No order amount found in email {} (source: {}, {} chars)",
            message.id,
            record.source,
            body.chars().count()
        ));
    }

    log::debug!(
        "Parsed email {}: source={}, items={}",
        message.id,
        record.source,
        record.items.len()
    );
    Ok(record)
}

/// 取得タスクのコンテキスト
pub struct OrderFetchContext<M, O>
where
    M: MailSource + 'static,
    O: OrderRepository + 'static,
{
    pub mail_source: Arc<M>,
    pub order_repo: Arc<O>,
    pub fetch: FetchConfig,
    pub parse: ParseConfig,
}

/// 注文メール取得タスク
///
/// 入力はメッセージID、出力は保存用の注文。
pub struct OrderFetchTask<M, O>
where
    M: MailSource + 'static,
    O: OrderRepository + 'static,
{
    _phantom: PhantomData<(M, O)>,
}

impl<M, O> OrderFetchTask<M, O>
where
    M: MailSource + 'static,
    O: OrderRepository + 'static,
{
    pub fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<M, O> Default for OrderFetchTask<M, O>
where
    M: MailSource + 'static,
    O: OrderRepository + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<M, O> BatchTask for OrderFetchTask<M, O>
where
    M: MailSource + 'static,
    O: OrderRepository + 'static,
{
    type Input = String;
    type Output = StoredOrder;
    type Context = OrderFetchContext<M, O>;

    fn name(&self) -> &str {
        ORDER_FETCH_TASK_NAME
    }

    async fn process(
        &self,
        input: Self::Input,
        context: &Self::Context,
    ) -> Result<Self::Output, String> {
        let message = context
            .mail_source
            .get_message(&input)
            .await
            .map_err(|e| format!("Failed to fetch message {input}: {e}"))?;
        let thread_id = message.thread_id.clone();

        // 正規表現の走査は CPU バウンドなので専用スレッドで実行し、時間上限を設ける。
        // timeout は結果を待つのをやめるだけで、スレッドは止まらない。
        // スレッド側も同じ期限を見て、抽出に入る前に打ち切る。
        let limit = Duration::from_millis(context.fetch.parse_timeout_ms);
        let deadline = Instant::now() + limit;
        let parse_config = context.parse.clone();
        let handle = tokio::task::spawn_blocking(move || {
            process_message_until(&message, &parse_config, Utc::now(), Some(deadline))
        });

        let record = match tokio::time::timeout(limit, handle).await {
            Ok(Ok(result)) => result?,
            Ok(Err(e)) => return Err(format!("Parse task for {input} failed: {e}")),
            Err(_) => {
                return Err(format!(
                    "Parsing message {input} timed out after {}ms",
                    context.fetch.parse_timeout_ms
                ))
            }
        };

        Ok(StoredOrder {
            email_id: input,
            thread_id,
            processed_at: Utc::now(),
            record,
        })
    }

    async fn process_batch(
        &self,
        inputs: Vec<Self::Input>,
        context: &Self::Context,
    ) -> Vec<Result<Self::Output, String>> {
        let concurrency = context.fetch.concurrency.max(1);
        stream::iter(inputs)
            .map(|input| self.process(input, context))
            .buffered(concurrency)
            .collect()
            .await
    }

    async fn after_batch(
        &self,
        batch_number: usize,
        results: &[Result<Self::Output, String>],
        context: &Self::Context,
    ) -> Result<(), String> {
        let orders: Vec<StoredOrder> = results
            .iter()
            .filter_map(|r| r.as_ref().ok().cloned())
            .collect();

        if orders.is_empty() {
            return Ok(());
        }

        let written = context.order_repo.upsert_orders(&orders).await?;
        log::info!(
            "[{}] Batch {}: stored {} order(s)",
            ORDER_FETCH_TASK_NAME,
            batch_number,
            written
        );
        Ok(())
    }
}

/// 設定されたクエリをすべて実行し、重複を除いたメッセージIDを返す
///
/// 失敗したクエリはログに残してスキップする。
pub async fn collect_candidate_ids<M>(mail_source: &M, config: &FetchConfig) -> Vec<String>
where
    M: MailSource + ?Sized,
{
    let mut all_ids = Vec::new();
    for query in &config.queries {
        match mail_source.list_message_ids(query, config.max_results).await {
            Ok(ids) => {
                log::debug!("Query '{}' returned {} message(s)", query, ids.len());
                all_ids.extend(ids);
            }
            Err(e) => log::warn!("Query failed: {}: {}", query, e),
        }
    }
    dedupe_message_ids(all_ids)
}

/// 候補メッセージを取得・パースして保存する
pub async fn run_order_fetch<M, O>(
    context: OrderFetchContext<M, O>,
    should_cancel: impl Fn() -> bool,
    on_progress: impl Fn(&crate::batch_runner::BatchProgressEvent),
) -> Result<(usize, BatchResult<StoredOrder>), String>
where
    M: MailSource + 'static,
    O: OrderRepository + 'static,
{
    let ids = collect_candidate_ids(context.mail_source.as_ref(), &context.fetch).await;
    let total = ids.len();
    log::info!("Found {} candidate order email(s)", total);

    let runner = BatchRunner::new(
        OrderFetchTask::<M, O>::new(),
        context.fetch.batch_size,
        context.fetch.delay_ms,
    );
    let result = runner.run(ids, &context, should_cancel, on_progress).await?;
    Ok((total, result))
}
