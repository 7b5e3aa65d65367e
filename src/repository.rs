//! リポジトリパターンによるDB操作の抽象化
//!
//! 注文の保存先は [`OrderRepository`] トレイトの背後に隠し、テスト時はモックに差し替える。
//! DB 接続は [`OrderStore`] が持ち、`acquire()` で開いて `release()` で閉じる。

use crate::parsers::{OrderItem, OrderRecord, Source};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
#[cfg(test)]
use mockall::automock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// スキーマ定義
pub const INIT_SQL: &str = include_str!("../migrations/001_init.sql");

/// 保存済みの注文（メッセージIDが一意キー）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredOrder {
    /// メールソースのメッセージID
    pub email_id: String,
    pub thread_id: Option<String>,
    /// 抽出した日時
    pub processed_at: DateTime<Utc>,
    #[serde(flatten)]
    pub record: OrderRecord,
}

/// 注文の保存先を抽象化するトレイト
#[cfg_attr(test, automock)]
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// 注文をまとめて保存する。同じ email_id は上書き
    ///
    /// # Returns
    /// 書き込んだ行数（新規・更新の区別はしない）
    async fn upsert_orders(&self, orders: &[StoredOrder]) -> Result<usize, String>;

    /// 全注文を日付の新しい順に取得
    async fn get_all_orders(&self) -> Result<Vec<StoredOrder>, String>;

    /// 全注文を削除し、削除件数を返す
    async fn clear_orders(&self) -> Result<u64, String>;
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    email_id: String,
    thread_id: Option<String>,
    source: String,
    restaurant: String,
    amount: String,
    subtotal: String,
    taxes: String,
    delivery_fee: String,
    discount: String,
    items: String,
    date: String,
    raw_text: String,
    processed_at: String,
}

fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_timestamp(value: &str, column: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| format!("Invalid {column} value '{value}': {e}"))
}

fn parse_decimal(value: &str, column: &str) -> Result<Decimal, String> {
    Decimal::from_str(value).map_err(|e| format!("Invalid {column} value '{value}': {e}"))
}

impl TryFrom<OrderRow> for StoredOrder {
    type Error = String;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let items: Vec<OrderItem> = serde_json::from_str(&row.items)
            .map_err(|e| format!("Invalid items JSON for {}: {e}", row.email_id))?;

        Ok(StoredOrder {
            processed_at: parse_timestamp(&row.processed_at, "processed_at")?,
            record: OrderRecord {
                amount: parse_decimal(&row.amount, "amount")?,
                restaurant: row.restaurant,
                items,
                subtotal: parse_decimal(&row.subtotal, "subtotal")?,
                taxes: parse_decimal(&row.taxes, "taxes")?,
                delivery_fee: parse_decimal(&row.delivery_fee, "delivery_fee")?,
                discount: parse_decimal(&row.discount, "discount")?,
                date: parse_timestamp(&row.date, "date")?,
                source: Source::from_str(&row.source)?,
                raw_text: row.raw_text,
            },
            email_id: row.email_id,
            thread_id: row.thread_id,
        })
    }
}

/// SQLiteを使用したOrderRepositoryの実装
pub struct SqliteOrderRepository {
    pool: SqlitePool,
}

impl SqliteOrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderRepository for SqliteOrderRepository {
    async fn upsert_orders(&self, orders: &[StoredOrder]) -> Result<usize, String> {
        if orders.is_empty() {
            return Ok(0);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| format!("Failed to start transaction: {e}"))?;

        let mut written = 0usize;
        for order in orders {
            let record = &order.record;
            let items = serde_json::to_string(&record.items)
                .map_err(|e| format!("Failed to serialize items: {e}"))?;

            let result = sqlx::query(
                r#"
                INSERT INTO orders (
                    email_id, thread_id, source, restaurant, amount, subtotal, taxes,
                    delivery_fee, discount, items, date, raw_text, processed_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(email_id) DO UPDATE SET
                    thread_id = excluded.thread_id,
                    source = excluded.source,
                    restaurant = excluded.restaurant,
                    amount = excluded.amount,
                    subtotal = excluded.subtotal,
                    taxes = excluded.taxes,
                    delivery_fee = excluded.delivery_fee,
                    discount = excluded.discount,
                    items = excluded.items,
                    date = excluded.date,
                    raw_text = excluded.raw_text,
                    processed_at = excluded.processed_at,
                    updated_at = CURRENT_TIMESTAMP
                "#,
            )
            .bind(&order.email_id)
            .bind(order.thread_id.as_deref())
            .bind(record.source.as_str())
            .bind(&record.restaurant)
            .bind(record.amount.to_string())
            .bind(record.subtotal.to_string())
            .bind(record.taxes.to_string())
            .bind(record.delivery_fee.to_string())
            .bind(record.discount.to_string())
            .bind(items)
            .bind(format_timestamp(&record.date))
            .bind(&record.raw_text)
            .bind(format_timestamp(&order.processed_at))
            .execute(&mut *tx)
            .await
            .map_err(|e| format!("Failed to upsert order {}: {e}", order.email_id))?;

            written += result.rows_affected() as usize;
        }

        tx.commit()
            .await
            .map_err(|e| format!("Failed to commit transaction: {e}"))?;

        log::debug!("Upserted {} orders", written);
        Ok(written)
    }

    async fn get_all_orders(&self) -> Result<Vec<StoredOrder>, String> {
        let rows: Vec<OrderRow> = sqlx::query_as(
            r#"
            SELECT email_id, thread_id, source, restaurant, amount, subtotal, taxes,
                   delivery_fee, discount, items, date, raw_text, processed_at
            FROM orders
            ORDER BY date DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| format!("Failed to fetch orders: {e}"))?;

        rows.into_iter().map(StoredOrder::try_from).collect()
    }

    async fn clear_orders(&self) -> Result<u64, String> {
        let result = sqlx::query("DELETE FROM orders")
            .execute(&self.pool)
            .await
            .map_err(|e| format!("Failed to clear orders: {e}"))?;
        Ok(result.rows_affected())
    }
}

/// 注文DBへの接続ハンドル
///
/// 呼び出し側が明示的に開閉する。グローバルな接続は持たない。
pub struct OrderStore {
    pool: SqlitePool,
}

impl OrderStore {
    /// DB ファイルを開き（なければ作成）、スキーマを適用する
    pub async fn acquire(path: &Path) -> Result<Self, String> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(|e| format!("Failed to open database {}: {e}", path.display()))?;

        log::info!("Order store opened: {}", path.display());
        Self::with_schema(pool).await
    }

    /// インメモリDBを開く（接続は 1 本に固定）
    pub async fn acquire_in_memory() -> Result<Self, String> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| format!("Failed to parse in-memory database URL: {e}"))?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| format!("Failed to open in-memory database: {e}"))?;

        Self::with_schema(pool).await
    }

    async fn with_schema(pool: SqlitePool) -> Result<Self, String> {
        sqlx::raw_sql(INIT_SQL)
            .execute(&pool)
            .await
            .map_err(|e| format!("Failed to apply schema: {e}"))?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// このストアを使うリポジトリ
    pub fn orders(&self) -> SqliteOrderRepository {
        SqliteOrderRepository::new(self.pool.clone())
    }

    /// 接続を閉じる
    pub async fn release(self) {
        self.pool.close().await;
        log::debug!("Order store closed");
    }
}
