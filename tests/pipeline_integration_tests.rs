//! 取得から集計までの統合テスト
//!
//! エクスポート済み JSON メッセージをディレクトリに置き、ファイルベースのメールソース経由で
//! 抽出・保存・集計まで通す。個人情報を含まないダミーデータを使用しています。

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use foodspend_lib::config::AppConfig;
use foodspend_lib::mail::{FileMailSource, Header, Part, RawMessage};
use foodspend_lib::repository::{OrderRepository, OrderStore};
use rust_decimal_macros::dec;
use std::sync::Arc;
use tempfile::TempDir;

/// Swiggy 配達完了メールのサンプル（ダミーデータ）
const SAMPLE_SWIGGY: &str = "Your Swiggy order from Meghana Foods was delivered.\n\
    1 x Chicken Biryani ₹320\n\
    2 x Raita ₹40\n\
    Delivery Fee: ₹35\n\
    Discount: ₹60\n\
    Total: Rs. 450.00\n";

/// Zomato 配達完了メールのサンプル（ダミーデータ）
const SAMPLE_ZOMATO: &str = "Your Zomato order from Truffles has been delivered\n\
    1 x Chicken Burger ₹ 250\n\
    2 x Peri Peri Fries ₹ 180\n\
    Delivery ₹ 30\n\
    Offer ₹ 100\n\
    Total ₹ 520\n";

/// HTML パートのフッター
const SAMPLE_FOOTER_HTML: &str = "<html><body><p>Thanks for choosing us</p></body></html>";

fn headers(from: &str, subject: &str, date: &str) -> Vec<Header> {
    [("From", from), ("Subject", subject), ("Date", date)]
        .into_iter()
        .map(|(name, value)| Header {
            name: name.to_string(),
            value: value.to_string(),
        })
        .collect()
}

fn message(id: &str, headers: Vec<Header>, payload: Part) -> RawMessage {
    let mut payload = payload;
    payload.headers = headers;
    RawMessage {
        id: id.to_string(),
        thread_id: Some(format!("thread-{id}")),
        payload,
    }
}

fn write_messages(dir: &TempDir, messages: &[RawMessage]) {
    for message in messages {
        let json = serde_json::to_string_pretty(message).unwrap();
        std::fs::write(dir.path().join(format!("{}.json", message.id)), json).unwrap();
    }
}

fn sample_mailbox() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_messages(
        &dir,
        &[
            message(
                "msg-001",
                headers(
                    "Swiggy <noreply@swiggy.in>",
                    "Your Swiggy order was delivered",
                    "Fri, 15 Mar 2024 19:00:00 +0530",
                ),
                Part::container(
                    "multipart/alternative",
                    vec![
                        Part::leaf("text/plain", &URL_SAFE.encode(SAMPLE_SWIGGY)),
                        Part::leaf("text/html", &URL_SAFE.encode(SAMPLE_FOOTER_HTML)),
                    ],
                ),
            ),
            message(
                "msg-002",
                headers(
                    "Zomato <noreply@zomato.com>",
                    "Your Zomato order from Truffles",
                    "Sat, 20 Apr 2024 13:15:00 +0530 (IST)",
                ),
                Part::container(
                    "multipart/mixed",
                    vec![Part::container(
                        "multipart/alternative",
                        vec![Part::leaf("text/plain", &URL_SAFE.encode(SAMPLE_ZOMATO))],
                    )],
                ),
            ),
            // 本文が短すぎて抽出対象にならない
            message(
                "msg-003",
                headers(
                    "Swiggy <noreply@swiggy.in>",
                    "Order update",
                    "Sun, 21 Apr 2024 10:00:00 +0530",
                ),
                Part::leaf("text/plain", &URL_SAFE.encode("Your order is on its way")),
            ),
            // どのクエリにも一致しない
            message(
                "msg-004",
                headers(
                    "Newsletter <news@example.com>",
                    "Weekly digest",
                    "Mon, 22 Apr 2024 09:00:00 +0530",
                ),
                Part::leaf("text/plain", &URL_SAFE.encode(SAMPLE_SWIGGY)),
            ),
        ],
    );
    dir
}

// ==================== Fetch Pipeline Tests ====================

#[tokio::test]
async fn test_fetch_orders_end_to_end() {
    let mailbox = sample_mailbox();
    let source = FileMailSource::load(mailbox.path()).unwrap();
    let store = OrderStore::acquire_in_memory().await.unwrap();
    let repo = Arc::new(store.orders());

    let summary = foodspend_lib::fetch_orders(
        Arc::new(source),
        repo.clone(),
        &AppConfig::default(),
        |_| {},
    )
    .await
    .unwrap();

    assert_eq!(summary.total_emails, 3);
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.stored, 2);
    assert_eq!(summary.total_amount, dec!(970.00));
    assert_eq!(summary.breakdown.swiggy, 1);
    assert_eq!(summary.breakdown.zomato, 1);
    assert_eq!(
        summary.message,
        "Processed 2 orders (1 Zomato, 1 Swiggy). Total: ₹970.00"
    );

    let orders = repo.get_all_orders().await.unwrap();
    assert_eq!(orders.len(), 2);
    // 日付の降順
    assert_eq!(orders[0].email_id, "msg-002");
    assert_eq!(orders[0].record.restaurant, "Truffles");
    assert_eq!(orders[0].thread_id.as_deref(), Some("thread-msg-002"));
    assert_eq!(orders[1].record.restaurant, "Meghana Foods");
    assert_eq!(orders[1].record.delivery_fee, dec!(35));
    assert_eq!(orders[1].record.discount, dec!(60));
    assert_eq!(orders[1].record.items.len(), 2);

    store.release().await;
}

#[tokio::test]
async fn test_fetch_orders_twice_does_not_duplicate() {
    let mailbox = sample_mailbox();
    let store = OrderStore::acquire_in_memory().await.unwrap();
    let repo = Arc::new(store.orders());
    let config = AppConfig::default();

    for _ in 0..2 {
        let source = FileMailSource::load(mailbox.path()).unwrap();
        foodspend_lib::fetch_orders(Arc::new(source), repo.clone(), &config, |_| {})
            .await
            .unwrap();
    }

    assert_eq!(repo.get_all_orders().await.unwrap().len(), 2);
    store.release().await;
}

#[tokio::test]
async fn test_fetch_orders_reports_progress() {
    let mailbox = sample_mailbox();
    let source = FileMailSource::load(mailbox.path()).unwrap();
    let store = OrderStore::acquire_in_memory().await.unwrap();
    let events = std::sync::Mutex::new(Vec::new());

    foodspend_lib::fetch_orders(
        Arc::new(source),
        Arc::new(store.orders()),
        &AppConfig::default(),
        |event| events.lock().unwrap().push(event.clone()),
    )
    .await
    .unwrap();

    let events = events.into_inner().unwrap();
    let last = events.last().expect("at least one progress event");
    assert!(last.is_complete);
    assert_eq!(last.total_items, 3);
    assert_eq!(last.success_count, 2);
    assert_eq!(last.failed_count, 1);
    store.release().await;
}

// ==================== Report Tests ====================

#[tokio::test]
async fn test_report_after_fetch() {
    let mailbox = sample_mailbox();
    let source = FileMailSource::load(mailbox.path()).unwrap();
    let store = OrderStore::acquire_in_memory().await.unwrap();
    let repo = Arc::new(store.orders());

    foodspend_lib::fetch_orders(Arc::new(source), repo.clone(), &AppConfig::default(), |_| {})
        .await
        .unwrap();
    let report = foodspend_lib::get_report(repo.as_ref()).await.unwrap();

    assert_eq!(report.summary.total_orders, 2);
    assert_eq!(report.summary.total_spent, dec!(970));
    assert_eq!(report.summary.average_order_value, dec!(485));
    assert_eq!(report.summary.total_delivery_fees, dec!(65));
    assert_eq!(report.summary.total_discounts, dec!(160));
    assert_eq!(report.summary.most_ordered_restaurant, "Truffles");

    let months: Vec<_> = report.monthly.iter().map(|m| m.month.as_str()).collect();
    assert_eq!(months, vec!["2024-03", "2024-04"]);

    let hours: Vec<_> = report.peak_hours.iter().map(|h| h.hour).collect();
    assert_eq!(hours, vec![13, 19]);

    assert_eq!(report.peak_days.len(), 7);
    let fri = report.peak_days.iter().find(|d| d.day == "Fri").unwrap();
    assert_eq!(fri.orders, 1);

    store.release().await;
}

#[tokio::test]
async fn test_clear_then_report_is_empty() {
    let mailbox = sample_mailbox();
    let source = FileMailSource::load(mailbox.path()).unwrap();
    let store = OrderStore::acquire_in_memory().await.unwrap();
    let repo = Arc::new(store.orders());

    foodspend_lib::fetch_orders(Arc::new(source), repo.clone(), &AppConfig::default(), |_| {})
        .await
        .unwrap();
    assert_eq!(foodspend_lib::clear_orders(repo.as_ref()).await.unwrap(), 2);

    let report = foodspend_lib::get_report(repo.as_ref()).await.unwrap();
    assert_eq!(report.summary.total_orders, 0);
    assert_eq!(report.summary.most_ordered_restaurant, "N/A");
    store.release().await;
}

#[tokio::test]
async fn test_file_store_persists_between_opens() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("foodspend.db");
    let mailbox = sample_mailbox();

    let store = OrderStore::acquire(&db_path).await.unwrap();
    let source = FileMailSource::load(mailbox.path()).unwrap();
    foodspend_lib::fetch_orders(
        Arc::new(source),
        Arc::new(store.orders()),
        &AppConfig::default(),
        |_| {},
    )
    .await
    .unwrap();
    store.release().await;

    let reopened = OrderStore::acquire(&db_path).await.unwrap();
    let orders = reopened.orders().get_all_orders().await.unwrap();
    assert_eq!(orders.len(), 2);
    reopened.release().await;
}
