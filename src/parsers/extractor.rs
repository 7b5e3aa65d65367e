//! 本文テキストから注文レコードを組み立てる
//!
//! 1. ブランド名でサービスを判定
//! 2. サービスごとのパターン表を店名・金額・配達料・割引・商品の順に適用
//!
//! どの段階でも一致しなければ既定値のまま進む。想定外の panic は
//! [`extract_order`] の境界で捕まえ、既定値のレコードに置き換える。

use super::patterns::{
    first_accepted, first_restaurant, Band, ItemRule, NumericRule, RestaurantRule,
};
use super::{get_parser, OrderRecord, Source, UNKNOWN_RESTAURANT};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::panic::{catch_unwind, AssertUnwindSafe};

const fn whole(value: u32) -> Decimal {
    Decimal::from_parts(value, 0, 0, false, 0)
}

/// 支払総額の妥当範囲（両端を含む）
pub const AMOUNT_BAND: Band = Band::inclusive(whole(20), whole(50_000));

/// 配達料の妥当範囲（両端を含まない）
pub const DELIVERY_FEE_BAND: Band = Band::exclusive(Decimal::ZERO, whole(500));

/// 割引の妥当範囲（両端を含まない）
pub const DISCOUNT_BAND: Band = Band::exclusive(Decimal::ZERO, whole(5_000));

/// "<個数> x <商品名>" の行。両サービス共通
pub const ITEM_PATTERN: &str =
    r"(?i)(?:^|\n|\|)\s*([0-9]+)\s*[×x]\s*([A-Za-z][^₹\n|<]{2,70}?)\s*(?:₹|\||<|\n|$)";

/// サービスごとのパターン表
///
/// 各リストは左から順に評価され、最初に検証を通ったものが採用される。
pub struct PatternTable {
    pub restaurant: Vec<RestaurantRule>,
    pub amount: Vec<NumericRule>,
    pub delivery_fee: Vec<NumericRule>,
    pub discount: Vec<NumericRule>,
    pub items: ItemRule,
}

/// 本文に含まれるブランド名からサービスを判定する
///
/// 両方含まれる、またはどちらも含まれない場合は [`Source::Unknown`]。
pub fn classify(text: &str) -> Source {
    let lower = text.to_lowercase();
    let has = |source: Source| {
        source
            .brand_token()
            .map(|token| lower.contains(token))
            .unwrap_or(false)
    };

    match (has(Source::Swiggy), has(Source::Zomato)) {
        (true, false) => Source::Swiggy,
        (false, true) => Source::Zomato,
        _ => Source::Unknown,
    }
}

/// パターン表を本文に適用してレコードを作る
pub fn extract_with_table(
    source: Source,
    table: &PatternTable,
    body: &str,
    date: DateTime<Utc>,
) -> OrderRecord {
    let mut record = OrderRecord::unresolved(body, date);
    record.source = source;

    record.restaurant = first_restaurant(&table.restaurant, body)
        .unwrap_or_else(|| UNKNOWN_RESTAURANT.to_string());
    record.amount = first_accepted(&table.amount, body).unwrap_or(Decimal::ZERO);
    record.delivery_fee = first_accepted(&table.delivery_fee, body).unwrap_or(Decimal::ZERO);
    record.discount = first_accepted(&table.discount, body).unwrap_or(Decimal::ZERO);
    record.items = table.items.collect(body);

    record
}

/// 正規化済み本文から注文レコードを抽出する
///
/// 失敗はしない。判定できない本文や内部の panic は既定値のレコード（amount = 0）になり、
/// 呼び出し側の [`OrderRecord::is_valid`] で弾かれる。
pub fn extract_order(body: &str, date: DateTime<Utc>) -> OrderRecord {
    run_guarded(body, date, || {
        let source = classify(body);
        match get_parser(source) {
            Some(parser) => parser.parse(body, date),
            None => OrderRecord::unresolved(body, date),
        }
    })
}

fn run_guarded<F>(body: &str, date: DateTime<Utc>, extract: F) -> OrderRecord
where
    F: FnOnce() -> OrderRecord,
{
    match catch_unwind(AssertUnwindSafe(extract)) {
        Ok(record) => record,
        Err(_) => {
            log::error!(
                "Order extraction panicked; falling back to default record ({} chars)",
                body.chars().count()
            );
            OrderRecord::unresolved(body, date)
        }
    }
}
