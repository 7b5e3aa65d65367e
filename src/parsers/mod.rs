use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod extractor;
pub mod order_parse_task;
pub mod patterns;
pub mod swiggy;
pub mod zomato;

pub use extractor::{classify, extract_order};

/// 店名が抽出できなかった場合の値
pub const UNKNOWN_RESTAURANT: &str = "Unknown";

/// 注文メールの送信元サービス
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Swiggy,
    Zomato,
    #[default]
    Unknown,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Swiggy => "swiggy",
            Source::Zomato => "zomato",
            Source::Unknown => "unknown",
        }
    }

    /// 本文中にこの文字列（小文字）が含まれていればこのサービスのメールとみなす
    pub fn brand_token(&self) -> Option<&'static str> {
        match self {
            Source::Swiggy => Some("swiggy"),
            Source::Zomato => Some("zomato"),
            Source::Unknown => None,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "swiggy" => Ok(Source::Swiggy),
            "zomato" => Ok(Source::Zomato),
            "unknown" => Ok(Source::Unknown),
            other => Err(format!("Unknown source: {other}")),
        }
    }
}

/// パースされた注文情報
///
/// 抽出時に 1 通ごとに新規作成され、返却後は変更されない。
/// `amount > 0` のものだけが保存対象（[`OrderRecord::is_valid`]）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    /// 支払総額。0 は未解決
    pub amount: Decimal,
    /// 店名
    pub restaurant: String,
    /// 商品リスト（出現順）
    pub items: Vec<OrderItem>,
    /// 小計
    pub subtotal: Decimal,
    /// 税
    pub taxes: Decimal,
    /// 配達料
    pub delivery_fee: Decimal,
    /// 割引
    pub discount: Decimal,
    /// メールの Date ヘッダー
    pub date: DateTime<Utc>,
    pub source: Source,
    /// 正規化済み本文（監査・デバッグ用）
    pub raw_text: String,
}

/// 商品情報
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// 商品名
    pub name: String,
    /// 個数
    pub quantity: u32,
    /// 単価（抽出しないため常に 0）
    pub price: Decimal,
}

impl OrderRecord {
    /// すべて既定値のレコード
    pub fn unresolved(raw_text: &str, date: DateTime<Utc>) -> Self {
        Self {
            amount: Decimal::ZERO,
            restaurant: UNKNOWN_RESTAURANT.to_string(),
            items: Vec::new(),
            subtotal: Decimal::ZERO,
            taxes: Decimal::ZERO,
            delivery_fee: Decimal::ZERO,
            discount: Decimal::ZERO,
            date,
            source: Source::Unknown,
            raw_text: raw_text.to_string(),
        }
    }

    /// 保存対象かどうか
    pub fn is_valid(&self) -> bool {
        self.amount > Decimal::ZERO
    }
}

/// メールパーサーのトレイト
pub trait EmailParser: Send + Sync {
    /// このパーサーが扱うサービス
    fn source(&self) -> Source;

    /// メール本文から注文情報をパースする
    ///
    /// 一致しないフィールドは既定値のまま返す。失敗はしない。
    fn parse(&self, email_body: &str, email_date: DateTime<Utc>) -> OrderRecord;
}

/// サービスから適切なパーサーを取得する
pub fn get_parser(source: Source) -> Option<Box<dyn EmailParser>> {
    match source {
        Source::Swiggy => Some(Box::new(swiggy::SwiggyParser)),
        Source::Zomato => Some(Box::new(zomato::ZomatoParser)),
        Source::Unknown => None,
    }
}
