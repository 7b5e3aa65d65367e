//! Zomato 注文メール用パーサー
//!
//! 送信元: noreply@zomato.com / orders@zomato.com
//!
//! Swiggy より表が短い。配達料・割引のラベルも "Delivery" / "Discount" / "Offer" のみ。

use super::extractor::{
    extract_with_table, PatternTable, AMOUNT_BAND, DELIVERY_FEE_BAND, DISCOUNT_BAND, ITEM_PATTERN,
};
use super::patterns::{ItemRule, NumericRule, RestaurantRule};
use super::{EmailParser, OrderRecord, Source};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;

/// Zomato のパターン表
pub static ZOMATO_PATTERNS: Lazy<PatternTable> = Lazy::new(|| PatternTable {
    restaurant: vec![
        RestaurantRule::new(r"(?i)order\s+from\s+([A-Z][^<>\n]{2,60}?)(?:\n|<|$)"),
        RestaurantRule::new(r"(?i)from\s+<[^>]*>([^<]{3,50})</[^>]*>"),
        RestaurantRule::new(r"(?i)>([A-Z][A-Za-z\s&',.-]{3,50})</(?:b|strong|h[0-9])>"),
        RestaurantRule::new(r"(?i)restaurant[:\s]+([^<>\n]{3,60}?)(?:[.!<]|\n)"),
    ],
    amount: vec![
        NumericRule::new(
            r"(?i)(?:Total|Grand\s*Total|Bill|Amount)[:\s]*(?:Rs\.?|₹)?\s*([0-9][0-9,]*\.?[0-9]{0,2})",
            AMOUNT_BAND,
        ),
        NumericRule::new(
            r"(?i)(?:Total|Paid)[^>]*>\s*(?:Rs\.?|₹)?\s*([0-9][0-9,]*\.?[0-9]{0,2})\s*<",
            AMOUNT_BAND,
        ),
        NumericRule::new(
            r"(?i)(?:Total|Grand Total)[^|]*\|\s*(?:Rs\.?|₹)?\s*([0-9][0-9,]*\.?[0-9]{0,2})",
            AMOUNT_BAND,
        ),
        NumericRule::new(
            r"(?i)₹\s*([0-9][0-9,]*\.?[0-9]{0,2})\s*(?:Total|Paid|was)",
            AMOUNT_BAND,
        ),
    ],
    delivery_fee: vec![NumericRule::new(
        r"(?i)Delivery[:\s|]*(?:Rs\.?|₹)?\s*([0-9][0-9,]*\.?[0-9]{0,2})",
        DELIVERY_FEE_BAND,
    )],
    discount: vec![NumericRule::new(
        r"(?i)(?:Discount|Offer)[:\s|]*(?:Rs\.?|₹)?\s*([0-9][0-9,]*\.?[0-9]{0,2})",
        DISCOUNT_BAND,
    )],
    items: ItemRule::new(ITEM_PATTERN, 50, 2),
});

/// Zomato 注文メール用パーサー
pub struct ZomatoParser;

impl EmailParser for ZomatoParser {
    fn source(&self) -> Source {
        Source::Zomato
    }

    fn parse(&self, email_body: &str, email_date: DateTime<Utc>) -> OrderRecord {
        extract_with_table(Source::Zomato, &ZOMATO_PATTERNS, email_body, email_date)
    }
}
