//! Swiggy 注文メール用パーサー
//!
//! 送信元: noreply@swiggy.in
//!
//! 表の並び順が優先度。具体的なパターンほど前に置いてあるので、並べ替えないこと
//! （曖昧な本文で抽出結果が変わる）。

use super::extractor::{
    extract_with_table, PatternTable, AMOUNT_BAND, DELIVERY_FEE_BAND, DISCOUNT_BAND, ITEM_PATTERN,
};
use super::patterns::{ItemRule, NumericRule, RestaurantRule};
use super::{EmailParser, OrderRecord, Source};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;

/// Swiggy のパターン表
pub static SWIGGY_PATTERNS: Lazy<PatternTable> = Lazy::new(|| PatternTable {
    restaurant: vec![
        RestaurantRule::new(
            r"(?i)order\s+(?:from|at)\s+([A-Z][^<>\n]{2,60}?)(?:\s+(?:was|has|is|delivered)|[.!]|\n)",
        ),
        RestaurantRule::new(r"(?i)delivered\s+(?:from|by)\s+([A-Z][^<>\n]{2,60}?)(?:[.!]|\n)"),
        RestaurantRule::new(r"(?i)restaurant[:\s]+([^<>\n]{3,60}?)(?:[.!]|\n)"),
        RestaurantRule::new(r"(?i)>([A-Z][A-Za-z\s&',.-]{3,50})</(?:b|strong|h[0-9])>"),
        RestaurantRule::new(r"(?i)from\s+<[^>]*>([^<]{3,50})</"),
    ],
    amount: vec![
        // 通常の "Label: ₹ 123" 形式
        NumericRule::new(
            r"(?i)(?:Total|Grand\s*Total|Bill\s*Total|Amount\s*Paid|You\s*Paid|Paid)[:\s]*(?:Rs\.?|₹|INR)?\s*([0-9][0-9,]*\.?[0-9]{0,2})",
            AMOUNT_BAND,
        ),
        // 表セル
        NumericRule::new(
            r"(?i)(?:Total|Paid)[^>]*>\s*(?:Rs\.?|₹|INR)?\s*([0-9][0-9,]*\.?[0-9]{0,2})\s*<",
            AMOUNT_BAND,
        ),
        // 正規化後の "Label | Value"
        NumericRule::new(
            r"(?i)(?:Total|Grand Total|Bill)[^|]*\|\s*(?:Rs\.?|₹|INR)?\s*([0-9][0-9,]*\.?[0-9]{0,2})",
            AMOUNT_BAND,
        ),
        // 金額が先に来る形式
        NumericRule::new(
            r"(?i)₹\s*([0-9][0-9,]*\.?[0-9]{0,2})\s*(?:Total|Paid|was|is|bill)",
            AMOUNT_BAND,
        ),
        NumericRule::new(
            r"(?i)(?:Total|Paid)[^₹]{0,30}₹\s*([0-9][0-9,]*\.?[0-9]{0,2})",
            AMOUNT_BAND,
        ),
    ],
    delivery_fee: vec![NumericRule::new(
        r"(?i)(?:Delivery|Handling|Partner)\s*(?:Charge|Fee|Tip)?[:\s|]*(?:Rs\.?|₹)?\s*([0-9][0-9,]*\.?[0-9]{0,2})",
        DELIVERY_FEE_BAND,
    )],
    discount: vec![NumericRule::new(
        r"(?i)(?:Discount|Coupon|Offer|Saved|Savings)[:\s|]*(?:Rs\.?|₹)?\s*([0-9][0-9,]*\.?[0-9]{0,2})",
        DISCOUNT_BAND,
    )],
    items: ItemRule::new(ITEM_PATTERN, 50, 2),
});

/// Swiggy 注文メール用パーサー
pub struct SwiggyParser;

impl EmailParser for SwiggyParser {
    fn source(&self) -> Source {
        Source::Swiggy
    }

    fn parse(&self, email_body: &str, email_date: DateTime<Utc>) -> OrderRecord {
        extract_with_table(Source::Swiggy, &SWIGGY_PATTERNS, email_body, email_date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn parse(body: &str) -> OrderRecord {
        SwiggyParser.parse(body, Utc::now())
    }

    #[test]
    fn test_parse_swiggy_plain_text() {
        let body = "Your Swiggy order from Meghana Foods was delivered.\n\
            1 x Chicken Biryani ₹320\n\
            2 x Raita ₹40\n\
            Delivery Fee: ₹35\n\
            Discount: ₹60\n\
            Total: Rs. 450.00\n";
        let order = parse(body);
        assert_eq!(order.source, Source::Swiggy);
        assert_eq!(order.restaurant, "Meghana Foods");
        assert_eq!(order.amount, dec!(450.00));
        assert_eq!(order.delivery_fee, dec!(35));
        assert_eq!(order.discount, dec!(60));
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.items[0].name, "Chicken Biryani");
        assert_eq!(order.items[1].quantity, 2);
        assert_eq!(order.subtotal, Decimal::ZERO);
        assert_eq!(order.taxes, Decimal::ZERO);
        assert_eq!(order.raw_text, body);
    }

    #[test]
    fn test_parse_swiggy_delivered_from_pattern() {
        let order = parse("Swiggy: delivered from Burger King!\nPaid ₹199");
        assert_eq!(order.restaurant, "Burger King");
        assert_eq!(order.amount, dec!(199));
    }

    #[test]
    fn test_parse_swiggy_pipe_layout() {
        // 正規化済み HTML の "Label | Value" 形式
        let order = parse("swiggy Order Summary Bill Total | ₹ 1,250.50 | Delivery partner fee | ₹ 25 |");
        assert_eq!(order.amount, dec!(1250.50));
        assert_eq!(order.delivery_fee, dec!(25));
    }

    #[test]
    fn test_parse_swiggy_amount_before_label() {
        let order = parse("swiggy ₹ 540 was charged to your card");
        assert_eq!(order.amount, dec!(540));
    }

    #[test]
    fn test_parse_swiggy_out_of_band_amount() {
        let order = parse("Swiggy Total ₹ 75000");
        assert_eq!(order.amount, Decimal::ZERO);
        assert!(!order.is_valid());
    }

    #[test]
    fn test_parse_swiggy_fee_and_discount_out_of_band() {
        let order = parse("swiggy Total: 300\nDelivery Fee: ₹ 650\nCoupon: ₹ 0\n");
        assert_eq!(order.amount, dec!(300));
        assert_eq!(order.delivery_fee, Decimal::ZERO);
        assert_eq!(order.discount, Decimal::ZERO);
    }

    #[test]
    fn test_parse_swiggy_no_restaurant() {
        let order = parse("swiggy Total: 300");
        assert_eq!(order.restaurant, "Unknown");
    }
}
