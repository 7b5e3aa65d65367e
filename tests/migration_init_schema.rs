//! 001_init.sql のスキーマ検証。orders は email_id で一意、金額は TEXT で持つことなど。

const INIT_SQL: &str = include_str!("../migrations/001_init.sql");

#[test]
fn test_init_creates_orders_table() {
    assert!(
        INIT_SQL
            .to_lowercase()
            .contains("create table if not exists orders"),
        "001_init must create table orders"
    );
}

#[test]
fn test_init_orders_email_id_is_unique() {
    let block = extract_create_block(INIT_SQL, "orders");
    assert!(
        block.contains("email_id TEXT UNIQUE NOT NULL"),
        "orders.email_id must be unique"
    );
}

#[test]
fn test_init_orders_money_columns_are_text() {
    let block = extract_create_block(INIT_SQL, "orders");
    for column in ["amount", "subtotal", "taxes", "delivery_fee", "discount"] {
        let line = block
            .lines()
            .map(str::trim)
            .find(|line| line.starts_with(&format!("{column} ")))
            .unwrap_or_else(|| panic!("orders must define {column}"));
        assert!(line.contains("TEXT"), "{column} must be stored as TEXT");
    }
}

#[test]
fn test_init_orders_source_is_constrained() {
    let block = extract_create_block(INIT_SQL, "orders");
    assert!(block.contains("CHECK(source IN ('swiggy', 'zomato', 'unknown'))"));
}

#[test]
fn test_init_creates_report_indexes() {
    for index in ["idx_orders_date", "idx_orders_restaurant"] {
        assert!(
            INIT_SQL.contains(&format!("CREATE INDEX IF NOT EXISTS {index}")),
            "001_init must create index {index}"
        );
    }
}

fn extract_create_block(s: &str, table: &str) -> String {
    let start = format!("CREATE TABLE IF NOT EXISTS {table} (");
    let i = s
        .find(&start)
        .unwrap_or_else(|| panic!("{table} CREATE TABLE block not found"));
    let rest = &s[i + start.len()..];
    let mut depth = 1i32;
    let end = rest
        .char_indices()
        .find_map(|(i, c)| {
            match c {
                '(' => depth += 1,
                ')' => depth -= 1,
                _ => {}
            }
            (depth == 0).then_some(i)
        })
        .expect("matching ')' for CREATE TABLE block");
    rest[..end].to_string()
}
