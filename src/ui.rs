use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Defines different styles for text elements.
pub enum StyleType {
    Title,
    ResultValue,
    Error,
    Subtle,
}

/// Applies a consistent style to a string.
pub fn style_text(text: &str, style_type: StyleType) -> String {
    let styled = match style_type {
        StyleType::Title => style(text).bold().underlined(),
        StyleType::ResultValue => style(text).green().bold(),
        StyleType::Error => style(text).red(),
        StyleType::Subtle => style(text).dim(),
    };
    styled.to_string()
}

/// Creates a new `comfy_table::Table` with standard styling.
pub fn new_styled_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Creates a styled header cell for a table.
pub fn header_cell(text: &str) -> Cell {
    Cell::new(text)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

/// Creates a right-aligned numeric cell.
pub fn amount_cell(text: &str) -> Cell {
    Cell::new(text).set_alignment(CellAlignment::Right)
}

/// Creates a spinner shown while rates are being fetched.
pub fn new_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Currencies surfaced first in listings. Presentation data only; the
/// conversion core never reads this.
pub const POPULAR_CURRENCIES: &[&str] = &[
    "usd", "eur", "gbp", "jpy", "cad", "inr", "aud", "btc", "eth",
];

/// Human-readable name for a currency code, where one is known. Codes
/// without an entry are shown as bare uppercase tickers.
pub fn currency_name(code: &str) -> Option<&'static str> {
    let name = match code {
        "usd" => "US Dollar",
        "eur" => "Euro",
        "gbp" => "British Pound",
        "jpy" => "Japanese Yen",
        "cad" => "Canadian Dollar",
        "aud" => "Australian Dollar",
        "inr" => "Indian Rupee",
        "chf" => "Swiss Franc",
        "cny" => "Chinese Yuan",
        "nzd" => "New Zealand Dollar",
        "btc" => "Bitcoin",
        "eth" => "Ethereum",
        "xau" => "Gold",
        "xag" => "Silver",
        "mxn" => "Mexican Peso",
        "sgd" => "Singapore Dollar",
        "hkd" => "Hong Kong Dollar",
        "nok" => "Norwegian Krone",
        "sek" => "Swedish Krona",
        "krw" => "South Korean Won",
        "zar" => "South African Rand",
        "try" => "Turkish Lira",
        "brl" => "Brazilian Real",
        "dkk" => "Danish Krone",
        "pln" => "Polish Zloty",
        "thb" => "Thai Baht",
        "ils" => "Israeli Shekel",
        _ => return None,
    };
    Some(name)
}
