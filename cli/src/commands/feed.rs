use anyhow::Result;

use kibble_core::service::Ledger;
use kibble_core::store::Store;

use super::helpers::grams;

pub(crate) fn cmd_feed<S: Store>(
    ledger: &Ledger<S>,
    password: &str,
    weight_before: f64,
    weight_after: f64,
    json: bool,
) -> Result<()> {
    let receipt =
        ledger.record_feeding(Some(password), Some(weight_before), Some(weight_after))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&receipt)?);
    } else {
        println!("Logged {}", grams(receipt.amount));
        println!("  Eaten today: {}", grams(receipt.total_eaten_today));
        println!("  Remaining:   {}", grams(receipt.remaining_today));
    }

    Ok(())
}

pub(crate) fn cmd_limit<S: Store>(
    ledger: &Ledger<S>,
    password: &str,
    grams_per_day: f64,
    json: bool,
) -> Result<()> {
    let limit = ledger.set_daily_limit(Some(password), grams_per_day)?;

    if json {
        println!("{}", serde_json::json!({ "dailyLimit": limit }));
    } else {
        println!("Daily limit set to {}", grams(limit));
    }

    Ok(())
}
