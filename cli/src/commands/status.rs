use anyhow::Result;
use chrono::Local;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use kibble_core::models::{DailyStatus, LimitAlert};
use kibble_core::service::Ledger;
use kibble_core::store::Store;

use super::helpers::grams;

pub(crate) fn cmd_status<S: Store>(ledger: &Ledger<S>, password: &str, json: bool) -> Result<()> {
    let status = ledger.status(Some(password))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    print_status(&status);
    Ok(())
}

pub(crate) fn cmd_check_password<S: Store>(ledger: &Ledger<S>, json: bool) -> Result<()> {
    let password_set = ledger.password_set()?;

    if json {
        println!("{}", serde_json::json!({ "passwordSet": password_set }));
    } else if password_set {
        println!("A password is set.");
    } else {
        println!("No password set yet. The first one used will be stored.");
    }

    Ok(())
}

fn print_status(status: &DailyStatus) {
    println!("  BAG:       {}", grams(status.current_bag_weight));
    println!("  LIMIT:     {}", grams(status.daily_limit));
    println!("  EATEN:     {}", grams(status.total_eaten_today));
    println!("  REMAINING: {}", grams(status.remaining_today));

    if let Some(line) = status.alert().map(alert_message) {
        println!("\n  {line}");
    }

    if status.feedings.is_empty() {
        eprintln!("\nNo feedings recorded today");
        return;
    }

    #[derive(Tabled)]
    struct FeedingRow {
        #[tabled(rename = "Time")]
        time: String,
        #[tabled(rename = "Before")]
        before: String,
        #[tabled(rename = "After")]
        after: String,
        #[tabled(rename = "Amount")]
        amount: String,
    }

    let rows: Vec<FeedingRow> = status
        .feedings
        .iter()
        .map(|f| FeedingRow {
            time: f.timestamp.with_timezone(&Local).format("%H:%M").to_string(),
            before: grams(f.weight_before),
            after: grams(f.weight_after),
            amount: grams(f.amount),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("\n{table}");
}

fn alert_message(alert: LimitAlert) -> String {
    match alert {
        LimitAlert::Over { excess } => format!("Over the daily limit by {}", grams(excess)),
        LimitAlert::Low { remaining } => format!("Only {} left for today", grams(remaining)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_message() {
        assert_eq!(
            alert_message(LimitAlert::Over { excess: 4.5 }),
            "Over the daily limit by 4.5 g"
        );
        assert_eq!(
            alert_message(LimitAlert::Low { remaining: 7.0 }),
            "Only 7.0 g left for today"
        );
    }
}
