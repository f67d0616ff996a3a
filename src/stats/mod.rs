pub mod daily;

pub use daily::{aggregate_daily, format_table, DailyStat};
