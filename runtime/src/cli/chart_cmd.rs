//! `pillar chart <datetime>` — local chart of one moment.

use super::output;
use crate::calendar::{CalendarConversionEngine, CalendarMoment};
use anyhow::Result;

/// Run the chart command.
pub async fn run(input: &str, utc_offset_minutes: i32) -> Result<()> {
    let parsed = CalendarMoment::parse(input)?;
    let moment = parsed.moment.with_utc_offset(utc_offset_minutes);

    let engine = CalendarConversionEngine::new();
    let chart = engine.convert(&moment)?;
    let term = engine.solar_term(&moment)?;

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "moment": moment,
            "chart": chart,
            "solar_term": term.name(),
            "default_time_used": parsed.default_time_used,
        }));
        return Ok(());
    }

    println!("Moment:     {moment}");
    println!("Solar term: {term}");
    println!();
    println!("Year:  {}", chart.year);
    println!("Month: {}", chart.month);
    println!("Day:   {}", chart.day);
    println!("Hour:  {}", chart.hour);
    println!();
    println!("Chart: {chart}");
    if parsed.default_time_used && !output::is_quiet() {
        println!();
        println!("Note: no time given, the hour pillar was computed for 12:00.");
    }
    Ok(())
}
