use std::fmt::Write as _;

use anyhow::Result;
use dialoguer::console;

use crate::remote::FitnessApi;
use crate::ui::{listing_table, print_with_pager, truncate, with_spinner};
use crate::utils::pluralize;

pub async fn run<A: FitnessApi>(api: &A, start: usize, limit: usize, json: bool) -> Result<()> {
    let activities = with_spinner("Loading activities...", api.get_activities(start, limit)).await?;

    if json {
        println!("{}", serde_json::to_string(&activities)?);
        return Ok(());
    }

    let mut output = String::new();
    writeln!(
        output,
        "{} {} from offset {}\n",
        console::style(activities.len()),
        pluralize(activities.len(), "activity", Some("activities")),
        start
    )?;

    let mut table = listing_table(
        &["Name", "Type", "Start", "Distance", "Duration", "ID"],
        (0, 4),
    );

    for activity in &activities {
        let id = activity
            .activity_id
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        let distance = activity
            .distance
            .filter(|m| *m > 0.0)
            .map(|m| format!("{:.2} km", m / 1000.0))
            .unwrap_or_else(|| "-".to_string());
        let duration = activity
            .duration
            .map(format_duration)
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            truncate(activity.name(), 40),
            activity.type_key().to_string(),
            activity.start_time().to_string(),
            distance,
            duration,
            id,
        ]);
    }

    write!(output, "{table}")?;
    print_with_pager(&output)?;
    Ok(())
}

/// `h:mm:ss` for durations given in seconds.
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    format!("{}:{:02}:{:02}", total / 3600, total % 3600 / 60, total % 60)
}
