use anyhow::{anyhow, Result};

use crate::remote::{ActivityId, FitnessApi};
use crate::ui::{print_with_pager, with_spinner};

pub async fn run<A: FitnessApi>(api: &A, raw_id: &str, json: bool) -> Result<()> {
    let id = ActivityId::new(raw_id.trim()).ok_or_else(|| anyhow!("invalid activity id '{raw_id}'"))?;
    let details = with_spinner(
        &format!("Loading activity {id}..."),
        api.get_activity_details(&id),
    )
    .await?;

    if json {
        println!("{}", serde_json::to_string(&details)?);
    } else {
        print_with_pager(&serde_json::to_string_pretty(&details)?)?;
    }
    Ok(())
}
