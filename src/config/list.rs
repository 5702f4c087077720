use std::path::Path;

use anyhow::Result;
use serde_json::{Map, Value};

use crate::args::BaseArgs;
use crate::config::Settings;

pub fn run(base: &BaseArgs, path: &Path, resolved: bool) -> Result<()> {
    let fields = if resolved {
        resolved_fields(&Settings::from_layers(base, &super::load_file(path)))
    } else {
        super::load_file(path).non_empty_fields()
    };

    let output = format_fields(&fields, base.json)?;
    if base.json {
        // stdout so it can be piped
        println!("{output}");
    } else if fields.is_empty() {
        eprintln!("No values set in {}", path.display());
    } else {
        eprintln!("{output}");
    }

    Ok(())
}

fn resolved_fields(settings: &Settings) -> Vec<(&'static str, String)> {
    vec![
        ("api_url", settings.api_url.clone()),
        ("auth_url", settings.auth_url.clone()),
        ("tokenstore", settings.tokenstore.display().to_string()),
        (
            "tokenstore_base64",
            settings.tokenstore_base64.display().to_string(),
        ),
        ("export_dir", settings.export_dir.display().to_string()),
        ("page_size", settings.page_size.to_string()),
        (
            "request_delay_ms",
            settings.request_delay.as_millis().to_string(),
        ),
        ("format", settings.format.to_string()),
        ("hr_threshold", settings.hr_threshold.to_string()),
    ]
}

fn format_fields(fields: &[(&'static str, String)], json: bool) -> Result<String> {
    if json {
        let map: Map<String, Value> = fields
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.clone())))
            .collect();
        Ok(serde_json::to_string(&map)?)
    } else {
        Ok(fields
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}
