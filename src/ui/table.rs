use comfy_table::{presets::NOTHING, Attribute, Cell, ContentArrangement, Table};

/// Borderless, non-wrapping listing with dim bold headings.
pub fn listing_table(columns: &[&str], padding: (u16, u16)) -> Table {
    let mut table = Table::new();
    table
        .load_preset(NOTHING)
        .set_content_arrangement(ContentArrangement::Disabled)
        .set_header(columns.iter().map(|title| {
            Cell::new(title)
                .add_attribute(Attribute::Bold)
                .add_attribute(Attribute::Dim)
        }));
    for column in table.column_iter_mut() {
        column.set_padding(padding);
    }
    table
}

/// Shorten to `max_len` characters, ending in an ellipsis when cut.
pub fn truncate(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    let mut kept: String = text.chars().take(max_len.saturating_sub(1)).collect();
    kept.push('…');
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_counts_characters() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Morning Run in the Park", 8), "Morning…");
        assert_eq!(truncate("Läufchen am See", 5), "Läuf…");
    }

    #[test]
    fn listing_has_one_column_per_heading() {
        let mut table = listing_table(&["Name", "ID"], (0, 2));
        table.add_row(vec!["Morning Run", "111"]);
        assert_eq!(table.column_count(), 2);
        let rendered = table.to_string();
        assert!(rendered.contains("Morning Run"));
        assert!(rendered.contains("111"));
    }
}
