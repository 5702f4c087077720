/// `pluralize(2, "activity", Some("activities"))` -> `"activities"`.
pub fn pluralize(count: usize, singular: &str, plural: Option<&str>) -> String {
    if count == 1 {
        return singular.to_string();
    }

    match plural {
        Some(p) => p.to_string(),
        None => format!("{singular}s"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pluralizes_counts() {
        assert_eq!(pluralize(1, "page", None), "page");
        assert_eq!(pluralize(0, "page", None), "pages");
        assert_eq!(pluralize(3, "activity", Some("activities")), "activities");
    }
}
