//! WIQL text assembly. Queries are only built here, never executed.

/// Built-in state filter for `my` listings when the caller supplies neither
/// `--exclude-state` nor `--all-states`. Locale-specific workflow tokens;
/// override via `default_states` in the config file.
pub const DEFAULT_MY_STATES: [&str; 2] = ["Разработка", "Выполняется"];

/// WIQL string literals escape a single quote by doubling it.
pub fn escape(value: &str) -> String {
    value.replace('\'', "''")
}

/// Free-text search over title and description, newest change first.
pub fn search_query(text: &str) -> String {
    let escaped = escape(text);
    format!(
        "SELECT [System.Id] FROM WorkItems \
         WHERE ([System.Title] CONTAINS '{escaped}' OR [System.Description] CONTAINS '{escaped}') \
         ORDER BY [System.ChangedDate] DESC"
    )
}

/// Items assigned to the current user in the current project. Clause order
/// is fixed: project, assignee, then the optional type and state filters.
pub fn my_items_query(
    type_filter: &str,
    all_types: bool,
    exclude_state: &str,
    all_states: bool,
    default_states: &[String],
) -> String {
    let mut conditions = vec![
        "[System.TeamProject] = @Project".to_string(),
        "[System.AssignedTo] = @Me".to_string(),
    ];
    if !all_types && !type_filter.trim().is_empty() {
        conditions.push(format!(
            "[System.WorkItemType] = '{}'",
            escape(type_filter)
        ));
    }
    if !all_states && !exclude_state.trim().is_empty() {
        conditions.push(format!("[System.State] <> '{}'", escape(exclude_state)));
    } else if !all_states {
        conditions.push(format!("[System.State] IN ({})", quoted_list(default_states)));
    }
    format!(
        "SELECT [System.Id] FROM WorkItems WHERE {} ORDER BY [System.ChangedDate] DESC",
        conditions.join(" AND ")
    )
}

fn quoted_list(values: &[String]) -> String {
    values
        .iter()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(|value| format!("'{}'", escape(value)))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_states() -> Vec<String> {
        DEFAULT_MY_STATES.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn search_doubles_quotes_in_both_predicates() {
        let query = search_query("it's");
        assert_eq!(
            query,
            "SELECT [System.Id] FROM WorkItems \
             WHERE ([System.Title] CONTAINS 'it''s' OR [System.Description] CONTAINS 'it''s') \
             ORDER BY [System.ChangedDate] DESC"
        );
    }

    #[test]
    fn my_query_defaults_to_the_state_in_clause() {
        let query = my_items_query("", true, "", false, &default_states());
        assert_eq!(
            query,
            "SELECT [System.Id] FROM WorkItems \
             WHERE [System.TeamProject] = @Project \
             AND [System.AssignedTo] = @Me \
             AND [System.State] IN ('Разработка', 'Выполняется') \
             ORDER BY [System.ChangedDate] DESC"
        );
    }

    #[test]
    fn my_query_with_type_and_exclude_state() {
        let query = my_items_query("Bug", false, "Closed", false, &default_states());
        assert!(query.contains("[System.TeamProject] = @Project AND [System.AssignedTo] = @Me"));
        assert!(query.contains("AND [System.WorkItemType] = 'Bug'"));
        assert!(query.contains("AND [System.State] <> 'Closed'"));
        assert!(!query.contains("IN ("));
    }

    #[test]
    fn all_states_drops_the_state_filter_entirely() {
        let query = my_items_query("", true, "", true, &default_states());
        assert!(!query.contains("System.State"));
        assert!(query.ends_with("ORDER BY [System.ChangedDate] DESC"));
    }

    #[test]
    fn type_filter_escapes_quotes() {
        let query = my_items_query("O'Brien's Type", false, "", true, &default_states());
        assert!(query.contains("[System.WorkItemType] = 'O''Brien''s Type'"));
    }

    #[test]
    fn custom_default_states_replace_the_builtin_pair() {
        let states = vec!["Active".to_string(), " ".to_string(), "New".to_string()];
        let query = my_items_query("", true, "", false, &states);
        assert!(query.contains("[System.State] IN ('Active', 'New')"));
    }
}
