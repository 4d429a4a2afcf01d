//! Naming utilities for dbvc
//!
//! Secondary indexes are named after their table and column so that the
//! key role can be recovered from the catalog of a dialect that only keeps
//! index names around.

use crate::schema::types::KeyRole;

const MULTI_INDEX_PATTERN: &str = "i_{table}_{column}";
const UNIQUE_INDEX_PATTERN: &str = "ui_{table}_{column}";

/// Format a name according to a pattern with placeholders
pub fn format_name(pattern: &str, replacements: &[(&str, &str)]) -> String {
    let mut result = pattern.to_string();

    for (placeholder, value) in replacements {
        result = result.replace(&format!("{{{}}}", placeholder), value);
    }

    result
}

/// Index name for a single-column index
pub fn index_name(table: &str, column: &str, unique: bool) -> String {
    let pattern = if unique {
        UNIQUE_INDEX_PATTERN
    } else {
        MULTI_INDEX_PATTERN
    };
    format_name(pattern, &[("table", table), ("column", column)])
}

/// Recover the key role and column from an index name produced by [`index_name`]
pub fn parse_index_name(table: &str, index: &str) -> Option<(KeyRole, String)> {
    let (role, rest) = if let Some(rest) = index.strip_prefix("ui_") {
        (KeyRole::Unique, rest)
    } else if let Some(rest) = index.strip_prefix("i_") {
        (KeyRole::Multi, rest)
    } else {
        return None;
    };

    let column = rest.strip_prefix(table)?.strip_prefix('_')?;
    if column.is_empty() {
        return None;
    }
    Some((role, column.to_string()))
}

/// Quote an identifier with backticks
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Quote a string literal with single quotes
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Quote a string literal for a dialect where a backslash starts an escape
/// sequence inside quotes
pub fn quote_escaped_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn test_format_name() {
        assert_eq!(
            format_name("idx_{table}_{column}", &[("table", "users"), ("column", "email")]),
            "idx_users_email"
        );
    }

    #[rstest]
    #[case("Bar", "email", false, "i_Bar_email")]
    #[case("Bar", "email", true, "ui_Bar_email")]
    #[case("user_roles", "role_id", true, "ui_user_roles_role_id")]
    fn test_index_name(
        #[case] table: &str,
        #[case] column: &str,
        #[case] unique: bool,
        #[case] expected: &str,
    ) {
        assert_eq!(index_name(table, column, unique), expected);
    }

    #[rstest]
    #[case("Bar", "i_Bar_email", Some((KeyRole::Multi, "email")))]
    #[case("Bar", "ui_Bar_email", Some((KeyRole::Unique, "email")))]
    #[case("user_roles", "ui_user_roles_role_id", Some((KeyRole::Unique, "role_id")))]
    #[case("Bar", "idx_Bar_email", None)]
    #[case("Bar", "i_Baz_email", None)]
    #[case("Bar", "i_Bar_", None)]
    #[case("Bar", "sqlite_autoindex_Bar_1", None)]
    fn test_parse_index_name(
        #[case] table: &str,
        #[case] index: &str,
        #[case] expected: Option<(KeyRole, &str)>,
    ) {
        let expected = expected.map(|(role, column)| (role, column.to_string()));
        assert_eq!(parse_index_name(table, index), expected);
    }

    #[test]
    fn quoting_escapes_delimiters() {
        assert_eq!(quote_ident("we`ird"), "`we``ird`");
        assert_eq!(quote_literal("O'Brien"), "'O''Brien'");
    }

    #[rstest]
    #[case(r"C:\", r"'C:\'", r"'C:\\'")]
    #[case(r"a\'b", r"'a\''b'", r"'a\\''b'")]
    #[case("plain", "'plain'", "'plain'")]
    fn backslashes_only_escape_where_they_are_special(
        #[case] value: &str,
        #[case] standard: &str,
        #[case] escaped: &str,
    ) {
        assert_eq!(quote_literal(value), standard);
        assert_eq!(quote_escaped_literal(value), escaped);
    }
}
