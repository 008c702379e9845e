//! Identifier and literal embedding.
//!
//! SQL Server DDL does not accept bind parameters for object names, so names
//! are spliced into statement text bracket-quoted with `]` doubled.

use sqlgrant_domain::DomainError;

/// `name` → `[name]`, doubling any embedded `]`.
pub fn quote_ident(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// Text placed inside an `N'…'` literal of a dynamic SQL batch.
pub fn escape_literal(text: &str) -> String {
    text.replace('\'', "''")
}

/// Expression converting the GUID bound at `@p{param}` to the SID text
/// SQL Server stores for Azure AD principals.
pub fn aad_sid_expr(param: usize) -> String {
    format!(
        "CONVERT(VARCHAR(85), CONVERT(VARBINARY(85), CAST(@p{param} AS UNIQUEIDENTIFIER), 1), 1)"
    )
}

/// Collations are spliced bare (`COLLATE Latin1_General_CI_AS`), so only
/// word characters are allowed.
pub fn validate_collation(collation: &str) -> Result<(), DomainError> {
    let valid = !collation.is_empty()
        && collation.len() <= 128
        && collation.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(DomainError::InvalidCollation(collation.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brackets_are_doubled() {
        assert_eq!(quote_ident("plain"), "[plain]");
        assert_eq!(quote_ident("we]ird"), "[we]]ird]");
        assert_eq!(quote_ident("a b"), "[a b]");
    }

    #[test]
    fn quotes_are_doubled_in_literals() {
        assert_eq!(escape_literal("[o'brien]"), "[o''brien]");
    }

    #[test]
    fn sid_expression_shape() {
        assert_eq!(
            aad_sid_expr(2),
            "CONVERT(VARCHAR(85), CONVERT(VARBINARY(85), CAST(@p2 AS UNIQUEIDENTIFIER), 1), 1)"
        );
    }

    #[test]
    fn collations_are_bare_words() {
        assert!(validate_collation("SQL_Latin1_General_CP1_CI_AS").is_ok());
        assert!(validate_collation("Latin1; DROP").is_err());
        assert!(validate_collation("").is_err());
    }
}
