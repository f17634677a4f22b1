//! Identifiers for warehouse objects.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A `(schema, table)` pair naming a warehouse table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    schema: String,
    name: String,
}

impl TableRef {
    /// Create a table reference; both parts must be plain SQL identifiers.
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        let schema = schema.into();
        let name = name.into();
        validate_identifier(&schema)?;
        validate_identifier(&name)?;
        Ok(Self { schema, name })
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sibling table in the same schema, e.g. a staging table.
    pub fn with_suffix(&self, suffix: &str) -> Result<Self> {
        Self::new(self.schema.clone(), format!("{}{}", self.name, suffix))
    }

    /// `"schema"."name"`, safe to splice into SQL.
    pub fn quoted(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.name))
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// Accept `[A-Za-z_][A-Za-z0-9_]*`, at most 63 bytes (the PostgreSQL limit).
pub fn validate_identifier(ident: &str) -> Result<()> {
    let mut chars = ident.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    if !valid_start
        || ident.len() > 63
        || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(Error::InvalidIdentifier(ident.to_string()));
    }
    Ok(())
}

/// Double-quote an identifier, escaping embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
