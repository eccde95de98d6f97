//! Per-request security context and the user-scoped filter choke point.

use crate::error::ToolError;
use quanta_store::{filter, quote, AuthToken};
use tracing::debug;

/// Field linking a record to its owner.
pub const OWNER_FIELD: &str = "user";

const MAX_USER_ID_LEN: usize = 64;

/// Identity bound to one dispatcher for one request.
#[derive(Debug, Clone)]
pub struct SecurityContext {
    user_id: String,
    auth_token: Option<AuthToken>,
}

impl SecurityContext {
    pub fn new(user_id: &str, auth_token: Option<&str>) -> Result<Self, ToolError> {
        let user_id = user_id.trim();
        validate_user_id(user_id)?;
        Ok(Self {
            user_id: user_id.to_string(),
            auth_token: auth_token
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(AuthToken::new),
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn auth_token(&self) -> Option<&AuthToken> {
        self.auth_token.as_ref()
    }

    /// `user = "<id>"`, conjoined after `extra` when given.
    ///
    /// `extra` must parse as one complete filter expression; it is re-rendered
    /// from its parse tree and parenthesized, so nothing in it can detach the
    /// owner clause.
    pub fn user_filter(&self, extra: Option<&str>) -> Result<String, ToolError> {
        let owner_clause = format!("{} = {}", OWNER_FIELD, quote(&self.user_id));

        let extra = extra.map(str::trim).filter(|source| !source.is_empty());
        let filter = match extra {
            Some(source) => {
                // The owner clause takes one comparison of the store's budget.
                let expr = filter::parse_bounded(source, filter::MAX_TERMS - 1)
                    .map_err(|e| ToolError::Validation(format!("invalid filter: {}", e)))?;
                let fields = expr.fields();
                if let Some(field) = fields.iter().find(|f| f.starts_with("@collection")) {
                    return Err(ToolError::Validation(format!(
                        "invalid filter: cross-collection reference {}",
                        field
                    )));
                }
                format!("({}) && {}", expr, owner_clause)
            }
            None => owner_clause,
        };

        debug!(%filter, "built user filter");
        Ok(filter)
    }
}

fn validate_user_id(user_id: &str) -> Result<(), ToolError> {
    if user_id.is_empty() {
        return Err(ToolError::Validation("user id must be non-empty".into()));
    }
    if user_id.len() > MAX_USER_ID_LEN {
        return Err(ToolError::Validation(format!(
            "user id must be at most {} characters",
            MAX_USER_ID_LEN
        )));
    }
    if !user_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ToolError::Validation(
            "user id may only contain letters, digits, '_' and '-'".into(),
        ));
    }
    Ok(())
}

/// Record ids and collection names share the user id's character set.
pub fn validate_identifier(kind: &str, value: &str) -> Result<(), ToolError> {
    if value.is_empty()
        || value.len() > MAX_USER_ID_LEN
        || !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ToolError::Validation(format!("invalid {}: {:?}", kind, value)));
    }
    Ok(())
}
