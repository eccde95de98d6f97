use quanta_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("User not authenticated")]
    Unauthenticated,

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Record not found or not owned by the current user: {collection}/{id}")]
    NotFoundOrForbidden { collection: String, id: String },

    #[error("Remote store failure: {0}")]
    RemoteStore(#[from] StoreError),
}

/// Error surfaced to callers of [`crate::ToolDispatcher::execute_tool`].
#[derive(Debug, Error)]
#[error("PocketBaseMCP error: {0}")]
pub struct DispatchError(#[from] pub ToolError);

impl DispatchError {
    pub fn kind(&self) -> &ToolError {
        &self.0
    }
}
