//! Tool catalog and dispatcher bridging model tool calls to the record store.

pub mod args;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod extract;
pub mod registry;
pub mod request;
pub mod response;
pub mod transaction;

pub use context::SecurityContext;
pub use dispatcher::{DispatcherOptions, ToolDispatcher};
pub use error::{DispatchError, ToolError};
pub use extract::{extract_tool_call, Extraction, TOOL_CALL_MARKER};
pub use registry::{list_tools, ToolDescriptor, ToolName};
pub use request::{ToolCall, ToolRequest};
pub use response::{safe_stringify, ContentBlock, McpResponse};
pub use transaction::{Amount, TransactionType};
