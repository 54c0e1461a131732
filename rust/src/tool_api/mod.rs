mod batch;
mod builder;
mod client;
mod ergonomic;
mod error;
mod protocol;
mod stream;
mod transport;

pub use batch::{BatchOperation, BatchOutcome};
pub use builder::{
    ClientConfig, ToolClientBuilder, DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY,
};
pub use client::ToolClient;
pub use ergonomic::{
    ActiveChangesQuery, ChangeOptions, CreateChange, TOOL_CHANGES_ACTIVE, TOOL_CHANGE_ARCHIVE,
    TOOL_CHANGE_OPEN,
};
pub use error::{is_retryable, ErrorCode, ErrorKind, ToolError};
pub use protocol::{ErrorPayload, StreamEvent, ToolRequest, API_VERSION};
pub use stream::{
    collect_result, ByteStream, EventStream, NdjsonFormat, SseFormat, StreamFormat,
    DEFAULT_MAX_NDJSON_LINE,
};
pub use transport::Transport;
