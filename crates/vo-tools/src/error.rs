use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("duplicate tool name: {name}")]
    DuplicateName { name: String },

    #[error("unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("malformed tool arguments (first bytes: {preview})")]
    MalformedArguments { preview: String },

    #[error("arguments must be a JSON object, got {got}")]
    NotAnObject { got: String },

    #[error("missing required parameter: {name}")]
    MissingRequired { name: String },
}

pub type Result<T> = std::result::Result<T, ToolError>;
