// The single store operation an invocation performs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Get,
    Put { value: String }, // write a new revision of the key
}

/// Parsed operation intent: which key of which bucket, and what to do with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intent {
    pub bucket: String,
    pub key: String,
    pub command: Command,
    pub history: bool,
}
