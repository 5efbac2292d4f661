pub mod note;
pub mod rpc;
pub mod stack;

pub use note::{CategoryFields, Note, NoteCategory, NoteEdit, NotePayload, NoteRemove, ValidationError};
pub use rpc::{ExportBundle, ImportSummary, RpcRequest, RpcResponse};
pub use stack::{StackInspection, StackInstall, StackReplacement, StackTensioning, STACK_IDS};
