//! Client half of the server-driven UI bridge.
//!
//! A [`UiBridge`] owns a [`PageHandle`]. User actions dispatched on the page
//! are attributed to a single control by [`attribution`], posted to the
//! server by [`RemoteInvocationClient`], and the streamed reply is decoded
//! and executed against the same page by a [`ScriptEngine`].

pub mod attribution;
pub mod bridge;
pub mod engine;
pub mod error;
pub mod invocation;
pub mod modules;
pub mod page;
pub mod script;
pub mod stream_decoder;

pub use attribution::{decide, Attribution, DispatchContext, ServerEventListener};
pub use bridge::{PendingInvocation, UiBridge};
pub use engine::{RenderScriptEngine, ScriptEngine};
pub use error::{BridgeError, DecodeError, ErrorKind, ExecutionError};
pub use invocation::RemoteInvocationClient;
pub use modules::{BuiltinModules, ModuleLoader};
pub use page::{Document, NodeId, PageHandle};
pub use script::ScriptValue;
pub use stream_decoder::{read_to_string, Utf8StreamDecoder};
