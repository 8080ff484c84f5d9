pub mod llm;
pub mod store;

pub use llm::{FailingClient, FixedClient, RecordedCall, ScriptedClient};
pub use store::FailingVectorCache;
