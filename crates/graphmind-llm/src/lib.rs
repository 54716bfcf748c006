pub mod echo;

pub use echo::EchoLlmClient;
pub use graphmind_core::LlmClient;
