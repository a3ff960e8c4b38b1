pub mod anthropic;
pub mod bedrock;
pub mod echo;

pub use anthropic::AnthropicAdapter;
pub use bedrock::BedrockAdapter;
pub use echo::EchoAdapter;
