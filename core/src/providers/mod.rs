pub mod bedrock;
pub mod factory;
mod http;
pub mod openai;

pub use bedrock::BedrockProvider;
pub use factory::create_provider;
pub use openai::OpenAIProvider;
