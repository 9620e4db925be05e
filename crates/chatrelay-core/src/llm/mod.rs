mod traits;
mod openai;
pub mod sse;

pub use traits::*;
pub use openai::OpenAiGateway;
