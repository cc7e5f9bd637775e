pub mod gemini;
pub mod http_errors;
pub mod sse;
