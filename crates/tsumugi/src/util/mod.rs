pub mod base62;
pub mod http;
pub mod path;
pub mod range;
