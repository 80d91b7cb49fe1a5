mod http;

pub use http::*;
