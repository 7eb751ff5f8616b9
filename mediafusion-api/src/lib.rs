// MediaFusion API library
//
// The Stremio addon protocol surface: stream lookup, debrid
// availability endpoints, and the provider resolve redirect.

pub mod http;

pub use http::AppState;
