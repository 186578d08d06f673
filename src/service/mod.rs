//! Serving surface.
//!
//! - transport-independent operations over a loaded bundle (`handlers`)
//! - the axum router and server loop (`http`)

pub mod handlers;
pub mod http;

pub use handlers::*;
pub use http::*;
