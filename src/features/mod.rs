//! Feature construction.
//!
//! - tabular preprocessing (`pipeline`)
//! - description encoding (`text`)
//! - fixed-order concatenation (`fusion`)

pub mod fusion;
pub mod pipeline;
pub mod text;

pub use fusion::*;
pub use pipeline::*;
pub use text::*;
