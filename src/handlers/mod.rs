pub mod sse;
pub mod widgets;

pub use sse::*;
pub use widgets::*;
