pub mod analysis;
pub mod contributions;
pub mod profile;
pub mod wrapped;

pub use analysis::*;
pub use contributions::*;
pub use profile::*;
pub use wrapped::*;
