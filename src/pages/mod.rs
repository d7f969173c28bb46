pub mod portfolio;
pub mod readme;
pub mod visualizer;
pub mod wrapped;
