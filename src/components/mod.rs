pub mod generation_panel;
pub mod markdown;
pub mod toast;
