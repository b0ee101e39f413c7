// Library exports for titlemark

pub mod dom;
pub mod error;
pub mod html;
pub mod modal;
pub mod richtext;
pub mod title_mark;
pub mod tooltip;
pub mod view;
