pub mod annotation;
pub mod category;
pub mod cell;
pub mod classify;
pub mod document;
pub mod label;
pub mod palette;
