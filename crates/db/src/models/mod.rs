pub mod annotation_action;
pub mod category;
pub mod cell_annotation;
pub mod label;
pub mod merge;
pub mod text_cell;
