pub mod annotation_action_repo;
pub mod category_repo;
pub mod cell_annotation_repo;
pub mod label_repo;
pub mod text_cell_repo;

pub use annotation_action_repo::AnnotationActionRepo;
pub use category_repo::CategoryRepo;
pub use cell_annotation_repo::CellAnnotationRepo;
pub use label_repo::LabelRepo;
pub use text_cell_repo::TextCellRepo;
