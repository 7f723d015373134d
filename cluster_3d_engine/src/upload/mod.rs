/// Upload module - staged scene uploads and the push constant block

pub mod push_constants;
pub mod scene_upload;

pub use push_constants::*;
pub use scene_upload::*;
