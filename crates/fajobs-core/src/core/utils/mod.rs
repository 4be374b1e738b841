pub mod duration;
pub mod text;
