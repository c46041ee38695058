pub mod header;
pub mod timestamp;
pub mod value;
