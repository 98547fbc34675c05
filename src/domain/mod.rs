pub mod entities;
pub mod sync;
pub mod value_objects;
