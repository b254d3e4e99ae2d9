pub mod field;
pub mod vegetation;
