pub mod table;
pub mod errors;
