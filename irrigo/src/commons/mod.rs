pub mod basic_functions;
pub mod date_range;
