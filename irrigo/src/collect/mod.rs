pub mod catalog;
pub mod climate;
#[cfg(feature = "reqwest")]
pub mod earth_engine;
pub mod global_variables;
#[cfg(feature = "reqwest")]
pub mod http;
