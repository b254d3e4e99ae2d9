pub mod crop_parameters;
pub mod crop_profile;
pub mod irrigation;
