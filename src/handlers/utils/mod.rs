pub mod json_response;
pub mod params;

pub use json_response::*;
pub use params::*;
