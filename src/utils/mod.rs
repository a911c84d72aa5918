pub mod constants;
pub mod url_utils;

pub use constants::*;
pub use url_utils::validate_url;
