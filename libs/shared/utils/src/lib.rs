pub mod extractor;
pub mod jwt;
pub mod request_id;
pub mod state;
pub mod test_utils;
pub mod validation;

pub use state::AppState;
