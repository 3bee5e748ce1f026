pub mod extractor;
pub mod helpers;
pub mod jwt;
pub mod test_utils;
