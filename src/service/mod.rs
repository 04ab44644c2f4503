pub mod search;
pub mod sessions;
pub mod stream;
