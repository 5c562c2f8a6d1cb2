pub mod handler;
pub mod request;

pub use request::RunRequest;
