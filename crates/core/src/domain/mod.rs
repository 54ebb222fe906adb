pub mod operation;
pub mod request;
pub mod result;
