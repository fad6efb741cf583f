pub mod forwarding;
pub mod upload;
