pub mod constants;
pub mod endpoint;

pub use endpoint::TransferEndpoint;
