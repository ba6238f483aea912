pub mod header;
pub mod status;
pub mod types;

pub use header::BlockHeader;
pub use status::Status;
pub use types::{Bytes32, Uint64};
pub use ssz;
