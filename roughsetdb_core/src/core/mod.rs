pub mod error;
pub mod types;
pub mod storage;
pub mod multi_index;
pub mod vc;
pub mod descriptor;
pub mod joiner;
pub mod filter;
