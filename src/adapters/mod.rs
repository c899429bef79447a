pub mod http;
pub mod simulated;
pub mod storage;
