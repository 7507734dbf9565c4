pub mod flash;
pub mod notify;
pub mod storage;
pub mod validation;
