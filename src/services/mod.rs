pub mod storage;
pub mod taximeter;
