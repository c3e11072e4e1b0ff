pub mod db;
pub mod encoder;
pub mod storage;
