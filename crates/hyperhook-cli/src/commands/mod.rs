pub mod detectors;
pub mod expr;
pub mod init;
pub mod read;
pub mod write;
