pub mod audio;
pub mod signal;
