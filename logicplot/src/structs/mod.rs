pub mod channel;
pub mod device;
