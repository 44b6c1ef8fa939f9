pub mod cache;
pub mod entities;
pub mod overlay;
pub mod ports;
pub mod session;
pub mod sync;
