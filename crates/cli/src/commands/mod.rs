pub mod broadcast;
pub mod pool;
pub mod signals;
