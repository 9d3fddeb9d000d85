pub mod comm;
pub mod core;
pub mod eventqueue;
pub mod executor;
pub mod reactor;
pub mod runloop;
