pub mod controller;
pub mod state;
pub mod stream;
pub mod timer;
