pub mod cage;

pub use cage::*;
