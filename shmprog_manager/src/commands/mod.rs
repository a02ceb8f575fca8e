pub mod demo;
pub mod status;
pub mod worker;
