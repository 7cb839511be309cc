pub mod cli;
pub mod core;
pub mod google;
pub mod jobs;
pub mod reservation;
