pub mod app;
pub mod audio;
pub mod document;
pub mod error;
pub mod geometry;
pub mod history;
pub mod interaction;
pub mod paths;
pub mod region;
pub mod session;
