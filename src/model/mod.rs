pub mod bar;
pub mod sample;
pub mod window;
