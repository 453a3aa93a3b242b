//! Focus Radio: a Pomodoro timer playing an internet radio stream over an
//! ambient rain / vinyl mixer.

pub mod app;
pub mod audio;
pub mod config;
pub mod coordinator;
pub mod media;
pub mod radio;
pub mod timer;
