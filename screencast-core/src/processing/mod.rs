pub mod capture_timer;
pub mod stream_mixer;
