pub mod capture_engine;
pub mod clock;
pub mod codec_engine;
pub mod delegate;
pub mod media_platform;
pub mod object_url;
