pub mod controller;
mod devices;
