pub mod artifact_slot;
pub mod filename;
pub mod url_registry;
