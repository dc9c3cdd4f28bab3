pub mod protocol;
pub mod system;
