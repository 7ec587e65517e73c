pub mod demo;
pub mod init;
pub mod version;

pub use demo::Demo;
pub use init::Init;
pub use version::Version;
