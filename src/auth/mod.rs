pub mod authentication;
pub mod coach;
pub mod permissions;
pub mod session;

pub use authentication::*;
pub use coach::*;
pub use permissions::*;
pub use session::*;
