pub mod catalog;
pub mod progress;
pub mod subscription;
pub mod user;

pub use catalog::*;
pub use progress::*;
pub use subscription::*;
pub use user::*;
