//! WebDriver-backed collaborators for the chat pipeline: driver autostart,
//! login, the new-message poll, outgoing messages and session teardown.

pub mod capabilities;
pub mod chatroom;
pub mod driver;
pub mod login;
pub mod wire;

pub use capabilities::Browser;
pub use chatroom::ChatroomSession;
pub use driver::{ensure_driver, DriverError, DriverLauncher, DriverProcess};
pub use login::{establish_session, LoginConfig};
pub use wire::{WebDriverClient, WireError};
