pub mod tcp;
pub mod traits;
pub mod websocket;

pub use traits::ControlEventSource;
pub use websocket::ControlHub;
