pub mod kiosk;
pub mod moment;
pub mod nft;
pub mod registry;

pub use kiosk::*;
pub use moment::*;
pub use nft::*;
pub use registry::*;
