#![cfg_attr(not(feature = "std"), no_std)]

pub mod protocol;

mod session;
pub use session::*;

mod transport;
pub use transport::*;

#[cfg(feature = "std")]
mod host;
#[cfg(feature = "std")]
pub use host::*;
