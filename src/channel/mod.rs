//! Companion-link adapter seam.

pub mod traits;

#[cfg(test)]
pub mod testing;

pub use traits::PeerChannel;
