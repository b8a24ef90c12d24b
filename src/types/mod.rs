// ABOUTME: Domain types shared across the crate.
// ABOUTME: Phantom-typed IDs and image reference parsing.

mod id;
mod image_ref;

pub use id::{ContainerId, Id, ImageId, NetworkId, PodId, SHORT_ID_LEN};
pub use image_ref::{ImageRef, ParseImageRefError};
