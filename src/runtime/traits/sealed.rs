// ABOUTME: Sealed trait pattern for runtime traits.
// ABOUTME: Only the adapters in this crate can implement the runtime contract.

/// Sealed trait to prevent external implementations.
///
/// Methods can be added to the capability traits without breaking callers,
/// since only this crate's adapters (and its test fake) implement them.
pub trait Sealed {}
