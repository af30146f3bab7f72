use std::error::Error;

/// A named slot holding one persisted value.
///
/// Implementations are bound to a single identifier and a single backend at
/// construction time. Every call is a fresh round trip to the backing store;
/// no value is cached in the handle.
pub trait DurableSlot {
    type Value;
    /// Lenient backends use [`std::convert::Infallible`] here.
    type Error: Error + Send + Sync + 'static;

    /// Load the persisted value, falling back to the slot's default where the
    /// backend defines one.
    fn read(&self) -> Result<Self::Value, Self::Error>;

    /// Persist a new value.
    fn write(&self, value: Self::Value) -> Result<(), Self::Error>;
}
