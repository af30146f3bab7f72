//! Core contracts for durable items: the slot trait, the structured codec,
//! and the store boundaries that backends talk to. Concrete stores live in
//! `durable-storage`; the in-memory doubles here back its tests.

pub mod codec;
pub mod slot;
pub mod storage;
