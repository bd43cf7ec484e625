//! Device event to pool status, through predicate, mapper and reconciler.
