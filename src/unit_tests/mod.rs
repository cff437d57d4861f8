pub mod finalizer;
pub mod reconcile;
