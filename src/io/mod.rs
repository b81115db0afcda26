// External I/O operations module
pub mod instance; // Finding and signalling the running instance
pub mod lock; // Single-instance lock file
pub mod signals; // Unix signal handling
