pub mod firestore;
pub mod gateway;
pub mod notifier;
pub mod termination;
