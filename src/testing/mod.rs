//! Test support utilities.

pub mod mocks;

pub use mocks::{MockBehavior, MockConnection, MockConnector, MockError};
