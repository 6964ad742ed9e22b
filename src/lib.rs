pub mod args;
pub mod catalog;
pub mod cli;
pub mod dispatcher;
pub mod error_handling;
pub mod logger;
pub mod outcome;
pub mod privilege;
pub mod products;
pub mod registry;
pub mod session;
pub mod system;
