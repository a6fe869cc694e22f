pub mod common;
pub mod orchestrator;
pub mod rpc;
