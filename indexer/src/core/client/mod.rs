pub mod database;
pub mod rpc;

pub use database::{DatabaseClient, DatabaseError, PostgresClient};
pub use rpc::{HttpRpcClient, RateLimitedRpc, RpcClient, RpcError, RpcTarget};
