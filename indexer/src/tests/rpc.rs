use std::time::Duration;

use assert_matches::assert_matches;
use httpmock::prelude::*;
use rstest::*;
use serde_json::json;
use url::Url;

use crate::core::client::rpc::{HttpRpcClient, RpcClient, RpcError, RpcTarget};
use crate::tests::common::send_envelope;

fn client(server: &MockServer) -> HttpRpcClient {
    HttpRpcClient::new(Url::parse(&server.base_url()).unwrap(), Duration::from_secs(2)).unwrap()
}

fn ok_body(result: serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(&json!({ "jsonrpc": "2.0", "id": 1, "result": result })).unwrap()
}

#[rstest]
#[tokio::test]
async fn test_get_block() {
    let server = MockServer::start_async().await;
    let envelope = send_envelope(1, 2, 10);
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/").body_contains("\"method\":\"block\"").body_contains("\"height\":\"12\"");
            then.status(200).body(ok_body(json!({
                "block_meta": { "block_id": { "hash": "q80=" } },
                "block": {
                    "header": {
                        "chain_id": "test5",
                        "height": "12",
                        "time": "2024-07-24T11:54:31.654393542Z",
                        "proposer_address": "g1proposer"
                    },
                    "data": { "txs": [envelope] },
                    "last_commit": {
                        "precommits": [{ "validator_address": "g1a" }, null, { "validator_address": "g1b" }]
                    }
                }
            })));
        })
        .await;

    let block = client(&server).get_block(12).await.unwrap();

    mock.assert_async().await;
    assert_eq!(block.height, 12);
    assert_eq!(block.chain_id, "test5");
    assert_eq!(block.tx_hashes, vec![indexer_tx_decoder::tx_hash_from_base64(&envelope).unwrap()]);
    assert_eq!(block.signers, vec!["g1a".to_string(), "g1b".to_string()]);
}

#[rstest]
#[tokio::test]
async fn test_get_tx() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/").body_contains("\"method\":\"tx\"");
            then.status(200).body(ok_body(json!({
                "hash": "aGFzaA==",
                "height": "12",
                "index": 0,
                "tx_result": {
                    "ResponseBase": {
                        "Error": null,
                        "Events": [{
                            "@type": "/tm.GnoEvent",
                            "type": "Register",
                            "pkg_path": "gno.land/r/demo/users",
                            "attrs": null
                        }],
                        "Log": ""
                    },
                    "GasWanted": "2000000",
                    "GasUsed": "1200000"
                },
                "tx": "AAAA"
            })));
        })
        .await;

    let tx = client(&server).get_tx("aGFzaA==").await.unwrap();

    assert!(tx.success());
    assert_eq!(tx.height, 12);
    assert_eq!(tx.events.len(), 1);
    assert_eq!(tx.events[0].event_type, "Register");
    assert!(tx.events[0].attrs.is_empty());
}

#[rstest]
#[tokio::test]
async fn test_latest_height_and_health() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/").body_contains("\"method\":\"status\"");
            then.status(200).body(ok_body(json!({ "sync_info": { "latest_block_height": "4821" } })));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/").body_contains("\"method\":\"health\"");
            then.status(200).body(ok_body(json!({})));
        })
        .await;

    let client = client(&server);
    assert_eq!(client.get_latest_block_height().await.unwrap(), 4821);
    assert!(client.health().await.is_ok());
}

#[rstest]
#[tokio::test]
async fn test_node_error_carries_the_height() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/");
            then.status(200).body(
                serde_json::to_vec(&json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "error": {
                        "code": -32603,
                        "message": "Internal error",
                        "data": "height 99 must be less than or equal to the current blockchain height 98"
                    }
                }))
                .unwrap(),
            );
        })
        .await;

    let err = client(&server).get_block(99).await.unwrap_err();

    assert_matches!(&err, RpcError::Node { target: RpcTarget::Height(99), code: -32603, .. });
    assert!(err.to_string().contains("current blockchain height"));
}

#[rstest]
#[tokio::test]
async fn test_http_failure_is_a_transport_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/");
            then.status(503).body("overloaded");
        })
        .await;

    let err = client(&server).get_tx("aGFzaA==").await.unwrap_err();

    assert_matches!(&err, RpcError::Transport { target: RpcTarget::Hash(hash), .. } if hash == "aGFzaA==");
    assert!(err.is_retryable());
}
