//! Decoder for tm2 signed transaction envelopes.
//!
//! RPC endpoints hand out transactions as base64 of the amino binary `std.Tx`. Decoding turns
//! one envelope into its basic data (signers, memo, fee, gas) and a typed list of messages.
//! Decoding is fail-closed: an unknown message type or a malformed field rejects the whole
//! transaction instead of skipping the offending message.
//!
//! ```rust,ignore
//! let decoded = indexer_tx_decoder::decode_base64_transaction(&raw)?;
//! for message in &decoded.messages {
//!     println!("{} {}", message.message_counter, message.kind.msg_type());
//! }
//! ```

mod error;
pub mod proto;
mod types;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bech32::{Bech32, Hrp};
use prost::Message as _;
use sha2::{Digest, Sha256};

pub use error::DecodeError;
pub use types::{
    BasicTxData, Coin, DecodedMessage, DecodedTransaction, Fee, MessageKind, MsgAddPackage, MsgCall, MsgRun, MsgSend,
    MsgType,
};

/// Length of a raw account address.
pub const ADDRESS_LEN: usize = 20;

const ADDRESS_HRP: Hrp = Hrp::parse_unchecked("g");

/// Decode a base64 envelope as returned by the RPC `block` and `tx` endpoints.
pub fn decode_base64_transaction(encoded: &str) -> Result<DecodedTransaction, DecodeError> {
    let bytes = BASE64.decode(encoded.trim())?;
    decode_transaction(&bytes)
}

/// Decode a binary envelope.
pub fn decode_transaction(bytes: &[u8]) -> Result<DecodedTransaction, DecodeError> {
    let tx = proto::Tx::decode(bytes).map_err(DecodeError::malformed("transaction envelope"))?;

    if tx.msgs.len() > i16::MAX as usize {
        return Err(DecodeError::TooManyMessages { count: tx.msgs.len() });
    }

    let messages = tx
        .msgs
        .iter()
        .enumerate()
        .map(|(index, any)| {
            let message_counter =
                i16::try_from(index).map_err(|_| DecodeError::TooManyMessages { count: tx.msgs.len() })?;
            Ok(DecodedMessage { message_counter, kind: decode_message(any)? })
        })
        .collect::<Result<Vec<_>, DecodeError>>()?;

    let mut signers: Vec<String> = Vec::new();
    for message in &messages {
        let signer = message.kind.signer();
        if !signers.iter().any(|known| known == signer) {
            signers.push(signer.to_string());
        }
    }

    let (gas_wanted, fee) = match tx.fee {
        Some(fee) => {
            let coin = fee.gas_fee.unwrap_or_default();
            (fee.gas_wanted, Fee { amount: coin.amount, denom: coin.denom })
        }
        None => (0, Fee::default()),
    };

    Ok(DecodedTransaction {
        hash: tx_hash(bytes),
        basic: BasicTxData { signers, memo: tx.memo, fee, gas_wanted },
        messages,
    })
}

/// Base64 SHA-256 of an envelope, the storage key of a transaction.
pub fn tx_hash(bytes: &[u8]) -> String {
    BASE64.encode(Sha256::digest(bytes))
}

/// Same as [`tx_hash`] for a base64 envelope.
pub fn tx_hash_from_base64(encoded: &str) -> Result<String, DecodeError> {
    Ok(tx_hash(&BASE64.decode(encoded.trim())?))
}

/// Render a raw 20 byte address as `g1...` bech32.
pub fn encode_address(field: &'static str, raw: &[u8]) -> Result<String, DecodeError> {
    if raw.len() != ADDRESS_LEN {
        return Err(DecodeError::InvalidAddress { field, len: raw.len() });
    }
    bech32::encode::<Bech32>(ADDRESS_HRP, raw).map_err(|e| DecodeError::AddressEncoding(e.to_string()))
}

fn decode_message(any: &proto::Any) -> Result<MessageKind, DecodeError> {
    let Some(msg_type) = MsgType::from_type_url(&any.type_url) else {
        return Err(DecodeError::UnsupportedMessageType { type_url: any.type_url.clone() });
    };

    let kind = match msg_type {
        MsgType::BankMsgSend => {
            let msg = proto::MsgSend::decode(any.value.as_slice()).map_err(DecodeError::malformed("bank.MsgSend"))?;
            MessageKind::Send(MsgSend {
                from_address: encode_address("from_address", &msg.from_address)?,
                to_address: encode_address("to_address", &msg.to_address)?,
                amount: coins(msg.amount),
            })
        }
        MsgType::VmMsgCall => {
            let msg = proto::MsgCall::decode(any.value.as_slice()).map_err(DecodeError::malformed("vm.m_call"))?;
            MessageKind::Call(MsgCall {
                caller: encode_address("caller", &msg.caller)?,
                pkg_path: msg.pkg_path,
                func_name: msg.func,
                args: msg.args,
                send: coins(msg.send),
                max_deposit: coins(msg.max_deposit),
            })
        }
        MsgType::VmMsgAddPackage => {
            let msg =
                proto::MsgAddPackage::decode(any.value.as_slice()).map_err(DecodeError::malformed("vm.m_addpkg"))?;
            let package = msg.package.unwrap_or_default();
            MessageKind::AddPackage(MsgAddPackage {
                creator: encode_address("creator", &msg.creator)?,
                pkg_path: package.path,
                pkg_name: package.name,
                file_names: package.files.into_iter().map(|file| file.name).collect(),
                send: coins(msg.send),
                max_deposit: coins(msg.max_deposit),
            })
        }
        MsgType::VmMsgRun => {
            let msg = proto::MsgRun::decode(any.value.as_slice()).map_err(DecodeError::malformed("vm.m_run"))?;
            let package = msg.package.unwrap_or_default();
            MessageKind::Run(MsgRun {
                caller: encode_address("caller", &msg.caller)?,
                pkg_path: package.path,
                pkg_name: package.name,
                file_names: package.files.into_iter().map(|file| file.name).collect(),
                send: coins(msg.send),
                max_deposit: coins(msg.max_deposit),
            })
        }
    };
    Ok(kind)
}

fn coins(list: Vec<proto::Coin>) -> Vec<Coin> {
    list.into_iter().map(|coin| Coin { amount: coin.amount, denom: coin.denom }).collect()
}
