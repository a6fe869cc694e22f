use serde::{Deserialize, Serialize};

/// Amount and denomination pair. Coin lists are never absent, only empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub amount: i64,
    pub denom: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fee {
    pub amount: i64,
    pub denom: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicTxData {
    /// Message signers, de-duplicated, in message order.
    pub signers: Vec<String>,
    pub memo: String,
    pub fee: Fee,
    pub gas_wanted: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTransaction {
    /// Base64 SHA-256 of the envelope bytes.
    pub hash: String,
    pub basic: BasicTxData,
    pub messages: Vec<DecodedMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMessage {
    /// Zero-based position in the envelope.
    pub message_counter: i16,
    pub kind: MessageKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    Send(MsgSend),
    Call(MsgCall),
    AddPackage(MsgAddPackage),
    Run(MsgRun),
}

impl MessageKind {
    pub fn msg_type(&self) -> MsgType {
        match self {
            MessageKind::Send(_) => MsgType::BankMsgSend,
            MessageKind::Call(_) => MsgType::VmMsgCall,
            MessageKind::AddPackage(_) => MsgType::VmMsgAddPackage,
            MessageKind::Run(_) => MsgType::VmMsgRun,
        }
    }

    /// The account that signs this message.
    pub fn signer(&self) -> &str {
        match self {
            MessageKind::Send(msg) => &msg.from_address,
            MessageKind::Call(msg) => &msg.caller,
            MessageKind::AddPackage(msg) => &msg.creator,
            MessageKind::Run(msg) => &msg.caller,
        }
    }

    /// Every account address the message references.
    pub fn addresses(&self) -> Vec<&str> {
        match self {
            MessageKind::Send(msg) => vec![&msg.from_address, &msg.to_address],
            _ => vec![self.signer()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MsgType {
    BankMsgSend,
    VmMsgCall,
    VmMsgAddPackage,
    VmMsgRun,
}

impl MsgType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MsgType::BankMsgSend => "bank_msg_send",
            MsgType::VmMsgCall => "vm_msg_call",
            MsgType::VmMsgAddPackage => "vm_msg_add_package",
            MsgType::VmMsgRun => "vm_msg_run",
        }
    }

    /// Amino type URL of the message on the wire.
    pub fn type_url(&self) -> &'static str {
        match self {
            MsgType::BankMsgSend => "/bank.MsgSend",
            MsgType::VmMsgCall => "/vm.m_call",
            MsgType::VmMsgAddPackage => "/vm.m_addpkg",
            MsgType::VmMsgRun => "/vm.m_run",
        }
    }

    pub fn from_type_url(type_url: &str) -> Option<Self> {
        match type_url {
            "/bank.MsgSend" => Some(MsgType::BankMsgSend),
            "/vm.m_call" => Some(MsgType::VmMsgCall),
            "/vm.m_addpkg" => Some(MsgType::VmMsgAddPackage),
            "/vm.m_run" => Some(MsgType::VmMsgRun),
            _ => None,
        }
    }
}

impl std::fmt::Display for MsgType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgSend {
    pub from_address: String,
    pub to_address: String,
    pub amount: Vec<Coin>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgCall {
    pub caller: String,
    pub pkg_path: String,
    pub func_name: String,
    pub args: Vec<String>,
    pub send: Vec<Coin>,
    pub max_deposit: Vec<Coin>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgAddPackage {
    pub creator: String,
    pub pkg_path: String,
    pub pkg_name: String,
    pub file_names: Vec<String>,
    pub send: Vec<Coin>,
    pub max_deposit: Vec<Coin>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgRun {
    pub caller: String,
    pub pkg_path: String,
    pub pkg_name: String,
    pub file_names: Vec<String>,
    pub send: Vec<Coin>,
    pub max_deposit: Vec<Coin>,
}
