//! Wire structs of the tm2 amino transaction envelope.
//!
//! Amino binary is protobuf3 compatible for these types, so the field tags below are the amino
//! field numbers of `std.Tx`, `bank.MsgSend` and the `vm` messages.

#[derive(Clone, PartialEq, prost::Message)]
pub struct Any {
    #[prost(string, tag = "1")]
    pub type_url: String,
    #[prost(bytes = "vec", tag = "2")]
    pub value: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Tx {
    #[prost(message, repeated, tag = "1")]
    pub msgs: Vec<Any>,
    #[prost(message, optional, tag = "2")]
    pub fee: Option<Fee>,
    #[prost(message, repeated, tag = "3")]
    pub signatures: Vec<Signature>,
    #[prost(string, tag = "4")]
    pub memo: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Fee {
    #[prost(int64, tag = "1")]
    pub gas_wanted: i64,
    #[prost(message, optional, tag = "2")]
    pub gas_fee: Option<Coin>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Coin {
    #[prost(string, tag = "1")]
    pub denom: String,
    #[prost(int64, tag = "2")]
    pub amount: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Signature {
    #[prost(message, optional, tag = "1")]
    pub pub_key: Option<Any>,
    #[prost(bytes = "vec", tag = "2")]
    pub signature: Vec<u8>,
}

/// `/bank.MsgSend`
#[derive(Clone, PartialEq, prost::Message)]
pub struct MsgSend {
    #[prost(bytes = "vec", tag = "1")]
    pub from_address: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub to_address: Vec<u8>,
    #[prost(message, repeated, tag = "3")]
    pub amount: Vec<Coin>,
}

/// `/vm.m_call`
#[derive(Clone, PartialEq, prost::Message)]
pub struct MsgCall {
    #[prost(bytes = "vec", tag = "1")]
    pub caller: Vec<u8>,
    #[prost(message, repeated, tag = "2")]
    pub send: Vec<Coin>,
    #[prost(message, repeated, tag = "3")]
    pub max_deposit: Vec<Coin>,
    #[prost(string, tag = "4")]
    pub pkg_path: String,
    #[prost(string, tag = "5")]
    pub func: String,
    #[prost(string, repeated, tag = "6")]
    pub args: Vec<String>,
}

/// `/vm.m_addpkg`
#[derive(Clone, PartialEq, prost::Message)]
pub struct MsgAddPackage {
    #[prost(bytes = "vec", tag = "1")]
    pub creator: Vec<u8>,
    #[prost(message, optional, tag = "2")]
    pub package: Option<MemPackage>,
    #[prost(message, repeated, tag = "3")]
    pub send: Vec<Coin>,
    #[prost(message, repeated, tag = "4")]
    pub max_deposit: Vec<Coin>,
}

/// `/vm.m_run`
#[derive(Clone, PartialEq, prost::Message)]
pub struct MsgRun {
    #[prost(bytes = "vec", tag = "1")]
    pub caller: Vec<u8>,
    #[prost(message, repeated, tag = "2")]
    pub send: Vec<Coin>,
    #[prost(message, repeated, tag = "3")]
    pub max_deposit: Vec<Coin>,
    #[prost(message, optional, tag = "4")]
    pub package: Option<MemPackage>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MemPackage {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub path: String,
    #[prost(message, repeated, tag = "3")]
    pub files: Vec<MemFile>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MemFile {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub body: String,
}
