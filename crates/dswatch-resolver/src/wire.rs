//! DS queries over the DNS wire protocol.
//!
//! Builds the query with `hickory-proto`, sends it over UDP, and retries over
//! TCP (RFC 1035 §4.2.2 length framing) when the UDP answer is truncated.

use std::{
  net::{Ipv4Addr, Ipv6Addr, SocketAddr},
  time::Duration,
};

use hickory_proto::{
  op::{Edns, Message, MessageType, OpCode, Query, ResponseCode},
  rr::{Name, RecordType},
};
use tokio::{
  io::{AsyncReadExt as _, AsyncWriteExt as _},
  net::{TcpStream, UdpSocket},
};
use tracing::debug;

use crate::{DsAnswer, DsQuerier, QueryError};

/// Advertised EDNS(0) UDP payload size (DNS flag day 2020 recommendation).
const EDNS_PAYLOAD: u16 = 1232;

/// Receive buffer for UDP responses.
const MAX_UDP_RESPONSE: usize = 4096;

/// Sends DS queries straight to a resolver, one exchange per call.
#[derive(Debug, Clone)]
pub struct WireQuerier {
  timeout: Duration,
}

impl WireQuerier {
  /// `timeout` bounds the whole exchange, including any TCP retry.
  pub fn new(timeout: Duration) -> Self { Self { timeout } }
}

impl DsQuerier for WireQuerier {
  async fn query_ds(
    &self,
    resolver: SocketAddr,
    domain: &str,
  ) -> Result<DsAnswer, QueryError> {
    let (id, query) = build_query(domain)?;
    tokio::time::timeout(self.timeout, exchange(resolver, id, &query))
      .await
      .map_err(|_| QueryError::Timeout(self.timeout))?
  }
}

// ─── Message handling ────────────────────────────────────────────────────────

/// Build a recursive `<domain> IN DS` query with the DO bit set.
fn build_query(domain: &str) -> Result<(u16, Vec<u8>), QueryError> {
  let mut name = Name::from_ascii(domain).map_err(|e| QueryError::InvalidName {
    name:   domain.to_owned(),
    reason: e.to_string(),
  })?;
  name.set_fqdn(true);

  let mut edns = Edns::new();
  edns.set_max_payload(EDNS_PAYLOAD);
  edns.set_dnssec_ok(true);

  let id = fastrand::u16(..);
  let mut message = Message::new();
  message
    .set_id(id)
    .set_message_type(MessageType::Query)
    .set_op_code(OpCode::Query)
    .set_recursion_desired(true)
    .add_query(Query::query(name, RecordType::DS));
  message.set_edns(edns);

  let bytes = message
    .to_vec()
    .map_err(|e| QueryError::Malformed(format!("cannot encode query: {e}")))?;
  Ok((id, bytes))
}

fn parse_response(id: u16, bytes: &[u8]) -> Result<Message, QueryError> {
  let message =
    Message::from_vec(bytes).map_err(|e| QueryError::Malformed(e.to_string()))?;
  if message.message_type() != MessageType::Response {
    return Err(QueryError::Malformed("not a response".to_owned()));
  }
  if message.id() != id {
    return Err(QueryError::IdMismatch { want: id, got: message.id() });
  }
  Ok(message)
}

/// Reduce a response to the DS records in its answer section.
///
/// NXDOMAIN is an answer (no DS); SERVFAIL, REFUSED and friends are not.
fn ds_answer(resolver: SocketAddr, message: &Message) -> Result<DsAnswer, QueryError> {
  match message.response_code() {
    ResponseCode::NoError | ResponseCode::NXDomain => {}
    code => return Err(QueryError::ServerFailure(code)),
  }

  let records = message
    .answers()
    .iter()
    .filter(|r| r.record_type() == RecordType::DS)
    .map(ToString::to_string)
    .collect();
  Ok(DsAnswer { resolver, records })
}

// ─── Transport ───────────────────────────────────────────────────────────────

async fn exchange(
  resolver: SocketAddr,
  id: u16,
  query: &[u8],
) -> Result<DsAnswer, QueryError> {
  let mut response = parse_response(id, &exchange_udp(resolver, query).await?)?;
  if response.truncated() {
    debug!(%resolver, "truncated UDP answer, retrying over TCP");
    response = parse_response(id, &exchange_tcp(resolver, query).await?)?;
  }
  ds_answer(resolver, &response)
}

async fn exchange_udp(resolver: SocketAddr, query: &[u8]) -> Result<Vec<u8>, QueryError> {
  let bind: SocketAddr = if resolver.is_ipv4() {
    (Ipv4Addr::UNSPECIFIED, 0).into()
  } else {
    (Ipv6Addr::UNSPECIFIED, 0).into()
  };

  // `connect` makes the kernel drop datagrams from any other source.
  let socket = UdpSocket::bind(bind).await?;
  socket.connect(resolver).await?;
  socket.send(query).await?;

  let mut buf = vec![0u8; MAX_UDP_RESPONSE];
  let len = socket.recv(&mut buf).await?;
  buf.truncate(len);
  Ok(buf)
}

async fn exchange_tcp(resolver: SocketAddr, query: &[u8]) -> Result<Vec<u8>, QueryError> {
  let len = u16::try_from(query.len())
    .map_err(|_| QueryError::Malformed("query exceeds 65535 bytes".to_owned()))?;

  let mut stream = TcpStream::connect(resolver).await?;
  stream.write_all(&len.to_be_bytes()).await?;
  stream.write_all(query).await?;

  let len = stream.read_u16().await?;
  let mut buf = vec![0u8; usize::from(len)];
  stream.read_exact(&mut buf).await?;
  Ok(buf)
}
