//! Wire exchange with a single broker.
//!
//! Kafka frames every message with a 4-byte big-endian length prefix;
//! inside the frame sit a request/response header and the message body,
//! both encoded by `kafka-protocol`. All API versions used here are
//! non-flexible, so the request header is v1 and the response header v0.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use kafka_protocol::messages::{ApiKey, RequestHeader, ResponseHeader};
use kafka_protocol::protocol::{Decodable, Encodable, StrBytes};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time;
use tracing::debug;

use super::KafkaError;

/// Upper bound on a single response frame. Metadata for even very large
/// clusters stays far below this.
const MAX_FRAME_SIZE: i32 = 64 * 1024 * 1024;

/// Encode a request header plus body into a single unframed buffer.
pub(crate) fn encode_request<R: Encodable>(
    api_key: ApiKey,
    api_version: i16,
    correlation_id: i32,
    client_id: &StrBytes,
    request: &R,
) -> Result<BytesMut, KafkaError> {
    let header = RequestHeader::default()
        .with_request_api_key(api_key as i16)
        .with_request_api_version(api_version)
        .with_correlation_id(correlation_id)
        .with_client_id(Some(client_id.clone()));

    let mut buf = BytesMut::new();
    header
        .encode(&mut buf, api_key.request_header_version(api_version))
        .map_err(|e| KafkaError::Protocol(format!("encode request header: {e}")))?;
    request
        .encode(&mut buf, api_version)
        .map_err(|e| KafkaError::Protocol(format!("encode request body: {e}")))?;
    Ok(buf)
}

/// Decode a response frame: header first, then the typed body.
pub(crate) fn decode_response<R: Decodable>(
    mut frame: Bytes,
    api_key: ApiKey,
    api_version: i16,
    expected_correlation: i32,
) -> Result<R, KafkaError> {
    let header = ResponseHeader::decode(&mut frame, api_key.response_header_version(api_version))
        .map_err(|e| KafkaError::Protocol(format!("decode response header: {e}")))?;
    if header.correlation_id != expected_correlation {
        return Err(KafkaError::Protocol(format!(
            "correlation id mismatch: sent {expected_correlation}, received {}",
            header.correlation_id
        )));
    }
    R::decode(&mut frame, api_version)
        .map_err(|e| KafkaError::Protocol(format!("decode response body: {e}")))
}

/// A plain TCP connection to one broker.
pub(crate) struct BrokerConnection {
    stream: TcpStream,
    addr: String,
    client_id: StrBytes,
    correlation_id: i32,
    timeout: Duration,
}

impl BrokerConnection {
    /// Open a connection, bounded by `timeout`.
    pub(crate) async fn connect(
        addr: &str,
        client_id: StrBytes,
        timeout: Duration,
    ) -> Result<Self, KafkaError> {
        let stream = time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| KafkaError::Timeout(timeout))??;
        debug!(addr = %addr, "connected to broker");
        Ok(Self {
            stream,
            addr: addr.to_string(),
            client_id,
            correlation_id: 0,
            timeout,
        })
    }

    /// Address this connection was opened against.
    pub(crate) fn addr(&self) -> &str {
        &self.addr
    }

    /// Issue one request and decode its response. The whole round trip is
    /// bounded by the connection timeout.
    pub(crate) async fn request<Req, Resp>(
        &mut self,
        api_key: ApiKey,
        api_version: i16,
        request: &Req,
    ) -> Result<Resp, KafkaError>
    where
        Req: Encodable,
        Resp: Decodable,
    {
        self.correlation_id = self.correlation_id.wrapping_add(1);
        let correlation = self.correlation_id;
        let payload = encode_request(api_key, api_version, correlation, &self.client_id, request)?;

        debug!(
            addr = %self.addr,
            api_key = api_key as i16,
            api_version,
            correlation,
            "sending request"
        );

        let frame = time::timeout(self.timeout, self.exchange(&payload))
            .await
            .map_err(|_| KafkaError::Timeout(self.timeout))??;
        decode_response(frame, api_key, api_version, correlation)
    }

    /// Write one framed request and read back one framed response.
    async fn exchange(&mut self, payload: &[u8]) -> Result<Bytes, KafkaError> {
        let len = i32::try_from(payload.len())
            .map_err(|_| KafkaError::Protocol("request exceeds frame size".to_string()))?;
        self.stream.write_all(&len.to_be_bytes()).await?;
        self.stream.write_all(payload).await?;
        self.stream.flush().await?;

        let mut size = [0u8; 4];
        self.stream.read_exact(&mut size).await?;
        let size = i32::from_be_bytes(size);
        if !(0..=MAX_FRAME_SIZE).contains(&size) {
            return Err(KafkaError::Protocol(format!(
                "invalid response frame size {size}"
            )));
        }

        let mut frame = vec![0u8; size as usize];
        self.stream.read_exact(&mut frame).await?;
        Ok(Bytes::from(frame))
    }
}

#[cfg(test)]
#[path = "connection_test.rs"]
mod tests;
