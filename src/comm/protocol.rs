use crate::comm::error::CommError;
use crate::comm::types::{MsgType, RequestPayload, ResponsePayload, ToolListPayload};
use rmp_serde::decode::Deserializer;
use rmp_serde::encode::Serializer;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::io::Cursor;
use std::result::Result as StdResult;

/// Header length: type (1 byte) + seq (4 bytes)
pub const HEADER_LEN: usize = 5;

/// Chunk header after the packet header: index (4 bytes) + total (4 bytes)
pub const CHUNK_HEADER_LEN: usize = 8;

/// Encode a packet with given type, sequence, and payload
pub fn encode_packet(
    msg_type: MsgType,
    seq: u32,
    payload: Option<&impl serde::Serialize>,
) -> StdResult<Vec<u8>, CommError> {
    let mut buf = Vec::new();

    // Write msg type (1 byte)
    buf.push(msg_type as u8);

    // Write seq (4 bytes, big-endian)
    buf.extend_from_slice(&seq.to_be_bytes());

    if let Some(p) = payload {
        let mut ser = Serializer::new(&mut buf);
        p.serialize(&mut ser)
            .map_err(|e| CommError::EncodeError(e.to_string()))?;
    }

    Ok(buf)
}

/// Decode packet type and seq from raw bytes
pub fn decode_header(data: &[u8]) -> StdResult<(MsgType, u32), CommError> {
    if data.len() < HEADER_LEN {
        return Err(CommError::DecodeError("Packet too short".to_string()));
    }

    let msg_type = MsgType::from_u8(data[0])
        .ok_or_else(|| CommError::DecodeError(format!("Unknown msg type: {}", data[0])))?;

    let seq = u32::from_be_bytes([data[1], data[2], data[3], data[4]]);

    Ok((msg_type, seq))
}

fn decode_payload<T: DeserializeOwned>(data: &[u8]) -> StdResult<T, CommError> {
    let mut de = Deserializer::new(Cursor::new(data));
    T::deserialize(&mut de).map_err(|e| CommError::DecodeError(e.to_string()))
}

/// Decode request payload
pub fn decode_request_payload(data: &[u8]) -> StdResult<RequestPayload, CommError> {
    decode_payload(data)
}

/// Decode response payload
#[allow(dead_code)]
pub fn decode_response_payload(data: &[u8]) -> StdResult<ResponsePayload, CommError> {
    decode_payload(data)
}

/// Decode tool list payload
#[allow(dead_code)]
pub fn decode_tool_list_payload(data: &[u8]) -> StdResult<ToolListPayload, CommError> {
    decode_payload(data)
}

/// Encode a tool call request
#[allow(dead_code)]
pub fn encode_request(seq: u32, payload: &RequestPayload) -> StdResult<Vec<u8>, CommError> {
    encode_packet(MsgType::Request, seq, Some(payload))
}

/// Encode request ack (no payload)
pub fn encode_request_ack(seq: u32) -> StdResult<Vec<u8>, CommError> {
    encode_packet(MsgType::RequestAck, seq, None::<&()>)
}

/// Encode response
pub fn encode_response(seq: u32, payload: &ResponsePayload) -> StdResult<Vec<u8>, CommError> {
    encode_packet(MsgType::Response, seq, Some(payload))
}

/// Encode a response as one RESPONSE packet, or as RESPONSE_CHUNK packets
/// when the payload exceeds `max_payload_bytes`
pub fn encode_response_packets(
    seq: u32,
    payload: &ResponsePayload,
    max_payload_bytes: usize,
) -> StdResult<Vec<Vec<u8>>, CommError> {
    let packet = encode_response(seq, payload)?;
    if packet.len() - HEADER_LEN <= max_payload_bytes {
        return Ok(vec![packet]);
    }

    let chunk_len = max_payload_bytes.saturating_sub(CHUNK_HEADER_LEN);
    if chunk_len == 0 {
        return Err(CommError::EncodeError(format!(
            "max payload of {} bytes leaves no room for chunk data",
            max_payload_bytes
        )));
    }

    let body = &packet[HEADER_LEN..];
    let total = u32::try_from(body.len().div_ceil(chunk_len))
        .map_err(|_| CommError::PayloadTooLarge(body.len()))?;

    body.chunks(chunk_len)
        .enumerate()
        .map(|(index, data)| {
            let mut chunk = Vec::with_capacity(HEADER_LEN + CHUNK_HEADER_LEN + data.len());
            chunk.push(MsgType::ResponseChunk as u8);
            chunk.extend_from_slice(&seq.to_be_bytes());
            chunk.extend_from_slice(&(index as u32).to_be_bytes());
            chunk.extend_from_slice(&total.to_be_bytes());
            chunk.extend_from_slice(data);
            Ok(chunk)
        })
        .collect()
}

/// Split a RESPONSE_CHUNK payload into (index, total, data)
pub fn decode_chunk(data: &[u8]) -> StdResult<(u32, u32, &[u8]), CommError> {
    if data.len() < CHUNK_HEADER_LEN {
        return Err(CommError::DecodeError("Chunk too short".to_string()));
    }

    let index = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
    let total = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
    if total == 0 || index >= total {
        return Err(CommError::DecodeError(format!(
            "Invalid chunk {} of {}",
            index, total
        )));
    }

    Ok((index, total, &data[CHUNK_HEADER_LEN..]))
}

/// Reassembles a chunked response
#[allow(dead_code)]
#[derive(Debug, Default)]
pub struct ChunkAssembler {
    chunks: Vec<Option<Vec<u8>>>,
    received: usize,
}

#[allow(dead_code)]
impl ChunkAssembler {
    /// Add one chunk payload; returns the full response once every chunk has arrived
    pub fn push(&mut self, data: &[u8]) -> StdResult<Option<ResponsePayload>, CommError> {
        let (index, total, body) = decode_chunk(data)?;

        if self.chunks.is_empty() {
            self.chunks = vec![None; total as usize];
        } else if self.chunks.len() != total as usize {
            return Err(CommError::DecodeError(format!(
                "Chunk total changed from {} to {}",
                self.chunks.len(),
                total
            )));
        }

        let slot = &mut self.chunks[index as usize];
        if slot.is_none() {
            *slot = Some(body.to_vec());
            self.received += 1;
        }

        if self.received < self.chunks.len() {
            return Ok(None);
        }

        let body: Vec<u8> = self.chunks.drain(..).flatten().flatten().collect();
        self.received = 0;
        decode_response_payload(&body).map(Some)
    }
}

/// Encode tool list request (no payload)
#[allow(dead_code)]
pub fn encode_list_tools(seq: u32) -> StdResult<Vec<u8>, CommError> {
    encode_packet(MsgType::ListTools, seq, None::<&()>)
}

/// Encode tool list
pub fn encode_tool_list(seq: u32, payload: &ToolListPayload) -> StdResult<Vec<u8>, CommError> {
    encode_packet(MsgType::ToolList, seq, Some(payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ToolDefinition;
    use serde_json::json;

    #[test]
    fn test_request_encode_decode() {
        let payload = RequestPayload {
            tool: "run_command".to_string(),
            arguments: json!({ "command": "echo hello" }),
        };

        let packet = encode_request(7, &payload).unwrap();
        let (msg_type, seq) = decode_header(&packet).unwrap();

        assert_eq!(msg_type, MsgType::Request);
        assert_eq!(seq, 7);

        let decoded = decode_request_payload(&packet[HEADER_LEN..]).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_request_ack_no_payload() {
        let packet = encode_request_ack(42).unwrap();

        assert_eq!(packet.len(), HEADER_LEN);
        let (msg_type, seq) = decode_header(&packet).unwrap();
        assert_eq!(msg_type, MsgType::RequestAck);
        assert_eq!(seq, 42);
    }

    #[test]
    fn test_response_carries_execution_result() {
        let payload = ResponsePayload {
            content: json!({ "stdout": "", "stderr": "oops\n", "return_code": -1 }),
            is_error: false,
        };

        let packet = encode_response(1, &payload).unwrap();
        let decoded = decode_response_payload(&packet[HEADER_LEN..]).unwrap();

        assert_eq!(decoded.content["return_code"], json!(-1));
        assert_eq!(decoded.content["stderr"], json!("oops\n"));
        assert!(!decoded.is_error);
    }

    #[test]
    fn test_response_error_message() {
        let payload = ResponsePayload {
            content: json!("Unknown tool: nope"),
            is_error: true,
        };

        let packet = encode_response(1, &payload).unwrap();
        let decoded = decode_response_payload(&packet[HEADER_LEN..]).unwrap();

        assert!(decoded.is_error);
        assert_eq!(decoded.content.as_str(), Some("Unknown tool: nope"));
    }

    #[test]
    fn test_tool_list_encode_decode() {
        let payload = ToolListPayload {
            server_name: "terminal-server".to_string(),
            tools: vec![ToolDefinition {
                name: "run_command".to_string(),
                description: "Run a terminal command".to_string(),
                input_schema: json!({ "type": "object" }),
                output_schema: None,
            }],
        };

        let packet = encode_tool_list(3, &payload).unwrap();
        let (msg_type, seq) = decode_header(&packet).unwrap();
        assert_eq!(msg_type, MsgType::ToolList);
        assert_eq!(seq, 3);

        let decoded = decode_tool_list_payload(&packet[HEADER_LEN..]).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_small_response_is_single_packet() {
        let payload = ResponsePayload {
            content: json!({ "stdout": "hi\n", "stderr": "", "return_code": 0 }),
            is_error: false,
        };

        let packets = encode_response_packets(4, &payload, 65000).unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(decode_header(&packets[0]).unwrap(), (MsgType::Response, 4));
    }

    #[test]
    fn test_large_response_is_chunked_and_reassembled() {
        let payload = ResponsePayload {
            content: json!({ "stdout": "x".repeat(5000), "stderr": "", "return_code": 0 }),
            is_error: false,
        };

        let packets = encode_response_packets(4, &payload, 1000).unwrap();
        assert!(packets.len() > 1);

        let mut assembler = ChunkAssembler::default();
        let mut result = None;
        // Out of order and with a duplicate
        let mut order: Vec<usize> = (0..packets.len()).rev().collect();
        order.push(0);
        for i in order {
            let packet = &packets[i];
            assert!(packet.len() - HEADER_LEN <= 1000);
            assert_eq!(decode_header(packet).unwrap(), (MsgType::ResponseChunk, 4));
            if let Some(done) = assembler.push(&packet[HEADER_LEN..]).unwrap() {
                result = Some(done);
            }
        }

        assert_eq!(result, Some(payload));
    }

    #[test]
    fn test_invalid_chunk_header() {
        assert!(decode_chunk(&[0, 0, 0]).is_err());
        assert!(decode_chunk(&[0, 0, 0, 2, 0, 0, 0, 2]).is_err());
        assert!(decode_chunk(&[0, 0, 0, 0, 0, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_list_tools_no_payload() {
        let packet = encode_list_tools(9).unwrap();
        assert_eq!(packet.len(), HEADER_LEN);
        assert_eq!(decode_header(&packet).unwrap(), (MsgType::ListTools, 9));
    }

    #[test]
    fn test_invalid_msg_type() {
        let mut packet = vec![0xFFu8];
        packet.extend_from_slice(&1u32.to_be_bytes());

        let result = decode_header(&packet);
        assert!(matches!(result, Err(CommError::DecodeError(_))));
    }

    #[test]
    fn test_truncated_packet() {
        assert!(decode_header(&[0x01, 0x00, 0x00]).is_err());
        assert!(decode_header(&[0x01, 0x00, 0x00, 0x00, 0x01]).is_ok());
    }

    #[test]
    fn test_seq_is_big_endian() {
        let packet = encode_request_ack(256).unwrap();
        assert_eq!(&packet[1..HEADER_LEN], &[0x00, 0x00, 0x01, 0x00]);

        let packet = encode_request_ack(u32::MAX).unwrap();
        assert_eq!(decode_header(&packet).unwrap().1, u32::MAX);
    }

    #[test]
    fn test_garbage_payload_is_decode_error() {
        let result = decode_request_payload(&[0xc1, 0x00]);
        assert!(matches!(result, Err(CommError::DecodeError(_))));
    }

    #[test]
    fn test_special_characters_in_command() {
        let payload = RequestPayload {
            tool: "run_command".to_string(),
            arguments: json!({ "command": "echo '你好🌮' | tr -d '\\n'\r\n" }),
        };

        let packet = encode_request(1, &payload).unwrap();
        let decoded = decode_request_payload(&packet[HEADER_LEN..]).unwrap();
        assert_eq!(decoded.arguments, payload.arguments);
    }
}
