use crate::error::ProtocolError;

/// The application-payload collaborator: a tagged union of message variants.
///
/// Each end of a link speaks one envelope type per direction. A variant's
/// numeric tag travels in the frame header and routes the payload to the
/// matching [`wait_for`](crate::Session::wait_for) caller on the far side;
/// the payload bytes themselves are opaque to the protocol stack.
///
/// Implementations are ordinarily Rust enums, where every value has an
/// active variant by construction. [`ProtocolError::NoActiveField`] exists
/// for envelope representations (generated bindings, unions of optionals)
/// that can be empty.
pub trait Envelope: Sized + Send + 'static {
    /// Numeric tag of the active variant.
    fn tag(&self) -> u32;

    /// Serialize the active variant's payload.
    fn encode_payload(&self) -> Result<Vec<u8>, ProtocolError>;

    /// Rebuild an envelope from a tag and its payload bytes.
    fn decode_payload(tag: u32, payload: &[u8]) -> Result<Self, ProtocolError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum Control {
        Echo(Vec<u8>),
        Status(u8),
    }

    impl Envelope for Control {
        fn tag(&self) -> u32 {
            match self {
                Control::Echo(_) => 1,
                Control::Status(_) => 2,
            }
        }

        fn encode_payload(&self) -> Result<Vec<u8>, ProtocolError> {
            Ok(match self {
                Control::Echo(data) => data.clone(),
                Control::Status(code) => vec![*code],
            })
        }

        fn decode_payload(tag: u32, payload: &[u8]) -> Result<Self, ProtocolError> {
            match tag {
                1 => Ok(Control::Echo(payload.to_vec())),
                2 => match payload {
                    [code] => Ok(Control::Status(*code)),
                    _ => Err(ProtocolError::MalformedPayload {
                        tag,
                        reason: format!("expected 1 byte, got {}", payload.len()),
                    }),
                },
                other => Err(ProtocolError::UnknownTag(other)),
            }
        }
    }

    #[test]
    fn roundtrip_by_tag() {
        let msg = Control::Echo(b"abc".to_vec());
        let bytes = msg.encode_payload().expect("payload should encode");
        assert_eq!(Control::decode_payload(msg.tag(), &bytes).expect("payload should decode"), msg);
    }

    #[test]
    fn unknown_tag_rejected() {
        assert!(matches!(
            Control::decode_payload(99, b""),
            Err(ProtocolError::UnknownTag(99))
        ));
    }

    #[test]
    fn malformed_payload_rejected() {
        assert!(matches!(
            Control::decode_payload(2, b"toolong"),
            Err(ProtocolError::MalformedPayload { tag: 2, .. })
        ));
    }
}
