//! Frame format used by [`super::TcpTransport`].
//!
//! Frame format: `[length:4][checksum:4][payload:N]`
//!
//! - **length**: Total frame size including header (little-endian u32)
//! - **checksum**: CRC32C of the payload
//! - **payload**: One encoded [`crate::Message`]

/// Header size: 4 (length) + 4 (checksum) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// Maximum payload size (1MB).
pub const MAX_PAYLOAD_SIZE: usize = 1024 * 1024;

/// Wire format error types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    /// Not enough data to parse the frame.
    #[error("insufficient data: need {needed} bytes, have {have}")]
    InsufficientData {
        /// Minimum bytes required to parse.
        needed: usize,
        /// Actual bytes available.
        have: usize,
    },

    /// Checksum verification failed - data was corrupted.
    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        /// Expected checksum from header.
        expected: u32,
        /// Computed checksum from data.
        actual: u32,
    },

    /// Payload exceeds maximum allowed size.
    #[error("frame too large: {size} bytes (max {MAX_PAYLOAD_SIZE})")]
    FrameTooLarge {
        /// Actual payload size in bytes.
        size: usize,
    },

    /// Length field has an invalid value.
    #[error("invalid frame length: {length}")]
    InvalidLength {
        /// The invalid length value from the header.
        length: u32,
    },
}

fn read_header(data: &[u8]) -> Result<(usize, u32), WireError> {
    let length = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    let checksum = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    if (length as usize) < HEADER_SIZE || length as usize > HEADER_SIZE + MAX_PAYLOAD_SIZE {
        return Err(WireError::InvalidLength { length });
    }
    Ok((length as usize, checksum))
}

fn verify(payload: &[u8], expected: u32) -> Result<(), WireError> {
    let actual = crc32c::crc32c(payload);
    if actual != expected {
        return Err(WireError::ChecksumMismatch { expected, actual });
    }
    Ok(())
}

/// Wrap a payload into a frame.
///
/// # Errors
///
/// Returns `FrameTooLarge` if payload exceeds MAX_PAYLOAD_SIZE.
pub fn serialize_frame(payload: &[u8]) -> Result<Vec<u8>, WireError> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(WireError::FrameTooLarge {
            size: payload.len(),
        });
    }

    let total_length = HEADER_SIZE + payload.len();
    let mut data = Vec::with_capacity(total_length);
    data.extend_from_slice(&(total_length as u32).to_le_bytes());
    data.extend_from_slice(&crc32c::crc32c(payload).to_le_bytes());
    data.extend_from_slice(payload);
    Ok(data)
}

/// Parse one complete frame, validating its checksum.
pub fn deserialize_frame(data: &[u8]) -> Result<Vec<u8>, WireError> {
    if data.len() < HEADER_SIZE {
        return Err(WireError::InsufficientData {
            needed: HEADER_SIZE,
            have: data.len(),
        });
    }
    let (length, checksum) = read_header(data)?;
    if data.len() < length {
        return Err(WireError::InsufficientData {
            needed: length,
            have: data.len(),
        });
    }

    let payload = &data[HEADER_SIZE..length];
    verify(payload, checksum)?;
    Ok(payload.to_vec())
}

/// Try to parse a frame from a buffer that may hold partial data.
///
/// # Returns
///
/// - `Ok(Some((payload, consumed)))` if a complete frame was parsed
/// - `Ok(None)` if more data is needed
/// - `Err` if data is malformed
pub fn try_deserialize_frame(data: &[u8]) -> Result<Option<(Vec<u8>, usize)>, WireError> {
    if data.len() < HEADER_SIZE {
        return Ok(None);
    }
    let (length, checksum) = read_header(data)?;
    if data.len() < length {
        return Ok(None);
    }

    let payload = &data[HEADER_SIZE..length];
    verify(payload, checksum)?;
    Ok(Some((payload.to_vec(), length)))
}
