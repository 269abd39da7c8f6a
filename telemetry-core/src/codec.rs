// Vehicle record wire codec.
// Invariants: fixed-size little-endian layout; encode and decode share the offsets below.

use thiserror::Error;

use crate::model::{Location, VehicleRecord};

pub const MAGIC: u32 = 0x3152_5456; // "VTR1"
pub const SCHEMA_VERSION: u8 = 1;
pub const RECORD_SIZE: usize = 0x14;

const OFFSET_MAGIC: usize = 0x00;
const OFFSET_VERSION: usize = 0x04;
const OFFSET_BRAKE: usize = 0x05;
const OFFSET_RESERVED: usize = 0x06;
const OFFSET_SPEED: usize = 0x08;
const OFFSET_LOCATION_X: usize = 0x0C;
const OFFSET_LOCATION_Y: usize = 0x10;

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum SchemaViolation {
    #[error("expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },
    #[error("bad magic 0x{0:08X}")]
    Magic(u32),
    #[error("unsupported schema version {0}")]
    Version(u8),
    #[error("invalid brake flag {0}")]
    BrakeFlag(u8),
    #[error("reserved field set to 0x{0:04X}")]
    Reserved(u16),
}

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("record truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("record does not match schema: {0}")]
    SchemaMismatch(SchemaViolation),
}

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("encode buffer too small: need {needed} bytes, have {available}")]
pub struct EncodeError {
    pub needed: usize,
    pub available: usize,
}

pub fn encode(record: &VehicleRecord) -> [u8; RECORD_SIZE] {
    let mut out = [0u8; RECORD_SIZE];
    write_record(record, &mut out);
    out
}

pub fn encode_into(record: &VehicleRecord, out: &mut [u8]) -> Result<(), EncodeError> {
    let available = out.len();
    let slot = out.get_mut(..RECORD_SIZE).ok_or(EncodeError {
        needed: RECORD_SIZE,
        available,
    })?;
    write_record(record, slot);
    Ok(())
}

pub fn decode(payload: &[u8]) -> Result<VehicleRecord, DecodeError> {
    let truncated = DecodeError::Truncated {
        expected: RECORD_SIZE,
        actual: payload.len(),
    };
    if payload.len() < RECORD_SIZE {
        return Err(truncated);
    }
    if payload.len() > RECORD_SIZE {
        return Err(DecodeError::SchemaMismatch(SchemaViolation::Length {
            expected: RECORD_SIZE,
            actual: payload.len(),
        }));
    }

    let magic = read_u32(payload, OFFSET_MAGIC).ok_or(truncated)?;
    if magic != MAGIC {
        return Err(DecodeError::SchemaMismatch(SchemaViolation::Magic(magic)));
    }
    let version = read_u8(payload, OFFSET_VERSION).ok_or(truncated)?;
    if version != SCHEMA_VERSION {
        return Err(DecodeError::SchemaMismatch(SchemaViolation::Version(version)));
    }
    let brake_engaged = match read_u8(payload, OFFSET_BRAKE).ok_or(truncated)? {
        0 => false,
        1 => true,
        other => return Err(DecodeError::SchemaMismatch(SchemaViolation::BrakeFlag(other))),
    };
    let reserved = read_u16(payload, OFFSET_RESERVED).ok_or(truncated)?;
    if reserved != 0 {
        return Err(DecodeError::SchemaMismatch(SchemaViolation::Reserved(reserved)));
    }

    Ok(VehicleRecord {
        speed: read_u32(payload, OFFSET_SPEED).ok_or(truncated)?,
        brake_engaged,
        location: Location {
            x: read_i32(payload, OFFSET_LOCATION_X).ok_or(truncated)?,
            y: read_i32(payload, OFFSET_LOCATION_Y).ok_or(truncated)?,
        },
    })
}

fn write_record(record: &VehicleRecord, out: &mut [u8]) {
    out[OFFSET_MAGIC..OFFSET_MAGIC + 4].copy_from_slice(&MAGIC.to_le_bytes());
    out[OFFSET_VERSION] = SCHEMA_VERSION;
    out[OFFSET_BRAKE] = u8::from(record.brake_engaged);
    out[OFFSET_RESERVED..OFFSET_RESERVED + 2].copy_from_slice(&0u16.to_le_bytes());
    out[OFFSET_SPEED..OFFSET_SPEED + 4].copy_from_slice(&record.speed.to_le_bytes());
    out[OFFSET_LOCATION_X..OFFSET_LOCATION_X + 4].copy_from_slice(&record.location.x.to_le_bytes());
    out[OFFSET_LOCATION_Y..OFFSET_LOCATION_Y + 4].copy_from_slice(&record.location.y.to_le_bytes());
}

fn read_u8(payload: &[u8], offset: usize) -> Option<u8> {
    payload.get(offset).copied()
}

fn read_u16(payload: &[u8], offset: usize) -> Option<u16> {
    let bytes = payload.get(offset..offset + 2)?;
    Some(u16::from_le_bytes(bytes.try_into().ok()?))
}

fn read_u32(payload: &[u8], offset: usize) -> Option<u32> {
    let bytes = payload.get(offset..offset + 4)?;
    Some(u32::from_le_bytes(bytes.try_into().ok()?))
}

fn read_i32(payload: &[u8], offset: usize) -> Option<i32> {
    let bytes = payload.get(offset..offset + 4)?;
    Some(i32::from_le_bytes(bytes.try_into().ok()?))
}
