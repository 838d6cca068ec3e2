use crate::column::{Column, Encoding, ElementType, Value};
use crate::error::{Error, Result};
use crate::frame::DataFrame;

pub const MAX_NAME_SIZE: usize = 64;

pub const RECORD_KIND_COLUMN: u32 = 1;
pub const RECORD_KIND_META: u32 = 2;
pub const RECORD_KIND_EOF: u32 = 3;

/// Encodes a single element as little-endian bytes. Fixed-width types write
/// their raw bytes; `String` is length-prefixed since its size isn't implied
/// by the element type alone.
fn encode_value(element: ElementType, value: &Value) -> Vec<u8> {
    match element {
        ElementType::Bool => vec![if matches!(value, Value::Bool(true)) { 1 } else { 0 }],
        ElementType::I8 => (value.as_f64() as i64 as i8).to_le_bytes().to_vec(),
        ElementType::I16 => (value.as_f64() as i64 as i16).to_le_bytes().to_vec(),
        ElementType::I32 => (value.as_f64() as i64 as i32).to_le_bytes().to_vec(),
        ElementType::I64 | ElementType::TimeNs => match value {
            Value::Int(v) => v.to_le_bytes().to_vec(),
            other => (other.as_f64() as i64).to_le_bytes().to_vec(),
        },
        ElementType::U8 => (value.as_f64() as u64 as u8).to_le_bytes().to_vec(),
        ElementType::U16 => (value.as_f64() as u64 as u16).to_le_bytes().to_vec(),
        ElementType::U32 => (value.as_f64() as u64 as u32).to_le_bytes().to_vec(),
        ElementType::U64 => match value {
            Value::UInt(v) => v.to_le_bytes().to_vec(),
            other => (other.as_f64() as u64).to_le_bytes().to_vec(),
        },
        ElementType::F32 => (value.as_f64() as f32).to_le_bytes().to_vec(),
        ElementType::F64 => value.as_f64().to_le_bytes().to_vec(),
        ElementType::String => {
            let s = match value {
                Value::Str(s) => s.as_str(),
                _ => "",
            };
            let bytes = s.as_bytes();
            let mut out = Vec::with_capacity(4 + bytes.len());
            out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            out.extend_from_slice(bytes);
            out
        }
    }
}

/// Decodes a single element starting at `offset`, advancing `offset` past it.
fn decode_value(element: ElementType, bytes: &[u8], offset: &mut usize) -> Result<Value> {
    let take = |offset: &mut usize, n: usize| -> Result<&[u8]> {
        if *offset + n > bytes.len() {
            return Err(Error::Corrupt {
                reason: "element data truncated".to_string(),
            });
        }
        let slice = &bytes[*offset..*offset + n];
        *offset += n;
        Ok(slice)
    };

    Ok(match element {
        ElementType::Bool => Value::Bool(take(offset, 1)?[0] != 0),
        ElementType::I8 => Value::Int(take(offset, 1)?[0] as i8 as i64),
        ElementType::I16 => Value::Int(i16::from_le_bytes(take(offset, 2)?.try_into().unwrap()) as i64),
        ElementType::I32 => Value::Int(i32::from_le_bytes(take(offset, 4)?.try_into().unwrap()) as i64),
        ElementType::I64 | ElementType::TimeNs => Value::Int(i64::from_le_bytes(take(offset, 8)?.try_into().unwrap())),
        ElementType::U8 => Value::UInt(take(offset, 1)?[0] as u64),
        ElementType::U16 => Value::UInt(u16::from_le_bytes(take(offset, 2)?.try_into().unwrap()) as u64),
        ElementType::U32 => Value::UInt(u32::from_le_bytes(take(offset, 4)?.try_into().unwrap()) as u64),
        ElementType::U64 => Value::UInt(u64::from_le_bytes(take(offset, 8)?.try_into().unwrap())),
        ElementType::F32 => Value::Float(f32::from_le_bytes(take(offset, 4)?.try_into().unwrap()) as f64),
        ElementType::F64 => Value::Float(f64::from_le_bytes(take(offset, 8)?.try_into().unwrap())),
        ElementType::String => {
            let len = u32::from_le_bytes(take(offset, 4)?.try_into().unwrap()) as usize;
            let bytes = take(offset, len)?;
            Value::Str(String::from_utf8_lossy(bytes).into_owned())
        }
    })
}

/// Builds the column records a `FrameSender` posts for a complete frame
/// (spec §4.6): one record per column in insertion order, scalar columns
/// packing their elements back-to-back, nested-list columns prefixing each
/// row with a `u32` element count, followed by the frame's metadata entries
/// as individual META records and a terminal EOF record.
pub fn serialize_frame(frame: &DataFrame) -> Vec<FrameRecord> {
    let mut records: Vec<FrameRecord> = frame
        .column_names()
        .map(|name| name.to_string())
        .collect::<Vec<_>>()
        .into_iter()
        .map(|name| {
            let column = frame.get_column(&name).expect("name came from column_names");
            let encoding = column.encoding();
            let mut data = Vec::new();

            match column {
                Column::Scalar { values, .. } => {
                    for v in values {
                        data.extend_from_slice(&encode_value(encoding.element, v));
                    }
                }
                Column::NestedList { rows, .. } => {
                    for row in rows {
                        data.extend_from_slice(&(row.len() as u32).to_le_bytes());
                    }
                    for row in rows {
                        for v in row {
                            data.extend_from_slice(&encode_value(encoding.element, v));
                        }
                    }
                }
            }

            FrameRecord {
                record_type: RECORD_KIND_COLUMN,
                encoding: encoding.to_wire(),
                num_rows: column.len() as u32,
                name,
                data,
            }
        })
        .collect();

    for name in frame.metadata_names().map(str::to_string).collect::<Vec<_>>() {
        let value = frame.metadata(&name).expect("name came from metadata_names").clone();
        let element = element_type_of(&value);
        let encoding = Encoding::scalar(element).with_roles(crate::column::role::META);
        records.push(FrameRecord {
            record_type: RECORD_KIND_META,
            encoding: encoding.to_wire(),
            num_rows: 1,
            name,
            data: encode_value(element, &value),
        });
    }

    records
}

fn element_type_of(value: &Value) -> ElementType {
    match value {
        Value::Bool(_) => ElementType::Bool,
        Value::Int(_) => ElementType::I64,
        Value::UInt(_) => ElementType::U64,
        Value::Float(_) => ElementType::F64,
        Value::Str(_) => ElementType::String,
    }
}

/// The terminal record a `FrameSender` posts after all column and metadata
/// records, carrying the column count a receiver checks its tally against.
pub fn eof_record(frame: &DataFrame) -> FrameRecord {
    let num_columns = frame.column_names().count() as u32;
    FrameRecord {
        record_type: RECORD_KIND_EOF,
        encoding: 0,
        num_rows: frame.num_rows() as u32,
        name: String::new(),
        data: num_columns.to_le_bytes().to_vec(),
    }
}

/// One record's wire layout: a fixed header followed by the column/metadata
/// name and its raw little-endian payload bytes (spec §4.6; grounded on the
/// original `gdf_rec_t` layout: type, size, encoding, num_rows, name, data).
pub struct FrameRecord {
    pub record_type: u32,
    pub encoding: u32,
    pub num_rows: u32,
    pub name: String,
    pub data: Vec<u8>,
}

impl FrameRecord {
    pub fn serialize(&self) -> Result<Vec<u8>> {
        if self.name.len() >= MAX_NAME_SIZE {
            return Err(Error::Corrupt {
                reason: format!("column name '{}' exceeds {} bytes", self.name, MAX_NAME_SIZE - 1),
            });
        }

        let mut name_field = vec![0u8; MAX_NAME_SIZE];
        name_field[..self.name.len()].copy_from_slice(self.name.as_bytes());

        let size = (16 + MAX_NAME_SIZE + self.data.len()) as u32;

        let mut out = Vec::with_capacity(size as usize);
        out.extend_from_slice(&self.record_type.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(&self.encoding.to_le_bytes());
        out.extend_from_slice(&self.num_rows.to_le_bytes());
        out.extend_from_slice(&name_field);
        out.extend_from_slice(&self.data);

        Ok(out)
    }

    pub fn deserialize(buf: &[u8]) -> Result<Self> {
        let header_len = 16 + MAX_NAME_SIZE;
        if buf.len() < header_len {
            return Err(Error::Corrupt {
                reason: "record shorter than its fixed header".to_string(),
            });
        }

        let record_type = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        let size = u32::from_le_bytes(buf[4..8].try_into().unwrap());
        let encoding = u32::from_le_bytes(buf[8..12].try_into().unwrap());
        let num_rows = u32::from_le_bytes(buf[12..16].try_into().unwrap());

        if buf.len() < size as usize {
            return Err(Error::Corrupt {
                reason: format!("record declares size {size} but only {} bytes are available", buf.len()),
            });
        }

        let name_bytes = &buf[16..16 + MAX_NAME_SIZE];
        let nul = name_bytes.iter().position(|&b| b == 0).unwrap_or(MAX_NAME_SIZE);
        let name = String::from_utf8_lossy(&name_bytes[..nul]).into_owned();

        let data = buf[header_len..size as usize].to_vec();

        Ok(FrameRecord {
            record_type,
            encoding,
            num_rows,
            name,
            data,
        })
    }
}

/// Decodes a COLUMN record's payload into a `Column`, using the encoding's
/// packed value type, role bits and nesting kind (spec §6).
pub fn column_from_record(record: &FrameRecord) -> Result<Column> {
    let encoding = Encoding::from_wire(record.encoding)?;
    let mut offset = 0usize;

    if encoding.nested_list {
        let num_rows = record.num_rows as usize;
        if record.data.len() < num_rows * 4 {
            return Err(Error::Corrupt {
                reason: format!("nested-list column '{}' missing row-length table", record.name),
            });
        }
        let mut lengths = Vec::with_capacity(num_rows);
        for _ in 0..num_rows {
            let len = u32::from_le_bytes(record.data[offset..offset + 4].try_into().unwrap()) as usize;
            offset += 4;
            lengths.push(len);
        }

        let mut column = Column::nested_list(encoding);
        for len in lengths {
            let mut row = Vec::with_capacity(len);
            for _ in 0..len {
                row.push(decode_value(encoding.element, &record.data, &mut offset)?);
            }
            column.push_list(row);
        }
        Ok(column)
    } else {
        let mut column = Column::scalar(encoding);
        for _ in 0..record.num_rows {
            column.push_scalar(decode_value(encoding.element, &record.data, &mut offset)?);
        }
        Ok(column)
    }
}

/// Decodes a META record's single-element payload back into a `Value`.
pub fn value_from_record(record: &FrameRecord) -> Result<Value> {
    let encoding = Encoding::from_wire(record.encoding)?;
    let mut offset = 0usize;
    decode_value(encoding.element, &record.data, &mut offset)
}

/// Combines a frame id and a per-request sub-key into the single key space
/// record transport uses for routing and reassembly (spec §4.6).
pub fn pack_key(frame_key: u32, request_key: u32) -> u64 {
    ((frame_key as u64) << 32) | request_key as u64
}

pub fn unpack_key(key: u64) -> (u32, u32) {
    ((key >> 32) as u32, key as u32)
}
