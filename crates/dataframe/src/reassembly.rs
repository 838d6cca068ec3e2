use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::frame::DataFrame;
use crate::wire::{column_from_record, unpack_key, value_from_record, FrameRecord, RECORD_KIND_COLUMN, RECORD_KIND_EOF};

struct PendingFrame {
    records: Vec<FrameRecord>,
    first_seen: Instant,
}

/// Groups incoming wire records by frame key and turns a complete group back
/// into a `DataFrame`, mirroring the reassembly side of the record transport
/// described in spec §4.6.
pub struct Reassembler {
    pending: HashMap<u32, PendingFrame>,
    timeout: Duration,
}

impl Reassembler {
    pub fn new(timeout: Duration) -> Self {
        Reassembler {
            pending: HashMap::new(),
            timeout,
        }
    }

    /// Registers a record carrying `key = (frame_key << 32) | request_key`.
    /// COLUMN and META records accumulate against the frame; an EOF record
    /// carries the sender's declared column count in its payload and
    /// finalizes the frame once every COLUMN record has arrived.
    pub fn accept(&mut self, key: u64, record: FrameRecord) -> Result<Option<DataFrame>> {
        let (frame_key, _request_key) = unpack_key(key);

        if record.record_type == RECORD_KIND_EOF {
            if record.data.len() < 4 {
                return Err(Error::Corrupt {
                    reason: "EOF record missing num_columns payload".to_string(),
                });
            }
            let expected_columns = u32::from_le_bytes(record.data[..4].try_into().unwrap()) as usize;

            let pending = self.pending.remove(&frame_key).unwrap_or_else(|| PendingFrame {
                records: Vec::new(),
                first_seen: Instant::now(),
            });
            let received_columns = pending.records.iter().filter(|r| r.record_type == RECORD_KIND_COLUMN).count();
            if received_columns != expected_columns {
                return Err(Error::IncompleteFrame {
                    frame_key,
                    received: received_columns,
                    expected: expected_columns,
                });
            }

            return Ok(Some(build_frame(pending.records)?));
        }

        let entry = self.pending.entry(frame_key).or_insert_with(|| PendingFrame {
            records: Vec::new(),
            first_seen: Instant::now(),
        });
        entry.records.push(record);
        Ok(None)
    }

    /// Drops any frame that has been incomplete for longer than the configured
    /// timeout, returning the keys and the error each should be failed with.
    pub fn sweep_expired(&mut self) -> Vec<(u32, Error)> {
        let now = Instant::now();
        let expired: Vec<u32> = self
            .pending
            .iter()
            .filter(|(_, p)| now.duration_since(p.first_seen) >= self.timeout)
            .map(|(k, _)| *k)
            .collect();

        expired
            .into_iter()
            .map(|frame_key| {
                let pending = self.pending.remove(&frame_key).unwrap();
                let err = if pending.records.is_empty() {
                    Error::TimeoutReceivingDataframe { key: frame_key as u64 }
                } else {
                    let received = pending.records.iter().filter(|r| r.record_type == RECORD_KIND_COLUMN).count();
                    Error::IncompleteFrame {
                        frame_key,
                        received,
                        expected: 0,
                    }
                };
                (frame_key, err)
            })
            .collect()
    }
}

fn build_frame(records: Vec<FrameRecord>) -> Result<DataFrame> {
    use crate::wire::RECORD_KIND_META;

    let mut frame = DataFrame::new();

    for record in records {
        match record.record_type {
            RECORD_KIND_COLUMN => {
                let column = column_from_record(&record)?;
                frame.set_column(&record.name, column);
            }
            RECORD_KIND_META => {
                let value = value_from_record(&record)?;
                frame.set_metadata(&record.name, value);
            }
            other => {
                return Err(Error::Corrupt {
                    reason: format!("unexpected record kind {other} in frame body"),
                })
            }
        }
    }

    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::{role, Column, Encoding, ElementType, Value};
    use crate::wire::{eof_record, pack_key, serialize_frame};

    fn column_record(name: &str, values: &[f64], roles: u32) -> FrameRecord {
        let encoding = Encoding::scalar(ElementType::F64).with_roles(roles);
        let mut column = Column::scalar(encoding);
        for &v in values {
            column.push_scalar(v);
        }
        FrameRecord {
            record_type: RECORD_KIND_COLUMN,
            encoding: encoding.to_wire(),
            num_rows: values.len() as u32,
            name: name.to_string(),
            data: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        }
    }

    fn eof(num_columns: u32, num_rows: u32) -> FrameRecord {
        FrameRecord {
            record_type: RECORD_KIND_EOF,
            encoding: 0,
            num_rows,
            name: String::new(),
            data: num_columns.to_le_bytes().to_vec(),
        }
    }

    #[test]
    fn completes_once_the_eof_record_declares_a_matching_column_count() {
        let mut reassembler = Reassembler::new(Duration::from_secs(5));
        let key_x = pack_key(1, 0);
        let key_y = pack_key(1, 1);
        let key_eof = pack_key(1, 2);

        assert!(reassembler.accept(key_x, column_record("x", &[1.0, 2.0], role::X)).unwrap().is_none());
        assert!(reassembler.accept(key_y, column_record("y", &[3.0, 4.0], role::Y)).unwrap().is_none());
        let frame = reassembler.accept(key_eof, eof(2, 2)).unwrap().unwrap();

        assert_eq!(frame.num_rows(), 2);
        assert!(frame.get_column("x").is_ok());
        assert!(frame.get_column("y").is_ok());
    }

    #[test]
    fn eof_rejects_a_frame_with_the_wrong_column_count() {
        let mut reassembler = Reassembler::new(Duration::from_secs(5));
        let key_x = pack_key(3, 0);
        let key_eof = pack_key(3, 1);

        reassembler.accept(key_x, column_record("x", &[1.0], role::NONE)).unwrap();
        let err = reassembler.accept(key_eof, eof(2, 1)).unwrap_err();
        assert!(matches!(err, Error::IncompleteFrame { frame_key: 3, received: 1, expected: 2 }));
    }

    #[test]
    fn meta_records_land_in_the_frame_metadata_dictionary() {
        let mut source = DataFrame::new();
        let mut x = Column::scalar(Encoding::scalar(ElementType::F64).with_roles(role::X));
        x.push_scalar(1.0);
        source.add_column("lon", x).unwrap();
        source.set_metadata("orbit", 1234u64);

        let records = serialize_frame(&source);
        let eof_rec = eof_record(&source);

        let mut reassembler = Reassembler::new(Duration::from_secs(5));
        let mut result = None;
        for (i, record) in records.into_iter().enumerate() {
            result = reassembler.accept(pack_key(9, i as u32), record).unwrap();
        }
        result = reassembler.accept(pack_key(9, 99), eof_rec).unwrap();

        let frame = result.unwrap();
        assert_eq!(frame.metadata("orbit"), Some(&Value::UInt(1234)));
    }

    #[test]
    fn sweep_expired_reports_incomplete_frame_after_timeout() {
        let mut reassembler = Reassembler::new(Duration::from_millis(0));
        let key_x = pack_key(2, 0);
        reassembler.accept(key_x, column_record("x", &[1.0], role::NONE)).unwrap();

        let expired = reassembler.sweep_expired();
        assert_eq!(expired.len(), 1);
        assert!(matches!(expired[0].1, Error::IncompleteFrame { frame_key: 2, received: 1, .. }));
    }
}
