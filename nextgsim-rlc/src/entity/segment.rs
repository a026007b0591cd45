//! Segmentation and in-order reassembly shared by UM and AM
//!
//! PDU layout:
//!
//! ```text
//!  0                   1
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5
//! +---+---------------------------+-----------
//! |SI |            SN             |  data ...
//! +---+---------------------------+-----------
//! ```
//!
//! SI tells whether the data field carries a full SDU or its first, middle or
//! last segment. SN increments once per PDU modulo `2^sn_field_length`.

use bytes::BytesMut;
use parking_lot::Mutex;

use crate::buffer::ByteBuffer;

use super::queue::SduQueue;

/// Header length in bytes
pub(crate) const HEADER_LEN: usize = 2;

const SN_BITS_MAX: u8 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentInfo {
    Full = 0,
    First = 1,
    Last = 2,
    Middle = 3,
}

impl SegmentInfo {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => SegmentInfo::Full,
            1 => SegmentInfo::First,
            2 => SegmentInfo::Last,
            _ => SegmentInfo::Middle,
        }
    }
}

#[derive(Debug, Default)]
struct TxState {
    next_sn: u16,
    /// SDU being segmented and the offset of its first unsent byte
    partial: Option<(ByteBuffer, usize)>,
}

#[derive(Debug, Default)]
struct RxState {
    expected_sn: Option<u16>,
    reassembly: Option<BytesMut>,
}

/// Sequence-numbered segmenting transmitter and reassembling receiver.
#[derive(Debug)]
pub(crate) struct Segmenter {
    sn_mask: u16,
    max_sdu_size: usize,
    tx: Mutex<TxState>,
    rx: Mutex<RxState>,
}

impl Segmenter {
    /// Reassembled SDUs are capped at `max_sdu_size` bytes.
    pub(crate) fn new(sn_field_length: u8, max_sdu_size: usize) -> Self {
        let bits = sn_field_length.min(SN_BITS_MAX);
        Self {
            sn_mask: ((1u32 << bits) - 1) as u16,
            max_sdu_size,
            tx: Mutex::new(TxState::default()),
            rx: Mutex::new(RxState::default()),
        }
    }

    /// Builds one PDU from the SDU being segmented or the queue head.
    pub(crate) fn read_pdu(&self, queue: &SduQueue, payload: &mut [u8]) -> usize {
        if payload.len() <= HEADER_LEN {
            return 0;
        }
        let room = payload.len() - HEADER_LEN;

        let mut tx = self.tx.lock();
        let (sdu, offset) = match tx.partial.take() {
            Some(partial) => partial,
            None => match queue.pop() {
                Some(sdu) => (sdu, 0),
                None => return 0,
            },
        };

        let remaining = sdu.len() - offset;
        let chunk = remaining.min(room);
        let complete = chunk == remaining;
        let si = match (offset == 0, complete) {
            (true, true) => SegmentInfo::Full,
            (true, false) => SegmentInfo::First,
            (false, true) => SegmentInfo::Last,
            (false, false) => SegmentInfo::Middle,
        };

        let sn = tx.next_sn;
        tx.next_sn = sn.wrapping_add(1) & self.sn_mask;

        payload[0] = ((si as u8) << 6) | ((sn >> 8) as u8 & 0x3F);
        payload[1] = (sn & 0xFF) as u8;
        payload[HEADER_LEN..HEADER_LEN + chunk].copy_from_slice(&sdu[offset..offset + chunk]);

        if !complete {
            tx.partial = Some((sdu, offset + chunk));
        }
        HEADER_LEN + chunk
    }

    /// Consumes one PDU. Returns a complete SDU when one has been reassembled.
    pub(crate) fn write_pdu(&self, pdu: &[u8]) -> Option<BytesMut> {
        if pdu.len() < HEADER_LEN {
            tracing::debug!(len = pdu.len(), "PDU shorter than header, dropping");
            return None;
        }
        let si = SegmentInfo::from_bits(pdu[0] >> 6);
        let sn = ((u16::from(pdu[0] & 0x3F) << 8) | u16::from(pdu[1])) & self.sn_mask;
        let data = &pdu[HEADER_LEN..];

        let mut rx = self.rx.lock();
        let in_sequence = rx.expected_sn.map_or(true, |expected| expected == sn);
        rx.expected_sn = Some(sn.wrapping_add(1) & self.sn_mask);

        match si {
            SegmentInfo::Full => {
                if rx.reassembly.take().is_some() {
                    tracing::debug!(sn, "discarding incomplete SDU");
                }
                if data.len() > self.max_sdu_size {
                    self.warn_oversized(sn, data.len());
                    return None;
                }
                Some(BytesMut::from(data))
            }
            SegmentInfo::First => {
                if rx.reassembly.take().is_some() {
                    tracing::debug!(sn, "discarding incomplete SDU");
                }
                if data.len() > self.max_sdu_size {
                    self.warn_oversized(sn, data.len());
                    return None;
                }
                rx.reassembly = Some(BytesMut::from(data));
                None
            }
            SegmentInfo::Middle | SegmentInfo::Last => match rx.reassembly.take() {
                Some(sdu) if in_sequence && sdu.len() + data.len() > self.max_sdu_size => {
                    self.warn_oversized(sn, sdu.len() + data.len());
                    None
                }
                Some(mut sdu) if in_sequence => {
                    sdu.extend_from_slice(data);
                    if si == SegmentInfo::Last {
                        Some(sdu)
                    } else {
                        rx.reassembly = Some(sdu);
                        None
                    }
                }
                _ => {
                    tracing::debug!(sn, "segment out of sequence, discarding");
                    None
                }
            },
        }
    }

    fn warn_oversized(&self, sn: u16, len: usize) {
        tracing::warn!(
            sn,
            len,
            max = self.max_sdu_size,
            "reassembled SDU exceeds maximum size, discarding"
        );
    }

    /// SDUs with at least one byte not yet sent, including the one being segmented
    pub(crate) fn pending(&self, queue: &SduQueue) -> (usize, usize) {
        let tx = self.tx.lock();
        let (count, bytes) = queue.occupancy();
        match &tx.partial {
            Some((sdu, offset)) => (count + 1, bytes + sdu.len() - offset),
            None => (count, bytes),
        }
    }

    pub(crate) fn has_partial(&self) -> bool {
        self.tx.lock().partial.is_some()
    }

    /// Drops the SDU being segmented.
    pub(crate) fn discard_partial(&self) {
        self.tx.lock().partial = None;
    }

    /// Resets sequence numbering and drops all segmentation state.
    pub(crate) fn reset(&self) {
        *self.tx.lock() = TxState::default();
        *self.rx.lock() = RxState::default();
    }
}
