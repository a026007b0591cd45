//! Collaborator interfaces consumed by the RLC layer
//!
//! The layer never owns PDCP or RRC. It holds shared handles to them and
//! calls them synchronously from whichever thread drove the RLC operation.

use crate::buffer::ByteBuffer;

/// Upper-layer (PDCP) interface used by the RLC layer.
///
/// All deliveries are fire-and-forget: ownership of the buffer passes to the
/// upper layer.
pub trait PdcpInterface: Send + Sync {
    /// Delivers a reassembled SDU received on a unicast bearer
    fn write_pdu(&self, lcid: u32, sdu: ByteBuffer);

    /// Delivers a reassembled SDU received on a multicast bearer
    fn write_pdu_mch(&self, lcid: u32, sdu: ByteBuffer);

    /// Delivers a BCCH message received on the BCH (MIB)
    fn write_pdu_bcch_bch(&self, pdu: ByteBuffer);

    /// Delivers a BCCH message received on the DL-SCH (SIBs)
    fn write_pdu_bcch_dlsch(&self, pdu: ByteBuffer);

    /// Delivers a paging message
    fn write_pdu_pcch(&self, pdu: ByteBuffer);
}

/// Control-plane (RRC) interface used by the RLC layer.
///
/// Only used for diagnostics, never for control decisions.
pub trait RrcInterface: Send + Sync {
    /// Human-readable radio bearer name for `lcid`
    fn get_rb_name(&self, lcid: u32) -> String;
}

/// Upper layer that drops everything it receives.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPdcp;

impl PdcpInterface for NullPdcp {
    fn write_pdu(&self, lcid: u32, sdu: ByteBuffer) {
        tracing::trace!(lcid, len = sdu.len(), "discarding SDU");
    }

    fn write_pdu_mch(&self, lcid: u32, sdu: ByteBuffer) {
        tracing::trace!(lcid, len = sdu.len(), "discarding MCH SDU");
    }

    fn write_pdu_bcch_bch(&self, _pdu: ByteBuffer) {}

    fn write_pdu_bcch_dlsch(&self, _pdu: ByteBuffer) {}

    fn write_pdu_pcch(&self, _pdu: ByteBuffer) {}
}

/// Bearer naming following the LTE convention: SRB0-2 on LCIDs 0-2, DRBs after.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticBearerNames;

impl RrcInterface for StaticBearerNames {
    fn get_rb_name(&self, lcid: u32) -> String {
        match lcid {
            0..=2 => format!("SRB{lcid}"),
            _ => format!("DRB{}", lcid - 2),
        }
    }
}
