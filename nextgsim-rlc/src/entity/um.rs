//! Unacknowledged Mode entity
//!
//! Segments SDUs to the grant offered by MAC and reassembles received
//! segments in sequence. Lost segments are not recovered: an incomplete SDU
//! is discarded as soon as a gap is detected.
//!
//! The same entity serves multicast (MCH) bearers when configured with
//! `is_mrb`; reassembled SDUs are then delivered through the multicast path.

use crate::buffer::ByteBuffer;
use crate::config::{RlcConfig, RlcMode, UmConfig};
use crate::logging::{log_pdu, Direction};

use super::queue::{Admission, SduQueue};
use super::segment::{Segmenter, HEADER_LEN};
use super::{EntityContext, EntityCore, RlcEntity};

const VALID_SN_FIELD_LENGTHS: [u8; 2] = [5, 10];

/// Unacknowledged Mode entity
pub struct UmEntity {
    core: EntityCore,
    queue: SduQueue,
    segmenter: Segmenter,
    config: UmConfig,
}

impl UmEntity {
    /// Creates an unconfigured UM entity.
    pub fn new(ctx: EntityContext) -> Self {
        let queue = SduQueue::new(ctx.queue_capacity);
        let config = UmConfig::default();
        let segmenter = Segmenter::new(config.sn_field_length, ctx.max_sdu_size);
        Self {
            core: EntityCore::new(ctx),
            queue,
            segmenter,
            config,
        }
    }

    /// Returns true if this entity serves a multicast bearer
    pub fn is_mrb(&self) -> bool {
        self.config.is_mrb
    }
}

impl RlcEntity for UmEntity {
    fn configure(&mut self, config: &RlcConfig) -> bool {
        let RlcConfig::Um(um) = config else {
            return false;
        };
        if !VALID_SN_FIELD_LENGTHS.contains(&um.sn_field_length) {
            tracing::warn!(
                bearer = %self.core.rb_name(),
                sn_field_length = um.sn_field_length,
                "unsupported UM SN field length"
            );
            return false;
        }

        self.config = *um;
        self.segmenter = Segmenter::new(um.sn_field_length, self.core.max_sdu_size);
        self.core.timers.release_all();
        self.core.timers.allocate(um.t_reordering_ms);

        tracing::debug!(
            bearer = %self.core.rb_name(),
            t_reordering_ms = um.t_reordering_ms,
            sn_field_length = um.sn_field_length,
            is_mrb = um.is_mrb,
            "UM entity configured"
        );
        true
    }

    fn stop(&self) {
        self.core.timers.stop_all();
        self.queue.disable();
        self.segmenter.discard_partial();
    }

    fn reestablish(&self) {
        self.core.timers.stop_all();
        self.queue.clear();
        self.segmenter.reset();
        self.queue.enable();
    }

    fn empty_queue(&self) {
        self.queue.clear();
    }

    fn reset_metrics(&self) {
        self.core.reset_metrics();
    }

    fn mode(&self) -> RlcMode {
        RlcMode::Um
    }

    fn lcid(&self) -> u32 {
        self.core.lcid()
    }

    fn set_lcid(&self, lcid: u32) {
        self.core.set_lcid(lcid);
    }

    fn write_sdu(&self, sdu: ByteBuffer, blocking: bool) {
        let len = sdu.len();
        match self.queue.push(sdu, blocking) {
            Admission::Queued => {
                tracing::debug!(bearer = %self.core.rb_name(), len, "UM SDU queued");
            }
            Admission::Full => {
                tracing::warn!(bearer = %self.core.rb_name(), len, "UM queue full, dropping SDU");
            }
            Admission::Disabled => {
                tracing::debug!(bearer = %self.core.rb_name(), len, "UM entity stopped, dropping SDU");
            }
        }
    }

    fn has_data(&self) -> bool {
        !self.queue.is_empty() || self.segmenter.has_partial()
    }

    fn buffer_state(&self) -> usize {
        let (count, bytes) = self.segmenter.pending(&self.queue);
        bytes + count * HEADER_LEN
    }

    fn read_pdu(&self, payload: &mut [u8]) -> usize {
        let n = self.segmenter.read_pdu(&self.queue, payload);
        if n > 0 {
            self.core.add_tx(n);
            log_pdu(Direction::Tx, self.core.lcid(), &payload[..n]);
        }
        n
    }

    fn write_pdu(&self, payload: &[u8]) {
        log_pdu(Direction::Rx, self.core.lcid(), payload);
        self.core.add_rx(payload.len());
        if let Some(sdu) = self.segmenter.write_pdu(payload) {
            self.core.deliver(&sdu, self.config.is_mrb);
        }
    }

    fn num_rx_bytes(&self) -> u64 {
        self.core.num_rx_bytes()
    }

    fn num_tx_bytes(&self) -> u64 {
        self.core.num_tx_bytes()
    }
}
