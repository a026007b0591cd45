//! Acknowledged Mode entity
//!
//! Shares the UM framing with a fixed 10-bit SN. Status reporting and
//! retransmission are not performed; the entity owns the poll-retransmit,
//! reordering and status-prohibit timers so their lifetime follows the
//! entity.

use crate::buffer::ByteBuffer;
use crate::config::{AmConfig, RlcConfig, RlcMode};
use crate::logging::{log_pdu, Direction};

use super::queue::{Admission, SduQueue};
use super::segment::{Segmenter, HEADER_LEN};
use super::{EntityContext, EntityCore, RlcEntity};

const AM_SN_FIELD_LENGTH: u8 = 10;

/// Acknowledged Mode entity
pub struct AmEntity {
    core: EntityCore,
    queue: SduQueue,
    segmenter: Segmenter,
    config: Option<AmConfig>,
}

impl AmEntity {
    /// Creates an unconfigured AM entity.
    pub fn new(ctx: EntityContext) -> Self {
        let queue = SduQueue::new(ctx.queue_capacity);
        let segmenter = Segmenter::new(AM_SN_FIELD_LENGTH, ctx.max_sdu_size);
        Self {
            core: EntityCore::new(ctx),
            queue,
            segmenter,
            config: None,
        }
    }

    /// Applied configuration, if any
    pub fn config(&self) -> Option<&AmConfig> {
        self.config.as_ref()
    }
}

impl RlcEntity for AmEntity {
    fn configure(&mut self, config: &RlcConfig) -> bool {
        let RlcConfig::Am(am) = config else {
            return false;
        };
        if am.max_retx_thresh == 0 {
            tracing::warn!(bearer = %self.core.rb_name(), "AM max_retx_thresh must be non-zero");
            return false;
        }

        self.core.timers.release_all();
        self.core.timers.allocate(am.t_poll_retx_ms);
        self.core.timers.allocate(am.t_reordering_ms);
        self.core.timers.allocate(am.t_status_prohibit_ms);
        self.config = Some(*am);

        tracing::debug!(
            bearer = %self.core.rb_name(),
            t_poll_retx_ms = am.t_poll_retx_ms,
            poll_pdu = ?am.poll_pdu,
            poll_byte_kb = ?am.poll_byte_kb,
            max_retx_thresh = am.max_retx_thresh,
            "AM entity configured"
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
        RlcMode::Am
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
                tracing::debug!(bearer = %self.core.rb_name(), len, "AM SDU queued");
            }
            Admission::Full => {
                tracing::warn!(bearer = %self.core.rb_name(), len, "AM queue full, dropping SDU");
            }
            Admission::Disabled => {
                tracing::debug!(bearer = %self.core.rb_name(), len, "AM entity stopped, dropping SDU");
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
            self.core.deliver(&sdu, false);
        }
    }

    fn num_rx_bytes(&self) -> u64 {
        self.core.num_rx_bytes()
    }

    fn num_tx_bytes(&self) -> u64 {
        self.core.num_tx_bytes()
    }
}
