//! Transparent Mode entity
//!
//! No header and no segmentation: a PDU is exactly one SDU. An SDU that does
//! not fit the capacity offered by MAC stays queued until a large enough grant
//! arrives.

use crate::buffer::ByteBuffer;
use crate::config::{RlcConfig, RlcMode};
use crate::logging::{log_pdu, Direction};

use super::queue::{Admission, SduQueue};
use super::{EntityContext, EntityCore, RlcEntity};

/// Transparent Mode entity
pub struct TmEntity {
    core: EntityCore,
    queue: SduQueue,
}

impl TmEntity {
    /// Creates a TM entity. TM takes no configuration.
    pub fn new(ctx: EntityContext) -> Self {
        let queue = SduQueue::new(ctx.queue_capacity);
        Self {
            core: EntityCore::new(ctx),
            queue,
        }
    }
}

impl RlcEntity for TmEntity {
    fn configure(&mut self, config: &RlcConfig) -> bool {
        matches!(config, RlcConfig::Tm)
    }

    fn stop(&self) {
        self.queue.disable();
    }

    fn reestablish(&self) {
        self.queue.clear();
        self.queue.enable();
    }

    fn empty_queue(&self) {
        self.queue.clear();
    }

    fn reset_metrics(&self) {
        self.core.reset_metrics();
    }

    fn mode(&self) -> RlcMode {
        RlcMode::Tm
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
                tracing::debug!(bearer = %self.core.rb_name(), len, "TM SDU queued");
            }
            Admission::Full => {
                tracing::warn!(bearer = %self.core.rb_name(), len, "TM queue full, dropping SDU");
            }
            Admission::Disabled => {
                tracing::debug!(bearer = %self.core.rb_name(), len, "TM entity stopped, dropping SDU");
            }
        }
    }

    fn has_data(&self) -> bool {
        !self.queue.is_empty()
    }

    fn buffer_state(&self) -> usize {
        self.queue.occupancy().1
    }

    fn read_pdu(&self, payload: &mut [u8]) -> usize {
        let capacity = payload.len();
        let Some(sdu) = self.queue.pop_if(|sdu| sdu.len() <= capacity) else {
            if let Some(head) = self.queue.front_len() {
                tracing::info!(
                    bearer = %self.core.rb_name(),
                    sdu_len = head,
                    capacity,
                    "TM SDU does not fit the grant"
                );
            }
            return 0;
        };
        let len = sdu.len();
        payload[..len].copy_from_slice(&sdu);
        self.core.add_tx(len);
        log_pdu(Direction::Tx, self.core.lcid(), &payload[..len]);
        len
    }

    fn write_pdu(&self, payload: &[u8]) {
        log_pdu(Direction::Rx, self.core.lcid(), payload);
        self.core.add_rx(payload.len());
        self.core.deliver(payload, false);
    }

    fn num_rx_bytes(&self) -> u64 {
        self.core.num_rx_bytes()
    }

    fn num_tx_bytes(&self) -> u64 {
        self.core.num_tx_bytes()
    }
}
