use std::sync::Arc;

use sumo_frame::{decode_frame, AckFrame, DeviceReport, Frame, Header};
use tracing::{debug, info, warn};

use crate::queue::ByteQueue;
use crate::sender::{FrameSender, SeqCounter};
use crate::state::DeviceState;
use crate::worker::{QueueConsumer, StopFlag, Worker};

/// Consumes device-originated ioctls, records what they report, and
/// acknowledges every one of them, understood or not.
pub struct InboundProcessor {
    queue: Arc<ByteQueue>,
    sender: Arc<FrameSender>,
    state: Arc<DeviceState>,
    stop: StopFlag,
    seq: SeqCounter,
}

impl InboundProcessor {
    pub fn new(
        queue: Arc<ByteQueue>,
        sender: Arc<FrameSender>,
        state: Arc<DeviceState>,
        stop: StopFlag,
    ) -> Self {
        Self {
            queue,
            sender,
            state,
            stop,
            seq: SeqCounter::new(),
        }
    }

    /// Handle one routed frame. Returns the ack that was sent, if any.
    pub fn process(&mut self, item: &[u8]) -> Option<AckFrame> {
        let header = match Header::decode(item) {
            Ok(header) => header,
            Err(err) => {
                warn!(error = %err, "malformed inbound frame dropped");
                return None;
            }
        };

        match decode_frame(item) {
            Ok(Frame::Ioctl(io)) => {
                let report = DeviceReport::from_ioctl(&io);
                if self.state.apply(&report) {
                    log_report(&report);
                } else {
                    warn!(
                        subtype = io.subtype,
                        func = io.func,
                        seqno = io.seqno,
                        "unhandled ioctl"
                    );
                }
            }
            Ok(other) => warn!(frame = %other, "unexpected frame on ioctl channel"),
            Err(err) => warn!(error = %err, seqno = header.seqno, "undecodable ioctl"),
        }

        let ack = AckFrame::for_frame(self.seq.next(), header.ext, header.seqno);
        match self.sender.send(&Frame::Ack(ack)) {
            Ok(()) => Some(ack),
            Err(_) => None,
        }
    }
}

fn log_report(report: &DeviceReport) {
    match report {
        DeviceReport::Battery(level) => debug!(level, "battery level"),
        DeviceReport::DateConfirmed(date) => debug!(%date, "date confirmed"),
        DeviceReport::TimeConfirmed(time) => debug!(%time, "time confirmed"),
        DeviceReport::InfoComplete => debug!("device info complete"),
        DeviceReport::Name(name) => info!(%name, "device name"),
        other => debug!(report = ?other, "device info"),
    }
}

impl QueueConsumer for InboundProcessor {
    fn queue(&self) -> &ByteQueue {
        &self.queue
    }
}

impl Worker for InboundProcessor {
    fn name(&self) -> &'static str {
        "inbound"
    }

    fn stop_flag(&self) -> &StopFlag {
        &self.stop
    }

    fn run(&mut self) {
        while let Some(item) = self.next_item(&self.stop) {
            self.process(&item);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use sumo_frame::{codes, IoctlFrame, IoctlPayload, ACK};
    use sumo_transport::MockTransport;

    use super::*;
    use crate::worker::spawn;

    fn processor(mock: &MockTransport) -> (InboundProcessor, Arc<DeviceState>) {
        let state = Arc::new(DeviceState::new());
        let processor = InboundProcessor::new(
            Arc::new(ByteQueue::new()),
            Arc::new(FrameSender::new(Arc::new(mock.clone()))),
            Arc::clone(&state),
            StopFlag::new(),
        );
        (processor, state)
    }

    fn inbound(ext: u8, seqno: u8, code: (u8, u8), payload: IoctlPayload) -> Bytes {
        let mut io = IoctlFrame::new(seqno, code, 0, payload);
        io.ext = ext;
        Frame::Ioctl(io).to_bytes().expect("encodes")
    }

    #[test]
    fn every_ioctl_is_acked_from_own_counter() {
        let mock = MockTransport::new();
        let (mut processor, state) = processor(&mock);

        let frames = [
            inbound(0x0b, 40, codes::BATTERY, IoctlPayload::U8(91)),
            inbound(0x0c, 41, (9, 9), IoctlPayload::Raw(Bytes::from_static(b"?"))),
            inbound(0x0b, 42, codes::INFO_COMPLETE, IoctlPayload::Empty),
        ];
        for frame in &frames {
            processor.process(frame);
        }

        let acks: Vec<AckFrame> = mock
            .sent()
            .iter()
            .map(|d| match decode_frame(d).expect("decodes") {
                Frame::Ack(ack) => ack,
                other => panic!("expected ack, got {other:?}"),
            })
            .collect();

        assert_eq!(
            acks,
            vec![
                AckFrame { ext: 0x8b, seqno: 1, acked: 40 },
                AckFrame { ext: 0x8c, seqno: 2, acked: 41 },
                AckFrame { ext: 0x8b, seqno: 3, acked: 42 },
            ]
        );
        assert_eq!(state.battery_level(), 91);
        assert!(state.info_complete.is_resolved());
    }

    #[test]
    fn undecodable_ioctl_is_still_acked() {
        let mock = MockTransport::new();
        let (mut processor, _) = processor(&mock);

        // IOCTL header with a 2-byte body, too short for the ioctl prefix.
        let short = [4u8, 0x0b, 7, 9, 0, 0, 0, 5, 1];
        let ack = processor.process(&short).expect("ack sent");

        assert_eq!(ack, AckFrame { ext: 0x8b, seqno: 1, acked: 7 });
        assert_eq!(mock.sent()[0][0], ACK);
    }

    #[test]
    fn malformed_header_is_not_acked() {
        let mock = MockTransport::new();
        let (mut processor, _) = processor(&mock);

        assert!(processor.process(&[4, 0x0b, 7, 9, 0, 1, 0]).is_none());
        assert!(mock.sent().is_empty());
    }

    #[test]
    fn worker_resolves_confirmations() {
        let mock = MockTransport::new();
        let (processor, state) = processor(&mock);
        let queue = Arc::clone(&processor.queue);
        let handle = spawn(processor).expect("worker should spawn");

        queue.push(inbound(
            0x0b,
            1,
            codes::DATE_CONFIRM,
            IoctlPayload::Text("2014-08-02".into()),
        ));

        assert_eq!(
            state.date.wait(Duration::from_secs(1)).as_deref(),
            Some("2014-08-02")
        );
        mock.wait_for_sent(1, Duration::from_secs(1));
        handle.shutdown(&[&queue]);
    }
}
