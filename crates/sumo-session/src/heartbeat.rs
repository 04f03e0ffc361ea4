//! Heartbeat synchronizer: keepalive echo, our own keepalives, and motion
//! streaming.

use std::sync::atomic::{AtomicBool, AtomicI8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use sumo_frame::{decode_frame, Frame, MoveFrame, SyncFrame};
use tracing::{debug, trace, warn};

use crate::config::HeartbeatTiming;
use crate::queue::ByteQueue;
use crate::sender::{FrameSender, SeqCounter};
use crate::worker::{QueueConsumer, StopFlag, Worker};

/// Setpoints and enable flags shared by the caller and the keepalive-out loop.
#[derive(Debug, Default)]
pub struct MotionState {
    speed: AtomicI8,
    turn: AtomicI8,
    motion: AtomicBool,
    keepalive_out: AtomicBool,
}

impl MotionState {
    pub fn new(keepalive_out: bool) -> Self {
        let state = Self::default();
        state.keepalive_out.store(keepalive_out, Ordering::Relaxed);
        state
    }

    /// Update the setpoints. Motion frames are streamed while either is non-zero.
    pub fn set(&self, speed: i8, turn: i8) {
        let speed = speed.clamp(-MoveFrame::MAX_SPEED, MoveFrame::MAX_SPEED);
        let turn = turn.clamp(-MoveFrame::MAX_TURN, MoveFrame::MAX_TURN);
        self.speed.store(speed, Ordering::Relaxed);
        self.turn.store(turn, Ordering::Relaxed);
        self.motion.store(speed != 0 || turn != 0, Ordering::Release);
    }

    pub fn speed(&self) -> i8 {
        self.speed.load(Ordering::Relaxed)
    }

    pub fn turn(&self) -> i8 {
        self.turn.load(Ordering::Relaxed)
    }

    pub fn motion_enabled(&self) -> bool {
        self.motion.load(Ordering::Acquire)
    }

    pub fn set_keepalive_out(&self, enabled: bool) {
        self.keepalive_out.store(enabled, Ordering::Release);
    }

    pub fn keepalive_out_enabled(&self) -> bool {
        self.keepalive_out.load(Ordering::Acquire)
    }

    /// Turn both streams off.
    pub fn disable(&self) {
        self.motion.store(false, Ordering::Release);
        self.keepalive_out.store(false, Ordering::Release);
    }
}

/// Echoes every device-initiated sync frame back with `ext` set to 1.
pub struct KeepaliveIn {
    queue: Arc<ByteQueue>,
    sender: Arc<FrameSender>,
    stop: StopFlag,
}

impl KeepaliveIn {
    pub fn new(queue: Arc<ByteQueue>, sender: Arc<FrameSender>, stop: StopFlag) -> Self {
        Self {
            queue,
            sender,
            stop,
        }
    }
}

impl QueueConsumer for KeepaliveIn {
    fn queue(&self) -> &ByteQueue {
        &self.queue
    }
}

impl Worker for KeepaliveIn {
    fn name(&self) -> &'static str {
        "keepalive-in"
    }

    fn stop_flag(&self) -> &StopFlag {
        &self.stop
    }

    fn run(&mut self) {
        while let Some(item) = self.next_item(&self.stop) {
            match decode_frame(&item) {
                Ok(Frame::Sync(sync)) => {
                    trace!(seqno = sync.seqno, "echoing keepalive");
                    if let Err(err) = self.sender.send(&Frame::Sync(sync.echo())) {
                        debug!(seqno = sync.seqno, error = %err, "keepalive echo not sent");
                    }
                }
                Ok(other) => debug!(frame = %other, "ignoring non-keepalive sync frame"),
                Err(err) => warn!(error = %err, "malformed keepalive dropped"),
            }
        }
    }
}

/// Emits our keepalives (when enabled) and streams move frames while the
/// setpoints are non-zero.
///
/// Keepalives and move frames share one sequence counter.
pub struct KeepaliveOut {
    responses: Arc<ByteQueue>,
    sender: Arc<FrameSender>,
    state: Arc<MotionState>,
    timing: HeartbeatTiming,
    stop: StopFlag,
    seq: SeqCounter,
    epoch: Instant,
}

impl KeepaliveOut {
    pub fn new(
        responses: Arc<ByteQueue>,
        sender: Arc<FrameSender>,
        state: Arc<MotionState>,
        timing: HeartbeatTiming,
        stop: StopFlag,
    ) -> Self {
        Self {
            responses,
            sender,
            state,
            timing,
            stop,
            seq: SeqCounter::new(),
            epoch: Instant::now(),
        }
    }
}

impl Worker for KeepaliveOut {
    fn name(&self) -> &'static str {
        "keepalive-out"
    }

    fn stop_flag(&self) -> &StopFlag {
        &self.stop
    }

    fn run(&mut self) {
        let mut awaiting_response = false;

        while !self.stop.is_stop_requested() {
            let keepalive = self.state.keepalive_out_enabled();
            let motion = self.state.motion_enabled();

            if keepalive {
                if awaiting_response {
                    if self.responses.pop(Some(self.timing.response_poll)).is_some() {
                        awaiting_response = false;
                    }
                } else {
                    let sync = SyncFrame::request(self.seq.next(), self.epoch.elapsed());
                    if self.sender.send(&Frame::Sync(sync)).is_err() {
                        self.stop.sleep(self.timing.send_backoff);
                        continue;
                    }
                    awaiting_response = true;
                }
            }

            if motion {
                let frame = MoveFrame::new(self.seq.next(), self.state.speed(), self.state.turn());
                if let Err(err) = self.sender.send(&Frame::Move(frame)) {
                    debug!(seqno = frame.seqno, error = %err, "move frame not sent");
                }
                self.stop.sleep(self.timing.motion_interval);
            }

            if !keepalive && !motion {
                self.stop.sleep(self.timing.idle_interval);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use sumo_transport::MockTransport;

    use super::*;
    use crate::worker::spawn;

    fn sender(mock: &MockTransport) -> Arc<FrameSender> {
        Arc::new(FrameSender::new(Arc::new(mock.clone())))
    }

    fn fast_timing() -> HeartbeatTiming {
        HeartbeatTiming {
            response_poll: Duration::from_millis(2),
            motion_interval: Duration::from_millis(5),
            idle_interval: Duration::from_millis(5),
            send_backoff: Duration::from_millis(10),
        }
    }

    fn decoded(mock: &MockTransport) -> Vec<Frame> {
        mock.sent()
            .iter()
            .map(|d| decode_frame(d).expect("sent frame decodes"))
            .collect()
    }

    #[test]
    fn keepalive_in_echoes_device_sync() {
        let mock = MockTransport::new();
        let queue = Arc::new(ByteQueue::new());
        let handle = spawn(KeepaliveIn::new(
            Arc::clone(&queue),
            sender(&mock),
            StopFlag::new(),
        ))
        .expect("worker should spawn");

        let sync = SyncFrame {
            ext: 0,
            seqno: 5,
            seconds: 10,
            nanoseconds: 500_000_000,
        };
        queue.push(Frame::Sync(sync).to_bytes().expect("encodes"));

        let sent = mock.wait_for_sent(1, Duration::from_secs(1));
        handle.shutdown(&[&queue]);

        assert_eq!(sent.len(), 1);
        assert_eq!(
            decode_frame(&sent[0]).expect("decodes"),
            Frame::Sync(SyncFrame {
                ext: 1,
                seqno: 5,
                seconds: 10,
                nanoseconds: 500_000_000,
            })
        );
    }

    #[test]
    fn keepalive_in_survives_failed_echo() {
        let mock = MockTransport::new();
        mock.fail_sends(true);
        let queue = Arc::new(ByteQueue::new());
        let handle = spawn(KeepaliveIn::new(
            Arc::clone(&queue),
            sender(&mock),
            StopFlag::new(),
        ))
        .expect("worker should spawn");

        let sync = |seqno| {
            Frame::Sync(SyncFrame {
                ext: 0,
                seqno,
                seconds: 1,
                nanoseconds: 0,
            })
            .to_bytes()
            .expect("encodes")
        };
        queue.push(sync(1));
        let deadline = std::time::Instant::now() + Duration::from_secs(1);
        while !queue.is_empty() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(2));
        }
        std::thread::sleep(Duration::from_millis(20));
        mock.fail_sends(false);
        queue.push(sync(2));

        let sent = mock.wait_for_sent(1, Duration::from_secs(1));
        assert!(!handle.is_finished());
        handle.shutdown(&[&queue]);

        assert_eq!(sent.len(), 1);
        assert_eq!(decode_frame(&sent[0]).expect("decodes").seqno(), 2);
    }

    #[test]
    fn setpoints_enable_motion_streaming() {
        let state = MotionState::new(false);
        state.set(0, 0);
        assert!(!state.motion_enabled());
        state.set(0, -10);
        assert!(state.motion_enabled());
        state.set(-128, 100);
        assert_eq!((state.speed(), state.turn()), (-127, 64));
    }

    #[test]
    fn motion_frames_follow_setpoints_with_own_counter() {
        let mock = MockTransport::new();
        let state = Arc::new(MotionState::new(false));
        state.set(50, -20);
        let responses = Arc::new(ByteQueue::new());
        let handle = spawn(KeepaliveOut::new(
            Arc::clone(&responses),
            sender(&mock),
            Arc::clone(&state),
            fast_timing(),
            StopFlag::new(),
        ))
        .expect("worker should spawn");

        mock.wait_for_sent(3, Duration::from_secs(1));
        handle.shutdown(&[&responses]);

        let frames = decoded(&mock);
        assert!(frames.len() >= 3);
        for (i, frame) in frames.iter().enumerate() {
            match frame {
                Frame::Move(m) => {
                    assert_eq!(m.seqno as usize, i + 1);
                    assert!(m.active);
                    assert_eq!((m.speed, m.turn), (50, -20));
                }
                other => panic!("unexpected frame {other:?}"),
            }
        }
    }

    #[test]
    fn idle_loop_sends_nothing() {
        let mock = MockTransport::new();
        let responses = Arc::new(ByteQueue::new());
        let handle = spawn(KeepaliveOut::new(
            Arc::clone(&responses),
            sender(&mock),
            Arc::new(MotionState::new(false)),
            fast_timing(),
            StopFlag::new(),
        ))
        .expect("worker should spawn");

        std::thread::sleep(Duration::from_millis(30));
        handle.shutdown(&[&responses]);
        assert!(mock.sent().is_empty());
    }

    #[test]
    fn keepalive_out_waits_for_echo_before_next_request() {
        let mock = MockTransport::new();
        let responses = Arc::new(ByteQueue::new());
        let handle = spawn(KeepaliveOut::new(
            Arc::clone(&responses),
            sender(&mock),
            Arc::new(MotionState::new(true)),
            fast_timing(),
            StopFlag::new(),
        ))
        .expect("worker should spawn");

        let first = mock.wait_for_sent(1, Duration::from_secs(1));
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(mock.sent().len(), 1);

        let echo = match decode_frame(&first[0]).expect("decodes") {
            Frame::Sync(sync) => sync.echo(),
            other => panic!("expected sync, got {other:?}"),
        };
        responses.push(Frame::Sync(echo).to_bytes().expect("encodes"));

        let sent = mock.wait_for_sent(2, Duration::from_secs(1));
        handle.shutdown(&[&responses]);

        assert!(sent.len() >= 2);
        match decode_frame(&sent[1]).expect("decodes") {
            Frame::Sync(sync) => {
                assert_eq!(sync.seqno, 2);
                assert!(!sync.is_echo());
            }
            other => panic!("expected sync, got {other:?}"),
        }
    }

    #[test]
    fn keepalive_and_motion_share_one_counter() {
        let mock = MockTransport::new();
        let state = Arc::new(MotionState::new(true));
        state.set(40, 0);
        let responses = Arc::new(ByteQueue::new());
        let handle = spawn(KeepaliveOut::new(
            Arc::clone(&responses),
            sender(&mock),
            Arc::clone(&state),
            fast_timing(),
            StopFlag::new(),
        ))
        .expect("worker should spawn");

        let syncs = |frames: &[Frame]| {
            frames
                .iter()
                .filter(|f| matches!(f, Frame::Sync(_)))
                .count()
        };

        // Moves keep flowing while the first keepalive is unanswered.
        mock.wait_for_sent(5, Duration::from_secs(1));
        std::thread::sleep(Duration::from_millis(20));
        let before_echo = decoded(&mock);
        assert_eq!(syncs(&before_echo), 1);
        let first = match &before_echo[0] {
            Frame::Sync(sync) => *sync,
            other => panic!("expected sync first, got {other:?}"),
        };
        assert_eq!(first.seqno, 1);

        state.set(-30, 10);
        responses.push(Frame::Sync(first.echo()).to_bytes().expect("encodes"));

        let deadline = std::time::Instant::now() + Duration::from_secs(1);
        while syncs(&decoded(&mock)) < 2 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(2));
        }
        let seen = mock.sent().len();
        mock.wait_for_sent(seen + 2, Duration::from_secs(1));
        handle.shutdown(&[&responses]);

        let frames = decoded(&mock);
        assert_eq!(syncs(&frames), 2);
        for pair in frames.windows(2) {
            assert_eq!(pair[1].seqno(), pair[0].seqno().wrapping_add(1));
        }

        let second = frames
            .iter()
            .rposition(|f| matches!(f, Frame::Sync(_)))
            .expect("second keepalive sent");
        let after: Vec<_> = frames[second + 1..]
            .iter()
            .map(|f| match f {
                Frame::Move(m) => (m.speed, m.turn),
                other => panic!("expected move, got {other:?}"),
            })
            .collect();
        assert!(!after.is_empty());
        assert!(after.iter().all(|setpoint| *setpoint == (-30, 10)));
    }
}
