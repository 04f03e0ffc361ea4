//! End-to-end session behavior against a scripted device on a mock transport.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use sumo_frame::{
    codes, decode_frame, AckFrame, Frame, ImageFrame, IoctlFrame, IoctlPayload, IOCTL_EXT,
};
use sumo_session::{MemorySink, NullSink, Session, SessionConfig, SessionError};
use sumo_transport::{DatagramTransport, MockTransport};

/// Acks every command and answers the initialization requests like a device.
struct ScriptedDevice {
    stop: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<Vec<IoctlFrame>>>,
}

impl ScriptedDevice {
    fn start(mock: &MockTransport) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let thread = {
            let mock = mock.clone();
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut seen = 0;
                let mut ack_seq = 1u8;
                let mut report_seq = 1u8;
                let mut commands = Vec::new();

                while !stop.load(Ordering::SeqCst) {
                    let sent = mock.wait_for_sent(seen + 1, Duration::from_millis(10));
                    for datagram in &sent[seen..] {
                        let Ok(Frame::Ioctl(io)) = decode_frame(datagram) else {
                            continue;
                        };
                        let ack = AckFrame::for_frame(ack_seq, io.ext, io.seqno);
                        ack_seq = ack_seq.wrapping_add(1);
                        mock.inject(&Frame::Ack(ack).to_bytes().expect("encodes"));

                        for (code, payload) in answers(&io) {
                            let mut report = IoctlFrame::new(report_seq, code, 0, payload);
                            report.ext = 0x0b;
                            report_seq = report_seq.wrapping_add(1);
                            mock.inject(&Frame::Ioctl(report).to_bytes().expect("encodes"));
                        }
                        commands.push(io);
                    }
                    seen = sent.len();
                }
                commands
            })
        };
        Self {
            stop,
            thread: Some(thread),
        }
    }

    fn finish(mut self) -> Vec<IoctlFrame> {
        self.stop.store(true, Ordering::SeqCst);
        self.thread
            .take()
            .expect("device running")
            .join()
            .expect("device thread should complete")
    }
}

fn answers(io: &IoctlFrame) -> Vec<((u8, u8), IoctlPayload)> {
    match (io.code(), &io.payload) {
        (codes::SET_DATE, IoctlPayload::Text(date)) => {
            vec![(codes::DATE_CONFIRM, IoctlPayload::Text(date.clone()))]
        }
        (codes::SET_TIME, IoctlPayload::Text(time)) => {
            vec![(codes::TIME_CONFIRM, IoctlPayload::Text(time.clone()))]
        }
        (codes::REQUEST_INFO, _) => vec![
            (codes::NAME, IoctlPayload::Text("JS-test".into())),
            (
                codes::VERSIONS,
                IoctlPayload::TextPair("1.99.0".into(), "HW_01".into()),
            ),
            (codes::BATTERY, IoctlPayload::U8(88)),
            (codes::INFO_COMPLETE, IoctlPayload::Empty),
        ],
        _ => Vec::new(),
    }
}

fn config() -> SessionConfig {
    SessionConfig {
        date_wait: Duration::from_secs(1),
        time_wait: Duration::from_secs(1),
        info_wait: Duration::from_secs(1),
        ack_timeout: Duration::from_secs(1),
        ..SessionConfig::default()
    }
}

#[test]
fn initialization_sequence_completes_against_device() {
    let mock = MockTransport::new();
    let device = ScriptedDevice::start(&mock);
    let session = Session::attach(Arc::new(mock.clone()), config(), Box::new(NullSink))
        .expect("session should attach");

    let report = session.initialize().expect("initialize");
    assert!(report.is_complete(), "{report:?}");
    let date = report.date_confirmed.expect("date confirmed");
    assert_eq!(date.len(), 10);
    assert!(report.time_confirmed.expect("time confirmed").starts_with('T'));

    assert_eq!(session.battery_level(), 88);
    let identity = session.identity();
    assert_eq!(identity.name.as_deref(), Some("JS-test"));
    assert_eq!(identity.hardware_version.as_deref(), Some("HW_01"));

    session.close();
    let commands = device.finish();

    let codes: Vec<(u8, u8)> = commands.iter().map(IoctlFrame::code).collect();
    assert_eq!(codes, vec![(4, 1), (4, 2), (2, 0), (4, 0), (18, 0), (8, 0)]);
    let seqnos: Vec<u8> = commands.iter().map(|io| io.seqno).collect();
    assert_eq!(seqnos, vec![1, 2, 3, 4, 5, 6]);
    assert!(commands.iter().all(|io| io.ext == IOCTL_EXT));
    assert_eq!(commands[4].payload, IoctlPayload::U8(1));
}

#[test]
fn channels_count_independently() {
    let mock = MockTransport::new();
    let device = ScriptedDevice::start(&mock);
    let session = Session::attach(Arc::new(mock.clone()), config(), Box::new(NullSink))
        .expect("session should attach");

    session.high_jump().expect("jump");
    session.drive(20, 0);
    let deadline = Instant::now() + Duration::from_secs(1);
    while Instant::now() < deadline {
        let moves = mock
            .sent()
            .iter()
            .filter(|d| matches!(decode_frame(d), Ok(Frame::Move(_))))
            .count();
        if moves >= 3 {
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }
    session.drive(0, 0);
    session.slalom().expect("slalom");

    session.close();
    device.finish();

    let mut command_seqnos = Vec::new();
    let mut move_seqnos = Vec::new();
    let mut ack_seqnos = Vec::new();
    for datagram in mock.sent() {
        match decode_frame(&datagram).expect("decodes") {
            Frame::Ioctl(io) => command_seqnos.push(io.seqno),
            Frame::Move(m) => move_seqnos.push(m.seqno),
            Frame::Ack(a) => ack_seqnos.push(a.seqno),
            other => panic!("unexpected frame {other:?}"),
        }
    }

    assert_eq!(command_seqnos, vec![1, 2]);
    assert!(move_seqnos.len() >= 3);
    assert!(move_seqnos.iter().enumerate().all(|(i, &s)| s as usize == i + 1));
    assert!(ack_seqnos.is_empty());
}

#[test]
fn video_frames_reach_sink_in_order() {
    let mock = MockTransport::new();
    let sink = MemorySink::new();
    let session = Session::attach(Arc::new(mock.clone()), config(), Box::new(sink.clone()))
        .expect("session should attach");

    let mut datagram = Vec::new();
    for n in 0..3u16 {
        let frame = Frame::Image(ImageFrame {
            ext: 0,
            seqno: n as u8,
            frame_number: 100 + n,
            jpeg: Bytes::from(vec![0xff, 0xd8, n as u8, 0xff, 0xd9]),
        });
        datagram.extend_from_slice(&frame.to_bytes().expect("encodes"));
    }
    mock.inject(&datagram);

    let deadline = Instant::now() + Duration::from_secs(1);
    while sink.len() < 3 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    session.close();

    let numbers: Vec<u16> = sink.frames().iter().map(|(n, _)| *n).collect();
    assert_eq!(numbers, vec![100, 101, 102]);
    assert_eq!(sink.frames()[2].1.as_ref(), &[0xff, 0xd8, 2, 0xff, 0xd9]);
}

#[test]
fn lost_transport_fails_commands() {
    let mock = MockTransport::new();
    let session = Session::attach(Arc::new(mock.clone()), config(), Box::new(NullSink))
        .expect("session should attach");

    mock.close();
    let err = session.swing().unwrap_err();
    assert!(err.is_fatal(), "{err:?}");
    assert!(!session.is_open());
}

#[test]
fn commands_during_close_do_not_hang() {
    let mock = MockTransport::new();
    let session = Arc::new(
        Session::attach(
            Arc::new(mock.clone()),
            SessionConfig {
                ack_timeout: Duration::from_secs(30),
                ..config()
            },
            Box::new(NullSink),
        )
        .expect("session should attach"),
    );

    let caller = {
        let session = Arc::clone(&session);
        thread::spawn(move || session.tap())
    };
    mock.wait_for_sent(1, Duration::from_secs(1));

    let started = Instant::now();
    session.close();
    let result = caller.join().expect("caller should complete");
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(matches!(result, Err(SessionError::Closed)));
}
