#![cfg(feature = "cli")]

use std::io::{Read, Write};
use std::net::{TcpListener, UdpSocket};
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use sumo_frame::{codes, decode_frame, AckFrame, Frame, IoctlFrame, IoctlPayload};

fn sumo() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_sumo"));
    command.arg("--log-level").arg("error");
    command
}

fn free_udp_port() -> u16 {
    UdpSocket::bind("127.0.0.1:0")
        .and_then(|s| s.local_addr())
        .expect("ephemeral port")
        .port()
}

/// A loopback device: one control-port exchange, then acks every command and
/// answers the initialization requests.
struct FakeDevice {
    control_port: u16,
    stop: Arc<AtomicBool>,
    threads: Vec<thread::JoinHandle<()>>,
}

impl FakeDevice {
    fn start() -> Self {
        let udp = UdpSocket::bind("127.0.0.1:0").expect("device data socket");
        udp.set_read_timeout(Some(Duration::from_millis(50)))
            .expect("read timeout");
        let c2d_port = udp.local_addr().expect("data addr").port();

        let listener = TcpListener::bind("127.0.0.1:0").expect("device control socket");
        let control_port = listener.local_addr().expect("control addr").port();

        let control = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("controller connects");
            let mut buf = [0u8; 512];
            let _ = stream.read(&mut buf).expect("configuration request");
            let reply = format!("{{\"status\":0,\"c2d_port\":{c2d_port}}}\0");
            stream.write_all(reply.as_bytes()).expect("configuration reply");
        });

        let stop = Arc::new(AtomicBool::new(false));
        let data = {
            let stop = Arc::clone(&stop);
            thread::spawn(move || serve_data(&udp, &stop))
        };

        Self {
            control_port,
            stop,
            threads: vec![control, data],
        }
    }
}

impl Drop for FakeDevice {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
    }
}

fn serve_data(udp: &UdpSocket, stop: &AtomicBool) {
    let mut buf = [0u8; 2048];
    let mut ack_seq = 1u8;
    let mut report_seq = 1u8;

    while !stop.load(Ordering::SeqCst) {
        let Ok((len, peer)) = udp.recv_from(&mut buf) else {
            continue;
        };
        let Ok(Frame::Ioctl(io)) = decode_frame(&buf[..len]) else {
            continue;
        };

        let ack = Frame::Ack(AckFrame::for_frame(ack_seq, io.ext, io.seqno));
        ack_seq = ack_seq.wrapping_add(1);
        let _ = udp.send_to(&ack.to_bytes().expect("ack encodes"), peer);

        let reports = match io.code() {
            codes::SET_DATE => vec![(codes::DATE_CONFIRM, IoctlPayload::Text("2026-10-18".into()))],
            codes::SET_TIME => vec![(codes::TIME_CONFIRM, IoctlPayload::Text("T101500+0000".into()))],
            codes::REQUEST_INFO => vec![
                (codes::BATTERY, IoctlPayload::U8(87)),
                (codes::NAME, IoctlPayload::Text("JS-loopback".into())),
                (codes::INFO_COMPLETE, IoctlPayload::Empty),
            ],
            _ => Vec::new(),
        };
        for (code, payload) in reports {
            let report = Frame::Ioctl(IoctlFrame::new(report_seq, code, 0, payload));
            report_seq = report_seq.wrapping_add(1);
            let _ = udp.send_to(&report.to_bytes().expect("report encodes"), peer);
        }
    }
}

#[test]
fn version_prints_package_version() {
    let output = sumo().arg("version").output().expect("version runs");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("sumo {}", env!("CARGO_PKG_VERSION")));
}

#[test]
fn version_extended_lists_defaults() {
    let output = sumo()
        .args(["version", "--extended"])
        .output()
        .expect("version runs");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("default_device: 192.168.2.1"));
    assert!(stdout.contains("control=44444, data=54321"));
}

#[test]
fn decode_splits_packed_datagram() {
    // An ack for seqno 9 followed by a device sync request.
    let hex = "018b0508000000 09 0200030f000000 0100000002000000";
    let output = sumo()
        .args(["--format", "json", "decode", hex])
        .output()
        .expect("decode runs");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("decode output is json");
    let frames = value["frames"].as_array().expect("frames array");
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0]["type"], "ACK");
    assert_eq!(frames[0]["ext"], 0x8b);
    assert_eq!(frames[1]["type"], "SYNC");
    assert_eq!(frames[1]["offset"], 8);
    assert!(value.get("error").is_none());
}

#[test]
fn decode_rejects_invalid_hex() {
    let output = sumo().args(["decode", "0g"]).output().expect("decode runs");
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn decode_reports_truncated_frame() {
    // Declares 40 bytes, carries 8.
    let output = sumo()
        .args(["--format", "json", "decode", "0400012800000000"])
        .output()
        .expect("decode runs");
    assert_eq!(output.status.code(), Some(60));

    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("partial output is json");
    assert!(value["frames"].as_array().expect("frames").is_empty());
    assert!(value["error"].as_str().expect("error").contains("40"));
}

#[test]
fn status_without_device_is_handshake_failure() {
    let control_port = TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .expect("ephemeral port")
        .port();

    let output = sumo()
        .args(["status", "--device", "127.0.0.1", "--connect-timeout", "500ms"])
        .args(["--control-port", &control_port.to_string()])
        .output()
        .expect("status runs");
    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn status_against_loopback_device() {
    let device = FakeDevice::start();
    let d2c_port = free_udp_port();

    let output = sumo()
        .args(["--format", "json", "status", "--device", "127.0.0.1"])
        .args(["--control-port", &device.control_port.to_string()])
        .args(["--d2c-port", &d2c_port.to_string()])
        .output()
        .expect("status runs");
    drop(device);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("status output is json");
    assert_eq!(value["battery"], 87);
    assert_eq!(value["identity"]["name"], "JS-loopback");
    assert_eq!(value["handshake_status"], 0);
    assert_eq!(value["init"]["complete"], true);
}
