use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use sumo_frame::{EnableFlag, Flip, Frame, IoctlFrame, Jump, Maneuver, Special};
use sumo_transport::{DatagramTransport, UdpTransport};
use tracing::{debug, info, warn};

use crate::command::{AckCheck, CommandChannel};
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::handshake::{handshake_client_with_config, HandshakeResult};
use crate::heartbeat::{KeepaliveIn, KeepaliveOut, MotionState};
use crate::image::{ImageChannel, ImageSink, NullSink};
use crate::inbound::InboundProcessor;
use crate::router::{Router, Routes};
use crate::sender::FrameSender;
use crate::state::{DeviceIdentity, DeviceState};
use crate::worker::{spawn, StopFlag, WorkerHandle};

/// Outcome of the initialization sequence run by [`Session::open`].
///
/// Missing confirmations do not fail the session; they are reported here and
/// logged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitReport {
    pub date_confirmed: Option<String>,
    pub time_confirmed: Option<String>,
    pub info_complete: bool,
    /// Initialization commands whose ack never arrived.
    pub unacknowledged: usize,
}

impl InitReport {
    pub fn is_complete(&self) -> bool {
        self.date_confirmed.is_some()
            && self.time_confirmed.is_some()
            && self.info_complete
            && self.unacknowledged == 0
    }
}

/// The session's worker threads, in the order they are stopped.
#[derive(Default)]
struct Workers {
    router: Option<WorkerHandle>,
    inbound: Option<WorkerHandle>,
    keepalive_in: Option<WorkerHandle>,
    keepalive_out: Option<WorkerHandle>,
    image: Option<WorkerHandle>,
}

impl Workers {
    /// Stop and join every worker. The transport must already be closed.
    fn shutdown(self, routes: &Routes, motion: &MotionState) {
        if let Some(router) = self.router {
            router.shutdown(&[]);
        }
        if let Some(inbound) = self.inbound {
            inbound.shutdown(&[&routes.inbound]);
        }

        motion.disable();
        if let Some(handle) = &self.keepalive_in {
            handle.request_stop();
        }
        if let Some(handle) = &self.keepalive_out {
            handle.request_stop();
        }
        routes.keepalive_in.push_sentinel();
        routes.keepalive_out.push_sentinel();
        if let Some(handle) = self.keepalive_in {
            handle.join();
        }
        if let Some(handle) = self.keepalive_out {
            handle.join();
        }

        if let Some(image) = self.image {
            image.shutdown(&[&routes.image]);
        }
    }
}

/// An open connection to one device.
///
/// Owns the data transport and five workers: the router, the two heartbeat
/// loops, the inbound command processor, and the image channel. Command
/// methods block the caller until the device acknowledges, bounded by
/// [`SessionConfig::ack_timeout`]. Dropping the session closes it.
pub struct Session {
    config: SessionConfig,
    transport: Arc<dyn DatagramTransport>,
    sender: Arc<FrameSender>,
    routes: Routes,
    state: Arc<DeviceState>,
    motion: Arc<MotionState>,
    commands: Mutex<CommandChannel>,
    workers: Mutex<Option<Workers>>,
    handshake: Option<HandshakeResult>,
    init_report: Option<InitReport>,
}

impl Session {
    /// Connect to the device with default configuration, discarding video.
    pub fn open() -> Result<Self> {
        Self::open_with_config(SessionConfig::default(), Box::new(NullSink))
    }

    /// Handshake, bind the data socket, start the workers and initialize the
    /// device.
    ///
    /// On failure nothing is left running.
    pub fn open_with_config(config: SessionConfig, sink: Box<dyn ImageSink>) -> Result<Self> {
        let handshake = handshake_client_with_config(&config.handshake)?;

        let peer = SocketAddr::new(config.handshake.device_addr, handshake.c2d_port);
        let transport = UdpTransport::bind_addr(config.handshake.local_data_addr(), peer)
            .and_then(|t| t.with_poll_interval(config.recv_poll))
            .map_err(|err| SessionError::HandshakeFailed(format!("data socket: {err}")))?;

        let mut session = Self::attach(Arc::new(transport), config, sink)?;
        session.handshake = Some(handshake);

        let report = session.initialize()?;
        info!(
            complete = report.is_complete(),
            battery = session.battery_level(),
            "session open"
        );
        session.init_report = Some(report);
        Ok(session)
    }

    /// Start the workers on an already connected transport, without
    /// initializing the device.
    pub fn attach(
        transport: Arc<dyn DatagramTransport>,
        config: SessionConfig,
        sink: Box<dyn ImageSink>,
    ) -> Result<Self> {
        let sender = Arc::new(FrameSender::new(Arc::clone(&transport)));
        let routes = Routes::new();
        let state = Arc::new(DeviceState::new());
        let motion = Arc::new(MotionState::new(config.keepalive_out));
        let commands = CommandChannel::new(
            Arc::clone(&sender),
            Arc::clone(&routes.acks),
            config.ack_timeout,
        );

        let mut workers = Workers::default();
        if let Err(err) = start_workers(
            &mut workers,
            &transport,
            &sender,
            &routes,
            &state,
            &motion,
            &config,
            sink,
        ) {
            transport.close();
            workers.shutdown(&routes, &motion);
            return Err(err);
        }

        Ok(Self {
            config,
            transport,
            sender,
            routes,
            state,
            motion,
            commands: Mutex::new(commands),
            workers: Mutex::new(Some(workers)),
            handshake: None,
            init_report: None,
        })
    }

    /// Run the device initialization sequence.
    ///
    /// Date, then time, then an identity request, each followed by a bounded
    /// wait for the device's confirmation, then the stream enable commands.
    /// Timeouts are logged and recorded in the report; only a lost transport
    /// fails.
    pub fn initialize(&self) -> Result<InitReport> {
        let mut report = InitReport::default();
        let now = chrono::Local::now();
        let date = now.format("%Y-%m-%d").to_string();
        let time = now.format("T%H%M%S%z").to_string();

        self.init_step(&mut report, |seq| IoctlFrame::set_date(seq, &date))?;
        report.date_confirmed = self.state.date.wait(self.config.date_wait);
        if report.date_confirmed.is_none() {
            warn!(timeout = ?self.config.date_wait, "device did not confirm the date");
        }

        self.init_step(&mut report, |seq| IoctlFrame::set_time(seq, &time))?;
        report.time_confirmed = self.state.time.wait(self.config.time_wait);
        if report.time_confirmed.is_none() {
            warn!(timeout = ?self.config.time_wait, "device did not confirm the time");
        }

        self.init_step(&mut report, IoctlFrame::request_info)?;
        report.info_complete = self
            .state
            .info_complete
            .wait(self.config.info_wait)
            .is_some();
        if !report.info_complete {
            warn!(timeout = ?self.config.info_wait, "device info incomplete");
        }

        self.init_step(&mut report, IoctlFrame::enable_stream)?;
        self.init_step(&mut report, |seq| EnableFlag::A.to_ioctl(seq))?;
        self.init_step(&mut report, |seq| EnableFlag::B.to_ioctl(seq))?;

        debug!(?report, "initialization finished");
        Ok(report)
    }

    fn init_step(
        &self,
        report: &mut InitReport,
        build: impl FnOnce(u8) -> IoctlFrame,
    ) -> Result<()> {
        match self.command(build) {
            Ok(_) => Ok(()),
            Err(SessionError::Timeout(_)) => {
                report.unacknowledged += 1;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Write one frame to the device.
    pub fn send(&self, frame: &Frame) -> Result<()> {
        self.sender.send(frame)
    }

    /// Send an ioctl built with the next command seqno and wait for its ack.
    ///
    /// Commands from concurrent callers are serialized: one is in flight at a time.
    pub fn command(&self, build: impl FnOnce(u8) -> IoctlFrame) -> Result<AckCheck> {
        if !self.is_open() {
            return Err(SessionError::Closed);
        }
        self.lock_commands().issue(build)
    }

    /// Set the motion setpoints: speed in -127..=127, turn in -64..=64.
    ///
    /// Move frames are streamed by the heartbeat while either is non-zero;
    /// `drive(0, 0)` stops streaming.
    pub fn drive(&self, speed: i8, turn: i8) {
        self.motion.set(speed, turn);
    }

    pub fn maneuver(&self, maneuver: Maneuver) -> Result<AckCheck> {
        info!(%maneuver, "maneuver");
        self.command(|seq| maneuver.to_ioctl(seq))
    }

    pub fn high_jump(&self) -> Result<AckCheck> {
        self.maneuver(Maneuver::Jump(Jump::High))
    }

    pub fn long_jump(&self) -> Result<AckCheck> {
        self.maneuver(Maneuver::Jump(Jump::Long))
    }

    /// Turn on the spot by `angle` radians.
    pub fn quick_turn(&self, angle: f32) -> Result<AckCheck> {
        self.maneuver(Maneuver::QuickTurn(angle))
    }

    pub fn flip_upside_down(&self) -> Result<AckCheck> {
        self.maneuver(Maneuver::Flip(Flip::UpsideDown))
    }

    pub fn flip_downside_up(&self) -> Result<AckCheck> {
        self.maneuver(Maneuver::Flip(Flip::DownsideUp))
    }

    pub fn handstand_balance(&self) -> Result<AckCheck> {
        self.maneuver(Maneuver::Flip(Flip::Balance))
    }

    pub fn special(&self, special: Special) -> Result<AckCheck> {
        self.maneuver(Maneuver::Special(special))
    }

    pub fn quick_turn_right(&self) -> Result<AckCheck> {
        self.special(Special::QuickTurnRight)
    }

    pub fn look_left_and_right(&self) -> Result<AckCheck> {
        self.special(Special::LookLeftAndRight)
    }

    pub fn tap(&self) -> Result<AckCheck> {
        self.special(Special::Tap)
    }

    pub fn swing(&self) -> Result<AckCheck> {
        self.special(Special::Swing)
    }

    pub fn quick_turn_right_left(&self) -> Result<AckCheck> {
        self.special(Special::QuickTurnRightLeft)
    }

    pub fn turn_and_jump(&self) -> Result<AckCheck> {
        self.special(Special::TurnAndJump)
    }

    pub fn turn_to_balance(&self) -> Result<AckCheck> {
        self.special(Special::TurnToBalance)
    }

    pub fn slalom(&self) -> Result<AckCheck> {
        self.special(Special::Slalom)
    }

    pub fn growing_circles(&self) -> Result<AckCheck> {
        self.special(Special::GrowingCircles)
    }

    /// Last battery level the device reported, in percent.
    pub fn battery_level(&self) -> u8 {
        self.state.battery_level()
    }

    pub fn identity(&self) -> DeviceIdentity {
        self.state.identity()
    }

    pub fn set_keepalive_out(&self, enabled: bool) {
        self.motion.set_keepalive_out(enabled);
    }

    /// The control-port exchange, when the session was opened through it.
    pub fn handshake(&self) -> Option<&HandshakeResult> {
        self.handshake.as_ref()
    }

    /// Outcome of the initialization run by [`open_with_config`](Session::open_with_config).
    pub fn init_report(&self) -> Option<&InitReport> {
        self.init_report.as_ref()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// `false` once closed, or once the transport was lost.
    pub fn is_open(&self) -> bool {
        !self.transport.is_closed() && self.lock_workers().is_some()
    }

    /// Close the transport, then stop and join every worker.
    ///
    /// Idempotent.
    pub fn close(&self) {
        let Some(workers) = self.lock_workers().take() else {
            return;
        };
        info!("closing session");
        self.transport.close();
        workers.shutdown(&self.routes, &self.motion);
        debug!("session closed");
    }

    fn lock_commands(&self) -> MutexGuard<'_, CommandChannel> {
        self.commands.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_workers(&self) -> MutexGuard<'_, Option<Workers>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[allow(clippy::too_many_arguments)]
fn start_workers(
    workers: &mut Workers,
    transport: &Arc<dyn DatagramTransport>,
    sender: &Arc<FrameSender>,
    routes: &Routes,
    state: &Arc<DeviceState>,
    motion: &Arc<MotionState>,
    config: &SessionConfig,
    sink: Box<dyn ImageSink>,
) -> Result<()> {
    let heartbeat_stop = StopFlag::new();
    workers.keepalive_in = Some(spawn(KeepaliveIn::new(
        Arc::clone(&routes.keepalive_in),
        Arc::clone(sender),
        heartbeat_stop.clone(),
    ))?);
    workers.keepalive_out = Some(spawn(KeepaliveOut::new(
        Arc::clone(&routes.keepalive_out),
        Arc::clone(sender),
        Arc::clone(motion),
        config.heartbeat,
        heartbeat_stop,
    ))?);
    workers.image = Some(spawn(ImageChannel::new(
        Arc::clone(&routes.image),
        sink,
        StopFlag::new(),
    ))?);
    workers.inbound = Some(spawn(InboundProcessor::new(
        Arc::clone(&routes.inbound),
        Arc::clone(sender),
        Arc::clone(state),
        StopFlag::new(),
    ))?);
    workers.router = Some(spawn(Router::new(
        Arc::clone(transport),
        routes.clone(),
        StopFlag::new(),
    ))?);
    Ok(())
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("open", &self.is_open())
            .field("battery", &self.battery_level())
            .field("keepalive_out", &self.motion.keepalive_out_enabled())
            .finish()
    }
}
