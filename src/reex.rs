use crate::auto_mouse::AutoMouse;
use crate::config::{ReexConfig, SCROLL_DIV_MAX};
use crate::hooks::{DefaultHooks, LayoutAdjust, ReexHooks};
use crate::keycode::{self, KeyEvent, KeyPos, ReexKeycode};
use crate::motion::{Half, MotionAccumulator};
use crate::negotiation::{layout_mask, merge_layout, Negotiation, NegotiationState};
use crate::pressing::PressingKeys;
use crate::record::ConfigRecord;
use crate::report::MouseReport;
use crate::sensor::{MotionSensor, SensorError};
use crate::snap::{ScrollSnapFilter, ScrollSnapMode};
use crate::storage::{ConfigStore, LayoutOptions, StorageError};
use crate::transport::{SplitTransport, TransportError};
use reex_proto::{BallInfo, CpiUpdate, MotionDelta, TransactionId};

/// Which half drives USB. Fixed for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Role {
    /// Connected to the host; emits reports and initiates transactions.
    Primary,
    /// Answers transactions from the primary.
    Secondary,
}

/// Physical side of this half.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Side {
    Left,
    Right,
}

/// State for one keyboard half.
///
/// Constructed once at startup and passed by `&mut` to the polling loop,
/// the transaction responder and the key handler.
pub struct Reex<H: ReexHooks = DefaultHooks> {
    config: ReexConfig,
    hooks: H,
    role: Role,
    side: Side,

    this_have_ball: bool,
    that_have_ball: bool,
    negotiation: Negotiation,

    this_motion: MotionAccumulator,
    that_motion: MotionAccumulator,

    cpi_value: u8,
    /// Needs relaying to the peer.
    cpi_changed: bool,
    /// Needs writing to the local sensor.
    sensor_cpi_dirty: bool,

    scroll_mode: bool,
    scroll_mode_changed: u32,
    scroll_div: u8,
    snap: ScrollSnapFilter,
    auto_mouse: AutoMouse,

    last_report: u32,
    last_motion_pull: u32,

    last_kc: u16,
    last_pos: KeyPos,
    last_mouse: MouseReport,
    pressing: PressingKeys,
}

impl Reex<DefaultHooks> {
    /// Create a new context with the default hooks.
    #[must_use]
    pub fn new(config: ReexConfig, role: Role, side: Side) -> Self {
        Self::with_hooks(config, role, side, DefaultHooks)
    }
}

impl<H: ReexHooks> Reex<H> {
    /// Create a new context with custom hooks.
    #[must_use]
    pub fn with_hooks(config: ReexConfig, role: Role, side: Side, hooks: H) -> Self {
        Self {
            hooks,
            role,
            side,
            this_have_ball: false,
            that_have_ball: false,
            negotiation: Negotiation::new(config.getinfo_interval_ms, config.getinfo_max_attempts),
            this_motion: MotionAccumulator::new(),
            that_motion: MotionAccumulator::new(),
            cpi_value: 0,
            cpi_changed: false,
            sensor_cpi_dirty: false,
            scroll_mode: false,
            scroll_mode_changed: 0,
            scroll_div: 0,
            snap: ScrollSnapFilter::new(config.scroll_snap),
            auto_mouse: AutoMouse::new(config.auto_mouse_timeout_ms),
            last_report: 0,
            last_motion_pull: 0,
            last_kc: 0,
            last_pos: KeyPos::default(),
            last_mouse: MouseReport::default(),
            pressing: PressingKeys::new(),
            config,
        }
    }

    /// Boot sequence: record whether the local sensor came up, restore the
    /// saved settings and fire the `Pending` layout hook.
    pub fn init<S: ConfigStore>(&mut self, this_have_ball: bool, store: &mut S) {
        self.this_have_ball = this_have_ball;
        self.sensor_cpi_dirty = this_have_ball;
        if !self.load(store) {
            debug!("no saved settings, using defaults");
        }
        self.hooks.on_adjust_layout(LayoutAdjust::Pending);
        info!(
            "reex up: role {:?}, side {:?}, ball {}",
            self.role, self.side, this_have_ball
        );
    }

    /// Get a reference to the build configuration.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &ReexConfig {
        &self.config
    }

    /// Whether this half talks to the host.
    #[inline]
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Which half this is.
    #[inline]
    #[must_use]
    pub const fn side(&self) -> Side {
        self.side
    }

    #[inline]
    #[must_use]
    pub fn is_left(&self) -> bool {
        self.side == Side::Left
    }

    /// Get a reference to the hooks.
    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    /// Get a mutable reference to the hooks.
    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    /// Whether the local sensor answered at boot.
    #[inline]
    #[must_use]
    pub const fn this_have_ball(&self) -> bool {
        self.this_have_ball
    }

    /// Peer ball presence; only meaningful once negotiated.
    #[inline]
    #[must_use]
    pub const fn that_have_ball(&self) -> bool {
        self.that_have_ball
    }

    /// Progress of the `GET_INFO` handshake.
    #[inline]
    #[must_use]
    pub const fn negotiation_state(&self) -> NegotiationState {
        self.negotiation.state()
    }

    // ---------------------------------------------------------------------
    // Motion

    /// Get a reference to the accumulator for `half`.
    #[must_use]
    pub fn motion(&self, half: Half) -> &MotionAccumulator {
        match half {
            Half::This => &self.this_motion,
            Half::That => &self.that_motion,
        }
    }

    /// Add raw sensor counts to `half`.
    pub fn accumulate(&self, half: Half, dx: i16, dy: i16) {
        self.motion(half).accumulate(dx, dy);
    }

    /// Read the local sensor into this half's accumulator, first applying
    /// any CPI change.
    pub async fn poll_sensor<S: MotionSensor>(&mut self, sensor: &mut S) -> Result<(), SensorError> {
        if !self.this_have_ball {
            return Ok(());
        }
        if self.sensor_cpi_dirty {
            sensor.set_cpi(self.cpi_register()).await?;
            self.sensor_cpi_dirty = false;
            debug!("sensor cpi register set to {}", self.cpi_register());
        }
        if let Some(m) = sensor.read_motion().await? {
            self.this_motion.accumulate(m.x, m.y);
        }
        Ok(())
    }

    /// Fill `report` from both accumulators.
    ///
    /// Returns `false` without touching the report on the secondary and
    /// while the report interval has not elapsed.
    pub fn get_report(&mut self, report: &mut MouseReport, now: u32) -> bool {
        if self.role != Role::Primary || !self.should_report(now) {
            return false;
        }
        let is_left = self.is_left();
        let scroll_mode = self.scroll_mode;
        self.apply_motion(Half::This, report, is_left, scroll_mode, now);
        // With a ball on this half, the other ball does the opposite job.
        self.apply_motion(
            Half::That,
            report,
            !is_left,
            scroll_mode ^ self.this_have_ball,
            now,
        );
        self.last_mouse = *report;
        true
    }

    fn should_report(&mut self, now: u32) -> bool {
        let interval = self.config.report_interval_ms;
        if interval > 0 {
            if now.wrapping_sub(self.last_report) < interval {
                return false;
            }
            self.last_report = now;
        }
        let inhibit = self.config.scroll_inhibit_ms;
        if inhibit > 0 && now.wrapping_sub(self.scroll_mode_changed) < inhibit {
            self.this_motion.clear();
            self.that_motion.clear();
        }
        true
    }

    fn apply_motion(
        &mut self,
        half: Half,
        report: &mut MouseReport,
        is_left: bool,
        as_scroll: bool,
        now: u32,
    ) {
        if as_scroll {
            let ticks = self.motion(half).drain_as_scroll(self.scroll_divisor());
            self.hooks.map_scroll(ticks, report, is_left);
            self.snap.apply(report, now);
        } else {
            let motion = self.motion(half).drain_as_vector();
            self.hooks.map_move(motion, report, is_left);
        }
    }

    /// The last report produced by [`Self::get_report`].
    #[inline]
    #[must_use]
    pub const fn last_mouse(&self) -> MouseReport {
        self.last_mouse
    }

    // ---------------------------------------------------------------------
    // Split link

    /// Primary-side periodic work: handshake, then motion pull and CPI push
    /// once the peer is known to have a ball.
    pub async fn housekeeping<T, L>(&mut self, transport: &mut T, layout: &mut L, now: u32)
    where
        T: SplitTransport,
        L: LayoutOptions,
    {
        if self.role != Role::Primary {
            return;
        }
        self.negotiate(transport, layout, now).await;
        if self.that_have_ball {
            self.pull_motion(transport, now).await;
            self.push_cpi(transport).await;
        }
    }

    async fn negotiate<T, L>(&mut self, transport: &mut T, layout: &mut L, now: u32)
    where
        T: SplitTransport,
        L: LayoutOptions,
    {
        if !self.negotiation.is_due(now) {
            return;
        }
        let attempt = self.negotiation.begin_attempt(now);
        let mut buf = [0u8; BallInfo::SIZE];
        let reply = match transport.exec(TransactionId::GetInfo, &[], &mut buf).await {
            Ok(n) => match BallInfo::from_bytes(&buf[..n.min(buf.len())]) {
                Ok(info) => Some(info.has_ball()),
                Err(e) => {
                    debug!("GET_INFO #{} bad reply: {:?}", attempt, e);
                    None
                }
            },
            Err(e) => {
                debug!("GET_INFO #{} missed: {:?}", attempt, e);
                None
            }
        };
        let Some(that_have_ball) = self.negotiation.finish_attempt(reply) else {
            return;
        };
        self.that_have_ball = that_have_ball;
        info!("negotiated #{}, peer ball {}", attempt, that_have_ball);

        let mask = layout_mask(self.this_have_ball, that_have_ball, self.is_left());
        if let Some(next) = merge_layout(layout.layout_options(), mask) {
            layout.set_layout_options(next);
        }
        self.hooks.on_adjust_layout(LayoutAdjust::Primary);
    }

    async fn pull_motion<T: SplitTransport>(&mut self, transport: &mut T, now: u32) {
        if now.wrapping_sub(self.last_motion_pull) < self.config.getmotion_interval_ms {
            return;
        }
        let mut buf = [0u8; MotionDelta::SIZE];
        match transport.exec(TransactionId::GetMotion, &[], &mut buf).await {
            Ok(n) => match MotionDelta::from_bytes(&buf[..n.min(buf.len())]) {
                Ok(d) => self.that_motion.accumulate(d.x, d.y),
                Err(e) => debug!("GET_MOTION bad reply: {:?}", e),
            },
            Err(e) => debug!("GET_MOTION missed: {:?}", e),
        }
        self.last_motion_pull = now;
    }

    async fn push_cpi<T: SplitTransport>(&mut self, transport: &mut T) {
        if !self.cpi_changed {
            return;
        }
        let req = CpiUpdate(self.cpi_value).to_bytes();
        match transport.send(TransactionId::SetCpi, &req).await {
            Ok(()) => self.cpi_changed = false,
            Err(e) => debug!("SET_CPI missed: {:?}", e),
        }
    }

    /// Secondary-side responder. Returns the number of response bytes.
    pub fn handle_request(
        &mut self,
        id: TransactionId,
        request: &[u8],
        response: &mut [u8],
    ) -> Result<usize, TransportError> {
        match id {
            TransactionId::GetInfo => {
                let out = response
                    .get_mut(..BallInfo::SIZE)
                    .ok_or(TransportError::Malformed)?;
                out.copy_from_slice(&BallInfo::new(self.this_have_ball).to_bytes());
                self.hooks.on_adjust_layout(LayoutAdjust::Secondary);
                Ok(BallInfo::SIZE)
            }
            TransactionId::GetMotion => {
                let out = response
                    .get_mut(..MotionDelta::SIZE)
                    .ok_or(TransportError::Malformed)?;
                let m = self.this_motion.drain_as_vector();
                out.copy_from_slice(&MotionDelta::from(m).to_bytes());
                Ok(MotionDelta::SIZE)
            }
            TransactionId::SetCpi => {
                let CpiUpdate(cpi) = CpiUpdate::from_bytes(request)?;
                self.set_cpi(cpi);
                Ok(0)
            }
        }
    }

    // ---------------------------------------------------------------------
    // Settings

    /// Effective CPI in units of 100.
    #[must_use]
    pub const fn cpi(&self) -> u8 {
        if self.cpi_value == 0 {
            self.config.cpi_default
        } else {
            self.cpi_value
        }
    }

    /// Value written to the sensor's resolution register.
    #[must_use]
    pub const fn cpi_register(&self) -> u8 {
        self.cpi().saturating_sub(1)
    }

    /// Set CPI (0 selects the default), clamped to `cpi_max`.
    pub fn set_cpi(&mut self, cpi: u8) {
        self.cpi_value = cpi.min(self.config.cpi_max);
        self.cpi_changed = true;
        if self.this_have_ball {
            self.sensor_cpi_dirty = true;
        }
    }

    fn add_cpi(&mut self, delta: i16) {
        let v = (i16::from(self.cpi()) + delta).clamp(1, i16::from(u8::MAX));
        self.set_cpi(v as u8);
    }

    /// Whether the primary ball scrolls instead of moving.
    #[inline]
    #[must_use]
    pub const fn scroll_mode(&self) -> bool {
        self.scroll_mode
    }

    /// Switch scroll mode. A change starts the scroll inhibit window.
    pub fn set_scroll_mode(&mut self, mode: bool, now: u32) {
        if mode != self.scroll_mode {
            self.scroll_mode_changed = now;
        }
        self.scroll_mode = mode;
    }

    /// Effective scroll divider exponent, `1..=7`.
    #[must_use]
    pub const fn scroll_div(&self) -> u8 {
        if self.scroll_div == 0 {
            self.config.scroll_div_default
        } else {
            self.scroll_div
        }
    }

    /// Set the divider (0 selects the default), clamped to 7.
    pub fn set_scroll_div(&mut self, div: u8) {
        self.scroll_div = div.min(SCROLL_DIV_MAX);
    }

    fn add_scroll_div(&mut self, delta: i8) {
        let v = (self.scroll_div() as i8 + delta).max(1);
        self.set_scroll_div(v as u8);
    }

    /// Raw counts per scroll tick.
    #[must_use]
    pub const fn scroll_divisor(&self) -> i16 {
        1 << self.scroll_div().saturating_sub(1)
    }

    #[inline]
    #[must_use]
    pub const fn scroll_snap_mode(&self) -> ScrollSnapMode {
        self.snap.mode()
    }

    /// Select the scroll snap mode.
    pub fn set_scroll_snap_mode(&mut self, mode: ScrollSnapMode) {
        self.snap.set_mode(mode);
    }

    /// Get a reference to the auto mouse settings.
    #[inline]
    #[must_use]
    pub const fn auto_mouse(&self) -> &AutoMouse {
        &self.auto_mouse
    }

    /// Get a mutable reference to the auto mouse settings.
    pub fn auto_mouse_mut(&mut self) -> &mut AutoMouse {
        &mut self.auto_mouse
    }

    /// Whether `keycode` counts as mouse activity for the auto mouse layer.
    #[must_use]
    pub fn is_mouse_record(&self, keycode: u16) -> bool {
        keycode::is_mouse_record(keycode) || self.hooks.is_mouse_record(keycode)
    }

    /// Live settings packed the way they are persisted.
    #[must_use]
    pub fn config_record(&self) -> ConfigRecord {
        let (auto_mouse_enabled, auto_mouse_timeout) = if self.config.auto_mouse {
            (self.auto_mouse.enabled(), self.auto_mouse.timeout_quantized())
        } else {
            (false, 0)
        };
        ConfigRecord {
            cpi: self.cpi_value,
            scroll_div: self.scroll_div,
            auto_mouse_enabled,
            auto_mouse_timeout,
            scroll_snap: if self.config.scroll_snap_lock() {
                self.snap.mode().raw()
            } else {
                0
            },
        }
    }

    /// Apply a record through the clamping setters.
    pub fn apply_record(&mut self, record: ConfigRecord) {
        self.set_cpi(record.cpi);
        self.set_scroll_div(record.scroll_div);
        if self.config.auto_mouse {
            self.auto_mouse.set_enabled(record.auto_mouse_enabled);
            self.auto_mouse
                .set_timeout_quantized(record.auto_mouse_timeout);
        }
        if self.config.scroll_snap_lock() {
            self.snap
                .set_mode(ScrollSnapMode::from_raw(record.scroll_snap));
        }
    }

    /// Restore settings; returns `false` when the store holds none.
    pub fn load<S: ConfigStore>(&mut self, store: &mut S) -> bool {
        match store.read_kb() {
            Some(raw) => {
                self.apply_record(ConfigRecord::from_raw(raw));
                true
            }
            None => false,
        }
    }

    /// Persist the live settings as one [`ConfigRecord`] word.
    pub fn save<S: ConfigStore>(&self, store: &mut S) -> Result<(), StorageError> {
        store.write_kb(self.config_record().to_raw())
    }

    /// Back to defaults (not persisted until saved).
    pub fn reset_settings(&mut self) {
        self.set_cpi(0);
        self.set_scroll_div(0);
        if self.config.auto_mouse {
            self.auto_mouse.reset();
        }
    }

    // ---------------------------------------------------------------------
    // Keys

    #[inline]
    #[must_use]
    pub const fn last_keycode(&self) -> u16 {
        self.last_kc
    }

    #[inline]
    #[must_use]
    pub const fn last_pos(&self) -> KeyPos {
        self.last_pos
    }

    /// Glyphs of the keys currently held.
    #[inline]
    #[must_use]
    pub const fn pressing_keys(&self) -> &PressingKeys {
        &self.pressing
    }

    /// Key handler. Returns `false` when the event was consumed here.
    pub fn process_record<S: ConfigStore>(
        &mut self,
        event: &KeyEvent,
        store: &mut S,
        now: u32,
    ) -> bool {
        self.last_kc = event.keycode;
        self.last_pos = event.pos;
        self.pressing.update(event.keycode, event.pressed);

        if !self.hooks.on_process_record(event) {
            return false;
        }

        let Some(key) = ReexKeycode::from_keycode(event.keycode) else {
            return true;
        };

        if key == ReexKeycode::ScrlMo {
            self.set_scroll_mode(event.pressed, now);
            return true;
        }

        if !event.pressed {
            return true;
        }

        let auto_mouse = self.config.auto_mouse;
        let snap_lock = self.config.scroll_snap_lock();
        match key {
            ReexKeycode::RecRst => self.reset_settings(),
            ReexKeycode::RecSave => {
                if let Err(e) = self.save(store) {
                    warn!("saving settings failed: {:?}", e);
                }
            }
            ReexKeycode::CpiI100 => self.add_cpi(1),
            ReexKeycode::CpiD100 => self.add_cpi(-1),
            ReexKeycode::CpiI1k => self.add_cpi(10),
            ReexKeycode::CpiD1k => self.add_cpi(-10),
            ReexKeycode::ScrlTo => self.set_scroll_mode(!self.scroll_mode, now),
            ReexKeycode::ScrlMo => return true,
            ReexKeycode::ScrlDvi => self.add_scroll_div(1),
            ReexKeycode::ScrlDvd => self.add_scroll_div(-1),
            ReexKeycode::AmlTo if auto_mouse => {
                let enabled = self.auto_mouse.enabled();
                self.auto_mouse.set_enabled(!enabled);
            }
            ReexKeycode::AmlI50 if auto_mouse => self.auto_mouse.step_timeout(true),
            ReexKeycode::AmlD50 if auto_mouse => self.auto_mouse.step_timeout(false),
            ReexKeycode::SsnpVrt if snap_lock => {
                self.set_scroll_snap_mode(ScrollSnapMode::Vertical)
            }
            ReexKeycode::SsnpHor if snap_lock => {
                self.set_scroll_snap_mode(ScrollSnapMode::Horizontal)
            }
            ReexKeycode::SsnpFre if snap_lock => self.set_scroll_snap_mode(ScrollSnapMode::Free),
            // Feature not built in.
            _ => return true,
        }
        false
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::config::ScrollSnapStrategy;
    use crate::motion::Motion;
    use core::future::Future;
    use core::pin::Pin;
    use core::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};
    use std::collections::VecDeque;
    use std::vec;
    use std::vec::Vec;

    // Transport that replays scripted replies and records what was sent.
    struct MockTransport {
        replies: VecDeque<Result<Vec<u8>, TransportError>>,
        send_results: VecDeque<Result<(), TransportError>>,
        execs: Vec<TransactionId>,
        sent: Vec<(TransactionId, Vec<u8>)>,
    }

    impl MockTransport {
        fn new() -> Self {
            Self {
                replies: VecDeque::new(),
                send_results: VecDeque::new(),
                execs: Vec::new(),
                sent: Vec::new(),
            }
        }

        fn reply(mut self, r: Result<Vec<u8>, TransportError>) -> Self {
            self.replies.push_back(r);
            self
        }

        fn count(&self, id: TransactionId) -> usize {
            self.execs.iter().filter(|&&e| e == id).count()
        }
    }

    impl SplitTransport for MockTransport {
        fn exec(
            &mut self,
            id: TransactionId,
            _request: &[u8],
            response: &mut [u8],
        ) -> impl Future<Output = Result<usize, TransportError>> {
            self.execs.push(id);
            let result = match self.replies.pop_front() {
                Some(Ok(bytes)) => {
                    response[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
                Some(Err(e)) => Err(e),
                None => Err(TransportError::Timeout),
            };
            core::future::ready(result)
        }

        fn send(
            &mut self,
            id: TransactionId,
            request: &[u8],
        ) -> impl Future<Output = Result<(), TransportError>> {
            let result = self.send_results.pop_front().unwrap_or(Ok(()));
            if result.is_ok() {
                self.sent.push((id, request.to_vec()));
            }
            core::future::ready(result)
        }
    }

    struct MockLayout {
        value: u32,
        writes: usize,
    }

    impl LayoutOptions for MockLayout {
        fn layout_options(&self) -> u32 {
            self.value
        }

        fn set_layout_options(&mut self, value: u32) {
            self.value = value;
            self.writes += 1;
        }
    }

    #[derive(Default)]
    struct MockStore {
        kb: Option<u32>,
        layers: [Option<u32>; 4],
    }

    impl ConfigStore for MockStore {
        fn read_kb(&mut self) -> Option<u32> {
            self.kb
        }

        fn write_kb(&mut self, raw: u32) -> Result<(), StorageError> {
            self.kb = Some(raw);
            Ok(())
        }

        fn read_layer_word(&mut self, layer: u8) -> Option<u32> {
            self.layers.get(usize::from(layer)).copied().flatten()
        }

        fn write_layer_word(&mut self, layer: u8, raw: u32) -> Result<(), StorageError> {
            let slot = self
                .layers
                .get_mut(usize::from(layer))
                .ok_or(StorageError::OutOfRange)?;
            *slot = Some(raw);
            Ok(())
        }
    }

    struct MockSensor {
        samples: VecDeque<Option<Motion>>,
        cpi_writes: Vec<u8>,
    }

    impl MotionSensor for MockSensor {
        fn read_motion(&mut self) -> impl Future<Output = Result<Option<Motion>, SensorError>> {
            core::future::ready(Ok(self.samples.pop_front().flatten()))
        }

        fn set_cpi(&mut self, register: u8) -> impl Future<Output = Result<(), SensorError>> {
            self.cpi_writes.push(register);
            core::future::ready(Ok(()))
        }
    }

    #[derive(Default)]
    struct RecordingHooks {
        adjusts: Vec<LayoutAdjust>,
        swallow: bool,
    }

    impl ReexHooks for RecordingHooks {
        fn on_adjust_layout(&mut self, adjust: LayoutAdjust) {
            self.adjusts.push(adjust);
        }

        fn on_process_record(&mut self, _event: &KeyEvent) -> bool {
            !self.swallow
        }
    }

    // Helper to run a future to completion (simple blocking executor)
    fn block_on<F: Future>(mut f: F) -> F::Output {
        fn noop_raw_waker() -> RawWaker {
            fn noop(_: *const ()) {}
            fn clone(_: *const ()) -> RawWaker {
                noop_raw_waker()
            }
            static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, noop, noop, noop);
            RawWaker::new(core::ptr::null(), &VTABLE)
        }

        let waker = unsafe { Waker::from_raw(noop_raw_waker()) };
        let mut cx = Context::from_waker(&waker);

        // SAFETY: We don't move f after pinning
        let mut f = unsafe { Pin::new_unchecked(&mut f) };

        match f.as_mut().poll(&mut cx) {
            Poll::Ready(result) => result,
            Poll::Pending => panic!("Mock future returned Pending unexpectedly"),
        }
    }

    fn primary(this_have_ball: bool, side: Side) -> Reex<RecordingHooks> {
        let mut reex = Reex::with_hooks(
            ReexConfig::new(),
            Role::Primary,
            side,
            RecordingHooks::default(),
        );
        reex.init(this_have_ball, &mut MockStore::default());
        reex
    }

    fn press(kc: u16) -> KeyEvent {
        KeyEvent::new(kc, 2, 3, true)
    }

    fn release(kc: u16) -> KeyEvent {
        KeyEvent::new(kc, 2, 3, false)
    }

    fn tap(reex: &mut Reex<impl ReexHooks>, kc: ReexKeycode, store: &mut MockStore) -> bool {
        let handled = reex.process_record(&press(kc.code()), store, 1000);
        reex.process_record(&release(kc.code()), store, 1000);
        handled
    }

    // Negotiation ---------------------------------------------------------

    #[test]
    fn test_negotiation_success_writes_layout_once() {
        let mut reex = primary(true, Side::Left);
        let mut transport = MockTransport::new().reply(Ok(vec![0]));
        let mut layout = MockLayout {
            value: 0xF0,
            writes: 0,
        };

        block_on(reex.housekeeping(&mut transport, &mut layout, 100));
        assert_eq!(transport.count(TransactionId::GetInfo), 0);

        block_on(reex.housekeeping(&mut transport, &mut layout, 500));
        assert_eq!(reex.negotiation_state(), NegotiationState::Negotiated);
        assert!(!reex.that_have_ball());
        assert_eq!(layout.value, 0xF2);
        assert_eq!(layout.writes, 1);
        assert_eq!(
            reex.hooks().adjusts,
            vec![LayoutAdjust::Pending, LayoutAdjust::Primary]
        );

        // Terminal: no further GET_INFO, no further writes.
        for t in (1000..5000).step_by(100) {
            block_on(reex.housekeeping(&mut transport, &mut layout, t));
        }
        assert_eq!(transport.count(TransactionId::GetInfo), 1);
        assert_eq!(layout.writes, 1);
    }

    #[test]
    fn test_negotiation_same_outcome_skips_layout_write() {
        let mut layout = MockLayout {
            value: 0,
            writes: 0,
        };
        for _ in 0..2 {
            let mut reex = primary(true, Side::Right);
            let mut transport = MockTransport::new().reply(Ok(vec![1]));
            block_on(reex.housekeeping(&mut transport, &mut layout, 500));
            assert!(reex.that_have_ball());
        }
        assert_eq!(layout.value, 0b11);
        assert_eq!(layout.writes, 1);
    }

    #[test]
    fn test_negotiation_gives_up_after_max_attempts() {
        let mut reex = primary(true, Side::Left);
        let mut transport = MockTransport::new();
        let mut layout = MockLayout {
            value: 0,
            writes: 0,
        };
        let mut now = 0;
        while reex.negotiation_state() != NegotiationState::Negotiated {
            now += 500;
            block_on(reex.housekeeping(&mut transport, &mut layout, now));
            assert!(now <= 500 * 10);
        }
        assert_eq!(transport.count(TransactionId::GetInfo), 10);
        assert!(!reex.that_have_ball());
        assert_eq!(layout.value, 0b10);
        assert_eq!(transport.count(TransactionId::GetMotion), 0);
    }

    #[test]
    fn test_negotiation_retries_on_interval_only() {
        let mut reex = primary(false, Side::Left);
        let mut transport = MockTransport::new()
            .reply(Err(TransportError::Io))
            .reply(Ok(vec![1]));
        let mut layout = MockLayout {
            value: 0,
            writes: 0,
        };
        block_on(reex.housekeeping(&mut transport, &mut layout, 500));
        assert_eq!(reex.negotiation_state(), NegotiationState::AwaitingPeer);
        block_on(reex.housekeeping(&mut transport, &mut layout, 900));
        assert_eq!(transport.count(TransactionId::GetInfo), 1);
        block_on(reex.housekeeping(&mut transport, &mut layout, 1000));
        assert!(reex.that_have_ball());
        assert_eq!(layout.value, 0b01);
    }

    #[test]
    fn test_one_ball_scenario() {
        // Primary A has a ball, secondary B does not.
        let mut a = primary(true, Side::Left);
        let mut b = Reex::new(ReexConfig::new(), Role::Secondary, Side::Right);
        b.init(false, &mut MockStore::default());

        let mut resp = [0u8; 8];
        let n = b
            .handle_request(TransactionId::GetInfo, &[], &mut resp)
            .unwrap();

        let mut transport = MockTransport::new().reply(Ok(resp[..n].to_vec()));
        let mut layout = MockLayout {
            value: 0,
            writes: 0,
        };
        block_on(a.housekeeping(&mut transport, &mut layout, 500));
        assert_eq!(layout.value, 0b10);
        assert!(!a.that_have_ball());

        for t in (504..600).step_by(4) {
            block_on(a.housekeeping(&mut transport, &mut layout, t));
        }
        assert_eq!(transport.count(TransactionId::GetMotion), 0);
        assert!(transport.sent.is_empty());

        // The secondary never initiates anything.
        let mut b_transport = MockTransport::new();
        block_on(b.housekeeping(&mut b_transport, &mut layout, 1000));
        assert!(b_transport.execs.is_empty());
    }

    // Relay ---------------------------------------------------------------

    fn negotiated_with_peer_ball() -> (Reex<RecordingHooks>, MockTransport, MockLayout) {
        let mut reex = primary(true, Side::Left);
        let mut transport = MockTransport::new().reply(Ok(vec![1]));
        let mut layout = MockLayout {
            value: 0,
            writes: 0,
        };
        block_on(reex.housekeeping(&mut transport, &mut layout, 500));
        assert!(reex.that_have_ball());
        (reex, transport, layout)
    }

    #[test]
    fn test_motion_pull_accumulates_peer_motion() {
        let (mut reex, mut transport, mut layout) = negotiated_with_peer_ball();
        // Already pulled once during the negotiation tick.
        assert_eq!(transport.count(TransactionId::GetMotion), 1);

        transport.replies.push_back(Ok(MotionDelta::new(5, -7).to_bytes().to_vec()));
        transport.replies.push_back(Ok(MotionDelta::new(1, 1).to_bytes().to_vec()));
        block_on(reex.housekeeping(&mut transport, &mut layout, 502));
        assert_eq!(transport.count(TransactionId::GetMotion), 1);
        block_on(reex.housekeeping(&mut transport, &mut layout, 504));
        block_on(reex.housekeeping(&mut transport, &mut layout, 508));
        assert_eq!(transport.count(TransactionId::GetMotion), 3);
        assert_eq!(reex.motion(Half::That).peek(), Motion::new(6, -6));
    }

    #[test]
    fn test_motion_pull_failure_is_no_data() {
        let (mut reex, mut transport, mut layout) = negotiated_with_peer_ball();
        transport.replies.push_back(Err(TransportError::Timeout));
        transport.replies.push_back(Ok(vec![0x01]));
        block_on(reex.housekeeping(&mut transport, &mut layout, 504));
        block_on(reex.housekeeping(&mut transport, &mut layout, 508));
        assert_eq!(reex.motion(Half::That).peek(), Motion::ZERO);
    }

    #[test]
    fn test_cpi_push_clears_flag_only_on_success() {
        let (mut reex, mut transport, mut layout) = negotiated_with_peer_ball();
        transport.sent.clear();

        let mut store = MockStore::default();
        tap(&mut reex, ReexKeycode::CpiI100, &mut store);
        transport.send_results.push_back(Err(TransportError::Busy));

        block_on(reex.housekeeping(&mut transport, &mut layout, 504));
        assert!(transport.sent.is_empty());

        block_on(reex.housekeeping(&mut transport, &mut layout, 508));
        assert_eq!(transport.sent, vec![(TransactionId::SetCpi, vec![6])]);

        block_on(reex.housekeeping(&mut transport, &mut layout, 512));
        assert_eq!(transport.sent.len(), 1);
    }

    #[test]
    fn test_responder_drains_on_get_motion() {
        let mut b = Reex::new(ReexConfig::new(), Role::Secondary, Side::Right);
        b.init(true, &mut MockStore::default());
        b.accumulate(Half::This, 300, -2);

        let mut resp = [0u8; 4];
        assert_eq!(
            b.handle_request(TransactionId::GetMotion, &[], &mut resp),
            Ok(4)
        );
        assert_eq!(MotionDelta::from_bytes(&resp), Ok(MotionDelta::new(300, -2)));
        assert_eq!(b.motion(Half::This).peek(), Motion::ZERO);

        // A short buffer fails without losing motion.
        b.accumulate(Half::This, 1, 1);
        let mut short = [0u8; 2];
        assert_eq!(
            b.handle_request(TransactionId::GetMotion, &[], &mut short),
            Err(TransportError::Malformed)
        );
        assert_eq!(b.motion(Half::This).peek(), Motion::new(1, 1));
    }

    #[test]
    fn test_responder_set_cpi_and_get_info_hook() {
        let mut b = Reex::with_hooks(
            ReexConfig::new(),
            Role::Secondary,
            Side::Right,
            RecordingHooks::default(),
        );
        b.init(true, &mut MockStore::default());
        let mut resp = [0u8; 4];
        assert_eq!(b.handle_request(TransactionId::SetCpi, &[200], &mut resp), Ok(0));
        assert_eq!(b.cpi(), 120);
        assert_eq!(
            b.handle_request(TransactionId::SetCpi, &[], &mut resp),
            Err(TransportError::Malformed)
        );

        assert_eq!(b.handle_request(TransactionId::GetInfo, &[], &mut resp), Ok(1));
        assert_eq!(resp[0], 1);
        assert_eq!(
            b.hooks().adjusts,
            vec![LayoutAdjust::Pending, LayoutAdjust::Secondary]
        );
    }

    // Sensor --------------------------------------------------------------

    #[test]
    fn test_poll_sensor_applies_cpi_then_reads() {
        let mut reex = primary(true, Side::Left);
        let mut sensor = MockSensor {
            samples: VecDeque::from(vec![Some(Motion::new(3, 4)), None]),
            cpi_writes: Vec::new(),
        };
        block_on(reex.poll_sensor(&mut sensor)).unwrap();
        block_on(reex.poll_sensor(&mut sensor)).unwrap();
        assert_eq!(sensor.cpi_writes, vec![4]);
        assert_eq!(reex.motion(Half::This).peek(), Motion::new(3, 4));

        reex.set_cpi(12);
        block_on(reex.poll_sensor(&mut sensor)).unwrap();
        assert_eq!(sensor.cpi_writes, vec![4, 11]);
    }

    #[test]
    fn test_poll_sensor_without_ball_is_noop() {
        let mut reex = primary(false, Side::Left);
        let mut sensor = MockSensor {
            samples: VecDeque::from(vec![Some(Motion::new(3, 4))]),
            cpi_writes: Vec::new(),
        };
        block_on(reex.poll_sensor(&mut sensor)).unwrap();
        assert!(sensor.cpi_writes.is_empty());
        assert_eq!(sensor.samples.len(), 1);
    }

    // Reports -------------------------------------------------------------

    #[test]
    fn test_report_move_and_scroll_split() {
        let mut reex = primary(true, Side::Left);
        reex.accumulate(Half::This, 10, 20);
        reex.accumulate(Half::That, 16, -24);

        let mut r = MouseReport {
            buttons: 1,
            ..MouseReport::default()
        };
        assert!(reex.get_report(&mut r, 100));
        assert_eq!((r.x, r.y), (-10, 20));
        // Divider 4 -> 8 counts per tick; tension swallows h at first.
        assert_eq!((r.h, r.v), (0, 3));
        assert_eq!(r.buttons, 1);
        assert_eq!(reex.last_mouse(), r);
    }

    #[test]
    fn test_report_throttled() {
        let mut reex = primary(true, Side::Left);
        let mut r = MouseReport::default();
        assert!(reex.get_report(&mut r, 100));
        reex.accumulate(Half::This, 5, 5);
        assert!(!reex.get_report(&mut r, 104));
        assert_eq!(reex.motion(Half::This).peek(), Motion::new(5, 5));
        assert!(reex.get_report(&mut r, 108));
        assert_eq!((r.x, r.y), (-5, 5));
    }

    #[test]
    fn test_secondary_never_reports() {
        let mut reex = Reex::new(ReexConfig::new(), Role::Secondary, Side::Left);
        reex.init(true, &mut MockStore::default());
        reex.accumulate(Half::This, 5, 5);
        let mut r = MouseReport::default();
        assert!(!reex.get_report(&mut r, 1000));
        assert_eq!(r, MouseReport::default());
    }

    #[test]
    fn test_scroll_mode_swaps_roles_and_inhibits() {
        let mut reex = primary(true, Side::Left);
        let mut store = MockStore::default();
        reex.process_record(&press(ReexKeycode::ScrlMo.code()), &mut store, 1000);
        assert!(reex.scroll_mode());

        // Motion within the inhibit window is discarded.
        reex.accumulate(Half::This, 80, 80);
        let mut r = MouseReport::default();
        assert!(reex.get_report(&mut r, 1020));
        assert_eq!(r, MouseReport::default());

        reex.accumulate(Half::This, 0, 80);
        reex.accumulate(Half::That, 7, 9);
        assert!(reex.get_report(&mut r, 1060));
        assert_eq!((r.h, r.v), (0, -10));
        assert_eq!((r.x, r.y), (-7, 9));

        reex.process_record(&release(ReexKeycode::ScrlMo.code()), &mut store, 1100);
        assert!(!reex.scroll_mode());
    }

    #[test]
    fn test_scroll_keeps_remainder_between_reports() {
        let cfg = ReexConfig::new().with_scroll_snap(ScrollSnapStrategy::Lock);
        let mut reex = Reex::new(cfg, Role::Primary, Side::Right);
        reex.init(true, &mut MockStore::default());
        reex.set_scroll_mode(true, 0);

        let mut r = MouseReport::default();
        reex.accumulate(Half::This, 0, -12);
        assert!(reex.get_report(&mut r, 100));
        assert_eq!(r.v, 1);
        assert_eq!(reex.motion(Half::This).peek(), Motion::new(0, -4));
        reex.accumulate(Half::This, 0, -4);
        assert!(reex.get_report(&mut r, 108));
        assert_eq!(r.v, 1);
        assert_eq!(reex.motion(Half::This).peek(), Motion::ZERO);
    }

    #[test]
    fn test_no_local_ball_uses_peer_for_pointer() {
        let mut reex = primary(false, Side::Right);
        reex.accumulate(Half::That, 3, 4);
        let mut r = MouseReport::default();
        assert!(reex.get_report(&mut r, 100));
        assert_eq!((r.x, r.y), (-3, 4));
    }

    // Settings ------------------------------------------------------------

    #[test]
    fn test_cpi_clamps() {
        let mut reex = primary(true, Side::Left);
        reex.set_cpi(250);
        assert_eq!(reex.cpi(), 120);
        reex.set_cpi(0);
        assert_eq!(reex.cpi(), 5);
        reex.set_cpi(42);
        assert_eq!(reex.cpi(), 42);
    }

    #[test]
    fn test_cpi_keys_clamp_to_range() {
        let mut reex = primary(true, Side::Left);
        let mut store = MockStore::default();
        for _ in 0..20 {
            tap(&mut reex, ReexKeycode::CpiI1k, &mut store);
        }
        assert_eq!(reex.cpi(), 120);
        for _ in 0..20 {
            tap(&mut reex, ReexKeycode::CpiD1k, &mut store);
        }
        assert_eq!(reex.cpi(), 1);
        tap(&mut reex, ReexKeycode::CpiD100, &mut store);
        assert_eq!(reex.cpi(), 1);
        tap(&mut reex, ReexKeycode::CpiI100, &mut store);
        assert_eq!(reex.cpi(), 2);
    }

    #[test]
    fn test_scroll_div_clamps() {
        let mut reex = primary(true, Side::Left);
        reex.set_scroll_div(9);
        assert_eq!(reex.scroll_div(), 7);
        assert_eq!(reex.scroll_divisor(), 64);
        reex.set_scroll_div(0);
        assert_eq!(reex.scroll_div(), 4);

        let mut store = MockStore::default();
        for _ in 0..10 {
            tap(&mut reex, ReexKeycode::ScrlDvd, &mut store);
        }
        assert_eq!(reex.scroll_div(), 1);
        assert_eq!(reex.scroll_divisor(), 1);
        for _ in 0..10 {
            tap(&mut reex, ReexKeycode::ScrlDvi, &mut store);
        }
        assert_eq!(reex.scroll_div(), 7);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let cfg = ReexConfig::new()
            .with_auto_mouse(true)
            .with_scroll_snap(ScrollSnapStrategy::Lock);
        let mut a = Reex::new(cfg, Role::Primary, Side::Left);
        let mut store = MockStore::default();
        a.init(true, &mut store);
        a.set_cpi(37);
        a.set_scroll_div(2);
        a.auto_mouse_mut().set_enabled(true);
        a.auto_mouse_mut().set_timeout_ms(850);
        a.set_scroll_snap_mode(ScrollSnapMode::Horizontal);
        a.save(&mut store).unwrap();

        let mut b = Reex::new(cfg, Role::Primary, Side::Left);
        b.init(true, &mut store);
        assert_eq!(b.config_record(), a.config_record());
        assert_eq!(b.cpi(), 37);
        assert_eq!(b.scroll_div(), 2);
        assert!(b.auto_mouse().enabled());
        assert_eq!(b.auto_mouse().timeout_ms(), 850);
        assert_eq!(b.scroll_snap_mode(), ScrollSnapMode::Horizontal);
    }

    #[test]
    fn test_new_context_defaults() {
        let reex = Reex::new(ReexConfig::new(), Role::Secondary, Side::Right);
        assert_eq!(reex.role(), Role::Secondary);
        assert_eq!(reex.side(), Side::Right);
        assert!(!reex.is_left());
        assert!(!reex.this_have_ball());
        assert_eq!(reex.negotiation_state(), NegotiationState::NotStarted);
        assert!(!reex.scroll_mode());
        assert_eq!(reex.cpi(), 5);
        assert!(reex.motion(Half::This).peek().is_zero());
        assert!(!reex.pressing_keys().as_bytes().is_empty());
    }

    #[test]
    fn test_save_through_settings_cache_marks_kb_dirty() {
        let mut cache = crate::storage::SettingsCache::<4>::new();
        let mut a = primary(true, Side::Left);
        a.set_cpi(20);
        a.save(&mut cache).unwrap();
        assert_eq!(
            cache.next_dirty(),
            Some((crate::storage::SettingKey::Kb, a.config_record().to_raw()))
        );

        let mut b = Reex::new(ReexConfig::new(), Role::Primary, Side::Left);
        b.init(true, &mut cache);
        assert_eq!(b.cpi(), 20);
    }

    #[test]
    fn test_load_reclamps_out_of_range_values() {
        let mut store = MockStore {
            kb: Some(ConfigRecord {
                cpi: 127,
                scroll_div: 0,
                ..ConfigRecord::default()
            }
            .to_raw()),
            ..MockStore::default()
        };
        let mut reex = Reex::new(ReexConfig::new(), Role::Primary, Side::Left);
        reex.init(false, &mut store);
        assert_eq!(reex.cpi(), 120);
        assert_eq!(reex.scroll_div(), 4);
    }

    #[test]
    fn test_uninitialised_store_keeps_defaults() {
        let mut reex = primary(true, Side::Left);
        assert_eq!(reex.cpi(), 5);
        assert_eq!(reex.scroll_div(), 4);
        let mut store = MockStore::default();
        assert!(!reex.load(&mut store));
    }

    // Keys ----------------------------------------------------------------

    #[test]
    fn test_unknown_keys_pass_through() {
        let mut reex = primary(true, Side::Left);
        let mut store = MockStore::default();
        assert!(reex.process_record(&press(0x04), &mut store, 0));
        assert_eq!(reex.last_keycode(), 0x04);
        assert_eq!(reex.last_pos(), KeyPos { row: 2, col: 3 });
        assert_eq!(reex.pressing_keys().as_bytes()[0], b'a');
    }

    #[test]
    fn test_handled_press_returns_false_release_true() {
        let mut reex = primary(true, Side::Left);
        let mut store = MockStore::default();
        let kc = ReexKeycode::ScrlTo.code();
        assert!(!reex.process_record(&press(kc), &mut store, 0));
        assert!(reex.scroll_mode());
        assert!(reex.process_record(&release(kc), &mut store, 0));
        assert!(reex.scroll_mode());
    }

    #[test]
    fn test_modifier_wrapped_custom_key_is_not_stripped_into_range() {
        let mut reex = primary(true, Side::Left);
        let mut store = MockStore::default();
        // LSFT(KC_A) strips to KC_A, which is not ours.
        assert!(reex.process_record(&press(0x0204), &mut store, 0));
    }

    #[test]
    fn test_rec_save_and_reset() {
        let mut reex = primary(true, Side::Left);
        let mut store = MockStore::default();
        reex.set_cpi(50);
        assert!(!tap(&mut reex, ReexKeycode::RecSave, &mut store));
        assert_eq!(store.kb.map(|raw| ConfigRecord::from_raw(raw).cpi), Some(50));

        tap(&mut reex, ReexKeycode::RecRst, &mut store);
        assert_eq!(reex.cpi(), 5);
        // Reset is not persisted by itself.
        assert_eq!(store.kb.map(|raw| ConfigRecord::from_raw(raw).cpi), Some(50));
    }

    #[test]
    fn test_user_hook_can_swallow_keys() {
        let mut reex = primary(true, Side::Left);
        reex.hooks_mut().swallow = true;
        let mut store = MockStore::default();
        assert!(!reex.process_record(&press(ReexKeycode::CpiI1k.code()), &mut store, 0));
        assert_eq!(reex.cpi(), 5);
        // Bookkeeping still happens.
        assert_eq!(reex.last_keycode(), ReexKeycode::CpiI1k.code());
    }

    #[test]
    fn test_feature_gated_keys_pass_through() {
        let mut reex = primary(true, Side::Left);
        let mut store = MockStore::default();
        assert!(tap(&mut reex, ReexKeycode::AmlTo, &mut store));
        assert!(!reex.auto_mouse().enabled());
        assert!(tap(&mut reex, ReexKeycode::SsnpFre, &mut store));
        assert_eq!(reex.scroll_snap_mode(), ScrollSnapMode::Vertical);
    }

    #[test]
    fn test_auto_mouse_keys() {
        let cfg = ReexConfig::new().with_auto_mouse(true);
        let mut reex = Reex::new(cfg, Role::Primary, Side::Left);
        let mut store = MockStore::default();
        reex.init(true, &mut store);

        assert!(!tap(&mut reex, ReexKeycode::AmlTo, &mut store));
        assert!(reex.auto_mouse().enabled());
        tap(&mut reex, ReexKeycode::AmlI50, &mut store);
        assert_eq!(reex.auto_mouse().timeout_ms(), 700);
        for _ in 0..20 {
            tap(&mut reex, ReexKeycode::AmlD50, &mut store);
        }
        assert_eq!(reex.auto_mouse().timeout_ms(), 100);
        assert!(reex.is_mouse_record(ReexKeycode::ScrlMo.code()));
        assert!(!reex.is_mouse_record(ReexKeycode::ScrlTo.code()));
    }

    #[test]
    fn test_scroll_snap_keys_with_lock_strategy() {
        let cfg = ReexConfig::new().with_scroll_snap(ScrollSnapStrategy::Lock);
        let mut reex = Reex::new(cfg, Role::Primary, Side::Left);
        let mut store = MockStore::default();
        reex.init(true, &mut store);
        assert!(!tap(&mut reex, ReexKeycode::SsnpHor, &mut store));
        assert_eq!(reex.scroll_snap_mode(), ScrollSnapMode::Horizontal);
        tap(&mut reex, ReexKeycode::SsnpFre, &mut store);
        assert_eq!(reex.scroll_snap_mode(), ScrollSnapMode::Free);
        tap(&mut reex, ReexKeycode::SsnpVrt, &mut store);
        assert_eq!(reex.scroll_snap_mode(), ScrollSnapMode::Vertical);
    }
}
