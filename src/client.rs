use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::diff::state_events;
use crate::hmi::{Field, HmiVector, index};
use crate::logger::{MessageLogMode, MessageLogger};
use crate::protocol::{DEVICE_PORT, exchange_url};
use crate::types::*;
use crate::{Error, Result};

/// Quiet period after the last setter call before a write is sent.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

type StateCallback = Box<dyn Fn(&DeviceState) + Send + Sync>;
type EventCallback = Box<dyn Fn(&Event) + Send + Sync>;

struct PendingWrite {
    buffer: HmiVector,
    deadline: Option<Instant>,
    in_flight: bool,
    rotation_speed_in_flight: bool,
}

impl PendingWrite {
    fn new() -> Self {
        Self {
            buffer: HmiVector::idle(),
            deadline: None,
            in_flight: false,
            rotation_speed_in_flight: false,
        }
    }

    fn has_pending_at(&self, now: Instant) -> bool {
        !self.buffer.is_idle() && self.deadline.is_none_or(|d| now >= d)
    }

    fn write(&mut self, fields: &[(usize, i32)], now: Instant, window: Duration) -> Result<()> {
        if let Some(&(i, _)) = fields.iter().find(|(i, _)| *i >= crate::hmi::FIELD_COUNT) {
            return Err(Error::IndexOutOfRange(i));
        }
        for &(i, value) in fields {
            self.buffer.set(i, Field::Value(value))?;
        }
        self.deadline = Some(now + window);
        Ok(())
    }
}

/// Clears the in-flight flag when the exchange finishes or is dropped.
struct InFlight<'a>(&'a Mutex<PendingWrite>);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.lock().in_flight = false;
    }
}

pub struct DeviceClientBuilder {
    ip: IpAddr,
    name: Option<String>,
    port: u16,
    timeout: Duration,
    debounce: Duration,
    temperature_offset: f64,
    state_callbacks: Vec<StateCallback>,
    event_callbacks: Vec<EventCallback>,
    log_mode: Option<MessageLogMode>,
    log_path: Option<String>,
}

impl DeviceClientBuilder {
    pub fn new(ip: IpAddr) -> Self {
        Self {
            ip,
            name: None,
            port: DEVICE_PORT,
            timeout: DEFAULT_TIMEOUT,
            debounce: DEFAULT_DEBOUNCE,
            temperature_offset: 0.0,
            state_callbacks: Vec::new(),
            event_callbacks: Vec::new(),
            log_mode: None,
            log_path: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn debounce(mut self, window: Duration) -> Self {
        self.debounce = window;
        self
    }

    /// Calibration added to the reported current temperature, in °C.
    pub fn temperature_offset(mut self, offset_c: f64) -> Self {
        self.temperature_offset = offset_c;
        self
    }

    pub fn on_state(mut self, f: impl Fn(&DeviceState) + Send + Sync + 'static) -> Self {
        self.state_callbacks.push(Box::new(f));
        self
    }

    pub fn on_event(mut self, f: impl Fn(&Event) + Send + Sync + 'static) -> Self {
        self.event_callbacks.push(Box::new(f));
        self
    }

    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<String>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<DeviceClient> {
        let http = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(Error::HttpClient)?;

        let logger = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => Some(Mutex::new(MessageLogger::new(mode, &path)?)),
            _ => None,
        };

        let ip_str = self.ip.to_string();
        Ok(DeviceClient {
            inner: Arc::new(Inner {
                http,
                base_url: format!("http://{}/", SocketAddr::new(self.ip, self.port)),
                ip: self.ip,
                id: Uuid::new_v5(&Uuid::NAMESPACE_OID, ip_str.as_bytes()),
                name: self.name.unwrap_or(ip_str),
                debounce: self.debounce,
                temperature_offset: self.temperature_offset,
                pending: Mutex::new(PendingWrite::new()),
                state: Mutex::new(None),
                state_callbacks: self.state_callbacks,
                event_callbacks: self.event_callbacks,
                logger,
            }),
        })
    }
}

struct Inner {
    http: reqwest::Client,
    base_url: String,
    ip: IpAddr,
    id: Uuid,
    name: String,
    debounce: Duration,
    temperature_offset: f64,
    pending: Mutex<PendingWrite>,
    state: Mutex<Option<DeviceState>>,
    state_callbacks: Vec<StateCallback>,
    event_callbacks: Vec<EventCallback>,
    logger: Option<Mutex<MessageLogger>>,
}

/// Handle to one air conditioner. Clones share the same pending write
/// buffer and cached state.
#[derive(Clone)]
pub struct DeviceClient {
    inner: Arc<Inner>,
}

impl DeviceClient {
    pub fn builder(ip: IpAddr) -> DeviceClientBuilder {
        DeviceClientBuilder::new(ip)
    }

    pub fn ip(&self) -> IpAddr {
        self.inner.ip
    }

    /// Stable identifier derived from the device address.
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Last state reported by the device, if any.
    pub fn state(&self) -> Option<DeviceState> {
        self.inner.state.lock().clone()
    }

    pub fn pending_write(&self) -> HmiVector {
        self.inner.pending.lock().buffer.clone()
    }

    /// True once something is buffered and the debounce window has elapsed.
    pub fn has_pending_write(&self) -> bool {
        self.inner.pending.lock().has_pending_at(Instant::now())
    }

    pub fn is_exchange_in_flight(&self) -> bool {
        self.inner.pending.lock().in_flight
    }

    /// Raised while a fan-speed-zero write is buffered or being sent.
    pub fn rotation_speed_write_in_flight(&self) -> bool {
        self.inner.pending.lock().rotation_speed_in_flight
    }

    pub fn set_field(&self, value: i32, index: usize) -> Result<()> {
        self.write(&[(index, value)])
    }

    fn write(&self, fields: &[(usize, i32)]) -> Result<()> {
        self.inner
            .pending
            .lock()
            .write(fields, Instant::now(), self.inner.debounce)?;
        debug!(ip = %self.inner.ip, ?fields, "buffered write");
        Ok(())
    }

    pub fn set_target_temperature(&self, temp: Temperature) -> Result<()> {
        self.set_field(temp.tenths(), index::TARGET_TEMPERATURE)
    }

    /// Power on/off. A power-off arriving while a fan-speed-zero write is in
    /// flight is ignored.
    pub fn set_operating_mode(&self, on: bool) -> Result<()> {
        if !on && self.rotation_speed_write_in_flight() {
            debug!(ip = %self.inner.ip, "ignoring power-off during rotation speed write");
            return Ok(());
        }
        self.set_field(i32::from(on), index::POWER)
    }

    pub fn set_operation_mode(&self, mode: OperationMode) -> Result<()> {
        self.set_field(mode.as_hmi(), index::OPERATION_MODE)
    }

    pub fn set_fan_mode(&self, speed: FanSpeed) -> Result<()> {
        let mut pending = self.inner.pending.lock();
        pending.write(
            &[(index::FAN_SPEED, i32::from(speed.value()))],
            Instant::now(),
            self.inner.debounce,
        )?;
        pending.rotation_speed_in_flight = speed.is_auto();
        debug!(ip = %self.inner.ip, speed = speed.value(), "buffered fan speed");
        Ok(())
    }

    pub fn set_special_mode(&self, mode: SpecialMode) -> Result<()> {
        self.write(&mode.hmi_fields())
    }

    pub fn set_eco_mode(&self, on: bool) -> Result<()> {
        self.set_flag(on, SpecialMode::Eco, index::ECO)
    }

    pub fn set_turbo_mode(&self, on: bool) -> Result<()> {
        self.set_flag(on, SpecialMode::Turbo, index::TURBO)
    }

    pub fn set_night_mode(&self, on: bool) -> Result<()> {
        self.set_flag(on, SpecialMode::Night, index::NIGHT)
    }

    fn set_flag(&self, on: bool, mode: SpecialMode, field: usize) -> Result<()> {
        if on {
            self.set_special_mode(mode)
        } else {
            self.set_field(0, field)
        }
    }

    /// One round-trip carrying the pending buffer (`UPD=1` when it holds a
    /// write). Fields sent are cleared only on success; anything written
    /// while the request was outstanding stays buffered.
    pub async fn exchange(&self) -> Result<String> {
        let _guard = self.begin_exchange()?;
        let sent = self.pending_write();
        let write = !sent.is_idle();

        let body = self.send(&sent, write).await?;

        if write {
            let mut pending = self.inner.pending.lock();
            pending.buffer.clear_sent(&sent);
            if pending.buffer.value(index::FAN_SPEED).is_none() {
                pending.rotation_speed_in_flight = false;
            }
        }
        Ok(body)
    }

    /// Status read (`UPD=0`) that leaves the pending buffer alone.
    pub async fn refresh(&self) -> Result<String> {
        let _guard = self.begin_exchange()?;
        self.send(&HmiVector::idle(), false).await
    }

    /// Applies a state string the device pushed to the listener.
    pub fn apply_report(&self, hmi: &str) -> Option<DeviceState> {
        self.apply(hmi, "push")
    }

    fn begin_exchange(&self) -> Result<InFlight<'_>> {
        let mut pending = self.inner.pending.lock();
        if pending.in_flight {
            return Err(Error::ExchangeInFlight);
        }
        pending.in_flight = true;
        Ok(InFlight(&self.inner.pending))
    }

    async fn send(&self, hmi: &HmiVector, write: bool) -> Result<String> {
        let url = exchange_url(&self.inner.base_url, hmi, write);
        debug!(ip = %self.inner.ip, write, "exchanging with device");

        if let Some(logger) = &self.inner.logger {
            logger.lock().log_request(hmi, write);
        }

        let result = async {
            let resp = self.inner.http.get(&url).send().await?.error_for_status()?;
            Ok::<_, reqwest::Error>(resp.text().await?)
        }
        .await;

        match result {
            Ok(body) => {
                self.apply(&body, "resp");
                Ok(body)
            }
            Err(e) => {
                warn!(ip = %self.inner.ip, write, error = %e, "exchange failed");
                if let Some(logger) = &self.inner.logger {
                    logger.lock().log_failure(write, &e.to_string());
                }
                Err(e.into())
            }
        }
    }

    fn apply(&self, report: &str, dir: &str) -> Option<DeviceState> {
        let hmi = HmiVector::decode_lenient(report);
        if hmi.is_idle() {
            warn!(ip = %self.inner.ip, "ignoring report without state");
            return None;
        }

        if let Some(logger) = &self.inner.logger {
            logger.lock().log_report(dir, &hmi);
        }

        let mut state = DeviceState::from_hmi(&hmi);
        if self.inner.temperature_offset != 0.0 {
            state.current_temperature = state
                .current_temperature
                .map(|t| t.offset_by(self.inner.temperature_offset));
        }

        let events = {
            let mut current = self.inner.state.lock();
            let previous = current.as_ref().map(|s| s.raw.clone()).unwrap_or_default();
            *current = Some(state.clone());
            state_events(&previous, &state)
        };

        for event in &events {
            for cb in &self.inner.event_callbacks {
                cb(event);
            }
        }
        for cb in &self.inner.state_callbacks {
            cb(&state);
        }

        if !events.is_empty() {
            debug!(ip = %self.inner.ip, count = events.len(), "processed state changes");
        }
        Some(state)
    }
}
