//! Routes messages from every MIDI input port to one callback.
//!
//! A worker thread owns all port listeners. It attaches a listener to each
//! port, filters by the selected device inside the listener, and polls the
//! port set so hot-plugged devices are picked up without re-initializing.

use std::collections::BTreeSet;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::access::{MessageHandler, MidiAccess, MidiDevice, PortListener};

/// Receives raw `(status, note, velocity)` triplets.
pub type MidiCallback = Arc<dyn Fn(u8, u8, u8) + Send + Sync + 'static>;

#[derive(Debug, Clone)]
pub struct RouterOptions {
    /// Client name registered with the platform MIDI service.
    pub client_name: String,
    /// How often the port set is checked for hot-plug changes.
    pub poll_interval: Duration,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            client_name: "chromasynth".into(),
            poll_interval: Duration::from_millis(500),
        }
    }
}

pub struct MidiRouter {
    access: Arc<dyn MidiAccess>,
    options: RouterOptions,
}

impl MidiRouter {
    pub fn new(access: impl MidiAccess + 'static) -> Self {
        Self::with_options(access, RouterOptions::default())
    }

    pub fn with_options(access: impl MidiAccess + 'static, options: RouterOptions) -> Self {
        Self {
            access: Arc::new(access),
            options,
        }
    }

    /// Router over the platform's MIDI inputs.
    #[cfg(feature = "native")]
    pub fn native() -> Self {
        Self::native_with_options(RouterOptions::default())
    }

    #[cfg(feature = "native")]
    pub fn native_with_options(options: RouterOptions) -> Self {
        let access = super::MidirAccess::new(options.client_name.clone());
        Self::with_options(access, options)
    }

    pub fn is_supported(&self) -> bool {
        self.access.is_supported()
    }

    /// Attaches `callback` to every input port.
    ///
    /// With `device_id` set, only messages from that port reach the callback.
    /// Failure to reach the platform yields an unsuccessful session with no
    /// devices; this never panics. To change the selected device, clean up
    /// the session and initialize again.
    pub fn initialize<F>(&self, callback: F, device_id: Option<String>) -> MidiSession
    where
        F: Fn(u8, u8, u8) + Send + Sync + 'static,
    {
        let ports = match self.access.input_ports() {
            Ok(ports) => ports,
            Err(e) => {
                warn!("Could not access MIDI devices: {}", e);
                return MidiSession::failed();
            }
        };

        let devices = Arc::new(Mutex::new(Vec::new()));
        let (command_tx, command_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();

        let access = Arc::clone(&self.access);
        let callback: MidiCallback = Arc::new(callback);
        let shared_devices = Arc::clone(&devices);
        let poll_interval = self.options.poll_interval;

        // Listeners are created, used and dropped on the worker thread only
        let spawned = thread::Builder::new()
            .name("midi-router".into())
            .spawn(move || {
                let mut worker = RouterWorker {
                    access,
                    callback,
                    device_id,
                    devices: shared_devices,
                    listeners: Vec::new(),
                    known: BTreeSet::new(),
                    attached: BTreeSet::new(),
                    poll_interval,
                };
                worker.attach(ports);
                let _ = ready_tx.send(());
                worker.run(command_rx);
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Failed to start MIDI router thread: {}", e);
                return MidiSession::failed();
            }
        };

        if ready_rx.recv().is_err() {
            warn!("MIDI router thread exited during startup");
            let _ = handle.join();
            return MidiSession::failed();
        }

        let session = MidiSession {
            devices,
            success: true,
            commands: Some(command_tx),
            worker: Some(handle),
        };
        info!("MIDI initialized with {} input device(s)", session.devices().len());
        session
    }
}

/// Whether a message from `port_id` passes the device filter.
pub fn accepts(selected: Option<&str>, port_id: &str) -> bool {
    selected.map_or(true, |id| id == port_id)
}

enum Command {
    Refresh(Sender<()>),
    Shutdown,
}

struct RouterWorker {
    access: Arc<dyn MidiAccess>,
    callback: MidiCallback,
    device_id: Option<String>,
    devices: Arc<Mutex<Vec<MidiDevice>>>,
    listeners: Vec<Box<dyn PortListener>>,
    /// Port ids seen by the last scan.
    known: BTreeSet<String>,
    /// Port ids with a live listener; a subset of `known`.
    attached: BTreeSet<String>,
    poll_interval: Duration,
}

impl RouterWorker {
    fn run(mut self, commands: Receiver<Command>) {
        loop {
            match commands.recv_timeout(self.poll_interval) {
                Ok(Command::Refresh(done)) => {
                    self.reload();
                    let _ = done.send(());
                }
                Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => self.poll(),
            }
        }
        self.detach();
        debug!("MIDI router stopped");
    }

    /// Re-attaches when the set of port ids has changed, and retries ports
    /// whose listener could not be opened earlier.
    fn poll(&mut self) {
        let ports = match self.access.input_ports() {
            Ok(ports) => ports,
            Err(e) => {
                debug!("MIDI port scan failed: {}", e);
                return;
            }
        };
        let ids: BTreeSet<String> = ports.iter().map(|p| p.id.clone()).collect();
        if ids != self.known {
            info!("MIDI devices changed ({} available)", ports.len());
            self.detach();
            self.attach(ports);
        } else if self.attached.len() < self.known.len() {
            self.connect(&ports, true);
        }
    }

    fn reload(&mut self) {
        match self.access.input_ports() {
            Ok(ports) => {
                self.detach();
                self.attach(ports);
            }
            Err(e) => warn!("MIDI refresh failed: {}", e),
        }
    }

    fn attach(&mut self, ports: Vec<MidiDevice>) {
        self.connect(&ports, false);
        self.known = ports.iter().map(|p| p.id.clone()).collect();
        *self.devices.lock().unwrap_or_else(PoisonError::into_inner) = ports;
    }

    /// Opens a listener on every port that does not have one yet.
    fn connect(&mut self, ports: &[MidiDevice], retry: bool) {
        for port in ports {
            if self.attached.contains(&port.id) {
                continue;
            }
            let handler = self.handler_for(&port.id);
            match self.access.listen(port, handler) {
                Ok(listener) => {
                    debug!("Listening on MIDI port {} ({})", port.name, port.id);
                    self.listeners.push(listener);
                    self.attached.insert(port.id.clone());
                }
                // Still failing on a retry; already reported once
                Err(e) if retry => debug!("MIDI port {} still unavailable: {}", port.name, e),
                Err(e) => warn!("Skipping MIDI port {}: {}", port.name, e),
            }
        }
    }

    fn detach(&mut self) {
        self.listeners.clear();
        self.attached.clear();
        self.known.clear();
    }

    fn handler_for(&self, port_id: &str) -> MessageHandler {
        let callback = Arc::clone(&self.callback);
        let port_id = port_id.to_string();
        let selected = self.device_id.clone();
        Box::new(move |message: &[u8]| {
            if let [status, note, velocity, ..] = *message {
                if accepts(selected.as_deref(), &port_id) {
                    callback(status, note, velocity);
                }
            }
        })
    }
}

/// The result of `MidiRouter::initialize`.
///
/// Holds the listeners alive until `cleanup` is called or the session is dropped.
pub struct MidiSession {
    devices: Arc<Mutex<Vec<MidiDevice>>>,
    success: bool,
    commands: Option<Sender<Command>>,
    worker: Option<JoinHandle<()>>,
}

impl MidiSession {
    fn failed() -> Self {
        Self {
            devices: Arc::new(Mutex::new(Vec::new())),
            success: false,
            commands: None,
            worker: None,
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    /// Input devices as of the last attach.
    pub fn devices(&self) -> Vec<MidiDevice> {
        self.devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_active(&self) -> bool {
        self.commands.is_some()
    }

    /// Tears down every listener and re-attaches to the current port set,
    /// returning once that has happened.
    pub fn refresh(&self) {
        let Some(commands) = &self.commands else {
            return;
        };
        let (done_tx, done_rx) = mpsc::channel();
        if commands.send(Command::Refresh(done_tx)).is_ok() {
            let _ = done_rx.recv();
        }
    }

    /// Removes every listener and stops hot-plug tracking. Safe to call repeatedly.
    pub fn cleanup(&mut self) {
        if let Some(commands) = self.commands.take() {
            let _ = commands.send(Command::Shutdown);
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("MIDI router thread panicked");
            }
        }
    }
}

impl Drop for MidiSession {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_selection_accepts_every_port() {
        assert!(accepts(None, "port-a"));
        assert!(accepts(None, "port-b"));
    }

    #[test]
    fn selection_accepts_only_matching_port() {
        assert!(accepts(Some("port-a"), "port-a"));
        assert!(!accepts(Some("port-a"), "port-b"));
    }

    #[test]
    fn default_options() {
        let options = RouterOptions::default();
        assert_eq!(options.client_name, "chromasynth");
        assert_eq!(options.poll_interval, Duration::from_millis(500));
    }
}
