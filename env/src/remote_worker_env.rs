use std::{
    collections::VecDeque,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use log::{debug, info, trace, warn};
use smol::{
    channel,
    channel::{Receiver, Sender, TryRecvError},
    future, Timer,
};

use shadow_objects_kernel::{Kernel, KernelConfig};
use shadow_objects_shared::{ChangeTrailPayload, DetachedTransferables, MessageToView};

use crate::{EnvError, ModuleCatalog, RemoteWorkerConfig, ShadowEnvProxy};

// Wire

/// Requests sent to the worker thread. Change trails cross the boundary
/// as JSON, with their transferables moved alongside.
#[derive(Clone)]
enum WorkerCommand {
    ApplyChangeTrail {
        json: String,
        transferables: DetachedTransferables,
        serial: u64,
        wait_for_confirmation: bool,
    },
    ImportScript {
        url: String,
        serial: u64,
    },
    Shutdown,
}

enum WorkerReply {
    Confirmed { serial: u64 },
    Failed { serial: u64, message: String },
    MessagesToView(Vec<MessageToView>),
}

// Worker side

fn run_worker(
    catalog: ModuleCatalog,
    kernel_config: KernelConfig,
    commands: Receiver<WorkerCommand>,
    replies: Sender<WorkerReply>,
) {
    let mut kernel = Kernel::new(kernel_config);
    let mut last_applied: Option<u64> = None;

    while let Ok(command) = commands.recv_blocking() {
        let (serial, result, confirm) = match command {
            WorkerCommand::ApplyChangeTrail {
                json,
                transferables,
                serial,
                wait_for_confirmation,
            } => {
                let result = if last_applied.is_some_and(|last| serial <= last) {
                    trace!("Change trail {} already applied, confirming resend", serial);
                    Ok(())
                } else {
                    last_applied = Some(serial);
                    apply_encoded(&mut kernel, &json, transferables)
                };
                (serial, result, wait_for_confirmation)
            }
            WorkerCommand::ImportScript { url, serial } => {
                let result = catalog
                    .resolve(&url)
                    .and_then(|module| kernel.import_module(&module).map_err(EnvError::from));
                (serial, result, true)
            }
            WorkerCommand::Shutdown => break,
        };

        let messages = kernel.take_messages_to_view();
        if !messages.is_empty() && replies.send_blocking(WorkerReply::MessagesToView(messages)).is_err() {
            break;
        }

        let reply = match result {
            Ok(()) if confirm => WorkerReply::Confirmed { serial },
            Ok(()) => continue,
            Err(error) => WorkerReply::Failed {
                serial,
                message: error.to_string(),
            },
        };
        if replies.send_blocking(reply).is_err() {
            break;
        }
    }

    kernel.destroy();
    info!("Worker stopped");
}

fn apply_encoded(
    kernel: &mut Kernel,
    json: &str,
    transferables: DetachedTransferables,
) -> Result<(), EnvError> {
    let mut payload = ChangeTrailPayload::from_json(json)?;
    payload.restore_transferables(transferables)?;
    kernel.run(&payload.change_trail)?;
    Ok(())
}

// View side

/// Replies that arrived while nobody was waiting for them.
#[derive(Default)]
struct Mailbox {
    messages: Vec<MessageToView>,
    failures: VecDeque<(u64, String)>,
}

impl Mailbox {
    fn receive(&mut self, reply: WorkerReply) {
        match reply {
            WorkerReply::MessagesToView(messages) => self.messages.extend(messages),
            WorkerReply::Confirmed { serial } => trace!("Late confirmation of request {}", serial),
            WorkerReply::Failed { serial, message } => {
                warn!("Worker failed to apply request {}: {}", serial, message);
                self.failures.push_back((serial, message));
            }
        }
    }
}

struct WorkerHandle {
    commands: Sender<WorkerCommand>,
    replies: Receiver<WorkerReply>,
    thread: JoinHandle<()>,
}

enum RemoteState {
    Idle,
    Running(WorkerHandle),
    Destroyed,
}

/// Runs the Kernel on its own thread. The Kernel is built inside the
/// thread, so nothing it owns ever crosses the boundary; only encoded
/// change trails, transferables and replies do.
pub struct RemoteWorkerEnv {
    config: RemoteWorkerConfig,
    kernel_config: KernelConfig,
    catalog: ModuleCatalog,
    state: RemoteState,
    next_serial: u64,
    mailbox: Mailbox,
}

impl RemoteWorkerEnv {
    pub fn new(catalog: ModuleCatalog, kernel_config: KernelConfig, config: RemoteWorkerConfig) -> Self {
        Self {
            config,
            kernel_config,
            catalog,
            state: RemoteState::Idle,
            next_serial: 1,
            mailbox: Mailbox::default(),
        }
    }

    fn worker(&self, operation: &'static str) -> Result<&WorkerHandle, EnvError> {
        match &self.state {
            RemoteState::Running(worker) => Ok(worker),
            RemoteState::Idle => Err(EnvError::NotStarted { operation }),
            RemoteState::Destroyed => Err(EnvError::Destroyed { operation }),
        }
    }

    fn take_serial(&mut self) -> u64 {
        let serial = self.next_serial;
        self.next_serial += 1;
        serial
    }

    /// Moves every reply that already arrived into the mailbox.
    fn drain_replies(&mut self) -> Result<(), EnvError> {
        if let RemoteState::Running(worker) = &self.state {
            loop {
                match worker.replies.try_recv() {
                    Ok(reply) => self.mailbox.receive(reply),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Closed) => return Err(EnvError::WorkerDisconnected),
                }
            }
        }
        Ok(())
    }

    /// Sends `command` and blocks until `serial` is confirmed, resending on
    /// timeout up to `max_retries` times.
    fn send_and_confirm(&mut self, command: WorkerCommand, serial: u64) -> Result<(), EnvError> {
        let attempts = self.config.max_retries + 1;
        let timeout = self.config.confirmation_timeout;

        for attempt in 1..=attempts {
            let RemoteState::Running(worker) = &self.state else {
                return Err(EnvError::Destroyed { operation: "wait for confirmation" });
            };
            worker
                .commands
                .send_blocking(command.clone())
                .map_err(|_| EnvError::WorkerDisconnected)?;

            if wait_for_reply(&worker.replies, serial, timeout, &mut self.mailbox)? {
                return Ok(());
            }
            warn!(
                "Confirmation of request {} timed out (attempt {}/{})",
                serial, attempt, attempts
            );
        }

        Err(EnvError::ConfirmationTimeout { serial, attempts })
    }
}

fn wait_for_reply(
    replies: &Receiver<WorkerReply>,
    serial: u64,
    timeout: Duration,
    mailbox: &mut Mailbox,
) -> Result<bool, EnvError> {
    let deadline = Instant::now() + timeout;
    smol::block_on(async {
        loop {
            let next = future::or(async { Some(replies.recv().await) }, async {
                Timer::at(deadline).await;
                None
            })
            .await;

            match next {
                None => return Ok(false),
                Some(Err(_)) => return Err(EnvError::WorkerDisconnected),
                Some(Ok(WorkerReply::Confirmed { serial: confirmed })) if confirmed == serial => {
                    return Ok(true);
                }
                Some(Ok(WorkerReply::Failed { serial: failed, message })) if failed == serial => {
                    return Err(EnvError::RemoteFailure { serial, message });
                }
                Some(Ok(reply)) => mailbox.receive(reply),
            }
        }
    })
}

impl ShadowEnvProxy for RemoteWorkerEnv {
    fn start(&mut self) -> Result<(), EnvError> {
        match self.state {
            RemoteState::Idle => {}
            RemoteState::Running(_) => return Ok(()),
            RemoteState::Destroyed => return Err(EnvError::Destroyed { operation: "start" }),
        }

        let (command_sender, command_receiver) = channel::unbounded();
        let (reply_sender, reply_receiver) = channel::unbounded();
        let catalog = self.catalog.clone();
        let kernel_config = self.kernel_config.clone();

        let thread = thread::Builder::new()
            .name(self.config.thread_name.clone())
            .spawn(move || run_worker(catalog, kernel_config, command_receiver, reply_sender))
            .map_err(|error| EnvError::WorkerSpawn {
                thread_name: self.config.thread_name.clone(),
                message: error.to_string(),
            })?;

        self.state = RemoteState::Running(WorkerHandle {
            commands: command_sender,
            replies: reply_receiver,
            thread,
        });
        info!("Worker {} started", self.config.thread_name);
        Ok(())
    }

    fn apply_change_trail(
        &mut self,
        mut payload: ChangeTrailPayload,
        wait_for_confirmation: bool,
    ) -> Result<(), EnvError> {
        self.worker("apply change trail")?;
        self.drain_replies()?;

        let serial = self.take_serial();
        payload.serial = Some(serial);
        let transferables = payload.take_transferables();
        let command = WorkerCommand::ApplyChangeTrail {
            json: payload.to_json()?,
            transferables,
            serial,
            wait_for_confirmation,
        };
        debug!(
            "Sending change trail {} of {} record(s) to worker",
            serial,
            payload.change_trail.len()
        );

        if wait_for_confirmation {
            return self.send_and_confirm(command, serial);
        }
        self.worker("apply change trail")?
            .commands
            .send_blocking(command)
            .map_err(|_| EnvError::WorkerDisconnected)
    }

    fn import_script(&mut self, url: &str) -> Result<(), EnvError> {
        self.worker("import script")?;
        self.drain_replies()?;
        if !self.catalog.contains(url) {
            return Err(EnvError::UnknownScript { url: url.to_string() });
        }

        let serial = self.take_serial();
        let command = WorkerCommand::ImportScript {
            url: url.to_string(),
            serial,
        };
        self.send_and_confirm(command, serial)
    }

    fn take_messages_to_view(&mut self) -> Vec<MessageToView> {
        if let Err(error) = self.drain_replies() {
            warn!("{}", error);
        }
        std::mem::take(&mut self.mailbox.messages)
    }

    fn take_failures(&mut self) -> Vec<EnvError> {
        if let Err(error) = self.drain_replies() {
            warn!("{}", error);
        }
        self.mailbox
            .failures
            .drain(..)
            .map(|(serial, message)| EnvError::RemoteFailure { serial, message })
            .collect()
    }

    fn destroy(&mut self) {
        let state = std::mem::replace(&mut self.state, RemoteState::Destroyed);
        if let RemoteState::Running(worker) = state {
            if worker.commands.send_blocking(WorkerCommand::Shutdown).is_err() {
                debug!("Worker already gone at shutdown");
            }
            if worker.thread.join().is_err() {
                warn!("Worker {} panicked", self.config.thread_name);
            }
            info!("Worker {} destroyed", self.config.thread_name);
        }
    }

    fn is_alive(&self) -> bool {
        match &self.state {
            RemoteState::Running(worker) => !worker.thread.is_finished(),
            _ => false,
        }
    }
}

impl Drop for RemoteWorkerEnv {
    fn drop(&mut self) {
        self.destroy();
    }
}
