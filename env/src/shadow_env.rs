use std::rc::Rc;

use log::{debug, info};

use shadow_objects_shared::ChangeTrailPayload;
use shadow_objects_view::ComponentContext;

use crate::{EnvError, ShadowEnvConfig, ShadowEnvProxy};

/// Pumps the change trails of one ComponentContext into a proxy.
///
/// Any number of `sync()` calls between two `run_pending()` calls result
/// in a single flush. Call `run_pending()` once per turn of the host loop.
pub struct ShadowEnv {
    config: ShadowEnvConfig,
    context: Rc<ComponentContext>,
    proxy: Option<Box<dyn ShadowEnvProxy>>,
    imported_scripts: Vec<String>,
    sync_requested: bool,
    proxy_lost: bool,
    flush_count: u64,
}

impl ShadowEnv {
    pub fn new(config: ShadowEnvConfig) -> Self {
        let context = ComponentContext::get(&config.namespace);
        Self {
            config,
            context,
            proxy: None,
            imported_scripts: Vec::new(),
            sync_requested: false,
            proxy_lost: false,
            flush_count: 0,
        }
    }

    pub fn config(&self) -> &ShadowEnvConfig {
        &self.config
    }

    pub fn context(&self) -> &Rc<ComponentContext> {
        &self.context
    }

    pub fn has_proxy(&self) -> bool {
        self.proxy.is_some()
    }

    /// Number of flushes that sent a non-empty change trail.
    pub fn flush_count(&self) -> u64 {
        self.flush_count
    }

    // Proxy

    /// Starts `proxy` and makes it the target of future flushes. If a proxy
    /// was attached before, this is a context loss and `proxy` is rebuilt
    /// from the context's memory.
    pub fn set_proxy(&mut self, proxy: Box<dyn ShadowEnvProxy>) -> Result<(), EnvError> {
        if self.proxy.is_some() || self.proxy_lost {
            return self.replace_proxy(proxy);
        }

        let mut proxy = proxy;
        proxy.start()?;
        self.proxy = Some(proxy);
        if self.config.auto_sync {
            self.sync();
        }
        Ok(())
    }

    /// Destroys the current proxy and rebuilds the whole tree on `proxy`:
    /// previously imported scripts are imported again, then every live
    /// component is re-sent from the context's memory.
    pub fn replace_proxy(&mut self, proxy: Box<dyn ShadowEnvProxy>) -> Result<(), EnvError> {
        if let Some(mut previous) = self.proxy.take() {
            previous.destroy();
        }

        self.proxy_lost = true;
        let mut proxy = proxy;
        proxy.start()?;
        for url in &self.imported_scripts {
            proxy.import_script(url)?;
        }
        self.proxy = Some(proxy);
        self.proxy_lost = false;

        info!(
            "Recreating {} component(s) of context {} on a new proxy",
            self.context.len(),
            self.context.namespace()
        );
        self.context.re_create_changes()?;
        self.sync_wait()
    }

    pub fn import_script(&mut self, url: &str) -> Result<(), EnvError> {
        let proxy = self.proxy.as_mut().ok_or(EnvError::NotStarted {
            operation: "import script",
        })?;
        proxy.import_script(url)?;
        if !self.imported_scripts.iter().any(|known| known == url) {
            self.imported_scripts.push(url.to_string());
        }
        if self.config.auto_sync {
            self.sync();
        }
        Ok(())
    }

    // Sync

    /// Requests a flush on the next `run_pending()`.
    pub fn sync(&mut self) {
        self.sync_requested = true;
    }

    pub fn is_sync_requested(&self) -> bool {
        self.sync_requested
    }

    /// Flushes if a sync was requested since the last flush. Returns
    /// whether it flushed.
    pub fn run_pending(&mut self) -> Result<bool, EnvError> {
        if !self.sync_requested {
            return Ok(false);
        }
        self.sync_requested = false;
        self.flush()?;
        Ok(true)
    }

    /// Flushes now, whether or not a sync was requested.
    pub fn sync_wait(&mut self) -> Result<(), EnvError> {
        self.sync_requested = false;
        self.flush()
    }

    fn flush(&mut self) -> Result<(), EnvError> {
        let proxy = self.proxy.as_mut().ok_or(EnvError::NotStarted {
            operation: "flush change trail",
        })?;

        // Changes stay pending until the proxy took the trail, so a failed
        // send is retried whole by the next flush.
        let change_trail = self.context.build_change_trails(false)?;
        if !change_trail.is_empty() {
            debug!("Flushing {} record(s)", change_trail.len());
            proxy.apply_change_trail(
                ChangeTrailPayload::new(change_trail),
                self.config.wait_for_confirmation,
            )?;
            self.flush_count += 1;
        }
        self.context.build_change_trails(true)?;

        self.dispatch_messages()?;
        Ok(())
    }

    /// Hands messages sent by shadow objects to their view components.
    /// Returns how many were dispatched.
    pub fn dispatch_messages(&mut self) -> Result<usize, EnvError> {
        let Some(proxy) = self.proxy.as_mut() else {
            return Ok(0);
        };
        let messages = proxy.take_messages_to_view();
        let count = messages.len();
        for message in messages {
            self.context.dispatch_message(message)?;
        }
        Ok(count)
    }

    /// Failures the proxy reported for trails sent without waiting for
    /// confirmation since the last call. Their changes were already
    /// committed; `replace_proxy` rebuilds the mirror from scratch.
    pub fn take_failures(&mut self) -> Vec<EnvError> {
        match self.proxy.as_mut() {
            Some(proxy) => proxy.take_failures(),
            None => Vec::new(),
        }
    }

    /// Destroys the proxy. The context and its components stay alive, so a
    /// later `set_proxy` recreates them.
    pub fn destroy(&mut self) {
        if let Some(mut proxy) = self.proxy.take() {
            proxy.destroy();
            self.proxy_lost = true;
        }
        self.sync_requested = false;
    }
}
