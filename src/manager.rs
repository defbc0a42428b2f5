//! Overlay manager: lifecycle state machine and per-tick reconciliation
//!
//! The manager is the composition root for the runtime core. It owns the
//! config store, both event channels, the VR runtime, the renderer and the
//! overlay bridge, and it is the only place that initialises or shuts down
//! the VR runtime session.

use std::rc::Rc;
use std::time::Instant;

use albrt_core::vr::{ApplicationType, EyeSlot, VrEvent};
use albrt_core::{
    CancelToken, ConfigStorage, ConfigStore, EventBus, ManagerEvent, Property, PropertyChange,
    Setting, StartupError, SubscriptionId, Tick, TickControl, TransformResolver,
    VrRuntime,
};
use albrt_overlay::{GpuBackend, MaskUniforms, OverlayBridge, Renderer, RendererConfig};
use tracing::{debug, error, info, warn};

use crate::event_log::EventLogger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    NotStarted,
    Loading,
    Error,
    Started,
    Running,
    Stopping,
    Stopped,
}

pub struct Manager<R: VrRuntime, G: GpuBackend> {
    state: LifecycleState,
    config: ConfigStore,
    events: EventBus<ManagerEvent>,
    runtime: R,
    renderer: Renderer<G>,
    bridge: OverlayBridge,
    resolver: TransformResolver,
    storage: Box<dyn ConfigStorage>,
    token: CancelToken,
    started_at: Option<Instant>,
    dashboard_open: bool,
    /// Whether DIRTY writes are reconciled immediately
    handler_attached: bool,
    log_subscriptions: Option<(SubscriptionId, SubscriptionId)>,
}

impl<R: VrRuntime, G: GpuBackend> Manager<R, G> {
    pub fn new(
        runtime: R,
        gpu: G,
        storage: Box<dyn ConfigStorage>,
        renderer_config: RendererConfig,
    ) -> Self {
        let bridge = OverlayBridge::new(&renderer_config.asset_dir);
        Self {
            state: LifecycleState::NotStarted,
            config: ConfigStore::new(),
            events: EventBus::new(),
            runtime,
            renderer: Renderer::new(gpu, renderer_config),
            bridge,
            resolver: TransformResolver::new(),
            storage,
            token: CancelToken::new(),
            started_at: None,
            dashboard_open: false,
            handler_attached: false,
            log_subscriptions: None,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    /// The lifecycle channel
    pub fn events(&self) -> &EventBus<ManagerEvent> {
        &self.events
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }

    pub fn renderer(&self) -> &Renderer<G> {
        &self.renderer
    }

    pub fn bridge(&self) -> &OverlayBridge {
        &self.bridge
    }

    pub fn resolver(&self) -> &TransformResolver {
        &self.resolver
    }

    pub fn is_dashboard_open(&self) -> bool {
        self.dashboard_open
    }

    /// Token observed by the scheduler driving this manager
    pub fn cancel_token(&self) -> CancelToken {
        self.token.clone()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Property API
    // ─────────────────────────────────────────────────────────────────────────

    pub fn get(&self, property: Property) -> Setting {
        self.config.get(property)
    }

    /// Write a property. While the manager is live the change is reconciled
    /// (and the property cleared) before this returns.
    pub fn set(&mut self, setting: Setting) -> PropertyChange {
        let change = self.config.set(setting);
        if self.handler_attached {
            self.on_property_dirty(change);
        }
        change
    }

    pub fn broadcast_init(&self, filter: &str) {
        self.config.broadcast_init(filter);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    fn transition(&mut self, state: LifecycleState) {
        debug!(from = ?self.state, to = ?state, "lifecycle transition");
        self.state = state;
    }

    fn emit(&self, event: ManagerEvent) {
        self.events.publish(&event);
    }

    pub fn start(&mut self) -> Result<(), StartupError> {
        if self.state != LifecycleState::NotStarted {
            warn!(state = ?self.state, "start ignored");
            return Ok(());
        }
        self.transition(LifecycleState::Loading);
        self.attach_event_logger();

        match self.storage.load() {
            Ok(settings) => {
                self.config.apply_settings(&settings);
                info!("settings applied");
            }
            Err(err) => warn!(error = %err, "settings not loaded, using defaults"),
        }
        self.started_at = Some(Instant::now());
        self.emit(ManagerEvent::Loading);

        if let Err(err) = self.bring_up() {
            self.fail(&err);
            return Err(err);
        }

        self.transition(LifecycleState::Started);
        self.emit(ManagerEvent::Started);

        self.handler_attached = true;
        for property in self.config.dirty_properties() {
            self.config.clear(property);
        }

        self.transition(LifecycleState::Running);
        info!("overlays running");
        Ok(())
    }

    /// Runtime session, overlays, placement, visibility, GPU and first frame
    fn bring_up(&mut self) -> Result<(), StartupError> {
        if !self.runtime.is_hmd_present() {
            return Err(StartupError::NoHmd);
        }
        self.runtime
            .init(ApplicationType::Overlay)
            .map_err(StartupError::RuntimeInit)?;
        self.bridge.create_both(&mut self.runtime)?;

        let right = self.runtime.eye_to_head_transform(EyeSlot::Right);
        self.resolver.observe(&right);
        self.apply_transforms();

        self.dashboard_open = self.runtime.is_dashboard_visible();
        self.apply_visibility();

        self.renderer
            .start()
            .map_err(|e| StartupError::Renderer(Box::new(e)))?;
        self.render(0.0);
        self.apply_alpha(0.0);
        Ok(())
    }

    fn fail(&mut self, err: &StartupError) {
        error!(code = err.code(), error = %err, "startup failed");

        self.renderer.destroy();
        self.bridge.destroy(&mut self.runtime);
        if !matches!(err, StartupError::NoHmd | StartupError::RuntimeInit(_)) {
            self.runtime.shutdown();
        }

        self.transition(LifecycleState::Error);
        self.emit(ManagerEvent::Error {
            code: err.code().to_string(),
            error: err.message(),
            solution: err.solution().to_string(),
        });
        self.detach_event_logger();
    }

    /// Stop everything and persist settings. Does nothing unless running.
    pub fn quit(&mut self) {
        if self.state != LifecycleState::Running {
            debug!(state = ?self.state, "quit ignored");
            return;
        }
        self.transition(LifecycleState::Stopping);
        self.handler_attached = false;
        self.detach_event_logger();

        self.token.cancel();
        self.renderer.destroy();
        self.bridge.destroy(&mut self.runtime);

        if let Err(err) = self.storage.save(&self.config.snapshot()) {
            error!(error = %err, "settings not saved");
        }
        self.runtime.shutdown();

        self.transition(LifecycleState::Stopped);
        info!("overlays stopped");
        self.emit(ManagerEvent::Quit);
    }

    fn attach_event_logger(&mut self) {
        if self.log_subscriptions.is_some() {
            return;
        }
        let logger = Rc::new(EventLogger);
        let config_id = self.config.bus().subscribe(logger.clone());
        let events_id = self.events.subscribe(logger);
        self.log_subscriptions = Some((config_id, events_id));
    }

    fn detach_event_logger(&mut self) {
        if let Some((config_id, events_id)) = self.log_subscriptions.take() {
            self.config.bus().unsubscribe(config_id);
            self.events.unsubscribe(events_id);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Tick
    // ─────────────────────────────────────────────────────────────────────────

    /// Seconds since start
    pub fn elapsed(&self) -> f32 {
        self.started_at
            .map(|t| t.elapsed().as_secs_f32())
            .unwrap_or(0.0)
    }

    /// One tick at a given animation time
    pub fn tick_at(&mut self, elapsed: f32) -> TickControl {
        if self.state != LifecycleState::Running {
            return TickControl::Stop;
        }
        if self.poll_events() == TickControl::Stop {
            return TickControl::Stop;
        }

        let right = self.runtime.eye_to_head_transform(EyeSlot::Right);
        if self.resolver.observe(&right) {
            debug!(half_ipd = self.resolver.half_ipd(), "IPD moved");
            self.set(Setting::IpdChanged(true));
        }

        self.render(elapsed);

        if self.config.alpha_t_enabled() {
            self.apply_alpha(elapsed);
        }
        TickControl::Continue
    }

    /// Drain pending runtime events. Returns Stop when the runtime asked to quit.
    fn poll_events(&mut self) -> TickControl {
        while let Some(event) = self.runtime.poll_next_event() {
            match event {
                VrEvent::DashboardActivated => {
                    self.dashboard_open = true;
                    self.emit(ManagerEvent::DashboardOpened);
                    self.apply_visibility();
                }
                VrEvent::DashboardDeactivated => {
                    self.dashboard_open = false;
                    self.emit(ManagerEvent::DashboardClosed);
                    self.apply_visibility();
                }
                VrEvent::Quit => {
                    info!("runtime requested quit");
                    self.runtime.acknowledge_quit_exiting();
                    self.quit();
                    return TickControl::Stop;
                }
                VrEvent::Other(code) => debug!(code, "runtime event ignored"),
            }
        }
        TickControl::Continue
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reconciliation
    // ─────────────────────────────────────────────────────────────────────────

    fn on_property_dirty(&mut self, change: PropertyChange) {
        match change.property {
            Property::IpdChanged => {
                self.apply_transforms();
                self.config.clear_to(Setting::IpdChanged(false));
                return;
            }
            Property::Alpha | Property::AlphaTEnabled => {
                if !self.config.alpha_t_enabled() {
                    self.bridge.set_alpha(&mut self.runtime, self.config.alpha());
                }
            }
            // Read by the next tick
            Property::AlphaTSpeed | Property::AlphaTType => {}
            Property::OverlayMaskType
            | Property::PatchColour
            | Property::PatchType
            | Property::PatchRadialSize
            | Property::PatchRadialSoftness
            | Property::SlatColour
            | Property::SlatHeight
            | Property::SlatSliceHeight
            | Property::SlatSliceOffset
            | Property::EyeToRender
            | Property::FogColour
            | Property::FogAnimated
            | Property::FogSpeed
            | Property::FogDirection
            | Property::FogType
            | Property::FogSeed => self.renderer.invalidate(),
            Property::HideInDash | Property::OverlaysVisible => self.apply_visibility(),
            Property::EyesSwitched => self.push_frame(),
            // Reserved for the 3D mask path
            Property::VirtualDistance => {}
        }
        self.config.clear(change.property);
    }

    fn apply_transforms(&mut self) {
        let right = self.runtime.eye_to_head_transform(EyeSlot::Right);
        let transforms = self.resolver.resolve(&right);
        self.bridge.push_transforms(&mut self.runtime, &transforms);
    }

    fn apply_visibility(&mut self) {
        self.bridge.show_or_hide(
            &mut self.runtime,
            self.config.overlays_visible(),
            self.dashboard_open,
            self.config.hide_in_dash(),
        );
    }

    fn apply_alpha(&mut self, elapsed: f32) {
        let alpha = match self.config.alpha_animation() {
            Some(animation) => animation.opacity_at(elapsed),
            None => self.config.alpha(),
        };
        self.bridge.set_alpha(&mut self.runtime, alpha);
    }

    fn render(&mut self, elapsed: f32) {
        let uniforms = MaskUniforms::from_store(&self.config);
        match self.renderer.draw_if_needed(&uniforms, elapsed) {
            Ok(Some(_)) => self.push_frame(),
            Ok(None) => {}
            Err(err) => warn!(error = %err, "redraw failed, retrying next tick"),
        }
    }

    /// Hand the current frame to both overlays, as pixels when the runtime
    /// asks for them and the backend has them
    fn push_frame(&mut self) {
        let switched = self.config.eyes_switched();
        if self.runtime.wants_raw_images()
            && let Some(images) = self.renderer.eye_images()
        {
            self.bridge.push_images(&mut self.runtime, images, switched);
        } else if let Some(textures) = self.renderer.textures() {
            self.bridge.push_textures(&mut self.runtime, textures, switched);
        }
    }
}

impl<R: VrRuntime, G: GpuBackend> Tick for Manager<R, G> {
    fn tick(&mut self) -> TickControl {
        let elapsed = self.elapsed();
        self.tick_at(elapsed)
    }
}
