//! Script-style behaviors and their hook dispatch
//!
//! A behavior is detached from its node while one of its hooks runs, so the
//! hook gets unrestricted mutable access to the scene. Failures (errors and
//! panics) are logged and never abort the caller.

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::cell::RefCell;
use std::error::Error;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use boxworld_physics::RigidBody;

use crate::component::Component;
use crate::node::Node;
use crate::scene::{NodeKey, Scene};

/// Result returned by behavior hooks
pub type HookResult = Result<(), Box<dyn Error + Send + Sync>>;

/// What a hook sees: the scene and the node the behavior belongs to
pub struct HookContext<'a> {
    pub scene: &'a mut Scene,
    pub node: NodeKey,
}

impl<'a> HookContext<'a> {
    pub fn new(scene: &'a mut Scene, node: NodeKey) -> Self {
        Self { scene, node }
    }

    /// The owning node
    pub fn node(&self) -> Option<&Node> {
        self.scene.get(self.node)
    }

    pub fn node_mut(&mut self) -> Option<&mut Node> {
        self.scene.get_mut(self.node)
    }

    /// The owning node's rigid body
    pub fn rigid_body_mut(&mut self) -> Option<&mut RigidBody> {
        self.node_mut()?.rigid_body_mut()
    }
}

/// User logic attached to a node
///
/// Every hook is optional. `on_attach` runs when the behavior is added and
/// may refuse the node by returning an error; `start` runs once when the
/// world starts (or on attach, for behaviors added afterwards); `update`
/// runs on ticks with script hooks enabled. Collision hooks receive the
/// other node's key.
pub trait Behavior {
    /// Default storage key: the type name without its module path
    fn name(&self) -> &str {
        short_type_name(std::any::type_name_of_val(self))
    }

    fn on_attach(&mut self, _ctx: &mut HookContext<'_>) -> HookResult {
        Ok(())
    }

    fn start(&mut self, _ctx: &mut HookContext<'_>) -> HookResult {
        Ok(())
    }

    fn update(&mut self, _ctx: &mut HookContext<'_>, _dt: f32) -> HookResult {
        Ok(())
    }

    fn on_collision_enter(&mut self, _ctx: &mut HookContext<'_>, _other: NodeKey) -> HookResult {
        Ok(())
    }

    fn on_collision_stay(&mut self, _ctx: &mut HookContext<'_>, _other: NodeKey) -> HookResult {
        Ok(())
    }

    fn on_collision_exit(&mut self, _ctx: &mut HookContext<'_>, _other: NodeKey) -> HookResult {
        Ok(())
    }

    fn on_trigger_enter(&mut self, _ctx: &mut HookContext<'_>, _other: NodeKey) -> HookResult {
        Ok(())
    }
}

fn short_type_name(full: &str) -> &str {
    // Strip the module path but keep any generic arguments intact
    let base = full.split('<').next().unwrap_or(full);
    match base.rfind("::") {
        Some(index) => &full[index + 2..],
        None => full,
    }
}

/// A hook invocation
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Hook {
    Attach,
    Start,
    Update(f32),
    CollisionEnter(NodeKey),
    CollisionStay(NodeKey),
    CollisionExit(NodeKey),
    TriggerEnter(NodeKey),
}

impl Hook {
    fn label(&self) -> &'static str {
        match self {
            Hook::Attach => "on_attach",
            Hook::Start => "start",
            Hook::Update(_) => "update",
            Hook::CollisionEnter(_) => "on_collision_enter",
            Hook::CollisionStay(_) => "on_collision_stay",
            Hook::CollisionExit(_) => "on_collision_exit",
            Hook::TriggerEnter(_) => "on_trigger_enter",
        }
    }

    fn call(self, behavior: &mut dyn Behavior, ctx: &mut HookContext<'_>) -> HookResult {
        match self {
            Hook::Attach => behavior.on_attach(ctx),
            Hook::Start => behavior.start(ctx),
            Hook::Update(dt) => behavior.update(ctx, dt),
            Hook::CollisionEnter(other) => behavior.on_collision_enter(ctx, other),
            Hook::CollisionStay(other) => behavior.on_collision_stay(ctx, other),
            Hook::CollisionExit(other) => behavior.on_collision_exit(ctx, other),
            Hook::TriggerEnter(other) => behavior.on_trigger_enter(ctx, other),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Where the last panic on this thread happened, and its backtrace if enabled
struct PanicSite {
    location: String,
    backtrace: Backtrace,
}

thread_local! {
    static LAST_PANIC: RefCell<Option<PanicSite>> = const { RefCell::new(None) };
}

static RECORD_PANICS: Once = Once::new();

/// Chain a panic hook that remembers the panic site for `call_guarded`
///
/// The previously installed hook still runs afterwards.
fn record_panic_sites() {
    RECORD_PANICS.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let location = info
                .location()
                .map(|l| format!("{}:{}", l.file(), l.line()))
                .unwrap_or_else(|| "unknown location".to_string());
            let site = PanicSite {
                location,
                backtrace: Backtrace::capture(),
            };
            LAST_PANIC.with(|last| *last.borrow_mut() = Some(site));
            previous(info);
        }));
    });
}

/// Run one hook, converting errors and panics into a message
///
/// Panic messages carry the source location; the backtrace is logged at
/// debug level when `RUST_BACKTRACE` enables capturing.
pub(crate) fn call_guarded(
    behavior: &mut dyn Behavior,
    scene: &mut Scene,
    node: NodeKey,
    hook: Hook,
) -> Result<(), String> {
    record_panic_sites();
    let mut ctx = HookContext::new(scene, node);
    match panic::catch_unwind(AssertUnwindSafe(|| hook.call(behavior, &mut ctx))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(err.to_string()),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            match LAST_PANIC.with(|last| last.borrow_mut().take()) {
                Some(site) => {
                    if site.backtrace.status() == BacktraceStatus::Captured {
                        log::debug!("{} hook backtrace:\n{}", hook.label(), site.backtrace);
                    }
                    Err(format!("panicked at {}: {}", site.location, message))
                }
                None => Err(format!("panicked: {}", message)),
            }
        }
    }
}

/// Run `hook` on the behavior stored under `key`
///
/// Returns `false` if the behavior was missing or the hook failed.
pub(crate) fn run_hook(scene: &mut Scene, node: NodeKey, key: &str, hook: Hook) -> bool {
    let Some((index, mut behavior)) = take_behavior(scene, node, key) else {
        return false;
    };

    let node_name = scene.get(node).map(|n| n.name.clone()).unwrap_or_default();
    let outcome = call_guarded(behavior.as_mut(), scene, node, hook);
    if let Err(message) = &outcome {
        log::error!(
            "{} hook of '{}' ({}) on node '{}' failed: {}",
            hook.label(),
            key,
            behavior.name(),
            node_name,
            message
        );
    }

    match scene.get_mut(node) {
        Some(owner) if owner.has_component(key) => {
            log::debug!("'{}' on '{}' was replaced during {}", key, node_name, hook.label());
        }
        Some(owner) => owner.restore_component(index, key.to_string(), Component::Behavior(behavior)),
        None => log::debug!("node '{}' was destroyed during {}", node_name, hook.label()),
    }
    outcome.is_ok()
}

/// Run `hook` on every behavior of a node, in attach order
pub(crate) fn run_hooks(scene: &mut Scene, node: NodeKey, hook: Hook) {
    let keys = match scene.get(node) {
        Some(n) => n.behavior_keys(),
        None => return,
    };
    for key in keys {
        run_hook(scene, node, &key, hook);
    }
}

fn take_behavior(scene: &mut Scene, node: NodeKey, key: &str) -> Option<(usize, Box<dyn Behavior>)> {
    let owner = scene.get_mut(node)?;
    if !matches!(owner.get_component(key), Some(Component::Behavior(_))) {
        return None;
    }
    match owner.take_component(key)? {
        (index, Component::Behavior(behavior)) => Some((index, behavior)),
        _ => None,
    }
}
