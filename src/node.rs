use crate::device::DeviceLink;
use crate::error::{Result, TesiraError};
use crate::lock;
use crate::property::{Detach, Property};
use crate::protocol::{Command, CommandKind};
use crate::router::{Owner, ResponseCallback, RouteKey};
use crate::subscription::PropertyChange;
use crate::types::{IndexPath, NodeId};
use crate::value::ControlValue;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Device-facing lifecycle shared by blocks, channels, lines and call appearances
///
/// Containers cascade each call to their children.
pub trait Lifecycle: Send + Sync {
    /// Issue the initial get/subscribe sequence if the device is ready
    fn initialize(&self);

    /// Forget transport-bound state after the connection dropped
    fn suspend(&self);

    /// Unsubscribe everything and sever callbacks; the node is dead afterwards
    fn dispose(&self);
}

#[derive(Clone)]
struct Binding {
    attribute: &'static str,
    subscribe: bool,
    handler: ResponseCallback,
    property: Arc<dyn Detach>,
}

/// All bindings of one attribute merged behind a single callback
struct AttributeGroup {
    attribute: &'static str,
    subscribe: bool,
    handler: ResponseCallback,
}

/// One addressable object on the device
///
/// Concrete node types own an `AttributeNode` plus their typed properties and
/// bind each property to a device attribute. The node then takes care of the
/// get/subscribe sequence, reply correlation, dedup and the unsubscribe on
/// dispose. Nothing is sent until the device has signalled ready.
pub struct AttributeNode {
    owner: Owner,
    instance_tag: String,
    index_path: IndexPath,
    link: Arc<DeviceLink>,
    initialized: AtomicBool,
    bindings: Mutex<Vec<Binding>>,
    subscribed: Mutex<Vec<RouteKey>>,
}

impl AttributeNode {
    pub(crate) fn new(
        link: Arc<DeviceLink>,
        instance_tag: impl Into<String>,
        index_path: IndexPath,
    ) -> Self {
        Self {
            owner: Owner::new(),
            instance_tag: instance_tag.into(),
            index_path,
            link,
            initialized: AtomicBool::new(false),
            bindings: Mutex::new(Vec::new()),
            subscribed: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> NodeId {
        self.owner.id()
    }

    pub fn instance_tag(&self) -> &str {
        &self.instance_tag
    }

    pub fn index_path(&self) -> &IndexPath {
        &self.index_path
    }

    /// `false` once disposed
    pub fn is_alive(&self) -> bool {
        self.owner.is_alive()
    }

    /// Whether the get/subscribe sequence ran for the current connection
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Keys this node currently holds subscriptions for
    pub fn subscriptions(&self) -> Vec<RouteKey> {
        lock(&self.subscribed).clone()
    }

    pub(crate) fn link(&self) -> &Arc<DeviceLink> {
        &self.link
    }

    pub fn route_key(&self, attribute: &str) -> RouteKey {
        RouteKey::new(
            self.instance_tag.clone(),
            attribute,
            self.index_path.clone(),
        )
    }

    /// Bind a property to a device attribute
    ///
    /// Several properties may share one attribute; the device is queried once
    /// and every decoder sees the same value. A value that fails to decode is
    /// logged and leaves the property untouched.
    pub(crate) fn bind<T, F>(
        &self,
        attribute: &'static str,
        subscribe: bool,
        property: &Arc<Property<T>>,
        decode: F,
    ) where
        T: Clone + PartialEq + Send + 'static,
        F: Fn(&ControlValue) -> Result<T> + Send + Sync + 'static,
    {
        let node = self.id();
        let instance_tag = self.instance_tag.clone();
        let index_path = self.index_path.clone();
        let link = Arc::downgrade(&self.link);
        let target = Arc::clone(property);

        let handler: ResponseCallback = Arc::new(move |_device: &str, value: &ControlValue| {
            match decode(value) {
                Ok(decoded) => {
                    if target.update(decoded) {
                        if let Some(link) = link.upgrade() {
                            link.publish_change(PropertyChange {
                                node,
                                instance_tag: instance_tag.clone(),
                                index_path: index_path.clone(),
                                property: target.name(),
                                value: value.clone(),
                            });
                        }
                    }
                }
                Err(e) => {
                    tracing::debug!(
                        "Ignoring {} feedback for {}{}: {}",
                        attribute,
                        instance_tag,
                        index_path,
                        e
                    );
                }
            }
        });

        let detach: Arc<dyn Detach> = property.clone();
        lock(&self.bindings).push(Binding {
            attribute,
            subscribe,
            handler,
            property: detach,
        });
    }

    fn groups(&self) -> Vec<AttributeGroup> {
        let bindings = lock(&self.bindings).clone();
        let mut groups: Vec<(&'static str, bool, Vec<ResponseCallback>)> = Vec::new();
        for binding in bindings {
            if let Some(group) = groups.iter_mut().find(|group| group.0 == binding.attribute) {
                group.1 |= binding.subscribe;
                group.2.push(binding.handler);
            } else {
                groups.push((binding.attribute, binding.subscribe, vec![binding.handler]));
            }
        }

        groups
            .into_iter()
            .map(|(attribute, subscribe, handlers)| AttributeGroup {
                attribute,
                subscribe,
                handler: combine(handlers),
            })
            .collect()
    }

    fn command(&self, kind: CommandKind, attribute: &str) -> Command {
        Command::new(self.instance_tag.clone(), kind, attribute)
            .with_index_path(self.index_path.clone())
    }

    fn transmit(&self, command: Command) {
        if let Err(e) = self.link.send(&command) {
            tracing::warn!("Failed to send '{}': {}", command, e);
        }
    }

    /// Send an adjustment command for an attribute
    ///
    /// The reply is correlated to the attribute's bound properties. Commands
    /// issued before the node is initialized are dropped. NaN and infinite
    /// values are rejected since the device has no token for them.
    pub(crate) fn send(
        &self,
        kind: CommandKind,
        attribute: &str,
        value: Option<ControlValue>,
    ) -> Result<()> {
        if let Some(ControlValue::Float(number)) = &value {
            if !number.is_finite() {
                return Err(TesiraError::InvalidCommand(format!(
                    "{} {} is not a finite number",
                    attribute, number
                )));
            }
        }

        let mut command = self.command(kind, attribute);
        command.value = value;

        if !self.is_initialized() {
            tracing::debug!("Suppressing '{}': device not ready", command);
            return Ok(());
        }

        if let Some(group) = self
            .groups()
            .into_iter()
            .find(|group| group.attribute == attribute)
        {
            self.link
                .router()
                .register(command.route_key(), &self.owner, group.handler, true);
        }
        self.link.send(&command)
    }

    /// Call a device service such as `dial` with an optional argument
    pub(crate) fn invoke(&self, service: &str, argument: Option<ControlValue>) -> Result<()> {
        let mut command = Command::invoke(self.instance_tag.clone(), service)
            .with_index_path(self.index_path.clone());
        command.value = argument;

        if !self.is_initialized() {
            tracing::debug!("Suppressing '{}': device not ready", command);
            return Ok(());
        }
        self.link.send(&command)
    }
}

impl Lifecycle for AttributeNode {
    fn initialize(&self) {
        // Held across the sequence so dispose sees every key issued here
        let mut subscribed = lock(&self.subscribed);
        if !self.is_alive() || self.is_initialized() {
            return;
        }
        if !self.link.is_ready() {
            tracing::trace!(
                "Deferring {}{} until the device is ready",
                self.instance_tag,
                self.index_path
            );
            return;
        }
        self.initialized.store(true, Ordering::Release);

        let router = self.link.router();
        for group in self.groups() {
            let key = self.route_key(group.attribute);
            router.register(key.clone(), &self.owner, group.handler.clone(), true);
            self.transmit(self.command(CommandKind::Get, group.attribute));

            if group.subscribe {
                router.register(key.clone(), &self.owner, group.handler, false);
                self.transmit(self.command(CommandKind::Subscribe, group.attribute));
                subscribed.push(key);
            }
        }
    }

    fn suspend(&self) {
        let mut subscribed = lock(&self.subscribed);
        self.initialized.store(false, Ordering::Release);
        subscribed.clear();
    }

    fn dispose(&self) {
        if !self.owner.retire() {
            return;
        }

        let subscribed = {
            let mut subscribed = lock(&self.subscribed);
            self.initialized.store(false, Ordering::Release);
            std::mem::take(&mut *subscribed)
        };
        let router = self.link.router();
        for key in subscribed {
            self.transmit(self.command(CommandKind::Unsubscribe, &key.attribute));
            router.unsubscribe(&key);
        }
        router.remove_owner(self.owner.id());

        let bindings = std::mem::take(&mut *lock(&self.bindings));
        for binding in bindings {
            binding.property.detach_observers();
        }
        tracing::debug!("Disposed {}{}", self.instance_tag, self.index_path);
    }
}

fn combine(mut handlers: Vec<ResponseCallback>) -> ResponseCallback {
    if handlers.len() == 1 {
        if let Some(handler) = handlers.pop() {
            return handler;
        }
    }
    Arc::new(move |device: &str, value: &ControlValue| {
        for handler in &handlers {
            handler(device, value);
        }
    })
}
