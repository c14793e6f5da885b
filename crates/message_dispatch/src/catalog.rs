//! Handler discovery.
//!
//! Handlers are not found by inspecting types at runtime. Each handler module
//! contributes [`HandlerDescriptor`]s to a [`HandlerCatalog`] during its
//! initialization phase, and the dispatcher asks a [`HandlerSource`] for the
//! current candidate set on every load.

use crate::error::InstantiateError;
use crate::handler::MessageHandler;
use std::fmt;
use std::sync::Arc;

pub type HandlerFactory =
    Arc<dyn Fn() -> Result<Arc<dyn MessageHandler>, InstantiateError> + Send + Sync>;

/// A candidate for registration: a name, whether it is tagged as a message
/// handler, and a factory producing a fresh instance.
#[derive(Clone)]
pub struct HandlerDescriptor {
    name: String,
    tagged: bool,
    factory: HandlerFactory,
}

impl HandlerDescriptor {
    pub fn new<H, F>(name: impl Into<String>, factory: F) -> Self
    where
        H: MessageHandler + 'static,
        F: Fn() -> Result<H, InstantiateError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            tagged: true,
            factory: Arc::new(
                move || -> Result<Arc<dyn MessageHandler>, InstantiateError> {
                    Ok(Arc::new(factory()?))
                },
            ),
        }
    }

    /// Descriptor for a handler type with a `Default` constructor.
    pub fn of<H>() -> Self
    where
        H: MessageHandler + Default + 'static,
    {
        Self::new(std::any::type_name::<H>(), || Ok(H::default()))
    }

    /// Marks the candidate as not being a message handler. The loader skips
    /// it without calling the factory.
    pub fn untagged(mut self) -> Self {
        self.tagged = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_message_handler(&self) -> bool {
        self.tagged
    }

    pub fn instantiate(&self) -> Result<Arc<dyn MessageHandler>, InstantiateError> {
        (self.factory)()
    }
}

impl fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("name", &self.name)
            .field("tagged", &self.tagged)
            .finish_non_exhaustive()
    }
}

/// Supplies the candidate set for one load.
pub trait HandlerSource: Send + Sync {
    fn discover(&self) -> Vec<HandlerDescriptor>;
}

#[derive(Debug, Clone, Default)]
pub struct HandlerCatalog {
    descriptors: Vec<HandlerDescriptor>,
}

impl HandlerCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, descriptor: HandlerDescriptor) -> &mut Self {
        self.descriptors.push(descriptor);
        self
    }

    pub fn with(mut self, descriptor: HandlerDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    pub fn register<H>(&mut self) -> &mut Self
    where
        H: MessageHandler + Default + 'static,
    {
        self.add(HandlerDescriptor::of::<H>())
    }

    /// Appends every descriptor of `other`, keeping order.
    pub fn extend(&mut self, other: HandlerCatalog) -> &mut Self {
        self.descriptors.extend(other.descriptors);
        self
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HandlerDescriptor> {
        self.descriptors.iter()
    }
}

impl HandlerSource for HandlerCatalog {
    fn discover(&self) -> Vec<HandlerDescriptor> {
        self.descriptors.clone()
    }
}

/// Builds a [`HandlerCatalog`] from handler types with `Default` constructors.
///
/// ```ignore
/// let catalog = handler_catalog![PingHandler, ChatHandler];
/// ```
#[macro_export]
macro_rules! handler_catalog {
    ($($handler:ty),* $(,)?) => {{
        let mut catalog = $crate::HandlerCatalog::new();
        $(
            catalog.register::<$handler>();
        )*
        catalog
    }};
}
