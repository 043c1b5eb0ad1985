//! Component source model.
//!
//! A source exposes the entities of a component library and the views
//! (templates) that render them. The adapter only ever reads from a source;
//! entities and views are owned by it.
//!
//! - [`Component`]: a named entity with one or more [`Variant`]s, exactly one of
//!   which is the default. A component without explicit variants has an
//!   implicit `default` variant.
//! - [`Entity`]: what a handle resolves to, either a component or a variant.
//! - [`View`]: a template body with its path and handle.
//!
//! Variant handles are `<component>--<variant>`.

use std::path::{Path, PathBuf};

use mosaic_include::ContextLookup;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::context::defaults_deep;
use crate::names::bare_handle;

/// Name of the implicit default variant.
pub const DEFAULT_VARIANT: &str = "default";

/// Separator between a component handle and a variant name.
pub const VARIANT_SEPARATOR: &str = "--";

/// A concrete renderable instance of a component.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename = "variant", rename_all = "camelCase")]
pub struct Variant {
    /// Full handle (`card--large`).
    pub handle: String,
    /// Variant name (`large`).
    pub name: String,
    /// Human-readable label.
    pub label: String,
    /// Handle of the owning component.
    pub base_handle: String,
    /// Whether this is the component's default variant.
    pub is_default: bool,
    /// Context tree, with the component context filled in underneath.
    pub context: Value,
    #[serde(skip)]
    own_context: Value,
}

impl Variant {
    fn new(component: &str, name: &str, context: Value) -> Self {
        Self {
            handle: format!("{component}{VARIANT_SEPARATOR}{name}"),
            name: name.to_string(),
            label: name.to_string(),
            base_handle: component.to_string(),
            is_default: false,
            context: context.clone(),
            own_context: context,
        }
    }

    /// Serializable self-representation, bound to `_self` while rendering.
    pub fn to_json(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

/// A component: a named entity owning its variants.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename = "component", rename_all = "camelCase")]
pub struct Component {
    /// Component handle (`card`).
    pub handle: String,
    /// Human-readable label.
    pub label: String,
    /// Component-level context shared by all variants.
    pub context: Value,
    /// Template path, absolute or relative to the source root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<PathBuf>,
    /// Name of the default variant.
    pub default_variant: String,
    variants: Vec<Variant>,
}

impl Component {
    /// Creates a component with an implicit `default` variant and an empty context.
    pub fn new(handle: impl Into<String>) -> Self {
        let handle = handle.into();
        let mut default = Variant::new(&handle, DEFAULT_VARIANT, Value::Object(Map::new()));
        default.is_default = true;
        Self {
            label: handle.clone(),
            handle,
            context: Value::Object(Map::new()),
            view: None,
            default_variant: DEFAULT_VARIANT.to_string(),
            variants: vec![default],
        }
    }

    /// Sets the label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets the component context; every variant inherits it.
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = context;
        self.merge_contexts();
        self
    }

    /// Sets the template path.
    pub fn with_view(mut self, path: impl Into<PathBuf>) -> Self {
        self.view = Some(path.into());
        self
    }

    /// Adds a variant, or replaces the context of an existing one.
    pub fn with_variant(mut self, name: &str, context: Value) -> Self {
        match self.variants.iter_mut().find(|v| v.name == name) {
            Some(variant) => variant.own_context = context,
            None => self.variants.push(Variant::new(&self.handle, name, context)),
        }
        self.merge_contexts();
        self
    }

    /// Sets the label of an existing variant.
    pub fn with_variant_label(mut self, name: &str, label: impl Into<String>) -> Self {
        if let Some(variant) = self.variants.iter_mut().find(|v| v.name == name) {
            variant.label = label.into();
        }
        self
    }

    /// Makes `name` the default variant. Unknown names are ignored.
    pub fn with_default_variant(mut self, name: &str) -> Self {
        if self.variants.iter().any(|v| v.name == name) {
            self.default_variant = name.to_string();
            for variant in &mut self.variants {
                variant.is_default = variant.name == name;
            }
        }
        self
    }

    /// All variants, the implicit default included.
    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    /// Looks up a variant by name.
    pub fn variant(&self, name: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.name == name)
    }

    /// The default variant.
    pub fn default_variant(&self) -> &Variant {
        self.variant(&self.default_variant)
            .unwrap_or(&self.variants[0])
    }

    fn merge_contexts(&mut self) {
        for variant in &mut self.variants {
            let mut context = variant.own_context.clone();
            if context.is_null() {
                context = Value::Object(Map::new());
            }
            defaults_deep(&mut context, &self.context);
            variant.context = context;
        }
    }
}

/// What a handle resolves to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Entity {
    Component(Component),
    Variant(Variant),
}

impl Entity {
    /// The entity's handle.
    pub fn handle(&self) -> &str {
        match self {
            Entity::Component(c) => &c.handle,
            Entity::Variant(v) => &v.handle,
        }
    }

    pub fn is_component(&self) -> bool {
        matches!(self, Entity::Component(_))
    }

    pub fn is_variant(&self) -> bool {
        matches!(self, Entity::Variant(_))
    }

    /// The variant rendered for this entity: itself, or a component's default.
    pub fn into_default_variant(self) -> Variant {
        match self {
            Entity::Component(c) => c.default_variant().clone(),
            Entity::Variant(v) => v,
        }
    }

    /// Context tree of the variant rendered for this entity.
    pub fn context(&self) -> &Value {
        match self {
            Entity::Component(c) => &c.default_variant().context,
            Entity::Variant(v) => &v.context,
        }
    }

    /// Serializable self-representation.
    pub fn to_json(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

/// Whether a view renders a component or wraps previews.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
    Component,
    Wrapper,
}

/// A template body owned by the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    /// Absolute path of the template.
    pub path: PathBuf,
    /// Bare handle of the entity (or wrapper) the view renders.
    pub handle: String,
    pub kind: ViewKind,
    /// Template source.
    pub content: String,
}

/// A view, or only its path, carried by a change event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewRef {
    View(View),
    Path(PathBuf),
}

impl ViewRef {
    pub fn path(&self) -> &Path {
        match self {
            ViewRef::View(view) => &view.path,
            ViewRef::Path(path) => path,
        }
    }

    pub fn handle(&self) -> Option<&str> {
        match self {
            ViewRef::View(view) => Some(&view.handle),
            ViewRef::Path(_) => None,
        }
    }
}

/// Change notifications emitted by a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    ViewAdded(ViewRef),
    ViewUpdated(ViewRef),
    ViewRemoved(ViewRef),
    WrapperUpdated(ViewRef),
    WrapperRemoved(ViewRef),
}

impl SourceEvent {
    /// Event name (`view:updated`, ...).
    pub fn name(&self) -> &'static str {
        match self {
            SourceEvent::ViewAdded(_) => "view:added",
            SourceEvent::ViewUpdated(_) => "view:updated",
            SourceEvent::ViewRemoved(_) => "view:removed",
            SourceEvent::WrapperUpdated(_) => "wrapper:updated",
            SourceEvent::WrapperRemoved(_) => "wrapper:removed",
        }
    }

    pub fn view(&self) -> &ViewRef {
        match self {
            SourceEvent::ViewAdded(view)
            | SourceEvent::ViewUpdated(view)
            | SourceEvent::ViewRemoved(view)
            | SourceEvent::WrapperUpdated(view)
            | SourceEvent::WrapperRemoved(view) => view,
        }
    }

    /// Whether compiled templates of the event's view become stale.
    pub fn invalidates_cache(&self) -> bool {
        !matches!(self, SourceEvent::ViewAdded(_))
    }
}

/// Lookup of entities by bare handle.
pub trait EntitySource {
    /// Finds a component (`card`) or variant (`card--large`).
    fn find(&self, handle: &str) -> Option<Entity>;
}

/// Lookup of views.
pub trait ViewSource {
    /// Directory that relative template paths are resolved against.
    fn root(&self) -> &Path;

    /// Finds the view rendering `handle`; variant handles resolve to their component's view.
    fn find_view(&self, handle: &str) -> Option<View>;

    /// Finds the view stored at `path`.
    fn find_view_by_path(&self, path: &Path) -> Option<View>;
}

/// Callback receiving source events.
pub type Listener = Box<dyn Fn(&SourceEvent) + Send + Sync>;

/// Identifies a listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// A thread-safe component library the adapter renders from.
pub trait ComponentSource: EntitySource + ViewSource + Send + Sync {
    /// Source name, used to name the template loader.
    fn name(&self) -> &str;

    /// Registers a listener for change events.
    fn subscribe(&self, listener: Listener) -> SubscriptionId;

    /// Removes a listener. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}

/// [`ContextLookup`] over an [`EntitySource`], for include resolution.
pub struct SourceContexts<'a, S: ?Sized> {
    source: &'a S,
    handle_prefix: &'a str,
}

impl<'a, S: EntitySource + ?Sized> SourceContexts<'a, S> {
    pub fn new(source: &'a S, handle_prefix: &'a str) -> Self {
        Self {
            source,
            handle_prefix,
        }
    }
}

impl<S: EntitySource + ?Sized> ContextLookup for SourceContexts<'_, S> {
    fn context_of(&self, id: &str) -> Option<Value> {
        let entity = self.source.find(bare_handle(id, self.handle_prefix))?;
        Some(entity.into_default_variant().context)
    }
}
