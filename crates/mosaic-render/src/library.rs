//! In-memory component library.
//!
//! [`ComponentLibrary`] is the bundled [`ComponentSource`]: components and
//! their views are kept behind a lock, and every mutation is broadcast to
//! subscribers after the lock is released.
//!
//! A library can be built programmatically or loaded from a directory with
//! [`ComponentLibrary::load_dir`]:
//!
//! ```text
//! components/
//! ├── _preview.jinja          # wrapper (leading underscore)
//! ├── 01-button.jinja         # component "button" (order prefix stripped)
//! ├── 01-button.config.yaml   # optional context, label, variants
//! └── cards/
//!     └── card.jinja          # component "card"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Deserialize;
use serde_json::Value;

use crate::error::RenderError;
use crate::source::{
    Component, ComponentSource, Entity, EntitySource, Listener, SourceEvent, SubscriptionId, View,
    ViewKind, ViewRef, ViewSource, VARIANT_SEPARATOR,
};

/// Suffix of a component's configuration file.
pub const CONFIG_SUFFIX: &str = ".config.yaml";

/// Marker prefix of wrapper templates.
pub const WRAPPER_MARKER: char = '_';

type SharedListener = Arc<dyn Fn(&SourceEvent) + Send + Sync>;

#[derive(Default)]
struct LibraryState {
    components: BTreeMap<String, Component>,
    views: Vec<View>,
}

/// A thread-safe, in-memory component library.
pub struct ComponentLibrary {
    name: String,
    root: PathBuf,
    state: RwLock<LibraryState>,
    listeners: RwLock<Vec<(SubscriptionId, SharedListener)>>,
    next_id: AtomicU64,
}

impl ComponentLibrary {
    /// Creates an empty library rooted at `root`.
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            state: RwLock::new(LibraryState::default()),
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Adds a component and its template.
    ///
    /// The view is stored at the component's `view` path (relative paths are
    /// joined to the root), or at `<root>/<handle>.jinja` when none is set.
    /// Emits `view:added`.
    pub fn add_component(&self, component: Component, template: impl Into<String>) {
        let path = match &component.view {
            Some(path) => self.root.join(path),
            None => self.root.join(format!("{}.jinja", component.handle)),
        };
        let component = component.with_view(path.clone());
        let view = View {
            path,
            handle: component.handle.clone(),
            kind: ViewKind::Component,
            content: template.into(),
        };

        {
            let mut state = self.write_state();
            state.views.retain(|v| v.path != view.path);
            state.views.push(view.clone());
            state.components.insert(component.handle.clone(), component);
        }
        self.notify(&SourceEvent::ViewAdded(ViewRef::View(view)));
    }

    /// Adds a wrapper template. Emits `view:added`.
    pub fn add_wrapper(&self, handle: impl Into<String>, path: impl AsRef<Path>, template: impl Into<String>) {
        let view = View {
            path: self.root.join(path),
            handle: handle.into(),
            kind: ViewKind::Wrapper,
            content: template.into(),
        };
        {
            let mut state = self.write_state();
            state.views.retain(|v| v.path != view.path);
            state.views.push(view.clone());
        }
        self.notify(&SourceEvent::ViewAdded(ViewRef::View(view)));
    }

    /// Replaces the template of a component. Emits `view:updated`.
    ///
    /// Returns false if the component has no view.
    pub fn update_view(&self, handle: &str, template: impl Into<String>) -> bool {
        let updated = self.replace_content(handle, ViewKind::Component, template.into());
        match updated {
            Some(view) => {
                self.notify(&SourceEvent::ViewUpdated(ViewRef::View(view)));
                true
            }
            None => false,
        }
    }

    /// Removes a component and its view. Emits `view:removed`.
    pub fn remove_view(&self, handle: &str) -> bool {
        let removed = {
            let mut state = self.write_state();
            state.components.remove(handle);
            take_view(&mut state.views, |v| {
                v.kind == ViewKind::Component && v.handle == handle
            })
        };
        match removed {
            Some(view) => {
                self.notify(&SourceEvent::ViewRemoved(ViewRef::View(view)));
                true
            }
            None => false,
        }
    }

    /// Replaces the template of a wrapper. Emits `wrapper:updated`.
    pub fn update_wrapper(&self, handle: &str, template: impl Into<String>) -> bool {
        let updated = self.replace_content(handle, ViewKind::Wrapper, template.into());
        match updated {
            Some(view) => {
                self.notify(&SourceEvent::WrapperUpdated(ViewRef::View(view)));
                true
            }
            None => false,
        }
    }

    /// Removes a wrapper. Emits `wrapper:removed`.
    pub fn remove_wrapper(&self, handle: &str) -> bool {
        let removed = {
            let mut state = self.write_state();
            take_view(&mut state.views, |v| {
                v.kind == ViewKind::Wrapper && v.handle == handle
            })
        };
        match removed {
            Some(view) => {
                self.notify(&SourceEvent::WrapperRemoved(ViewRef::View(view)));
                true
            }
            None => false,
        }
    }

    /// Broadcasts an event to every subscriber.
    pub fn notify(&self, event: &SourceEvent) {
        let listeners: Vec<SharedListener> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        tracing::debug!(event = event.name(), path = %event.view().path().display(), listeners = listeners.len(), "source event");
        for listener in listeners {
            listener(event);
        }
    }

    /// Handles of all components, in order.
    pub fn handles(&self) -> Vec<String> {
        self.read_state().components.keys().cloned().collect()
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.read_state().components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Loads a library from a directory of templates with extension `ext`.
    ///
    /// Files whose name starts with `_` become wrappers; everything else
    /// becomes a component whose handle is the file stem without a numeric
    /// order prefix (`01-button` -> `button`). A sibling `<stem>.config.yaml`
    /// provides context, label, default variant and variants.
    pub fn load_dir(root: impl AsRef<Path>, ext: &str) -> Result<Self, RenderError> {
        let root = root.as_ref();
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "components".to_string());
        let library = Self::new(name, root);

        let suffix = format!(".{}", ext.trim_start_matches('.'));
        let mut files = Vec::new();
        walk(root, &suffix, &mut files)?;
        files.sort();

        for path in files {
            let Some(stem) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_suffix(&suffix))
                .map(str::to_string)
            else {
                continue;
            };
            let template = fs::read_to_string(&path)?;

            if stem.starts_with(WRAPPER_MARKER) {
                library.add_wrapper(stem, &path, template);
                continue;
            }

            let handle = strip_order_prefix(&stem).to_string();
            let config_path = path.with_file_name(format!("{stem}{CONFIG_SUFFIX}"));
            let component = if config_path.is_file() {
                let config: ComponentConfig = serde_yaml::from_str(&fs::read_to_string(&config_path)?)?;
                config.into_component(&handle)
            } else {
                Component::new(&handle)
            };
            tracing::debug!(handle = %handle, path = %path.display(), "loaded component");
            library.add_component(component.with_view(path), template);
        }

        Ok(library)
    }

    fn replace_content(&self, handle: &str, kind: ViewKind, content: String) -> Option<View> {
        let mut state = self.write_state();
        let view = state
            .views
            .iter_mut()
            .find(|v| v.kind == kind && v.handle == handle)?;
        view.content = content;
        Some(view.clone())
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, LibraryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, LibraryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EntitySource for ComponentLibrary {
    fn find(&self, handle: &str) -> Option<Entity> {
        let state = self.read_state();
        if let Some(component) = state.components.get(handle) {
            return Some(Entity::Component(component.clone()));
        }
        let (base, variant) = handle.split_once(VARIANT_SEPARATOR)?;
        let variant = state.components.get(base)?.variant(variant)?;
        Some(Entity::Variant(variant.clone()))
    }
}

impl ViewSource for ComponentLibrary {
    fn root(&self) -> &Path {
        &self.root
    }

    fn find_view(&self, handle: &str) -> Option<View> {
        let state = self.read_state();
        let lookup = |handle: &str| state.views.iter().find(|v| v.handle == handle).cloned();
        lookup(handle).or_else(|| {
            let (base, _) = handle.split_once(VARIANT_SEPARATOR)?;
            lookup(base)
        })
    }

    fn find_view_by_path(&self, path: &Path) -> Option<View> {
        self.read_state()
            .views
            .iter()
            .find(|v| v.path == path)
            .cloned()
    }
}

impl ComponentSource for ComponentLibrary {
    fn name(&self) -> &str {
        &self.name
    }

    fn subscribe(&self, listener: Listener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::from(listener)));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(existing, _)| *existing != id);
    }
}

impl std::fmt::Debug for ComponentLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentLibrary")
            .field("name", &self.name)
            .field("root", &self.root)
            .field("components", &self.handles())
            .finish_non_exhaustive()
    }
}

/// Contents of a `<name>.config.yaml` file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ComponentConfig {
    label: Option<String>,
    context: Option<Value>,
    default: Option<String>,
    variants: Vec<VariantConfig>,
}

#[derive(Debug, Deserialize)]
struct VariantConfig {
    name: String,
    label: Option<String>,
    #[serde(default)]
    context: Option<Value>,
}

impl ComponentConfig {
    fn into_component(self, handle: &str) -> Component {
        let mut component = Component::new(handle);
        if let Some(label) = self.label {
            component = component.with_label(label);
        }
        if let Some(context) = self.context {
            component = component.with_context(context);
        }
        for variant in self.variants {
            component = component.with_variant(&variant.name, variant.context.unwrap_or_default());
            if let Some(label) = variant.label {
                component = component.with_variant_label(&variant.name, label);
            }
        }
        if let Some(default) = self.default {
            component = component.with_default_variant(&default);
        }
        component
    }
}

fn take_view(views: &mut Vec<View>, predicate: impl Fn(&View) -> bool) -> Option<View> {
    let index = views.iter().position(predicate)?;
    Some(views.remove(index))
}

/// `01-button` -> `button`. Stems that are only digits are kept.
fn strip_order_prefix(stem: &str) -> &str {
    match stem.split_once('-') {
        Some((order, rest))
            if !order.is_empty() && !rest.is_empty() && order.bytes().all(|b| b.is_ascii_digit()) =>
        {
            rest
        }
        _ => stem,
    }
}

fn walk(dir: &Path, suffix: &str, files: &mut Vec<PathBuf>) -> Result<(), RenderError> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            walk(&path, suffix, files)?;
        } else if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(suffix) && !n.ends_with(CONFIG_SUFFIX))
        {
            files.push(path);
        }
    }
    Ok(())
}
