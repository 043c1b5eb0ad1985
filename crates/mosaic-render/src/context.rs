//! Context tree helpers for identity-scoped rendering.
//!
//! Keys starting with [`INTERNAL_MARKER`] are ambient values (`_self`,
//! `_target`, `_env`, `_config`) seeded or bound by the adapter.
//!
//! MiniJinja enumerates a mapping from its own keys each time the template
//! reads it, so there is no separate key index to rebuild after the context is
//! rewritten and nothing extra is written into the tree.

use serde_json::Value;

/// Prefix of ambient and internal context keys.
pub const INTERNAL_MARKER: char = '_';

/// Ambient key bound to the entity being rendered.
pub const SELF_KEY: &str = "_self";
/// Ambient key bound to the render target.
pub const TARGET_KEY: &str = "_target";
/// Ambient key bound to the render environment.
pub const ENV_KEY: &str = "_env";
/// Ambient key bound to the application configuration.
pub const CONFIG_KEY: &str = "_config";

/// Fills in everything `defaults` has and `target` lacks. Values already in
/// `target` win.
///
/// Mappings present on both sides are merged key by key. Sequences present on
/// both sides are merged index by index, and default items past the end of
/// the target's sequence are appended.
pub fn defaults_deep(target: &mut Value, defaults: &Value) {
    match (target, defaults) {
        (Value::Object(target), Value::Object(defaults)) => {
            for (key, default) in defaults {
                match target.get_mut(key) {
                    None => {
                        target.insert(key.clone(), default.clone());
                    }
                    Some(existing) => defaults_deep(existing, default),
                }
            }
        }
        (Value::Array(target), Value::Array(defaults)) => {
            for (existing, default) in target.iter_mut().zip(defaults) {
                defaults_deep(existing, default);
            }
            let len = target.len();
            if defaults.len() > len {
                target.extend_from_slice(&defaults[len..]);
            }
        }
        _ => {}
    }
}

/// Sets `key` to `value` when the context has no such key and a value is given.
pub fn set_if_absent(context: &mut Value, key: &str, value: Option<Value>) {
    let (Value::Object(map), Some(value)) = (context, value) else {
        return;
    };
    if !map.contains_key(key) {
        map.insert(key.to_string(), value);
    }
}

/// Binds `key` to `value`, replacing what was there.
pub fn bind(context: &mut Value, key: &str, value: Value) {
    if let Value::Object(map) = context {
        map.insert(key.to_string(), value);
    }
}
