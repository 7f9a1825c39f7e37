// src/core/env.rs

//! Layered key/value environment.
//!
//! Reads are merged: the innermost layer that defines a key wins. Writes go to
//! one explicit layer, by default the `Session` layer, so values written by a
//! step outlive the ephemeral `Command` overlay pushed for that step.

use std::collections::BTreeMap;

/// Value that, when written through a parsed env binding, deletes the key instead.
pub const DEL_MARK: &str = "--";

/// The named partitions of an [`Env`], from least to most specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EnvLayerKind {
    /// Built-in defaults plus the user config file.
    Default,
    /// Values that belong to the current run; persisted to the session file.
    Session,
    /// Ephemeral overlay carrying one step's bindings.
    Command,
}

impl EnvLayerKind {
    /// Lowercase name used in logs and listings.
    pub fn name(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Session => "session",
            Self::Command => "command",
        }
    }
}

/// A single layer. Layer handles bypass merging entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvLayer {
    kind: EnvLayerKind,
    pairs: BTreeMap<String, String>,
}

impl EnvLayer {
    /// An empty layer.
    pub fn new(kind: EnvLayerKind) -> Self {
        Self {
            kind,
            pairs: BTreeMap::new(),
        }
    }

    /// Which partition this layer is.
    pub fn kind(&self) -> EnvLayerKind {
        self.kind
    }

    /// Value in this layer only.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs.get(key).map(String::as_str)
    }

    /// Returns the value or an empty string when absent.
    pub fn get_raw(&self, key: &str) -> &str {
        self.get(key).unwrap_or("")
    }

    /// See [`Env::get_bool`].
    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).is_some_and(parse_bool)
    }

    /// Whether this layer defines `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.pairs.contains_key(key)
    }

    /// Empty keys are ignored.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        if key.is_empty() {
            log::warn!("Ignoring write of an empty env key to the {} layer.", self.kind.name());
            return;
        }
        self.pairs.insert(key, value.into());
    }

    /// Stores `true` or `false`.
    pub fn set_bool(&mut self, key: impl Into<String>, value: bool) {
        self.set(key, if value { "true" } else { "false" });
    }

    /// Stores the decimal form.
    pub fn set_int(&mut self, key: impl Into<String>, value: i64) {
        self.set(key, value.to_string());
    }

    /// Removes `key`, returning the old value.
    pub fn delete(&mut self, key: &str) -> Option<String> {
        self.pairs.remove(key)
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// True when the layer holds no pair.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Copies every pair of `other` into this layer.
    pub fn merge_from(&mut self, other: &Self) {
        for (k, v) in &other.pairs {
            self.pairs.insert(k.clone(), v.clone());
        }
    }
}

/// The hierarchical environment shared by a whole run.
///
/// `Default` and `Session` always exist; `Command` overlays are stacked on top
/// while a step runs and popped afterwards. `clone()` yields a fully
/// independent copy, which is what dry-run description works on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Env {
    default: EnvLayer,
    session: EnvLayer,
    overlays: Vec<EnvLayer>,
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}

impl Env {
    /// Empty default and session layers, no overlay.
    pub fn new() -> Self {
        Self {
            default: EnvLayer::new(EnvLayerKind::Default),
            session: EnvLayer::new(EnvLayerKind::Session),
            overlays: Vec::new(),
        }
    }

    /// Layers from most specific to least specific.
    fn layers_innermost_first(&self) -> impl Iterator<Item = &EnvLayer> {
        self.overlays
            .iter()
            .rev()
            .chain(std::iter::once(&self.session))
            .chain(std::iter::once(&self.default))
    }

    /// Merged read. `None` means absent, which is distinct from an empty value.
    pub fn get_ex(&self, key: &str) -> Option<&str> {
        self.layers_innermost_first().find_map(|layer| layer.get(key))
    }

    /// Merged value, or empty when absent.
    pub fn get_raw(&self, key: &str) -> &str {
        self.get_ex(key).unwrap_or("")
    }

    /// `true` for "true", "1", "yes", "on" (any case); `false` when missing or anything else.
    pub fn get_bool(&self, key: &str) -> bool {
        self.get_ex(key).is_some_and(parse_bool)
    }

    /// Parses the merged value as an integer; `0` when missing or malformed.
    pub fn get_int(&self, key: &str) -> i64 {
        self.get_ex(key)
            .and_then(|v| v.trim().parse::<i64>().ok())
            .unwrap_or(0)
    }

    /// Like [`Env::get_int`] but with a caller-chosen fallback.
    pub fn get_int_or(&self, key: &str, fallback: i64) -> i64 {
        self.get_ex(key)
            .and_then(|v| v.trim().parse::<i64>().ok())
            .unwrap_or(fallback)
    }

    /// Writes to the session layer.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.session.set(key, value);
    }

    /// Writes a bool to the session layer.
    pub fn set_bool(&mut self, key: impl Into<String>, value: bool) {
        self.session.set_bool(key, value);
    }

    /// Deletes from the session layer only; lower layers become visible again.
    pub fn delete(&mut self, key: &str) -> Option<String> {
        self.session.delete(key)
    }

    /// Returns the innermost layer of the given kind.
    pub fn get_layer(&self, kind: EnvLayerKind) -> Option<&EnvLayer> {
        match kind {
            EnvLayerKind::Default => Some(&self.default),
            EnvLayerKind::Session => Some(&self.session),
            EnvLayerKind::Command => self.overlays.last(),
        }
    }

    /// Mutable form of [`Env::get_layer`].
    pub fn get_layer_mut(&mut self, kind: EnvLayerKind) -> Option<&mut EnvLayer> {
        match kind {
            EnvLayerKind::Default => Some(&mut self.default),
            EnvLayerKind::Session => Some(&mut self.session),
            EnvLayerKind::Command => self.overlays.last_mut(),
        }
    }

    /// The `Default` layer.
    pub fn default_layer(&self) -> &EnvLayer {
        &self.default
    }

    /// The `Default` layer, for loading config.
    pub fn default_layer_mut(&mut self) -> &mut EnvLayer {
        &mut self.default
    }

    /// The `Session` layer.
    pub fn session(&self) -> &EnvLayer {
        &self.session
    }

    /// The `Session` layer, for loading the env file.
    pub fn session_mut(&mut self) -> &mut EnvLayer {
        &mut self.session
    }

    /// Stacks an ephemeral overlay on top of every other layer.
    pub fn push_overlay(&mut self, layer: EnvLayer) {
        self.overlays.push(layer);
    }

    /// Removes the innermost overlay.
    pub fn pop_overlay(&mut self) -> Option<EnvLayer> {
        self.overlays.pop()
    }

    /// Number of overlays currently stacked.
    pub fn overlay_depth(&self) -> usize {
        self.overlays.len()
    }

    /// Produces a key → value map.
    ///
    /// * `merge` - walk every layer (innermost wins); otherwise only the innermost layer.
    /// * `exclude_prefixes` - keys starting with any of these are left out.
    /// * `innermost_only` - keep only keys the innermost layer introduces, i.e.
    ///   keys absent from every lower layer or holding a different value there.
    pub fn flatten(
        &self,
        merge: bool,
        exclude_prefixes: &[&str],
        innermost_only: bool,
    ) -> BTreeMap<String, String> {
        let excluded = |k: &str| exclude_prefixes.iter().any(|p| k.starts_with(p));
        let mut layers: Vec<&EnvLayer> = self.layers_innermost_first().collect();
        let mut out = BTreeMap::new();
        if layers.is_empty() {
            return out;
        }
        let innermost = layers.remove(0);

        if !merge || innermost_only {
            for (k, v) in innermost.iter() {
                if excluded(k) {
                    continue;
                }
                if innermost_only && merge {
                    let inherited = layers.iter().find_map(|l| l.get(k));
                    if inherited == Some(v) {
                        continue;
                    }
                }
                out.insert(k.to_string(), v.to_string());
            }
            return out;
        }

        for layer in std::iter::once(innermost).chain(layers) {
            for (k, v) in layer.iter() {
                if excluded(k) || out.contains_key(k) {
                    continue;
                }
                out.insert(k.to_string(), v.to_string());
            }
        }
        out
    }
}

fn parse_bool(v: &str) -> bool {
    matches!(
        v.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}
