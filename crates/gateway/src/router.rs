//! Dispatch router: maps a classified interaction to a registered handler.
//!
//! The registry is built once at startup and frozen behind an `Arc`; lookups
//! are lock-free. Commands and autocomplete route by exact name; components
//! and modals route by exact `custom_id` or by a declared prefix (components
//! commonly encode state as `"confirm_ban:<user_id>"`), with the longest
//! registered prefix winning. Both paths are O(1)/O(log n), never a linear
//! scan over the registry, since command counts can reach the hundreds.
//!
//! Handshakes are special-cased by the endpoint front and never reach the
//! router. The router imposes no timing policy; that is the deadline
//! coordinator's job.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::domain::error::RouteError;
use crate::domain::interaction::{Interaction, InteractionKind};
use crate::ports::InteractionHandler;

type Handler = Arc<dyn InteractionHandler>;

/// Exact-or-prefix lookup table for custom-id keyed kinds.
#[derive(Default)]
struct MatcherMap {
    exact: HashMap<String, Handler>,
    prefixes: BTreeMap<String, Handler>,
}

impl MatcherMap {
    fn lookup(&self, key: &str) -> Option<&Handler> {
        if let Some(handler) = self.exact.get(key) {
            return Some(handler);
        }
        longest_prefix_match(&self.prefixes, key)
    }

    fn len(&self) -> usize {
        self.exact.len() + self.prefixes.len()
    }
}

/// Find the entry whose key is the longest prefix of `key`.
///
/// Classic BTreeMap walk: probe at `key`, and when the nearest smaller entry
/// is not a prefix, shrink the probe to the shared prefix and retry. Each
/// iteration strictly shortens the probe, so the scan is bounded by the key
/// length, not the map size.
fn longest_prefix_match<'a>(
    map: &'a BTreeMap<String, Handler>,
    key: &str,
) -> Option<&'a Handler> {
    let mut probe = key;
    loop {
        let (candidate, handler) = map
            .range::<str, _>((
                std::ops::Bound::Unbounded,
                std::ops::Bound::Included(probe),
            ))
            .next_back()?;
        if key.starts_with(candidate.as_str()) {
            return Some(handler);
        }
        let common = candidate
            .bytes()
            .zip(probe.bytes())
            .take_while(|(a, b)| a == b)
            .count();
        if common == 0 {
            return None;
        }
        // Shrink to a char boundary within the common run.
        let mut end = common;
        while !probe.is_char_boundary(end) {
            end -= 1;
        }
        if end == 0 {
            return None;
        }
        probe = &probe[..end];
    }
}

/// Immutable handler registry, read-only at request time.
pub struct HandlerRegistry {
    commands: HashMap<String, Handler>,
    autocomplete: HashMap<String, Handler>,
    components: MatcherMap,
    modals: MatcherMap,
}

impl HandlerRegistry {
    /// Start building a registry.
    pub fn builder() -> HandlerRegistryBuilder {
        HandlerRegistryBuilder::default()
    }

    /// Resolve the handler for a classified interaction.
    pub fn route(&self, interaction: &Interaction) -> Result<Handler, RouteError> {
        let key = interaction.route_key.as_str();
        let found = match interaction.kind {
            InteractionKind::Command => self.commands.get(key),
            InteractionKind::Autocomplete => self.autocomplete.get(key),
            InteractionKind::Component => self.components.lookup(key),
            InteractionKind::ModalSubmit => self.modals.lookup(key),
            // Ping is intercepted by the endpoint front; unknown kinds get
            // the generic fallback without dispatch.
            InteractionKind::Ping | InteractionKind::Unknown(_) => None,
        };

        found.cloned().ok_or_else(|| RouteError::NotFound {
            kind: interaction.kind.label(),
            key: key.to_string(),
        })
    }

    /// Total registered handlers, for startup logging.
    pub fn len(&self) -> usize {
        self.commands.len() + self.autocomplete.len() + self.components.len() + self.modals.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builder for [`HandlerRegistry`]. Registration happens at startup only;
/// the built registry is immutable.
#[derive(Default)]
pub struct HandlerRegistryBuilder {
    commands: HashMap<String, Handler>,
    autocomplete: HashMap<String, Handler>,
    components: MatcherMap,
    modals: MatcherMap,
}

impl HandlerRegistryBuilder {
    /// Register a slash-command handler by exact name.
    pub fn command(mut self, name: impl Into<String>, handler: Handler) -> Self {
        self.commands.insert(name.into(), handler);
        self
    }

    /// Register an autocomplete handler by exact command name.
    pub fn autocomplete(mut self, name: impl Into<String>, handler: Handler) -> Self {
        self.autocomplete.insert(name.into(), handler);
        self
    }

    /// Register a component handler by exact `custom_id`.
    pub fn component(mut self, custom_id: impl Into<String>, handler: Handler) -> Self {
        self.components.exact.insert(custom_id.into(), handler);
        self
    }

    /// Register a component handler matching any `custom_id` with the given
    /// prefix. The longest registered prefix wins.
    pub fn component_prefix(mut self, prefix: impl Into<String>, handler: Handler) -> Self {
        self.components.prefixes.insert(prefix.into(), handler);
        self
    }

    /// Register a modal handler by exact `custom_id`.
    pub fn modal(mut self, custom_id: impl Into<String>, handler: Handler) -> Self {
        self.modals.exact.insert(custom_id.into(), handler);
        self
    }

    /// Register a modal handler matching a `custom_id` prefix.
    pub fn modal_prefix(mut self, prefix: impl Into<String>, handler: Handler) -> Self {
        self.modals.prefixes.insert(prefix.into(), handler);
        self
    }

    /// Freeze into an immutable registry.
    pub fn build(self) -> HandlerRegistry {
        HandlerRegistry {
            commands: self.commands,
            autocomplete: self.autocomplete,
            components: self.components,
            modals: self.modals,
        }
    }
}
