//! Platform capability registry
//!
//! Fixed table mapping platform ids to protocol capabilities, used to
//! parameterize event assertions. Also owns the reduced-limit override table
//! for constrained-connectivity variants.

use crate::error::{HarnessError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Maximum event data length on gen 2 platforms.
pub const MAX_EVENT_DATA_LENGTH_GEN2: usize = 864;

/// Maximum event data length on gen 3 platforms.
pub const MAX_EVENT_DATA_LENGTH_GEN3: usize = 1024;

/// Event data length applied by cellular devices whose modem firmware cannot
/// handle IP packets over a certain size. Recalculated from the modem MTU;
/// also depends on the size of the event name.
pub const REDUCED_CELLULAR_EVENT_DATA_LENGTH: usize = 838;

/// Device generation, the coarsest capability tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Generation {
    Gen2,
    Gen3,
}

impl Generation {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Gen2 => "gen2",
            Self::Gen3 => "gen3",
        }
    }
}

/// Known device hardware families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformFamily {
    Photon,
    P1,
    Electron,
    Argon,
    Boron,
    BSom,
    B5Som,
    Tracker,
    Esomx,
}

impl PlatformFamily {
    #[must_use]
    pub fn generation(self) -> Generation {
        match self {
            Self::Photon | Self::P1 | Self::Electron => Generation::Gen2,
            Self::Argon
            | Self::Boron
            | Self::BSom
            | Self::B5Som
            | Self::Tracker
            | Self::Esomx => Generation::Gen3,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Photon => "photon",
            Self::P1 => "p1",
            Self::Electron => "electron",
            Self::Argon => "argon",
            Self::Boron => "boron",
            Self::BSom => "bsom",
            Self::B5Som => "b5som",
            Self::Tracker => "tracker",
            Self::Esomx => "esomx",
        }
    }
}

/// Protocol capabilities of a single platform. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformCapabilities {
    pub id: Arc<str>,
    pub family: PlatformFamily,
    pub max_event_payload_length: usize,
}

impl PlatformCapabilities {
    /// Whether this platform matches an applicability tag. A tag can name the
    /// platform id, the family, or the generation (`"gen2"` / `"gen3"`).
    #[must_use]
    pub fn is(&self, tag: &str) -> bool {
        tag == &*self.id || tag == self.family.name() || tag == self.family.generation().name()
    }
}

#[derive(Debug, Deserialize)]
struct PlatformRow {
    id: String,
    family: PlatformFamily,
    max_event_payload_length: usize,
}

#[derive(Debug, Deserialize)]
struct PlatformTable {
    #[serde(default, rename = "platform")]
    platforms: Vec<PlatformRow>,
    #[serde(default)]
    reduced_limits: HashMap<PlatformFamily, usize>,
}

/// Registry of platform capabilities, loaded once at startup and read-only
/// afterwards. Lookup is total: an unregistered id is an error, never a
/// silent default.
#[derive(Debug, Clone)]
pub struct PlatformRegistry {
    platforms: HashMap<String, Arc<PlatformCapabilities>>,
    reduced_limits: HashMap<PlatformFamily, usize>,
}

impl PlatformRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            platforms: HashMap::new(),
            reduced_limits: HashMap::new(),
        }
    }

    /// Creates a registry with the built-in platform table.
    ///
    /// Gen 2 platforms carry an 864-byte event data limit, gen 3 a 1024-byte
    /// limit. The cellular `boron` and `bsom` families additionally carry the
    /// reduced 838-byte override applied when old modem firmware is detected.
    ///
    /// # Panics
    ///
    /// Does not panic: every built-in row satisfies the positive-limit
    /// invariant.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        let rows = [
            (PlatformFamily::Photon, "photon"),
            (PlatformFamily::P1, "p1"),
            (PlatformFamily::Electron, "electron"),
            (PlatformFamily::Argon, "argon"),
            (PlatformFamily::Boron, "boron"),
            (PlatformFamily::BSom, "bsom"),
            (PlatformFamily::B5Som, "b5som"),
            (PlatformFamily::Tracker, "tracker"),
            (PlatformFamily::Esomx, "esomx"),
        ];
        for (family, id) in rows {
            let max_len = match family.generation() {
                Generation::Gen2 => MAX_EVENT_DATA_LENGTH_GEN2,
                Generation::Gen3 => MAX_EVENT_DATA_LENGTH_GEN3,
            };
            registry.register(family, id, max_len).expect("built-in row");
        }
        registry
            .set_reduced_limit(PlatformFamily::Boron, REDUCED_CELLULAR_EVENT_DATA_LENGTH)
            .expect("built-in override");
        registry
            .set_reduced_limit(PlatformFamily::BSom, REDUCED_CELLULAR_EVENT_DATA_LENGTH)
            .expect("built-in override");
        registry
    }

    /// Registers a platform, replacing any existing row with the same id.
    ///
    /// # Errors
    ///
    /// Returns an error if `max_event_payload_length` is zero.
    pub fn register(
        &mut self,
        family: PlatformFamily,
        id: impl Into<String>,
        max_event_payload_length: usize,
    ) -> Result<()> {
        let id = id.into();
        if max_event_payload_length == 0 {
            return Err(HarnessError::InvalidCapabilities(format!(
                "platform '{id}' must have a positive max event payload length"
            )));
        }
        let capabilities = Arc::new(PlatformCapabilities {
            id: Arc::from(id.as_str()),
            family,
            max_event_payload_length,
        });
        self.platforms.insert(id, capabilities);
        Ok(())
    }

    /// Sets the reduced event data limit for a constrained-connectivity
    /// family.
    ///
    /// # Errors
    ///
    /// Returns an error if `reduced_length` is zero.
    pub fn set_reduced_limit(
        &mut self,
        family: PlatformFamily,
        reduced_length: usize,
    ) -> Result<()> {
        if reduced_length == 0 {
            return Err(HarnessError::InvalidCapabilities(format!(
                "reduced limit for family '{}' must be positive",
                family.name()
            )));
        }
        self.reduced_limits.insert(family, reduced_length);
        Ok(())
    }

    /// Returns the reduced event data limit for a family, if one is
    /// configured.
    #[must_use]
    pub fn reduced_limit(&self, family: PlatformFamily) -> Option<usize> {
        self.reduced_limits.get(&family).copied()
    }

    /// Looks up the capabilities for a platform id.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::UnknownPlatform`] if the id is not registered.
    pub fn capabilities_for(&self, id: &str) -> Result<Arc<PlatformCapabilities>> {
        self.platforms
            .get(id)
            .cloned()
            .ok_or_else(|| HarnessError::UnknownPlatform(id.to_string()))
    }

    /// Returns all registered platforms matching an applicability tag,
    /// ordered by id.
    #[must_use]
    pub fn matching(&self, tag: &str) -> Vec<Arc<PlatformCapabilities>> {
        let mut matches: Vec<_> = self
            .platforms
            .values()
            .filter(|caps| caps.is(tag))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        matches
    }

    /// Returns all registered platform ids, ordered.
    #[must_use]
    pub fn platform_ids(&self) -> Vec<Arc<str>> {
        let mut ids: Vec<_> = self.platforms.values().map(|caps| caps.id.clone()).collect();
        ids.sort();
        ids
    }

    /// Builds a registry from a TOML platform table.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or a row violates the
    /// positive-limit invariant.
    pub fn from_toml(content: &str) -> Result<Self> {
        let mut registry = Self::new();
        registry.apply_toml(content)?;
        Ok(registry)
    }

    /// Merges a TOML platform table into this registry. Rows with an existing
    /// id replace the current entry; reduced limits are merged per family.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or a row violates the
    /// positive-limit invariant.
    pub fn apply_toml(&mut self, content: &str) -> Result<()> {
        let table: PlatformTable = toml::from_str(content)
            .map_err(|e| HarnessError::InvalidCapabilities(e.to_string()))?;
        for row in table.platforms {
            self.register(row.family, row.id, row.max_event_payload_length)?;
        }
        for (family, reduced) in table.reduced_limits {
            self.set_reduced_limit(family, reduced)?;
        }
        Ok(())
    }
}

impl Default for PlatformRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
