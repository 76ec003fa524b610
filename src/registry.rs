//! Process-wide registry of negotiated versions.
//!
//! Maps (device, requested major, requested profile) to the version the driver
//! actually granted. Entries are write-once. The per-device mapping pass runs
//! under the registry lock, so concurrent first users of a device block until
//! the single probing pass has finished instead of probing the driver again.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use crate::error::{ContextError, ContextResult};
use crate::identity::DeviceId;
use crate::version::{NegotiatedVersion, RequestedProfile, VersionRequest};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct VersionKey {
    device: String,
    major: u8,
    profile: RequestedProfile,
}

impl VersionKey {
    fn new(device: &DeviceId, request: VersionRequest) -> Self {
        Self {
            device: device.unique_id(),
            major: request.major,
            profile: request.profile,
        }
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    versions: HashMap<VersionKey, NegotiatedVersion>,
    mapped_devices: HashSet<String>,
}

impl RegistryState {
    fn get(&self, device: &DeviceId, request: VersionRequest) -> Option<NegotiatedVersion> {
        self.versions.get(&VersionKey::new(device, request)).copied()
    }

    fn insert(
        &mut self,
        device: &DeviceId,
        request: VersionRequest,
        negotiated: NegotiatedVersion,
    ) -> ContextResult<()> {
        match self.versions.entry(VersionKey::new(device, request)) {
            Entry::Occupied(entry) => {
                let existing = *entry.get();
                if existing == negotiated {
                    Ok(())
                } else {
                    Err(ContextError::RegistryConflict {
                        key: format!("{device} {request}"),
                        existing,
                        rejected: negotiated,
                    })
                }
            }
            Entry::Vacant(entry) => {
                log::debug!("Mapped {device} {request} -> {negotiated}");
                entry.insert(negotiated);
                Ok(())
            }
        }
    }
}

/// Registry of negotiated versions, shared by every context of the process.
#[derive(Debug, Default)]
pub struct VersionRegistry {
    state: Mutex<RegistryState>,
}

impl VersionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The negotiated version for a request, or `None` if it is unavailable
    /// or has not been probed yet.
    pub fn get_available_version(
        &self,
        device: &DeviceId,
        request: VersionRequest,
    ) -> Option<NegotiatedVersion> {
        self.state.lock().get(device, request)
    }

    /// Record a negotiated version.
    ///
    /// Re-inserting the same value is a no-op; inserting a different value for
    /// an existing key is rejected with [`ContextError::RegistryConflict`].
    pub fn map_available_version(
        &self,
        device: &DeviceId,
        request: VersionRequest,
        negotiated: NegotiatedVersion,
    ) -> ContextResult<()> {
        self.state.lock().insert(device, request, negotiated)
    }

    /// Whether the mapping pass for `device` has completed.
    pub fn is_device_mapped(&self, device: &DeviceId) -> bool {
        self.state
            .lock()
            .mapped_devices
            .contains(&device.unique_id())
    }

    /// Run `populate` for `device` unless the device is already mapped.
    ///
    /// The registry lock is held for the whole call, so at most one pass per
    /// device ever runs. Returns `Ok(true)` if this call performed the pass.
    /// A failing pass leaves the device unmapped.
    pub fn map_versions_once<F>(&self, device: &DeviceId, populate: F) -> ContextResult<bool>
    where
        F: FnOnce(&mut DeviceVersions<'_>) -> ContextResult<()>,
    {
        let mut state = self.state.lock();
        let id = device.unique_id();
        if state.mapped_devices.contains(&id) {
            log::debug!("GL versions already mapped for {device}");
            return Ok(false);
        }

        let mut view = DeviceVersions {
            device,
            state: &mut *state,
        };
        populate(&mut view)?;

        state.mapped_devices.insert(id);
        log::info!("GL versions mapped for {device}");
        Ok(true)
    }

    /// Walk the degrade chain starting at `request` and return the first
    /// request that has a negotiated version.
    pub fn best_available(
        &self,
        device: &DeviceId,
        request: VersionRequest,
    ) -> Option<(VersionRequest, NegotiatedVersion)> {
        let state = self.state.lock();
        let mut candidate = Some(request);
        while let Some(req) = candidate {
            if let Some(version) = state.get(device, req) {
                return Some((req, version));
            }
            candidate = req.degrade();
        }
        None
    }

    /// All canonical requests mapped for `device`, in probing order.
    pub fn mapped_versions(&self, device: &DeviceId) -> Vec<(VersionRequest, NegotiatedVersion)> {
        let state = self.state.lock();
        VersionRequest::CANONICAL
            .iter()
            .filter_map(|&req| state.get(device, req).map(|v| (req, v)))
            .collect()
    }

    /// Drop every entry of `device` so the next creation probes it again.
    pub fn forget_device(&self, device: &DeviceId) {
        let mut state = self.state.lock();
        let id = device.unique_id();
        state.versions.retain(|key, _| key.device != id);
        state.mapped_devices.remove(&id);
        log::info!("Forgot GL version mapping for {device}");
    }
}

/// Mutable view of one device's entries, handed to a mapping pass.
pub struct DeviceVersions<'a> {
    device: &'a DeviceId,
    state: &'a mut RegistryState,
}

impl DeviceVersions<'_> {
    pub fn device(&self) -> &DeviceId {
        self.device
    }

    pub fn get(&self, request: VersionRequest) -> Option<NegotiatedVersion> {
        self.state.get(self.device, request)
    }

    pub fn map(&mut self, request: VersionRequest, negotiated: NegotiatedVersion) -> ContextResult<()> {
        self.state.insert(self.device, request, negotiated)
    }
}
