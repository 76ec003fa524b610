//! Sharing groups.
//!
//! Contexts that share server-side objects form a group. A context being
//! created shares with whichever peer is already created; the group is told
//! about creations and destructions after the native call succeeded. A
//! destroyed context leaves its group for good, and a group with fewer than
//! two members left is dissolved.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::identity::ContextId;
use crate::surface::NativeHandle;

/// Sharing-group collaborator of a context.
pub trait SharingGroupRegistry: Send + Sync {
    /// Put `context` in the group of `share_with`.
    fn register_sharing(&self, context: ContextId, share_with: ContextId);

    fn context_created(&self, context: ContextId, handle: NativeHandle);

    fn context_destroyed(&self, context: ContextId);

    /// Native handle to pass as the share argument when creating `context`,
    /// or null if no peer is created.
    fn share_handle(&self, context: ContextId) -> NativeHandle;
}

#[derive(Debug, Default)]
struct ShareGroup {
    /// Registration order; the first member is the master.
    members: Vec<ContextId>,
    created: HashMap<ContextId, NativeHandle>,
}

/// Default [`SharingGroupRegistry`].
#[derive(Debug, Default)]
pub struct ShareGroups {
    groups: Mutex<Vec<ShareGroup>>,
}

impl ShareGroups {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_group<R>(&self, context: ContextId, f: impl FnOnce(&ShareGroup) -> R) -> Option<R> {
        let groups = self.groups.lock();
        groups
            .iter()
            .find(|group| group.members.contains(&context))
            .map(f)
    }

    pub fn is_shared(&self, context: ContextId) -> bool {
        self.with_group(context, |_| ()).is_some()
    }

    /// The first registered member of the group.
    pub fn shared_master(&self, context: ContextId) -> Option<ContextId> {
        self.with_group(context, |group| group.members.first().copied())
            .flatten()
    }

    /// Created peers of `context`, in registration order.
    pub fn created_shares(&self, context: ContextId) -> Vec<ContextId> {
        self.with_group(context, |group| {
            group
                .members
                .iter()
                .filter(|&&member| member != context && group.created.contains_key(&member))
                .copied()
                .collect()
        })
        .unwrap_or_default()
    }

    pub fn group_count(&self) -> usize {
        self.groups.lock().len()
    }
}

impl SharingGroupRegistry for ShareGroups {
    fn register_sharing(&self, context: ContextId, share_with: ContextId) {
        let mut groups = self.groups.lock();
        let index = match groups
            .iter()
            .position(|group| group.members.contains(&share_with))
        {
            Some(index) => index,
            None => {
                groups.push(ShareGroup {
                    members: vec![share_with],
                    created: HashMap::new(),
                });
                groups.len() - 1
            }
        };

        let group = &mut groups[index];
        if !group.members.contains(&context) {
            group.members.push(context);
        }
        log::debug!("{context} shares with {share_with}");
    }

    fn context_created(&self, context: ContextId, handle: NativeHandle) {
        let mut groups = self.groups.lock();
        if let Some(group) = groups
            .iter_mut()
            .find(|group| group.members.contains(&context))
        {
            group.created.insert(context, handle);
        }
    }

    fn context_destroyed(&self, context: ContextId) {
        let mut groups = self.groups.lock();
        for group in groups.iter_mut() {
            group.created.remove(&context);
            group.members.retain(|member| *member != context);
        }
        // a lone survivor shares with nobody
        groups.retain(|group| group.members.len() > 1);
    }

    fn share_handle(&self, context: ContextId) -> NativeHandle {
        self.with_group(context, |group| {
            group
                .members
                .iter()
                .filter(|&&member| member != context)
                .find_map(|member| group.created.get(member).copied())
        })
        .flatten()
        .unwrap_or(NativeHandle::NULL)
    }
}
