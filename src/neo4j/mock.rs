//! In-memory mock implementation of GraphStore for testing.
//!
//! Provides a complete mock of all graph operations using
//! `tokio::sync::RwLock` collections. Traversals follow the same rules as the
//! Cypher queries in `client.rs`.
//! Conditionally compiled with `#[cfg(test)]`.

use crate::neo4j::models::*;
use crate::neo4j::traits::GraphStore;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet, VecDeque};
use tokio::sync::RwLock;

/// In-memory mock implementation of GraphStore for testing.
#[derive(Default)]
pub struct MockGraphStore {
    pub notes: RwLock<HashMap<String, Note>>,
    pub items: RwLock<Vec<ItemEdge>>,
    pub invitations: RwLock<HashMap<String, Invitation>>,
    /// Devices keyed by id
    pub devices: RwLock<HashMap<String, Device>>,
}

impl MockGraphStore {
    /// Create a new empty MockGraphStore.
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Builder / seeding methods for tests
    // ========================================================================

    /// Seed an invitation into the store.
    pub async fn with_invitation(self, invitation: Invitation) -> Self {
        self.invitations
            .write()
            .await
            .insert(invitation.id.clone(), invitation);
        self
    }

    /// Seed a device into the store.
    pub async fn with_device(self, device: Device) -> Self {
        self.devices.write().await.insert(device.id.clone(), device);
        self
    }

    /// Number of stored item edges
    pub async fn edge_count(&self) -> usize {
        self.items.read().await.len()
    }

    /// Number of stored devices
    pub async fn device_count(&self) -> usize {
        self.devices.read().await.len()
    }
}

/// Notes reachable from `roots` through item edges, with their hop count
fn item_reachable(
    roots: &[String],
    edges: &[ItemEdge],
) -> HashMap<String, usize> {
    let mut depths: HashMap<String, usize> = HashMap::new();
    let mut queue: VecDeque<(String, usize)> = VecDeque::new();
    for root in roots {
        if depths.insert(root.clone(), 0).is_none() {
            queue.push_back((root.clone(), 0));
        }
    }

    while let Some((current, depth)) = queue.pop_front() {
        if depth >= MAX_TRAVERSAL_DEPTH {
            continue;
        }
        for edge in edges
            .iter()
            .filter(|e| e.from == current && e.link == ItemLink::Item)
        {
            if !depths.contains_key(&edge.to) {
                depths.insert(edge.to.clone(), depth + 1);
                queue.push_back((edge.to.clone(), depth + 1));
            }
        }
    }

    depths
}

#[async_trait]
impl GraphStore for MockGraphStore {
    // ========================================================================
    // Note documents
    // ========================================================================

    async fn get_note(&self, id: &str) -> Result<Option<Note>> {
        Ok(self.notes.read().await.get(id).cloned())
    }

    async fn insert_note(&self, note: &Note) -> Result<Note> {
        let mut notes = self.notes.write().await;
        let mut stored = note.clone();
        if stored.id.is_empty() {
            stored.id = new_document_id();
        }
        if notes.contains_key(&stored.id) {
            return Err(anyhow!("note {} already exists", stored.id));
        }
        let now = Utc::now();
        stored.rev = Some(next_revision(None));
        stored.created = Some(now);
        stored.updated = Some(now);
        notes.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn update_note(&self, note: &Note) -> Result<Note> {
        let mut notes = self.notes.write().await;
        let existing = notes
            .get(&note.id)
            .ok_or_else(|| StoreError::not_found(DocumentKind::Note, &note.id))?;
        let mut stored = note.clone();
        stored.rev = Some(next_revision(existing.rev.as_deref()));
        stored.created = existing.created;
        stored.updated = Some(Utc::now());
        notes.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn delete_note(&self, id: &str) -> Result<()> {
        self.notes.write().await.remove(id);
        self.items
            .write()
            .await
            .retain(|e| e.from != id && e.to != id);
        Ok(())
    }

    // ========================================================================
    // Item edges
    // ========================================================================

    async fn remove_obsolete_note_items(
        &self,
        note_id: &str,
        items: &[String],
        refs: &[String],
    ) -> Result<()> {
        self.items.write().await.retain(|e| {
            if e.from != note_id {
                return true;
            }
            match e.link {
                ItemLink::Item => items.contains(&e.to),
                ItemLink::Ref => refs.contains(&e.to),
            }
        });
        Ok(())
    }

    async fn ensure_note_items(
        &self,
        note_id: &str,
        items: &[String],
        refs: &[String],
    ) -> Result<()> {
        let mut edges = self.items.write().await;
        let now = Utc::now();
        let wanted = items
            .iter()
            .map(|to| (to, ItemLink::Item))
            .chain(refs.iter().map(|to| (to, ItemLink::Ref)));

        for (to, link) in wanted {
            match edges
                .iter_mut()
                .find(|e| e.from == note_id && &e.to == to && e.link == link)
            {
                Some(edge) => edge.updated = Some(now),
                None => edges.push(ItemEdge {
                    from: note_id.to_string(),
                    to: to.clone(),
                    link,
                    created: Some(now),
                    updated: None,
                }),
            }
        }
        Ok(())
    }

    async fn list_note_items(&self, note_id: &str) -> Result<Vec<ItemEdge>> {
        Ok(self
            .items
            .read()
            .await
            .iter()
            .filter(|e| e.from == note_id)
            .cloned()
            .collect())
    }

    // ========================================================================
    // Access traversals
    // ========================================================================

    async fn invitation_ids_for_note(
        &self,
        note_id: &str,
        include_refs: bool,
    ) -> Result<HashSet<String>> {
        let notes = self.notes.read().await;
        let edges = self.items.read().await;
        let mut found = HashSet::new();

        if !notes.contains_key(note_id) {
            return Ok(found);
        }

        let collect = |id: &str, found: &mut HashSet<String>| {
            if let Some(note) = notes.get(id) {
                found.extend(note.steward.iter().cloned());
                found.extend(note.invitations.iter().cloned());
            }
        };

        let mut expanded: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(String, usize)> = VecDeque::new();
        expanded.insert(note_id.to_string());
        queue.push_back((note_id.to_string(), 0));

        while let Some((current, depth)) = queue.pop_front() {
            collect(&current, &mut found);
            if depth >= MAX_TRAVERSAL_DEPTH {
                continue;
            }
            for edge in edges.iter().filter(|e| e.to == current) {
                // A ref parent of the start note is walked like an item parent;
                // refs further up end the walk
                let follow = match edge.link {
                    ItemLink::Item => true,
                    ItemLink::Ref => include_refs && depth == 0,
                };
                if follow && expanded.insert(edge.from.clone()) {
                    queue.push_back((edge.from.clone(), depth + 1));
                }
            }
        }

        Ok(found)
    }

    async fn all_note_revs_by_invitation(&self, invitation_id: &str) -> Result<Vec<NoteRev>> {
        let notes = self.notes.read().await;
        let edges = self.items.read().await;

        let roots: Vec<String> = notes
            .values()
            .filter(|n| n.is_direct_member(invitation_id))
            .map(|n| n.id.clone())
            .collect();

        let by_item = item_reachable(&roots, &edges);
        let mut access: HashMap<String, ItemLink> = by_item
            .keys()
            .map(|id| (id.clone(), ItemLink::Item))
            .collect();

        for edge in edges.iter().filter(|e| e.link == ItemLink::Ref) {
            let reachable = by_item
                .get(&edge.from)
                .is_some_and(|depth| *depth < MAX_TRAVERSAL_DEPTH);
            if reachable {
                access.entry(edge.to.clone()).or_insert(ItemLink::Ref);
            }
        }

        let mut revs: Vec<NoteRev> = access
            .into_iter()
            .filter_map(|(id, access)| {
                notes.get(&id).map(|note| NoteRev {
                    id,
                    rev: note.rev.clone().unwrap_or_default(),
                    access,
                })
            })
            .collect();
        revs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(revs)
    }

    // ========================================================================
    // Invitations
    // ========================================================================

    async fn count_invitations(&self) -> Result<usize> {
        Ok(self.invitations.read().await.len())
    }

    async fn list_invitations(&self) -> Result<Vec<Invitation>> {
        let mut invitations: Vec<Invitation> =
            self.invitations.read().await.values().cloned().collect();
        invitations.sort_by(|a, b| a.created.cmp(&b.created).then(a.id.cmp(&b.id)));
        Ok(invitations)
    }

    async fn get_invitation(&self, id: &str) -> Result<Option<Invitation>> {
        Ok(self.invitations.read().await.get(id).cloned())
    }

    async fn invitation_from_token(&self, token: &str) -> Result<Option<Invitation>> {
        Ok(self
            .invitations
            .read()
            .await
            .values()
            .find(|i| i.token.as_deref() == Some(token))
            .cloned())
    }

    async fn insert_invitation(&self, invitation: &Invitation) -> Result<Invitation> {
        let mut stored = invitation.clone();
        if stored.id.is_empty() {
            stored.id = new_document_id();
        }
        let now = Utc::now();
        stored.created = Some(now);
        stored.updated = Some(now);
        self.invitations
            .write()
            .await
            .insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn update_invitation(&self, invitation: &Invitation) -> Result<Invitation> {
        let mut invitations = self.invitations.write().await;
        let existing = invitations
            .get(&invitation.id)
            .ok_or_else(|| StoreError::not_found(DocumentKind::Invitation, &invitation.id))?;
        let mut stored = invitation.clone();
        stored.created = existing.created;
        stored.updated = Some(Utc::now());
        invitations.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn delete_invitation(&self, id: &str) -> Result<()> {
        self.invitations.write().await.remove(id);
        Ok(())
    }

    async fn remove_invitation_from_all_notes(&self, invitation_id: &str) -> Result<Vec<Note>> {
        let mut notes = self.notes.write().await;
        let mut updated = Vec::new();
        for note in notes.values_mut() {
            if note.invitations.iter().any(|i| i == invitation_id) {
                note.invitations.retain(|i| i != invitation_id);
                note.rev = Some(next_revision(note.rev.as_deref()));
                note.updated = Some(Utc::now());
                updated.push(note.clone());
            }
        }
        Ok(updated)
    }

    // ========================================================================
    // Devices
    // ========================================================================

    async fn device_from_token(&self, token: &str) -> Result<Device> {
        let mut devices = self.devices.write().await;
        if let Some(device) = devices.values_mut().find(|d| d.token == token) {
            device.updated = Some(Utc::now());
            return Ok(device.clone());
        }
        let device = Device {
            id: new_document_id(),
            token: token.to_string(),
            invitation: None,
            created: Some(Utc::now()),
            updated: None,
        };
        devices.insert(device.id.clone(), device.clone());
        Ok(device)
    }

    async fn update_device(&self, device: &Device) -> Result<Device> {
        let mut devices = self.devices.write().await;
        let existing = devices
            .get(&device.id)
            .ok_or_else(|| StoreError::not_found(DocumentKind::Device, &device.id))?;
        let mut stored = device.clone();
        stored.created = existing.created;
        stored.updated = Some(Utc::now());
        devices.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn invitation_from_device_token(&self, token: &str) -> Result<Option<Invitation>> {
        let invitation_id = self
            .devices
            .read()
            .await
            .values()
            .find(|d| d.token == token)
            .and_then(|d| d.invitation.clone());
        match invitation_id {
            Some(id) => self.get_invitation(&id).await,
            None => Ok(None),
        }
    }

    async fn remove_devices_by_invitation(&self, invitation_id: &str) -> Result<()> {
        self.devices
            .write()
            .await
            .retain(|_, d| d.invitation.as_deref() != Some(invitation_id));
        Ok(())
    }

    // ========================================================================
    // Health
    // ========================================================================

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(id: &str, steward: &str) -> Note {
        Note {
            id: id.to_string(),
            steward: Some(steward.to_string()),
            ..Default::default()
        }
    }

    async fn link(store: &MockGraphStore, from: &str, items: &[&str], refs: &[&str]) {
        let items: Vec<String> = items.iter().map(|s| s.to_string()).collect();
        let refs: Vec<String> = refs.iter().map(|s| s.to_string()).collect();
        store.ensure_note_items(from, &items, &refs).await.unwrap();
    }

    #[tokio::test]
    async fn test_insert_assigns_revision_and_timestamps() {
        let store = MockGraphStore::new();
        let stored = store.insert_note(&note("a", "x")).await.unwrap();
        assert!(stored.rev.is_some());
        assert!(stored.created.is_some());
        assert!(stored.updated.is_some());
        assert!(store.insert_note(&note("a", "x")).await.is_err());
    }

    #[tokio::test]
    async fn test_update_missing_note_is_not_found() {
        let store = MockGraphStore::new();
        let err = store.update_note(&note("ghost", "x")).await.unwrap_err();
        assert!(StoreError::is_not_found(&err));
    }

    #[tokio::test]
    async fn test_update_bumps_revision_and_keeps_created() {
        let store = MockGraphStore::new();
        let first = store.insert_note(&note("a", "x")).await.unwrap();
        let second = store.update_note(&first).await.unwrap();
        assert_ne!(first.rev, second.rev);
        assert_eq!(first.created, second.created);
    }

    #[tokio::test]
    async fn test_traversal_collects_item_ancestors() {
        let store = MockGraphStore::new();
        store.insert_note(&note("root", "x")).await.unwrap();
        store.insert_note(&note("mid", "y")).await.unwrap();
        store.insert_note(&note("leaf", "z")).await.unwrap();
        link(&store, "root", &["mid"], &[]).await;
        link(&store, "mid", &["leaf"], &[]).await;

        let ids = store.invitation_ids_for_note("leaf", false).await.unwrap();
        let expected: HashSet<String> = ["x", "y", "z"].iter().map(|s| s.to_string()).collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn test_traversal_never_recurses_past_ref_without_include_refs() {
        let store = MockGraphStore::new();
        store.insert_note(&note("owner", "x")).await.unwrap();
        store.insert_note(&note("target", "z")).await.unwrap();
        link(&store, "owner", &[], &["target"]).await;

        let ids = store.invitation_ids_for_note("target", false).await.unwrap();
        assert_eq!(ids, HashSet::from(["z".to_string()]));
    }

    #[tokio::test]
    async fn test_traversal_follows_item_ancestors_of_first_hop_ref() {
        let store = MockGraphStore::new();
        store.insert_note(&note("top", "w")).await.unwrap();
        store.insert_note(&note("owner", "x")).await.unwrap();
        store.insert_note(&note("target", "z")).await.unwrap();
        link(&store, "top", &["owner"], &[]).await;
        link(&store, "owner", &[], &["target"]).await;

        let ids = store.invitation_ids_for_note("target", true).await.unwrap();
        let expected: HashSet<String> = ["w", "x", "z"].iter().map(|s| s.to_string()).collect();
        assert_eq!(ids, expected);

        // Edit access never crosses the ref
        let ids = store.invitation_ids_for_note("target", false).await.unwrap();
        let expected: HashSet<String> = ["z"].iter().map(|s| s.to_string()).collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn test_view_traversal_agrees_with_snapshot() {
        let store = MockGraphStore::new();
        store.insert_note(&note("root", "b")).await.unwrap();
        store.insert_note(&note("mid", "c")).await.unwrap();
        store.insert_note(&note("target", "a")).await.unwrap();
        link(&store, "root", &["mid"], &[]).await;
        link(&store, "mid", &[], &["target"]).await;

        let revs = store.all_note_revs_by_invitation("b").await.unwrap();
        for rev in &revs {
            let ids = store.invitation_ids_for_note(&rev.id, true).await.unwrap();
            assert!(ids.contains("b"), "{} is in b's snapshot", rev.id);
        }
        assert!(revs
            .iter()
            .any(|r| r.id == "target" && r.access == ItemLink::Ref));
    }

    #[tokio::test]
    async fn test_traversal_depth_bound_on_long_item_chain() {
        let store = MockGraphStore::new();
        store.insert_note(&note("n0", "s0")).await.unwrap();

        // Grow the chain one ancestor at a time; the access set only grows
        let mut previous: HashSet<String> = HashSet::new();
        for level in 1..=MAX_TRAVERSAL_DEPTH + 1 {
            let id = format!("n{}", level);
            let child = format!("n{}", level - 1);
            store
                .insert_note(&note(&id, &format!("s{}", level)))
                .await
                .unwrap();
            link(&store, &id, &[child.as_str()], &[]).await;

            let ids = store.invitation_ids_for_note("n0", false).await.unwrap();
            assert!(previous.is_subset(&ids), "shrank at level {}", level);
            assert_eq!(
                ids.contains(&format!("s{}", level)),
                level <= MAX_TRAVERSAL_DEPTH,
                "level {}",
                level
            );
            previous = ids;
        }
        assert_eq!(previous.len(), MAX_TRAVERSAL_DEPTH + 1);

        let top = format!("s{}", MAX_TRAVERSAL_DEPTH + 1);
        let revs = store.all_note_revs_by_invitation(&top).await.unwrap();
        assert!(revs.iter().any(|r| r.id == "n1"));
        assert!(!revs.iter().any(|r| r.id == "n0"));
    }

    #[tokio::test]
    async fn test_traversal_ignores_ref_beyond_first_hop() {
        let store = MockGraphStore::new();
        store.insert_note(&note("owner", "x")).await.unwrap();
        store.insert_note(&note("mid", "y")).await.unwrap();
        store.insert_note(&note("leaf", "z")).await.unwrap();
        link(&store, "owner", &[], &["mid"]).await;
        link(&store, "mid", &["leaf"], &[]).await;

        let ids = store.invitation_ids_for_note("leaf", true).await.unwrap();
        let expected: HashSet<String> = ["y", "z"].iter().map(|s| s.to_string()).collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn test_traversal_handles_cycles() {
        let store = MockGraphStore::new();
        store.insert_note(&note("a", "x")).await.unwrap();
        store.insert_note(&note("b", "y")).await.unwrap();
        link(&store, "a", &["b"], &[]).await;
        link(&store, "b", &["a"], &[]).await;

        let ids = store.invitation_ids_for_note("a", false).await.unwrap();
        assert_eq!(ids.len(), 2);
    }

    #[tokio::test]
    async fn test_traversal_of_missing_note_is_empty() {
        let store = MockGraphStore::new();
        let ids = store.invitation_ids_for_note("nope", true).await.unwrap();
        assert!(ids.is_empty());
    }

    #[tokio::test]
    async fn test_all_note_revs_classifies_access() {
        let store = MockGraphStore::new();
        store.insert_note(&note("root", "x")).await.unwrap();
        store.insert_note(&note("child", "x")).await.unwrap();
        store.insert_note(&note("foreign", "z")).await.unwrap();
        store.insert_note(&note("foreign-child", "z")).await.unwrap();
        store.insert_note(&note("unrelated", "z")).await.unwrap();
        link(&store, "root", &["child"], &["foreign"]).await;
        link(&store, "foreign", &["foreign-child"], &[]).await;

        let revs = store.all_note_revs_by_invitation("x").await.unwrap();
        let access: HashMap<&str, ItemLink> =
            revs.iter().map(|r| (r.id.as_str(), r.access)).collect();

        assert_eq!(access.get("root"), Some(&ItemLink::Item));
        assert_eq!(access.get("child"), Some(&ItemLink::Item));
        assert_eq!(access.get("foreign"), Some(&ItemLink::Ref));
        assert!(!access.contains_key("foreign-child"));
        assert!(!access.contains_key("unrelated"));
    }

    #[tokio::test]
    async fn test_all_note_revs_prefers_item_over_ref() {
        let store = MockGraphStore::new();
        store.insert_note(&note("root", "x")).await.unwrap();
        store.insert_note(&note("both", "z")).await.unwrap();
        link(&store, "root", &["both"], &["both"]).await;

        let revs = store.all_note_revs_by_invitation("x").await.unwrap();
        let both = revs.iter().find(|r| r.id == "both").unwrap();
        assert_eq!(both.access, ItemLink::Item);
    }

    #[tokio::test]
    async fn test_ensure_note_items_is_idempotent() {
        let store = MockGraphStore::new();
        link(&store, "a", &["b", "c"], &["d"]).await;
        link(&store, "a", &["b", "c"], &["d"]).await;
        assert_eq!(store.edge_count().await, 3);

        let edges = store.list_note_items("a").await.unwrap();
        assert!(edges.iter().all(|e| e.created.is_some()));
        assert!(edges.iter().all(|e| e.updated.is_some()));
    }

    #[tokio::test]
    async fn test_remove_obsolete_note_items_respects_link_kind() {
        let store = MockGraphStore::new();
        link(&store, "a", &["b"], &["b", "c"]).await;
        store
            .remove_obsolete_note_items("a", &[], &["b".to_string()])
            .await
            .unwrap();
        let edges = store.list_note_items("a").await.unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].to, "b");
        assert_eq!(edges[0].link, ItemLink::Ref);
    }

    #[tokio::test]
    async fn test_device_from_token_upserts() {
        let store = MockGraphStore::new();
        let first = store.device_from_token("abc").await.unwrap();
        let second = store.device_from_token("abc").await.unwrap();
        assert_eq!(first.id, second.id);
        assert!(second.updated.is_some());
        assert_eq!(store.device_count().await, 1);
    }

    #[tokio::test]
    async fn test_remove_invitation_from_all_notes() {
        let store = MockGraphStore::new();
        let mut shared = note("a", "x");
        shared.invitations = vec!["y".into(), "z".into()];
        let stored = store.insert_note(&shared).await.unwrap();
        store.insert_note(&note("b", "x")).await.unwrap();

        let updated = store.remove_invitation_from_all_notes("y").await.unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].invitations, vec!["z".to_string()]);
        assert_ne!(updated[0].rev, stored.rev);
    }
}
