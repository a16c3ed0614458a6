//! Neo4j client for the note graph
//!
//! Notes are `:Note` nodes. The full document is kept as a JSON string in the
//! `doc` property, next to the few fields that queries filter on (`steward`,
//! `invitations`, `items`, `refs`, `rev`). Items and references are
//! `(:Note)-[:ITEM {link}]->(:Note)` relationships pointing from parent to child.

use super::models::*;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use neo4rs::{query, Graph};
use std::collections::HashSet;
use std::sync::Arc;

/// Client for Neo4j operations
pub struct Neo4jClient {
    graph: Arc<Graph>,
}

fn parse_datetime(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .filter(|s| !s.is_empty())
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|d| d.with_timezone(&Utc))
}

fn format_datetime(value: Option<DateTime<Utc>>) -> String {
    value.map(|d| d.to_rfc3339()).unwrap_or_default()
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

impl Neo4jClient {
    /// Create a new Neo4j client
    pub async fn new(uri: &str, user: &str, password: &str) -> Result<Self> {
        let graph = Graph::new(uri, user, password)
            .await
            .context("Failed to connect to Neo4j")?;

        let client = Self {
            graph: Arc::new(graph),
        };

        client.init_schema().await?;

        Ok(client)
    }

    /// Initialize the graph schema with constraints and indexes
    async fn init_schema(&self) -> Result<()> {
        let constraints = vec![
            "CREATE CONSTRAINT note_id IF NOT EXISTS FOR (n:Note) REQUIRE n.id IS UNIQUE",
            "CREATE CONSTRAINT invitation_id IF NOT EXISTS FOR (i:Invitation) REQUIRE i.id IS UNIQUE",
            "CREATE CONSTRAINT device_id IF NOT EXISTS FOR (d:Device) REQUIRE d.id IS UNIQUE",
            "CREATE CONSTRAINT device_token IF NOT EXISTS FOR (d:Device) REQUIRE d.token IS UNIQUE",
        ];

        let indexes = vec![
            "CREATE INDEX note_steward IF NOT EXISTS FOR (n:Note) ON (n.steward)",
            "CREATE INDEX invitation_token IF NOT EXISTS FOR (i:Invitation) ON (i.token)",
            "CREATE INDEX device_invitation IF NOT EXISTS FOR (d:Device) ON (d.invitation)",
        ];

        for constraint in constraints {
            if let Err(e) = self.graph.run(query(constraint)).await {
                tracing::warn!("Constraint may already exist: {}", e);
            }
        }

        for index in indexes {
            if let Err(e) = self.graph.run(query(index)).await {
                tracing::warn!("Index may already exist: {}", e);
            }
        }

        Ok(())
    }

    // ========================================================================
    // Note documents
    // ========================================================================

    fn doc_to_note(doc: &str) -> Result<Note> {
        serde_json::from_str(doc).context("Corrupt note document")
    }

    /// Get a note by ID
    pub async fn get_note(&self, id: &str) -> Result<Option<Note>> {
        let q = query(
            r#"
            MATCH (n:Note {id: $id})
            RETURN n.doc AS doc
            "#,
        )
        .param("id", id.to_string());

        let mut result = self.graph.execute(q).await?;
        if let Some(row) = result.next().await? {
            let doc: String = row.get("doc")?;
            Ok(Some(Self::doc_to_note(&doc)?))
        } else {
            Ok(None)
        }
    }

    /// Insert a note, then attach edges from parents that already list it
    pub async fn insert_note(&self, note: &Note) -> Result<Note> {
        let now = Utc::now();
        let mut stored = note.clone();
        if stored.id.is_empty() {
            stored.id = new_document_id();
        }
        stored.rev = Some(next_revision(None));
        stored.created = Some(now);
        stored.updated = Some(now);

        let q = query(
            r#"
            CREATE (n:Note {
                id: $id,
                rev: $rev,
                steward: $steward,
                invitations: $invitations,
                items: $items,
                refs: $refs,
                doc: $doc
            })
            "#,
        )
        .param("id", stored.id.clone())
        .param("rev", stored.rev.clone().unwrap_or_default())
        .param("steward", stored.steward.clone().unwrap_or_default())
        .param("invitations", stored.invitations.clone())
        .param("items", stored.items.clone())
        .param("refs", stored.refs.clone())
        .param("doc", serde_json::to_string(&stored)?);

        self.graph
            .run(q)
            .await
            .with_context(|| format!("Failed to insert note {}", stored.id))?;

        self.adopt_pending_parents(&stored.id, now).await?;

        Ok(stored)
    }

    /// Create the edges that could not exist before the child note did
    async fn adopt_pending_parents(&self, id: &str, now: DateTime<Utc>) -> Result<()> {
        for (link, field) in [(ItemLink::Item, "items"), (ItemLink::Ref, "refs")] {
            let cypher = format!(
                r#"
                MATCH (n:Note {{id: $id}})
                MATCH (p:Note) WHERE $id IN p.{}
                MERGE (p)-[r:ITEM {{link: $link}}]->(n)
                ON CREATE SET r.created = $now
                "#,
                field
            );
            let q = query(&cypher)
                .param("id", id.to_string())
                .param("link", link.to_string())
                .param("now", now.to_rfc3339());
            self.graph.run(q).await?;
        }
        Ok(())
    }

    /// Replace an existing note
    pub async fn update_note(&self, note: &Note) -> Result<Note> {
        let existing = self
            .get_note(&note.id)
            .await?
            .ok_or_else(|| StoreError::not_found(DocumentKind::Note, &note.id))?;

        let mut stored = note.clone();
        stored.rev = Some(next_revision(existing.rev.as_deref()));
        stored.created = existing.created;
        stored.updated = Some(Utc::now());

        let q = query(
            r#"
            MATCH (n:Note {id: $id})
            SET n.rev = $rev,
                n.steward = $steward,
                n.invitations = $invitations,
                n.items = $items,
                n.refs = $refs,
                n.doc = $doc
            "#,
        )
        .param("id", stored.id.clone())
        .param("rev", stored.rev.clone().unwrap_or_default())
        .param("steward", stored.steward.clone().unwrap_or_default())
        .param("invitations", stored.invitations.clone())
        .param("items", stored.items.clone())
        .param("refs", stored.refs.clone())
        .param("doc", serde_json::to_string(&stored)?);

        self.graph.run(q).await?;
        Ok(stored)
    }

    /// Delete a note with all its edges
    pub async fn delete_note(&self, id: &str) -> Result<()> {
        let q = query(
            r#"
            MATCH (n:Note {id: $id})
            DETACH DELETE n
            "#,
        )
        .param("id", id.to_string());

        self.graph.run(q).await?;
        Ok(())
    }

    // ========================================================================
    // Item edges
    // ========================================================================

    /// Remove outgoing edges whose target is no longer listed
    pub async fn remove_obsolete_note_items(
        &self,
        note_id: &str,
        items: &[String],
        refs: &[String],
    ) -> Result<()> {
        let q = query(
            r#"
            MATCH (n:Note {id: $id})-[r:ITEM]->(t:Note)
            WHERE (r.link = 'item' AND NOT t.id IN $items)
               OR (r.link = 'ref' AND NOT t.id IN $refs)
            DELETE r
            "#,
        )
        .param("id", note_id.to_string())
        .param("items", items.to_vec())
        .param("refs", refs.to_vec());

        self.graph.run(q).await?;
        Ok(())
    }

    /// Upsert one edge per listed target that exists
    pub async fn ensure_note_items(
        &self,
        note_id: &str,
        items: &[String],
        refs: &[String],
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        for (link, targets) in [(ItemLink::Item, items), (ItemLink::Ref, refs)] {
            if targets.is_empty() {
                continue;
            }
            let q = query(
                r#"
                MATCH (n:Note {id: $id})
                UNWIND $targets AS target
                MATCH (t:Note {id: target})
                MERGE (n)-[r:ITEM {link: $link}]->(t)
                ON CREATE SET r.created = $now
                ON MATCH SET r.updated = $now
                "#,
            )
            .param("id", note_id.to_string())
            .param("targets", targets.to_vec())
            .param("link", link.to_string())
            .param("now", now.clone());

            self.graph.run(q).await?;
        }
        Ok(())
    }

    /// List the outgoing edges of a note
    pub async fn list_note_items(&self, note_id: &str) -> Result<Vec<ItemEdge>> {
        let q = query(
            r#"
            MATCH (n:Note {id: $id})-[r:ITEM]->(t:Note)
            RETURN t.id AS to, r.link AS link, r.created AS created, r.updated AS updated
            "#,
        )
        .param("id", note_id.to_string());

        let mut result = self.graph.execute(q).await?;
        let mut edges = Vec::new();
        while let Some(row) = result.next().await? {
            let link: String = row.get("link")?;
            edges.push(ItemEdge {
                from: note_id.to_string(),
                to: row.get("to")?,
                link: link.parse().map_err(anyhow::Error::msg)?,
                created: parse_datetime(row.get("created").ok()),
                updated: parse_datetime(row.get("updated").ok()),
            });
        }
        Ok(edges)
    }

    // ========================================================================
    // Access traversals
    // ========================================================================

    /// Invitation ids on a note and its inbound item ancestry.
    ///
    /// Both branches end in distinct vertices, so the planner prunes the
    /// var-length expands instead of enumerating every path.
    pub async fn invitation_ids_for_note(
        &self,
        note_id: &str,
        include_refs: bool,
    ) -> Result<HashSet<String>> {
        let q = query(
            r#"
            MATCH (n:Note {id: $id})
            CALL {
                WITH n
                MATCH (n)<-[:ITEM*0..99 {link: 'item'}]-(v:Note)
                RETURN DISTINCT v
              UNION
                WITH n
                MATCH (n)<-[:ITEM {link: 'ref'}]-(m:Note)
                WHERE $include_refs
                WITH DISTINCT m
                MATCH (m)<-[:ITEM*0..98 {link: 'item'}]-(v:Note)
                RETURN DISTINCT v
            }
            UNWIND coalesce(v.invitations, []) + [v.steward] AS inv
            WITH inv WHERE inv IS NOT NULL AND inv <> ''
            RETURN DISTINCT inv
            "#,
        )
        .param("id", note_id.to_string())
        .param("include_refs", include_refs);

        let mut result = self.graph.execute(q).await?;
        let mut ids = HashSet::new();
        while let Some(row) = result.next().await? {
            ids.insert(row.get::<String>("inv")?);
        }
        Ok(ids)
    }

    /// Every note an invitation can reach, with its access kind.
    ///
    /// Kind 0 is reached through items only, kind 1 through a final ref.
    pub async fn all_note_revs_by_invitation(&self, invitation_id: &str) -> Result<Vec<NoteRev>> {
        let q = query(
            r#"
            MATCH (root:Note)
            WHERE root.steward = $inv OR $inv IN root.invitations
            WITH collect(root) AS roots
            CALL {
                WITH roots
                UNWIND roots AS root
                MATCH (root)-[:ITEM*0..99 {link: 'item'}]->(n:Note)
                RETURN DISTINCT n, 0 AS kind
              UNION
                WITH roots
                UNWIND roots AS root
                MATCH (root)-[:ITEM*0..98 {link: 'item'}]->(m:Note)
                WITH DISTINCT m
                MATCH (m)-[:ITEM {link: 'ref'}]->(n:Note)
                RETURN DISTINCT n, 1 AS kind
            }
            WITH n, min(kind) AS kind
            RETURN n.id AS id, n.rev AS rev, kind
            ORDER BY id
            "#,
        )
        .param("inv", invitation_id.to_string());

        let mut result = self.graph.execute(q).await?;
        let mut revs = Vec::new();
        while let Some(row) = result.next().await? {
            let kind: i64 = row.get("kind")?;
            revs.push(NoteRev {
                id: row.get("id")?,
                rev: row.get("rev").unwrap_or_default(),
                access: if kind == 0 { ItemLink::Item } else { ItemLink::Ref },
            });
        }
        Ok(revs)
    }

    // ========================================================================
    // Invitations
    // ========================================================================

    fn node_to_invitation(node: &neo4rs::Node) -> Result<Invitation> {
        Ok(Invitation {
            id: node.get("id")?,
            token: node.get("token").ok().and_then(non_empty),
            name: node.get("name").ok().and_then(non_empty),
            is_steward: node.get("is_steward").unwrap_or(false),
            created: parse_datetime(node.get("created").ok()),
            updated: parse_datetime(node.get("updated").ok()),
        })
    }

    /// Number of invitations
    pub async fn count_invitations(&self) -> Result<usize> {
        let q = query("MATCH (i:Invitation) RETURN count(i) AS count");
        let mut result = self.graph.execute(q).await?;
        if let Some(row) = result.next().await? {
            let count: i64 = row.get("count")?;
            Ok(count.max(0) as usize)
        } else {
            Ok(0)
        }
    }

    /// List all invitations, oldest first
    pub async fn list_invitations(&self) -> Result<Vec<Invitation>> {
        let q = query(
            r#"
            MATCH (i:Invitation)
            RETURN i
            ORDER BY i.created, i.id
            "#,
        );

        let mut result = self.graph.execute(q).await?;
        let mut invitations = Vec::new();
        while let Some(row) = result.next().await? {
            let node: neo4rs::Node = row.get("i")?;
            invitations.push(Self::node_to_invitation(&node)?);
        }
        Ok(invitations)
    }

    /// Get an invitation by ID
    pub async fn get_invitation(&self, id: &str) -> Result<Option<Invitation>> {
        let q = query("MATCH (i:Invitation {id: $id}) RETURN i").param("id", id.to_string());

        let mut result = self.graph.execute(q).await?;
        if let Some(row) = result.next().await? {
            let node: neo4rs::Node = row.get("i")?;
            Ok(Some(Self::node_to_invitation(&node)?))
        } else {
            Ok(None)
        }
    }

    /// Get an invitation by token
    pub async fn invitation_from_token(&self, token: &str) -> Result<Option<Invitation>> {
        if token.is_empty() {
            return Ok(None);
        }
        let q = query("MATCH (i:Invitation {token: $token}) RETURN i LIMIT 1")
            .param("token", token.to_string());

        let mut result = self.graph.execute(q).await?;
        if let Some(row) = result.next().await? {
            let node: neo4rs::Node = row.get("i")?;
            Ok(Some(Self::node_to_invitation(&node)?))
        } else {
            Ok(None)
        }
    }

    /// Insert an invitation
    pub async fn insert_invitation(&self, invitation: &Invitation) -> Result<Invitation> {
        let now = Utc::now();
        let mut stored = invitation.clone();
        if stored.id.is_empty() {
            stored.id = new_document_id();
        }
        stored.created = Some(now);
        stored.updated = Some(now);

        let q = query(
            r#"
            CREATE (i:Invitation {
                id: $id,
                token: $token,
                name: $name,
                is_steward: $is_steward,
                created: $created,
                updated: $updated
            })
            "#,
        )
        .param("id", stored.id.clone())
        .param("token", stored.token.clone().unwrap_or_default())
        .param("name", stored.name.clone().unwrap_or_default())
        .param("is_steward", stored.is_steward)
        .param("created", format_datetime(stored.created))
        .param("updated", format_datetime(stored.updated));

        self.graph.run(q).await?;
        Ok(stored)
    }

    /// Update an existing invitation
    pub async fn update_invitation(&self, invitation: &Invitation) -> Result<Invitation> {
        let existing = self
            .get_invitation(&invitation.id)
            .await?
            .ok_or_else(|| StoreError::not_found(DocumentKind::Invitation, &invitation.id))?;

        let mut stored = invitation.clone();
        stored.created = existing.created;
        stored.updated = Some(Utc::now());

        let q = query(
            r#"
            MATCH (i:Invitation {id: $id})
            SET i.token = $token,
                i.name = $name,
                i.is_steward = $is_steward,
                i.updated = $updated
            "#,
        )
        .param("id", stored.id.clone())
        .param("token", stored.token.clone().unwrap_or_default())
        .param("name", stored.name.clone().unwrap_or_default())
        .param("is_steward", stored.is_steward)
        .param("updated", format_datetime(stored.updated));

        self.graph.run(q).await?;
        Ok(stored)
    }

    /// Delete an invitation
    pub async fn delete_invitation(&self, id: &str) -> Result<()> {
        let q = query("MATCH (i:Invitation {id: $id}) DETACH DELETE i").param("id", id.to_string());
        self.graph.run(q).await?;
        Ok(())
    }

    /// Remove an invitation from every note listing it
    pub async fn remove_invitation_from_all_notes(&self, invitation_id: &str) -> Result<Vec<Note>> {
        let q = query(
            r#"
            MATCH (n:Note)
            WHERE $inv IN n.invitations
            RETURN n.doc AS doc
            "#,
        )
        .param("inv", invitation_id.to_string());

        let mut result = self.graph.execute(q).await?;
        let mut listed = Vec::new();
        while let Some(row) = result.next().await? {
            let doc: String = row.get("doc")?;
            listed.push(Self::doc_to_note(&doc)?);
        }

        let mut updated = Vec::with_capacity(listed.len());
        for mut note in listed {
            note.invitations.retain(|i| i != invitation_id);
            updated.push(self.update_note(&note).await?);
        }
        Ok(updated)
    }

    // ========================================================================
    // Devices
    // ========================================================================

    fn node_to_device(node: &neo4rs::Node) -> Result<Device> {
        Ok(Device {
            id: node.get("id")?,
            token: node.get("token")?,
            invitation: node.get("invitation").ok().and_then(non_empty),
            created: parse_datetime(node.get("created").ok()),
            updated: parse_datetime(node.get("updated").ok()),
        })
    }

    /// Get or create the device for a token
    pub async fn device_from_token(&self, token: &str) -> Result<Device> {
        let now = Utc::now().to_rfc3339();
        let q = query(
            r#"
            MERGE (d:Device {token: $token})
            ON CREATE SET d.id = $id, d.created = $now, d.invitation = ''
            ON MATCH SET d.updated = $now
            RETURN d
            "#,
        )
        .param("token", token.to_string())
        .param("id", new_document_id())
        .param("now", now);

        let mut result = self.graph.execute(q).await?;
        let row = result
            .next()
            .await?
            .ok_or_else(|| anyhow::anyhow!("Device upsert returned no row"))?;
        let node: neo4rs::Node = row.get("d")?;
        Self::node_to_device(&node)
    }

    /// Update an existing device
    pub async fn update_device(&self, device: &Device) -> Result<Device> {
        let q = query(
            r#"
            MATCH (d:Device {id: $id})
            SET d.invitation = $invitation,
                d.updated = $updated
            RETURN d
            "#,
        )
        .param("id", device.id.clone())
        .param("invitation", device.invitation.clone().unwrap_or_default())
        .param("updated", Utc::now().to_rfc3339());

        let mut result = self.graph.execute(q).await?;
        match result.next().await? {
            Some(row) => {
                let node: neo4rs::Node = row.get("d")?;
                Self::node_to_device(&node)
            }
            None => Err(StoreError::not_found(DocumentKind::Device, &device.id)),
        }
    }

    /// Invitation bound to the device holding this token
    pub async fn invitation_from_device_token(&self, token: &str) -> Result<Option<Invitation>> {
        let q = query(
            r#"
            MATCH (d:Device {token: $token})
            MATCH (i:Invitation {id: d.invitation})
            RETURN i
            "#,
        )
        .param("token", token.to_string());

        let mut result = self.graph.execute(q).await?;
        if let Some(row) = result.next().await? {
            let node: neo4rs::Node = row.get("i")?;
            Ok(Some(Self::node_to_invitation(&node)?))
        } else {
            Ok(None)
        }
    }

    /// Delete every device bound to an invitation
    pub async fn remove_devices_by_invitation(&self, invitation_id: &str) -> Result<()> {
        let q = query("MATCH (d:Device {invitation: $inv}) DELETE d")
            .param("inv", invitation_id.to_string());
        self.graph.run(q).await?;
        Ok(())
    }

    // ========================================================================
    // Health
    // ========================================================================

    /// Check connectivity
    pub async fn health_check(&self) -> Result<bool> {
        match self.graph.run(query("RETURN 1 AS ping")).await {
            Ok(_) => Ok(true),
            Err(_) => Ok(false),
        }
    }
}
