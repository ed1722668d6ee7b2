//! `$ref` resolution across local and remote documents.
//!
//! Resolution runs in two phases. Remote documents are gathered first, in
//! rounds: every round fetches all not-yet-seen locations concurrently and
//! adds whatever new locations the fetched content refers to. Once no new
//! locations remain, the tree is expanded synchronously. References are
//! grouped into strongly connected components; inside a cycle only the first
//! level is inlined and the back-references stay `$ref`s, so recursive
//! schemas terminate and every target is expanded once.

use super::dialect::Dialect;
use super::pointer::{lookup, parse_pointer, split_ref, to_pointer};
use crate::error::Result;
use crate::loader::{Fetch, join_location};
use futures::future::try_join_all;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Key of the document being resolved in the document table
const ROOT: &str = "";

/// A `$ref` member and the path of that member (ending in `$ref`)
#[derive(Debug, Clone, PartialEq)]
pub struct RefSite {
    pub path: Vec<String>,
    pub reference: String,
}

/// A reference whose target does not exist after every fetch completed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnresolvedRef {
    pub path: Vec<String>,
    pub reference: String,
}

/// Output of one resolution
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Dialect-normalized original, references intact
    pub normalized: Value,
    pub resolved: Value,
    pub unresolved: Vec<UnresolvedRef>,
    /// Remote locations that were fetched, in sorted order
    pub fetched: Vec<String>,
}

/// Every `$ref` in a tree, in document order
pub fn find_refs(value: &Value) -> Vec<RefSite> {
    let mut sites = Vec::new();
    collect_refs(value, &mut Vec::new(), &mut sites);
    sites
}

fn collect_refs(value: &Value, path: &mut Vec<String>, sites: &mut Vec<RefSite>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(reference)) = map.get("$ref") {
                let mut ref_path = path.clone();
                ref_path.push("$ref".to_string());
                sites.push(RefSite {
                    path: ref_path,
                    reference: reference.clone(),
                });
                return;
            }
            for (key, child) in map {
                path.push(key.clone());
                collect_refs(child, path, sites);
                path.pop();
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                path.push(index.to_string());
                collect_refs(child, path, sites);
                path.pop();
            }
        }
        _ => {}
    }
}

pub struct Resolver<'a> {
    dialect: &'a dyn Dialect,
    fetcher: Option<&'a dyn Fetch>,
    base: Option<String>,
}

impl<'a> Resolver<'a> {
    pub fn new(dialect: &'a dyn Dialect) -> Self {
        Self {
            dialect,
            fetcher: None,
            base: None,
        }
    }

    /// Allow remote references, fetched with `fetcher`
    pub fn with_fetcher(mut self, fetcher: &'a dyn Fetch) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Location of the document itself, used to join relative references
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub async fn resolve(&self, document: &Value) -> Result<Resolution> {
        let normalized = self.dialect.normalize(document);

        let mut documents: BTreeMap<String, Value> = BTreeMap::new();
        documents.insert(ROOT.to_string(), normalized.clone());
        let mut locations: HashMap<String, Option<String>> = HashMap::new();
        locations.insert(ROOT.to_string(), self.base.clone());

        if let Some(fetcher) = self.fetcher {
            self.fetch_remote(fetcher, &mut documents, &mut locations).await?;
        }

        let unresolved = self.unresolved(&documents, &locations);
        let fetched = documents.keys().filter(|k| !k.is_empty()).cloned().collect();

        let resolved = Expander::new(&documents, &locations).expand(ROOT, &normalized);

        tracing::debug!(
            unresolved = unresolved.len(),
            remote_documents = documents.len() - 1,
            "Resolved document"
        );

        Ok(Resolution {
            normalized,
            resolved,
            unresolved,
            fetched,
        })
    }

    async fn fetch_remote(
        &self,
        fetcher: &dyn Fetch,
        documents: &mut BTreeMap<String, Value>,
        locations: &mut HashMap<String, Option<String>>,
    ) -> Result<()> {
        let mut scanned: BTreeSet<String> = BTreeSet::new();
        let mut round = 0;

        loop {
            let mut pending: BTreeSet<String> = BTreeSet::new();
            for (key, document) in documents.iter() {
                if !scanned.insert(key.clone()) {
                    continue;
                }
                let base = locations.get(key).cloned().flatten();
                for site in find_refs(document) {
                    if let (Some(location), _) = split_ref(&site.reference) {
                        let absolute = join_location(base.as_deref(), location);
                        if !documents.contains_key(&absolute) {
                            pending.insert(absolute);
                        }
                    }
                }
            }
            if pending.is_empty() {
                return Ok(());
            }

            round += 1;
            tracing::debug!(round, count = pending.len(), "Fetching remote documents");

            // One failure aborts the whole round
            let fetched = try_join_all(pending.iter().map(|location| fetcher.fetch(location))).await?;
            for (location, document) in pending.into_iter().zip(fetched) {
                locations.insert(location.clone(), Some(location.clone()));
                documents.insert(location, self.dialect.normalize(&document));
            }
        }
    }

    fn unresolved(
        &self,
        documents: &BTreeMap<String, Value>,
        locations: &HashMap<String, Option<String>>,
    ) -> Vec<UnresolvedRef> {
        let mut unresolved = Vec::new();
        for (key, document) in documents {
            let base = locations.get(key).cloned().flatten();
            for site in find_refs(document) {
                if target(documents, base.as_deref(), &site.reference).is_some() {
                    continue;
                }
                let mut path = site.path;
                if !key.is_empty() {
                    path.insert(0, key.clone());
                }
                unresolved.push(UnresolvedRef {
                    path,
                    reference: site.reference,
                });
            }
        }
        unresolved
    }
}

/// Document key and canonical pointer a reference points at
type Target = (String, String);

fn target_key(base: Option<&str>, reference: &str) -> Target {
    let (location, fragment) = split_ref(reference);
    let key = match location {
        Some(location) => join_location(base, location),
        None => ROOT.to_string(),
    };
    (key, to_pointer(&parse_pointer(fragment)))
}

fn find_target<'d>(documents: &'d BTreeMap<String, Value>, target: &Target) -> Option<&'d Value> {
    lookup(documents.get(&target.0)?, &parse_pointer(&target.1))
}

fn target<'d>(
    documents: &'d BTreeMap<String, Value>,
    base: Option<&str>,
    reference: &str,
) -> Option<&'d Value> {
    find_target(documents, &target_key(base, reference))
}

/// Reference graph between existing targets, grouped into strongly
/// connected components. An edge `a -> b` means the subtree at `a` holds a
/// `$ref` to `b`.
struct RefGraph {
    component: HashMap<Target, usize>,
    cyclic: Vec<bool>,
}

impl RefGraph {
    fn build(
        documents: &BTreeMap<String, Value>,
        locations: &HashMap<String, Option<String>>,
    ) -> Self {
        let base_of = |key: &str| locations.get(key).cloned().flatten();

        let mut graph: DiGraph<Target, ()> = DiGraph::new();
        let mut index: HashMap<Target, NodeIndex> = HashMap::new();
        for (key, document) in documents {
            let base = base_of(key.as_str());
            for site in find_refs(document) {
                let target = target_key(base.as_deref(), &site.reference);
                if !index.contains_key(&target) && find_target(documents, &target).is_some() {
                    let node = graph.add_node(target.clone());
                    index.insert(target, node);
                }
            }
        }

        for (target, &from) in &index {
            let Some(found) = find_target(documents, target) else {
                continue;
            };
            let base = base_of(target.0.as_str());
            for site in find_refs(found) {
                if let Some(&to) = index.get(&target_key(base.as_deref(), &site.reference)) {
                    graph.update_edge(from, to, ());
                }
            }
        }

        let mut component = HashMap::new();
        let mut cyclic = Vec::new();
        for (id, members) in tarjan_scc(&graph).into_iter().enumerate() {
            cyclic.push(members.len() > 1 || graph.contains_edge(members[0], members[0]));
            for member in members {
                component.insert(graph[member].clone(), id);
            }
        }
        Self { component, cyclic }
    }

    /// Component of `target` when it takes part in a reference cycle
    fn cycle_of(&self, target: &Target) -> Option<usize> {
        self.component.get(target).copied().filter(|id| self.cyclic[*id])
    }
}

/// Expands references, each target exactly once.
///
/// While a target that sits on a cycle is expanded, references to members of
/// the same cycle stay `$ref`s. That makes every expansion depend on its
/// target alone, so results are memoized unconditionally.
struct Expander<'d> {
    documents: &'d BTreeMap<String, Value>,
    locations: &'d HashMap<String, Option<String>>,
    graph: RefGraph,
    /// Cycle of the innermost target being expanded
    cycle: Option<usize>,
    /// Position inside the root document, while walking it directly
    root_path: Option<Vec<String>>,
    memo: HashMap<Target, Value>,
}

impl<'d> Expander<'d> {
    fn new(
        documents: &'d BTreeMap<String, Value>,
        locations: &'d HashMap<String, Option<String>>,
    ) -> Self {
        Self {
            documents,
            locations,
            graph: RefGraph::build(documents, locations),
            cycle: None,
            root_path: Some(Vec::new()),
            memo: HashMap::new(),
        }
    }

    /// Expand `value` (which lives in document `key`)
    fn expand(&mut self, key: &str, value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                if let Some(Value::String(reference)) = map.get("$ref") {
                    return self.expand_ref(key, value, reference);
                }
                let mut out = Map::new();
                for (name, child) in map {
                    let expanded = self.enter(key, name, child);
                    out.insert(name.clone(), expanded);
                }
                Value::Object(out)
            }
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(index, child)| self.enter(key, &index.to_string(), child))
                    .collect(),
            ),
            scalar => scalar.clone(),
        }
    }

    /// Expand a child node. While walking the root document itself, a node
    /// that is a cyclic target opens its cycle for the subtree below it.
    fn enter(&mut self, key: &str, segment: &str, child: &Value) -> Value {
        let Some(path) = self.root_path.as_mut() else {
            return self.expand(key, child);
        };
        path.push(segment.to_string());
        let here = (ROOT.to_string(), to_pointer(path.as_slice()));

        let outer = self.cycle;
        if let Some(cycle) = self.graph.cycle_of(&here) {
            self.cycle = Some(cycle);
        }
        let expanded = self.expand(key, child);
        self.cycle = outer;

        if let Some(path) = self.root_path.as_mut() {
            path.pop();
        }
        expanded
    }

    fn expand_ref(&mut self, key: &str, node: &Value, reference: &str) -> Value {
        let base = self.locations.get(key).cloned().flatten();
        let target = target_key(base.as_deref(), reference);

        let cycle = self.graph.cycle_of(&target);
        if cycle.is_some() && cycle == self.cycle {
            return node.clone();
        }
        if let Some(done) = self.memo.get(&target) {
            return done.clone();
        }
        let documents = self.documents;
        let Some(found) = find_target(documents, &target) else {
            return node.clone();
        };

        let outer_cycle = std::mem::replace(&mut self.cycle, cycle);
        let outer_path = self.root_path.take();
        let expanded = self.expand(&target.0, found);
        self.cycle = outer_cycle;
        self.root_path = outer_path;

        self.memo.insert(target, expanded.clone());
        expanded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WardenError;
    use crate::spec::dialect::Version;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct MapFetcher {
        documents: HashMap<String, Value>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Fetch for MapFetcher {
        async fn fetch(&self, location: &str) -> Result<Value> {
            self.calls.lock().unwrap().push(location.to_string());
            self.documents
                .get(location)
                .cloned()
                .ok_or_else(|| WardenError::FetchError {
                    location: location.to_string(),
                    message: "not found".to_string(),
                })
        }
    }

    fn v2() -> &'static dyn Dialect {
        Version::V2_0.dialect()
    }

    #[tokio::test]
    async fn test_local_references_are_expanded() {
        let document = json!({
            "definitions": {
                "Pet": {"properties": {"tag": {"$ref": "#/definitions/Tag"}}},
                "Tag": {"type": "string"}
            },
            "paths": {"/pets": {"get": {"responses": {"200": {"schema": {"$ref": "#/definitions/Pet"}}}}}}
        });
        let resolution = Resolver::new(v2()).resolve(&document).await.unwrap();
        assert_eq!(
            resolution.resolved["paths"]["/pets"]["get"]["responses"]["200"]["schema"]["properties"]["tag"],
            json!({"type": "string"})
        );
        assert!(resolution.unresolved.is_empty());
        assert_eq!(resolution.normalized, document);
    }

    #[tokio::test]
    async fn test_circular_reference_is_left_in_place() {
        let document = json!({
            "definitions": {
                "Node": {"properties": {"next": {"$ref": "#/definitions/Node"}}}
            }
        });
        let resolution = Resolver::new(v2()).resolve(&document).await.unwrap();
        assert_eq!(
            resolution.resolved["definitions"]["Node"]["properties"]["next"],
            json!({"$ref": "#/definitions/Node"})
        );
    }

    #[tokio::test]
    async fn test_mutually_referencing_definitions_expand_once() {
        let names: Vec<String> = (0..12).map(|i| format!("Model{}", i)).collect();
        let definitions: Map<String, Value> = names
            .iter()
            .map(|name| {
                let properties: Map<String, Value> = names
                    .iter()
                    .map(|other| (other.to_lowercase(), json!({"$ref": format!("#/definitions/{}", other)})))
                    .collect();
                (name.clone(), json!({"properties": properties}))
            })
            .collect();
        let document = json!({
            "definitions": definitions,
            "paths": {"/models": {"get": {"responses": {"200": {"schema": {"$ref": "#/definitions/Model3"}}}}}}
        });

        let resolution = Resolver::new(v2()).resolve(&document).await.unwrap();

        assert_eq!(
            resolution.resolved["definitions"]["Model0"]["properties"]["model7"],
            json!({"$ref": "#/definitions/Model7"})
        );
        let schema = &resolution.resolved["paths"]["/models"]["get"]["responses"]["200"]["schema"];
        assert_eq!(schema["properties"]["model5"], json!({"$ref": "#/definitions/Model5"}));
        assert_eq!(schema["properties"].as_object().unwrap().len(), 12);
        assert!(serde_json::to_string(&resolution.resolved).unwrap().len() < 20_000);
    }

    #[tokio::test]
    async fn test_shared_targets_outside_cycles_are_inlined_everywhere() {
        let document = json!({
            "definitions": {
                "Tag": {"type": "string"},
                "Node": {"properties": {"next": {"$ref": "#/definitions/Node"}, "tag": {"$ref": "#/definitions/Tag"}}}
            },
            "schema": {"$ref": "#/definitions/Node"}
        });
        let resolution = Resolver::new(v2()).resolve(&document).await.unwrap();
        let schema = &resolution.resolved["schema"];
        assert_eq!(schema["properties"]["next"], json!({"$ref": "#/definitions/Node"}));
        assert_eq!(schema["properties"]["tag"], json!({"type": "string"}));
        assert_eq!(
            resolution.resolved["definitions"]["Node"]["properties"]["tag"],
            json!({"type": "string"})
        );
    }

    #[tokio::test]
    async fn test_missing_target_is_recorded_not_fatal() {
        let document = json!({"a": {"$ref": "#/definitions/Missing"}, "b": {"type": "string"}});
        let resolution = Resolver::new(v2()).resolve(&document).await.unwrap();
        assert_eq!(resolution.unresolved.len(), 1);
        assert_eq!(resolution.unresolved[0].path, vec!["a", "$ref"]);
        assert_eq!(resolution.resolved["b"], json!({"type": "string"}));
    }

    #[tokio::test]
    async fn test_remote_documents_are_fetched_in_rounds() {
        let fetcher = MapFetcher {
            documents: HashMap::from([
                (
                    "http://example.com/specs/pet.json".to_string(),
                    json!({"Pet": {"properties": {"tag": {"$ref": "tag.json#/Tag"}}}}),
                ),
                (
                    "http://example.com/specs/tag.json".to_string(),
                    json!({"Tag": {"type": "string"}}),
                ),
            ]),
            calls: Mutex::new(Vec::new()),
        };
        let document = json!({"schema": {"$ref": "pet.json#/Pet"}});

        let resolution = Resolver::new(v2())
            .with_fetcher(&fetcher)
            .with_base("http://example.com/specs/swagger.json")
            .resolve(&document)
            .await
            .unwrap();

        assert_eq!(
            resolution.resolved["schema"]["properties"]["tag"],
            json!({"type": "string"})
        );
        assert_eq!(
            *fetcher.calls.lock().unwrap(),
            vec![
                "http://example.com/specs/pet.json".to_string(),
                "http://example.com/specs/tag.json".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_is_a_hard_error() {
        let fetcher = MapFetcher {
            documents: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        };
        let document = json!({"schema": {"$ref": "http://example.com/missing.json#/Pet"}});
        let result = Resolver::new(v2()).with_fetcher(&fetcher).resolve(&document).await;
        assert!(matches!(result, Err(WardenError::FetchError { .. })));
    }

    #[tokio::test]
    async fn test_remote_references_without_fetcher_are_unresolved() {
        let document = json!({"schema": {"$ref": "http://example.com/pet.json#/Pet"}});
        let resolution = Resolver::new(v2()).resolve(&document).await.unwrap();
        assert_eq!(resolution.unresolved.len(), 1);
        assert_eq!(resolution.resolved, document);
    }

    #[test]
    fn test_find_refs_paths_end_in_ref() {
        let sites = find_refs(&json!({"a": [{"$ref": "#/x"}], "b": {"$ref": "#/y", "ignored": {"$ref": "#/z"}}}));
        assert_eq!(sites.len(), 2);
        assert_eq!(sites[0].path, vec!["a", "0", "$ref"]);
        assert_eq!(sites[1].reference, "#/y");
    }
}
